//! The object model: what it means for a value to be a taggable document.
//!
//! [`DocumentType`] is the static side (a type identity plus the serde bounds the
//! normalization engine needs). [`Document`] is its object-safe shadow, so decoded values
//! can travel as `Box<dyn Document>` until the caller downcasts them.
//!
//! `#[derive(Document)]` implements [`DocumentType`]; [`Document`] follows from the
//! blanket impl below.

use crate::codec::TaggedCodec;
use crate::embed::Fields;
use crate::error::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::Any;
use std::fmt;

/// Type identity of the generic fallback document, [`serde_json::Value`].
pub const FALLBACK_TYPE: &str = "json";

/// A concrete type that can be stored as a tagged envelope.
///
/// `TYPE_NAME` is the fully qualified type identity written (through its alias) into the
/// `#type` key. The derive macro defaults it to `module_path!()::Name`.
pub trait DocumentType:
    Serialize + DeserializeOwned + PartialEq + Clone + fmt::Debug + Send + Sync + 'static
{
    /// Fully qualified type identity.
    const TYPE_NAME: &'static str;

    /// Wraps the `#[document(embed)]` fields of a normalized `Self` in their envelopes.
    fn tag_embedded(_fields: &mut Fields, _codec: &TaggedCodec) -> Result<()> {
        Ok(())
    }

    /// Checks and strips the envelopes of the `#[document(embed)]` fields before decoding.
    fn untag_embedded(_fields: &mut Fields, _codec: &TaggedCodec, _path: &str) -> Result<()> {
        Ok(())
    }
}

/// Object-safe view of a [`DocumentType`].
pub trait Document: Any + fmt::Debug + Send + Sync + 'static {
    /// Fully qualified type identity of the concrete value.
    fn type_name(&self) -> &'static str;

    /// Normalizes the value into its field mapping (or scalar) form.
    fn to_value(&self) -> serde_json::Result<Value>;

    /// Upcast for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Value equality as defined by the concrete type. Values of different types are never equal.
    fn eq_document(&self, other: &dyn Document) -> bool;

    /// Clones the value behind a fresh box.
    fn clone_document(&self) -> Box<dyn Document>;

    /// Tags the nested documents of this value's normalized form.
    fn tag_nested(&self, normalized: &mut Value, codec: &TaggedCodec) -> Result<()>;
}

impl<T: DocumentType> Document for T {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn eq_document(&self, other: &dyn Document) -> bool {
        other.as_any().downcast_ref::<T>() == Some(self)
    }

    fn clone_document(&self) -> Box<dyn Document> {
        Box::new(self.clone())
    }

    fn tag_nested(&self, normalized: &mut Value, codec: &TaggedCodec) -> Result<()> {
        match normalized {
            Value::Object(fields) => T::tag_embedded(fields, codec),
            _ => Ok(()),
        }
    }
}

impl dyn Document {
    /// Returns `true` if the concrete value is a `T`.
    pub fn is<T: DocumentType>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Borrows the concrete value as `T`.
    pub fn downcast_ref<T: DocumentType>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Mutably borrows the concrete value as `T`.
    pub fn downcast_mut<T: DocumentType>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

impl PartialEq for dyn Document {
    fn eq(&self, other: &Self) -> bool {
        self.eq_document(other)
    }
}

impl Clone for Box<dyn Document> {
    fn clone(&self) -> Self {
        self.clone_document()
    }
}

/// Untyped JSON is the fallback document: mappings with no `#type` and no declared type
/// come back as a `Value`.
impl DocumentType for Value {
    const TYPE_NAME: &'static str = FALLBACK_TYPE;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fallback_documents_compare_by_value() {
        let a: Box<dyn Document> = Box::new(json!({"a": 1}));
        let b: Box<dyn Document> = Box::new(json!({"a": 1}));
        let c: Box<dyn Document> = Box::new(json!([1]));
        assert!(a.as_ref() == b.as_ref());
        assert!(a.as_ref() != c.as_ref());
        assert_eq!(a.type_name(), FALLBACK_TYPE);
        assert!(a.is::<Value>());
        assert_eq!(a.downcast_ref::<Value>().unwrap()["a"], 1);
    }
}
