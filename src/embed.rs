//! Documents nested inside other documents.
//!
//! A field marked `#[document(embed)]` holds a document (or a container of documents) that
//! travels in its own `#type` envelope inside the parent's field mapping:
//!
//! ```text
//! {"#type": "u", "name": "Jane", "address": {"#type": "address", "city": "Varna"}}
//! ```
//!
//! [`Embedded`] walks the normalized form of a field type. The derive implements it for
//! every document type; the impls below lift it through `Option`, `Box`, `Vec` and string
//! keyed maps.

use crate::codec::TaggedCodec;
use crate::error::Result;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Field mapping of a normalized document.
pub type Fields = Map<String, Value>;

/// A field type whose normalized form may contain nested documents.
pub trait Embedded {
    /// Wraps every nested document inside `value` in its envelope.
    fn tag(value: &mut Value, codec: &TaggedCodec) -> Result<()>;

    /// Checks and strips the envelopes inside `value` so it deserializes as `Self`.
    ///
    /// `path` locates `value` in the enclosing document, for diagnostics.
    fn untag(value: &mut Value, codec: &TaggedCodec, path: &str) -> Result<()>;
}

impl<T: Embedded> Embedded for Option<T> {
    fn tag(value: &mut Value, codec: &TaggedCodec) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        T::tag(value, codec)
    }

    fn untag(value: &mut Value, codec: &TaggedCodec, path: &str) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        T::untag(value, codec, path)
    }
}

impl<T: Embedded> Embedded for Box<T> {
    fn tag(value: &mut Value, codec: &TaggedCodec) -> Result<()> {
        T::tag(value, codec)
    }

    fn untag(value: &mut Value, codec: &TaggedCodec, path: &str) -> Result<()> {
        T::untag(value, codec, path)
    }
}

impl<T: Embedded> Embedded for Vec<T> {
    fn tag(value: &mut Value, codec: &TaggedCodec) -> Result<()> {
        if let Value::Array(items) = value {
            for item in items {
                T::tag(item, codec)?;
            }
        }
        Ok(())
    }

    fn untag(value: &mut Value, codec: &TaggedCodec, path: &str) -> Result<()> {
        if let Value::Array(items) = value {
            for (index, item) in items.iter_mut().enumerate() {
                T::untag(item, codec, &format!("{path}[{index}]"))?;
            }
        }
        Ok(())
    }
}

fn tag_entries<T: Embedded>(value: &mut Value, codec: &TaggedCodec) -> Result<()> {
    if let Value::Object(entries) = value {
        for entry in entries.values_mut() {
            T::tag(entry, codec)?;
        }
    }
    Ok(())
}

fn untag_entries<T: Embedded>(value: &mut Value, codec: &TaggedCodec, path: &str) -> Result<()> {
    if let Value::Object(entries) = value {
        for (key, entry) in entries.iter_mut() {
            T::untag(entry, codec, &format!("{path}.{key}"))?;
        }
    }
    Ok(())
}

impl<K, T: Embedded> Embedded for BTreeMap<K, T> {
    fn tag(value: &mut Value, codec: &TaggedCodec) -> Result<()> {
        tag_entries::<T>(value, codec)
    }

    fn untag(value: &mut Value, codec: &TaggedCodec, path: &str) -> Result<()> {
        untag_entries::<T>(value, codec, path)
    }
}

impl<K, T: Embedded, S> Embedded for HashMap<K, T, S> {
    fn tag(value: &mut Value, codec: &TaggedCodec) -> Result<()> {
        tag_entries::<T>(value, codec)
    }

    fn untag(value: &mut Value, codec: &TaggedCodec, path: &str) -> Result<()> {
        untag_entries::<T>(value, codec, path)
    }
}
