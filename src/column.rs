//! Storage boundary: converts between a nullable text column and a [`Payload`].

use crate::context::Context;
use crate::document::Document;
use crate::error::Result;
use crate::serializer::{DocumentSerializer, Payload};
use std::sync::Arc;
use tracing::trace;

/// A nullable JSON text column backed by a [`DocumentSerializer`].
///
/// The configured serialization and deserialization contexts of the serializer apply to
/// every conversion.
#[derive(Debug, Clone)]
pub struct JsonColumn {
    serializer: Arc<DocumentSerializer>,
}

impl JsonColumn {
    /// Column type name used in schema hints.
    pub const NAME: &'static str = "json_document";

    /// Creates a column over a shared serializer.
    pub fn new(serializer: Arc<DocumentSerializer>) -> Self {
        Self { serializer }
    }

    /// The serializer behind the column.
    pub fn serializer(&self) -> &Arc<DocumentSerializer> {
        &self.serializer
    }

    /// Converts a payload for storage. `None` is stored as SQL `NULL`.
    ///
    /// Lazy handles that were never observed are written from their original text.
    pub fn to_storage(&self, value: Option<&Payload>) -> Result<Option<String>> {
        value
            .map(|payload| self.serializer.serialize_payload(payload, &Context::default()))
            .transpose()
    }

    /// Converts a single document for storage.
    pub fn document_to_storage(&self, value: Option<&dyn Document>) -> Result<Option<String>> {
        value
            .map(|document| self.serializer.serialize(document, &Context::default()))
            .transpose()
    }

    /// Reads a stored value. `NULL` and the empty string read as `None`.
    pub fn from_storage(&self, stored: Option<&str>) -> Result<Option<Payload>> {
        match stored {
            None | Some("") => {
                trace!("empty column value");
                Ok(None)
            }
            Some(json) => self.serializer.deserialize(json, &Context::default()).map(Some),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_and_empty_read_as_none() {
        let column = JsonColumn::new(DocumentSerializer::builder().build());
        assert!(column.from_storage(None).unwrap().is_none());
        assert!(column.from_storage(Some("")).unwrap().is_none());
        assert_eq!(column.to_storage(None).unwrap(), None);
    }

    #[test]
    fn plain_values_pass_through() {
        let column = JsonColumn::new(DocumentSerializer::builder().build());
        let payload = column.from_storage(Some("[1,2,3]")).unwrap().unwrap();
        assert_eq!(payload.as_value(), Some(&json!([1, 2, 3])));
        assert_eq!(
            column.to_storage(Some(&payload)).unwrap().as_deref(),
            Some("[1,2,3]")
        );
    }
}
