//! The tagged codec: injects and extracts the `#type` envelope around normalized objects.
//!
//! Wire shapes:
//!
//! ```text
//! {"#type": "<alias>", <field>: <value>, ...}     normalized form is a mapping
//! {"#type": "<alias>", "#scalar": <value>}        normalized form is anything else
//! ```
//!
//! On decode the tag is authoritative: a caller-declared type is only consulted when the
//! payload carries no tag.
//!
//! Documents held in `#[document(embed)]` fields are wrapped the same way inside the
//! parent's mapping. A nested tag must resolve to the field's own type.

use crate::context::Context;
use crate::document::{Document, DocumentType};
use crate::error::{OdmError, Result};
use crate::normalizer::{Normalizer, ROOT_PATH};
use crate::registry::TypeRegistry;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{trace, warn};

/// Reserved key holding the alias of the encoded type.
pub const TYPE_KEY: &str = "#type";

/// Reserved key holding a normalized form that is not a mapping.
pub const SCALAR_KEY: &str = "#scalar";

/// Wraps a [`Normalizer`] with type tagging driven by a [`TypeRegistry`].
#[derive(Debug, Clone)]
pub struct TaggedCodec {
    registry: Arc<TypeRegistry>,
    normalizer: Arc<dyn Normalizer>,
}

impl TaggedCodec {
    /// Creates a codec over a shared registry and engine.
    pub fn new(registry: Arc<TypeRegistry>, normalizer: Arc<dyn Normalizer>) -> Self {
        Self {
            registry,
            normalizer,
        }
    }

    /// The registry used to resolve aliases.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Encodes an object into its tagged envelope.
    ///
    /// Nested documents in `#[document(embed)]` fields get envelopes of their own.
    pub fn encode(&self, value: &dyn Document, ctx: &Context) -> Result<Value> {
        let mut normalized = self.normalizer.normalize(value, ctx)?;
        value.tag_nested(&mut normalized, self)?;
        Ok(self.envelope(value.type_name(), normalized))
    }

    /// Replaces the normalized form of a nested `T` with its envelope.
    ///
    /// Called by the derived [`Embedded`](crate::Embedded) impls.
    pub fn wrap_nested<T: DocumentType>(&self, value: &mut Value) -> Result<()> {
        if let Value::Object(fields) = value {
            T::tag_embedded(fields, self)?;
        }
        let normalized = std::mem::take(value);
        *value = self.envelope(T::TYPE_NAME, normalized);
        Ok(())
    }

    /// Checks the envelope of a nested `T` and replaces it with the normalized form.
    ///
    /// The tag must resolve to `T` itself. Untagged values are taken as they are.
    pub fn unwrap_nested<T: DocumentType>(&self, value: &mut Value, path: &str) -> Result<()> {
        let mut scalar = None;
        if let Value::Object(fields) = value {
            if let Some(Value::String(alias)) = fields.get(TYPE_KEY) {
                let type_name = self.registry.type_for(alias);
                if type_name != T::TYPE_NAME {
                    if !self.registry.is_registered(type_name) {
                        return Err(OdmError::UnresolvableType {
                            alias: alias.clone(),
                            type_name: type_name.to_owned(),
                        });
                    }
                    let message = format!("tag '{alias}' resolves to '{type_name}'");
                    return Err(OdmError::FieldDecodeFailure {
                        type_name: T::TYPE_NAME.to_owned(),
                        path: path.to_owned(),
                        cause: Arc::new(<serde_json::Error as serde::de::Error>::custom(message)),
                    });
                }
                fields.remove(TYPE_KEY);
                scalar = fields.remove(SCALAR_KEY);
            }
        }
        if let Some(scalar) = scalar {
            *value = scalar;
        }
        if let Value::Object(fields) = value {
            T::untag_embedded(fields, self, path)?;
        }
        Ok(())
    }

    fn envelope(&self, type_name: &str, normalized: Value) -> Value {
        let alias = self.registry.alias_for(type_name);

        let mut envelope = Map::new();
        envelope.insert(TYPE_KEY.to_owned(), Value::String(alias.to_owned()));
        match normalized {
            Value::Object(fields) => {
                for (key, field) in fields {
                    if key == TYPE_KEY {
                        warn!(type_name, "field named '#type' dropped from envelope");
                        continue;
                    }
                    envelope.insert(key, field);
                }
            }
            scalar => {
                envelope.insert(SCALAR_KEY.to_owned(), scalar);
            }
        }
        Value::Object(envelope)
    }

    /// Encodes a non-object value. No tag is added.
    pub fn encode_value<T: Serialize + ?Sized>(&self, value: &T) -> Result<Value> {
        serde_json::to_value(value).map_err(|e| OdmError::Serialization(e.to_string()))
    }

    /// Decodes an envelope.
    ///
    /// * Tagged: resolve `#type` through the registry, strip it, unwrap `#scalar` if
    ///   present, denormalize against the tagged type. `declared` is ignored.
    /// * Untagged, no `declared`: the value comes back unchanged as a
    ///   [`serde_json::Value`] document.
    /// * Untagged with `declared` (an alias or a type identity): denormalize against it.
    pub fn decode(
        &self,
        envelope: Value,
        declared: Option<&str>,
        ctx: &Context,
    ) -> Result<Box<dyn Document>> {
        let mut fields = match envelope {
            Value::Object(fields) => fields,
            other => return self.decode_untagged(other, declared, ctx),
        };

        let alias = match fields.get(TYPE_KEY) {
            Some(Value::String(alias)) => alias.clone(),
            _ => return self.decode_untagged(Value::Object(fields), declared, ctx),
        };

        let type_name = self.registry.type_for(&alias);
        let binding = self
            .registry
            .binding(type_name)
            .ok_or_else(|| OdmError::UnresolvableType {
                alias: alias.clone(),
                type_name: type_name.to_owned(),
            })?;
        trace!(alias = %alias, type_name, "decoding tagged envelope");

        fields.remove(TYPE_KEY);
        let mut data = fields
            .remove(SCALAR_KEY)
            .unwrap_or(Value::Object(fields));
        binding.untag_embedded(&mut data, self, ROOT_PATH)?;
        self.normalizer.denormalize(data, binding, ctx)
    }

    /// Decodes an envelope and downcasts it to `T`.
    pub fn decode_as<T: DocumentType>(&self, envelope: Value, ctx: &Context) -> Result<T> {
        let decoded = self.decode(envelope, Some(T::TYPE_NAME), ctx)?;
        let found = decoded.type_name();
        decoded
            .as_any()
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| OdmError::UnexpectedType {
                expected: T::TYPE_NAME,
                found: found.to_owned(),
            })
    }

    fn decode_untagged(
        &self,
        mut data: Value,
        declared: Option<&str>,
        ctx: &Context,
    ) -> Result<Box<dyn Document>> {
        let Some(declared) = declared.filter(|d| !d.is_empty()) else {
            return Ok(Box::new(data));
        };
        let type_name = self.registry.type_for(declared);
        let binding = self
            .registry
            .binding(type_name)
            .ok_or_else(|| OdmError::UnresolvableType {
                alias: declared.to_owned(),
                type_name: type_name.to_owned(),
            })?;
        binding.untag_embedded(&mut data, self, ROOT_PATH)?;
        self.normalizer.denormalize(data, binding, ctx)
    }
}
