//! The top-level entry point: JSON text in, payloads and lazy handles out.

use crate::codec::TaggedCodec;
use crate::config::{OdmConfig, SequenceMode};
use crate::context::Context;
use crate::document::{Document, DocumentType};
use crate::error::{OdmError, Result};
use crate::lazy::{LazyObject, LazySequence, PersistentSequence};
use crate::normalizer::{Normalizer, SerdeNormalizer};
use crate::registry::{AliasMap, TypeBinding, TypeRegistry};
use crate::sniff::{self, RootShape};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// The result of reading a stored JSON string.
#[derive(Debug)]
pub enum Payload {
    /// A scalar or an untagged structure, decoded literally.
    Value(Value),
    /// A single tagged object.
    Object(LazyObject),
    /// A tagged array with per-element materialization.
    Sequence(LazySequence),
    /// A tagged array with whole-array materialization and copy-on-write updates.
    Persistent(PersistentSequence),
}

impl Payload {
    /// The literal value, if this payload is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The object handle, if this payload is one.
    pub fn as_object(&self) -> Option<&LazyObject> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Mutable access to the object handle.
    pub fn as_object_mut(&mut self) -> Option<&mut LazyObject> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// The sequence handle, if this payload is one.
    pub fn as_sequence(&self) -> Option<&LazySequence> {
        match self {
            Self::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Mutable access to the sequence handle.
    pub fn as_sequence_mut(&mut self) -> Option<&mut LazySequence> {
        match self {
            Self::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// The persistent sequence handle, if this payload is one.
    pub fn as_persistent(&self) -> Option<&PersistentSequence> {
        match self {
            Self::Persistent(p) => Some(p),
            _ => None,
        }
    }

    /// Consumes the payload, returning the object handle.
    pub fn into_object(self) -> Option<LazyObject> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Consumes the payload, returning the sequence handle.
    pub fn into_sequence(self) -> Option<LazySequence> {
        match self {
            Self::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Consumes the payload, returning the persistent sequence handle.
    pub fn into_persistent(self) -> Option<PersistentSequence> {
        match self {
            Self::Persistent(p) => Some(p),
            _ => None,
        }
    }
}

/// Serializes documents to tagged JSON and reads them back as lazy handles.
///
/// Built once per process with [`DocumentSerializer::builder`] and shared as
/// `Arc<DocumentSerializer>`; every handle keeps a reference to it.
#[derive(Debug)]
pub struct DocumentSerializer {
    codec: TaggedCodec,
    lazy_loading: bool,
    sequence_mode: SequenceMode,
    serialization_context: Context,
    deserialization_context: Context,
}

impl DocumentSerializer {
    /// Starts a builder with lazy loading on and no aliases.
    pub fn builder() -> DocumentSerializerBuilder {
        DocumentSerializerBuilder::default()
    }

    /// The tagged codec.
    pub fn codec(&self) -> &TaggedCodec {
        &self.codec
    }

    /// The registry.
    pub fn registry(&self) -> &TypeRegistry {
        self.codec.registry()
    }

    /// Whether reads hand out lazy handles.
    pub fn lazy_loading(&self) -> bool {
        self.lazy_loading
    }

    /// Handle used for tagged arrays.
    pub fn sequence_mode(&self) -> SequenceMode {
        self.sequence_mode
    }

    /// See [`AliasMap::alias_for`].
    pub fn alias_for<'a>(&'a self, type_name: &'a str) -> &'a str {
        self.registry().alias_for(type_name)
    }

    /// See [`AliasMap::type_for`].
    pub fn type_for<'a>(&'a self, alias: &'a str) -> &'a str {
        self.registry().type_for(alias)
    }

    /// Configured write-path defaults with `ctx` applied on top.
    pub fn write_context(&self, ctx: &Context) -> Context {
        self.serialization_context.merged(ctx)
    }

    /// Configured read-path defaults with `ctx` applied on top.
    pub fn read_context(&self, ctx: &Context) -> Context {
        self.deserialization_context.merged(ctx)
    }

    /// Encodes one object as a tagged envelope.
    pub fn serialize(&self, value: &dyn Document, ctx: &Context) -> Result<String> {
        let envelope = self.codec.encode(value, &self.write_context(ctx))?;
        to_json(&envelope)
    }

    /// Encodes objects as a JSON array of envelopes.
    pub fn serialize_all<'v, I>(&self, values: I, ctx: &Context) -> Result<String>
    where
        I: IntoIterator<Item = &'v dyn Document>,
    {
        let ctx = self.write_context(ctx);
        let envelopes = values
            .into_iter()
            .map(|value| self.codec.encode(value, &ctx))
            .collect::<Result<Vec<_>>>()?;
        to_json(&envelopes)
    }

    /// Encodes a non-object value as plain JSON, without a tag.
    pub fn serialize_value<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        to_json(&self.codec.encode_value(value)?)
    }

    /// Writes a payload back to JSON.
    ///
    /// Handles that were never observed are written from their original text without
    /// decoding anything.
    pub fn serialize_payload(&self, payload: &Payload, ctx: &Context) -> Result<String> {
        match payload {
            Payload::Value(value) => self.serialize_value(value),
            Payload::Object(object) => object.to_json(ctx),
            Payload::Sequence(sequence) => Ok(sequence.to_json()),
            Payload::Persistent(sequence) => sequence.to_json(ctx),
        }
    }

    /// Reads a stored JSON string.
    ///
    /// With lazy loading on, a tagged object becomes a pending [`LazyObject`] and an array
    /// whose first element is tagged becomes a lazy sequence; nothing is decoded until it
    /// is observed. Scalars, untagged objects and untagged arrays are decoded on the spot.
    ///
    /// With lazy loading off, the same handles are returned already materialized and any
    /// decode failure surfaces here.
    ///
    /// # Errors
    /// [`OdmError::InvalidPayload`] for malformed text (always immediate). With lazy
    /// loading off, any decode failure.
    pub fn deserialize(self: &Arc<Self>, json: &str, ctx: &Context) -> Result<Payload> {
        let ctx = Arc::new(self.read_context(ctx));
        let shape = sniff::classify_root(json)?;
        debug!(?shape, lazy = self.lazy_loading, "deserializing document");

        match shape {
            RootShape::TaggedObject(alias) => {
                let object = LazyObject::new(json.to_owned(), &alias, Arc::clone(self), ctx);
                if !self.lazy_loading {
                    object.observe()?;
                }
                Ok(Payload::Object(object))
            }
            RootShape::Array {
                first_tag: Some(alias),
            } => self.deserialize_sequence(json, alias, ctx),
            RootShape::Array { first_tag: None }
            | RootShape::Scalar
            | RootShape::UntaggedObject => Ok(Payload::Value(parse(json)?)),
        }
    }

    /// Eagerly decodes one envelope from text. `declared` only applies to untagged input.
    pub fn decode_str(
        &self,
        json: &str,
        declared: Option<&str>,
        ctx: &Context,
    ) -> Result<Box<dyn Document>> {
        self.codec.decode(parse(json)?, declared, ctx)
    }

    /// Eagerly decodes one envelope from text into `T`.
    pub fn deserialize_as<T: DocumentType>(&self, json: &str, ctx: &Context) -> Result<T> {
        self.codec.decode_as::<T>(parse(json)?, &self.read_context(ctx))
    }

    fn deserialize_sequence(
        self: &Arc<Self>,
        json: &str,
        alias: String,
        ctx: Arc<Context>,
    ) -> Result<Payload> {
        match self.sequence_mode {
            SequenceMode::Mutable => {
                let raw = sniff::split_elements(json)?;
                let sequence = LazySequence::from_raw(raw, Some(alias), Arc::clone(self), ctx);
                if !self.lazy_loading {
                    sequence.to_sequence()?;
                }
                Ok(Payload::Sequence(sequence))
            }
            SequenceMode::Persistent => {
                let sequence =
                    PersistentSequence::from_raw(json.to_owned(), Some(alias), Arc::clone(self), ctx);
                if !self.lazy_loading {
                    sequence.items()?;
                }
                Ok(Payload::Persistent(sequence))
            }
        }
    }
}

fn parse(json: &str) -> Result<Value> {
    serde_json::from_str(json).map_err(|e| OdmError::invalid_payload(json, e))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| OdmError::Serialization(e.to_string()))
}

/// Builder for [`DocumentSerializer`].
///
/// ```rust
/// use jsonodm::{DocumentSerializer, SequenceMode};
///
/// let serializer = DocumentSerializer::builder()
///     .alias("point", "geo::Point")
///     .lazy_loading(true)
///     .sequence_mode(SequenceMode::Mutable)
///     .build();
/// assert_eq!(serializer.alias_for("geo::Point"), "point");
/// ```
#[derive(Debug)]
pub struct DocumentSerializerBuilder {
    aliases: Vec<(String, String)>,
    bindings: Vec<TypeBinding>,
    normalizer: Arc<dyn Normalizer>,
    lazy_loading: bool,
    sequence_mode: SequenceMode,
    serialization_context: Context,
    deserialization_context: Context,
}

impl Default for DocumentSerializerBuilder {
    fn default() -> Self {
        Self {
            aliases: Vec::new(),
            bindings: Vec::new(),
            normalizer: Arc::new(SerdeNormalizer),
            lazy_loading: true,
            sequence_mode: SequenceMode::default(),
            serialization_context: Context::default(),
            deserialization_context: Context::default(),
        }
    }
}

impl DocumentSerializerBuilder {
    /// Seeds a builder from a validated configuration.
    pub fn from_config(config: &OdmConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            aliases: config
                .type_map
                .iter()
                .map(|(alias, ty)| (alias.to_owned(), ty.to_owned()))
                .collect(),
            lazy_loading: config.lazy_loading,
            sequence_mode: config.sequence_mode,
            serialization_context: config.serialization_context.clone(),
            deserialization_context: config.deserialization_context.clone(),
            ..Self::default()
        })
    }

    /// Adds an `alias -> type` mapping. Later mappings for the same type take precedence.
    pub fn alias(mut self, alias: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.aliases.push((alias.into(), type_name.into()));
        self
    }

    /// Registers `T` so tags resolving to `T::TYPE_NAME` can be materialized.
    pub fn register<T: DocumentType>(mut self) -> Self {
        self.bindings.push(TypeBinding::of::<T>());
        self
    }

    /// Registers `T` under `alias` in one step.
    pub fn register_as<T: DocumentType>(self, alias: impl Into<String>) -> Self {
        self.alias(alias, T::TYPE_NAME).register::<T>()
    }

    /// Replaces the normalization engine.
    pub fn normalizer(mut self, normalizer: Arc<dyn Normalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Enables or disables lazy handles on read.
    pub fn lazy_loading(mut self, enabled: bool) -> Self {
        self.lazy_loading = enabled;
        self
    }

    /// Chooses the handle for tagged arrays.
    pub fn sequence_mode(mut self, mode: SequenceMode) -> Self {
        self.sequence_mode = mode;
        self
    }

    /// Default write-path context.
    pub fn serialization_context(mut self, ctx: Context) -> Self {
        self.serialization_context = ctx;
        self
    }

    /// Default read-path context.
    pub fn deserialization_context(mut self, ctx: Context) -> Self {
        self.deserialization_context = ctx;
        self
    }

    /// Freezes the registry and returns the shared serializer.
    pub fn build(self) -> Arc<DocumentSerializer> {
        let mut registry = TypeRegistry::new(AliasMap::new(self.aliases));
        for binding in self.bindings {
            registry.insert_binding(binding);
        }
        debug!(
            aliases = registry.aliases().len(),
            lazy = self.lazy_loading,
            "document serializer ready"
        );
        Arc::new(DocumentSerializer {
            codec: TaggedCodec::new(Arc::new(registry), self.normalizer),
            lazy_loading: self.lazy_loading,
            sequence_mode: self.sequence_mode,
            serialization_context: self.serialization_context,
            deserialization_context: self.deserialization_context,
        })
    }
}
