//! The lazy value proxy: one tagged object, decoded on first observation.

use crate::context::Context;
use crate::document::{Document, DocumentType};
use crate::error::{OdmError, Result};
use crate::serializer::DocumentSerializer;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace, warn};

const TARGET: &str = "object";

/// A handle standing in for a single not-yet-decoded object.
///
/// The handle owns the raw JSON of the envelope. Every read of the value goes through
/// [`observe`](Self::observe) (or one of the typed helpers built on it), which decodes the
/// envelope exactly once and caches either the value or the failure. Racing observers on
/// different threads block on the same cell; only one of them runs the decoder.
///
/// `#[derive(Document)]` generates a `<Name>Fields` trait implemented for this type, so
/// `lazy.name()?` reads a field after materializing.
pub struct LazyObject {
    raw: String,
    alias: String,
    type_name: String,
    serializer: Arc<DocumentSerializer>,
    context: Arc<Context>,
    state: OnceLock<Result<Box<dyn Document>>>,
}

impl LazyObject {
    /// Creates a pending handle over the envelope `raw`, whose sniffed tag is `alias`.
    ///
    /// Nothing is decoded here. If `alias` resolves to an unregistered type, the handle is
    /// created in its failed state and reports [`OdmError::UnresolvableType`] when observed.
    pub fn new(
        raw: String,
        alias: &str,
        serializer: Arc<DocumentSerializer>,
        context: Arc<Context>,
    ) -> Self {
        let type_name = serializer.type_for(alias).to_owned();
        let state = OnceLock::new();
        if !serializer.registry().is_registered(&type_name) {
            warn!(alias, type_name = %type_name, "lazy object tag resolves to an unregistered type");
            let _ = state.set(Err(OdmError::materialization(
                TARGET,
                OdmError::UnresolvableType {
                    alias: alias.to_owned(),
                    type_name: type_name.clone(),
                },
            )));
        } else {
            trace!(alias, type_name = %type_name, "lazy object created");
        }
        Self {
            raw,
            alias: alias.to_owned(),
            type_name,
            serializer,
            context,
            state,
        }
    }

    /// Wraps an already materialized value. The raw text is produced by encoding it.
    pub fn from_document(
        value: Box<dyn Document>,
        serializer: Arc<DocumentSerializer>,
        ctx: &Context,
    ) -> Result<Self> {
        let raw = serializer.serialize(value.as_ref(), ctx)?;
        let type_name = value.type_name().to_owned();
        let alias = serializer.alias_for(&type_name).to_owned();
        Ok(Self {
            raw,
            alias,
            type_name,
            serializer,
            context: Arc::new(ctx.clone()),
            state: OnceLock::from(Ok(value)),
        })
    }

    /// Materializes (once) and returns the value.
    ///
    /// # Errors
    /// [`OdmError::MaterializationFailure`] wrapping the decode failure. The same error is
    /// returned on every later call.
    pub fn observe(&self) -> Result<&dyn Document> {
        match self.state.get_or_init(|| self.materialize()) {
            Ok(value) => Ok(value.as_ref()),
            Err(err) => Err(err.clone()),
        }
    }

    /// Materializes (once) and returns the value for mutation.
    pub fn observe_mut(&mut self) -> Result<&mut dyn Document> {
        self.observe()?;
        match self.state.get_mut() {
            Some(Ok(value)) => Ok(value.as_mut()),
            Some(Err(err)) => Err(err.clone()),
            None => Err(OdmError::Internal("lazy object left pending after observe".into())),
        }
    }

    /// Materializes and downcasts to `T`.
    pub fn get<T: DocumentType>(&self) -> Result<&T> {
        let value = self.observe()?;
        value
            .downcast_ref::<T>()
            .ok_or_else(|| unexpected::<T>(value))
    }

    /// Materializes and mutably downcasts to `T`.
    pub fn get_mut<T: DocumentType>(&mut self) -> Result<&mut T> {
        let value = self.observe_mut()?;
        let found = value.type_name();
        value
            .downcast_mut::<T>()
            .ok_or_else(|| OdmError::UnexpectedType {
                expected: T::TYPE_NAME,
                found: found.to_owned(),
            })
    }

    /// Consumes the handle, returning the materialized value.
    pub fn into_inner(self) -> Result<Box<dyn Document>> {
        let Self {
            raw,
            serializer,
            context,
            state,
            ..
        } = self;
        match state.into_inner() {
            Some(result) => result,
            None => materialize(&serializer, &raw, &context),
        }
    }

    /// Returns `true` once the value has been decoded successfully. Never triggers decoding.
    pub fn is_materialized(&self) -> bool {
        matches!(self.state.get(), Some(Ok(_)))
    }

    /// Returns `true` if materialization failed (or the tag was unresolvable).
    pub fn is_failed(&self) -> bool {
        matches!(self.state.get(), Some(Err(_)))
    }

    /// Whether the tag resolves to `T`. Never triggers decoding.
    pub fn is<T: DocumentType>(&self) -> bool {
        self.type_name == T::TYPE_NAME
    }

    /// The type identity the tag resolved to.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The tag as stored.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The envelope text this handle was created from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// JSON for storage. A handle that was never materialized (or failed) returns its raw
    /// text untouched; a materialized one is re-encoded so mutations are kept.
    pub fn to_json(&self, ctx: &Context) -> Result<String> {
        match self.state.get() {
            Some(Ok(value)) => self.serializer.serialize(value.as_ref(), ctx),
            _ => Ok(self.raw.clone()),
        }
    }

    fn materialize(&self) -> Result<Box<dyn Document>> {
        materialize(&self.serializer, &self.raw, &self.context)
    }
}

fn materialize(
    serializer: &DocumentSerializer,
    raw: &str,
    ctx: &Context,
) -> Result<Box<dyn Document>> {
    debug!(bytes = raw.len(), "materializing lazy object");
    serializer.decode_str(raw, None, ctx).map_err(|err| {
        warn!(error = %err, "lazy object materialization failed");
        OdmError::materialization(TARGET, err)
    })
}

fn unexpected<T: DocumentType>(value: &dyn Document) -> OdmError {
    OdmError::UnexpectedType {
        expected: T::TYPE_NAME,
        found: value.type_name().to_owned(),
    }
}

impl fmt::Debug for LazyObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("LazyObject");
        out.field("type_name", &self.type_name);
        match self.state.get() {
            None => out.field("state", &"Pending"),
            Some(Ok(value)) => out.field("value", value),
            Some(Err(err)) => out.field("failed", err),
        };
        out.finish()
    }
}
