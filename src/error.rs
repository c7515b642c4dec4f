//! Centralized error handling for jsonodm.
//!
//! Every fallible operation in the crate returns [`Result`], and every failure is one
//! [`OdmError`] variant. The library never panics on malformed input.
//!
//! ## Cloneable Errors
//!
//! [`OdmError`] is `Clone`. A lazy handle whose materialization failed caches the error
//! and hands the same diagnostic back on every later observation, so the underlying
//! causes are kept behind `Arc`.
//!
//! ## Error Categories
//!
//! - **Read path:** [`OdmError::InvalidPayload`], [`OdmError::UnresolvableType`],
//!   [`OdmError::FieldDecodeFailure`], wrapped in [`OdmError::MaterializationFailure`]
//!   once they come out of a lazy handle.
//! - **Handle access:** [`OdmError::IndexOutOfRange`], [`OdmError::UnexpectedType`].
//! - **Write path:** [`OdmError::Serialization`].
//! - **Setup:** [`OdmError::Config`], [`OdmError::Io`].
//! - **Internal:** [`OdmError::Internal`], which indicates a bug.
//!
//! ```rust
//! use jsonodm::{DocumentSerializer, OdmError};
//!
//! let serializer = DocumentSerializer::builder().build();
//! match serializer.deserialize("{not json", &Default::default()) {
//!     Err(OdmError::InvalidPayload { excerpt, .. }) => assert_eq!(excerpt, "{not json"),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

/// Maximum number of characters of offending input kept in [`OdmError::InvalidPayload`].
pub const EXCERPT_LIMIT: usize = 100;

/// A specialized `Result` type for jsonodm operations.
pub type Result<T> = std::result::Result<T, OdmError>;

/// The master error enum covering all failure domains in jsonodm.
#[derive(Debug, Clone)]
pub enum OdmError {
    /// The input is not well-formed JSON.
    ///
    /// Raised by the sniffer or by the full decode path. `excerpt` holds the first
    /// [`EXCERPT_LIMIT`] characters of the input.
    InvalidPayload {
        /// Truncated copy of the offending text.
        excerpt: String,
        /// The tokenizer error.
        cause: Arc<serde_json::Error>,
    },

    /// A `#type` tag resolved to a type identity with no registered binding.
    ///
    /// Only raised at full-decode time; sniffing never validates existence.
    UnresolvableType {
        /// The alias as it appeared in the payload.
        alias: String,
        /// The type identity the alias resolved to.
        type_name: String,
    },

    /// The normalization engine could not rebuild a value from its fields.
    FieldDecodeFailure {
        /// Type identity the payload was decoded against.
        type_name: String,
        /// Location of the failing value inside the document (`$` is the root).
        path: String,
        /// The engine error, which names the offending field.
        cause: Arc<serde_json::Error>,
    },

    /// A lazy handle (or one slot of a lazy sequence) failed to materialize.
    ///
    /// The handle keeps this error and returns it again on every later observation.
    MaterializationFailure {
        /// What was being materialized (`object` or `element <n>`).
        target: String,
        /// The underlying read-path failure.
        cause: Box<OdmError>,
    },

    /// Lazy sequence access beyond its bounds.
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Sequence length at the time of the access.
        len: usize,
    },

    /// A materialized value is not of the type the caller asked for.
    UnexpectedType {
        /// Type identity requested by the caller.
        expected: &'static str,
        /// Type identity of the materialized value.
        found: String,
    },

    /// Encoding a value to JSON failed. Always immediate; the write path is never lazy.
    Serialization(String),

    /// Invalid configuration.
    Config(String),

    /// Low-level I/O failure while loading configuration.
    Io(Arc<io::Error>),

    /// Logic error inside a handle's state machine. Should not occur in production.
    Internal(String),
}

impl OdmError {
    /// Builds an [`OdmError::InvalidPayload`], truncating `text` on a character boundary.
    pub fn invalid_payload(text: &str, cause: serde_json::Error) -> Self {
        Self::InvalidPayload {
            excerpt: text.chars().take(EXCERPT_LIMIT).collect(),
            cause: Arc::new(cause),
        }
    }

    /// Wraps a read-path failure as the terminal state of a lazy handle.
    pub fn materialization(target: impl Into<String>, cause: OdmError) -> Self {
        Self::MaterializationFailure {
            target: target.into(),
            cause: Box::new(cause),
        }
    }

    /// Returns the innermost read-path failure, looking through materialization wrappers.
    pub fn root_cause(&self) -> &OdmError {
        match self {
            Self::MaterializationFailure { cause, .. } => cause.root_cause(),
            other => other,
        }
    }
}

impl fmt::Display for OdmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPayload { excerpt, cause } => {
                write!(f, "Invalid JSON data: {cause} (input: {excerpt})")
            }
            Self::UnresolvableType { alias, type_name } => {
                write!(f, "Unknown type: alias '{alias}' resolves to unregistered '{type_name}'")
            }
            Self::FieldDecodeFailure {
                type_name,
                path,
                cause,
            } => write!(f, "Failed to decode {type_name} at {path}: {cause}"),
            Self::MaterializationFailure { target, cause } => {
                write!(f, "Lazy initialization of {target} failed: {cause}")
            }
            Self::IndexOutOfRange { index, len } => {
                write!(f, "Index {index} out of range for sequence of length {len}")
            }
            Self::UnexpectedType { expected, found } => {
                write!(f, "Expected {expected}, found {found}")
            }
            Self::Serialization(s) => write!(f, "Serialization failed: {s}"),
            Self::Config(s) => write!(f, "Configuration error: {s}"),
            Self::Io(e) => write!(f, "I/O Error: {e}"),
            Self::Internal(s) => write!(f, "Internal Logic Error: {s}"),
        }
    }
}

impl std::error::Error for OdmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidPayload { cause, .. } | Self::FieldDecodeFailure { cause, .. } => {
                Some(cause.as_ref())
            }
            Self::MaterializationFailure { cause, .. } => Some(cause.as_ref()),
            Self::Io(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for OdmError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
