//! # jsonodm
//!
//! Self-describing JSON documents with lazy, exactly-once materialization.
//!
//! ## Overview
//!
//! Objects are written as JSON envelopes that carry their own type tag, so a stored string
//! can be turned back into the right Rust type without any out-of-band schema:
//!
//! ```text
//! {"#type": "user", "name": "Jane", "email": "jane@example.com"}
//! [{"#type": "address", "city": "Sofia"}, {"#type": "address", "city": "Plovdiv"}]
//! ```
//!
//! Reading such a string does not decode it. The serializer only sniffs the root shape
//! and the first tag, then hands out a placeholder:
//!
//! *   **[`LazyObject`]:** one tagged object. The first observation decodes the envelope;
//!     later observations reuse the result.
//! *   **[`LazySequence`]:** a tagged array. Each element keeps its raw text and is decoded
//!     on its own the first time it is read; `len()` never decodes anything.
//! *   **[`PersistentSequence`]:** a tagged array decoded as a whole on first access, with
//!     copy-on-write updates.
//!
//! Scalars, untagged objects and untagged arrays are returned as plain
//! [`serde_json::Value`]s.
//!
//! ## Architecture
//!
//! ### Registry
//!
//! Tags are short storage aliases. [`AliasMap`] maps them to fully qualified type
//! identities and back, and [`TypeRegistry`] pairs every identity with the decode entry of
//! a type registered at startup. A tag can only ever produce a registered type.
//!
//! ### Codec
//!
//! [`TaggedCodec`] adds the `#type` key on write and strips it on read. Types whose
//! normalized form is not a JSON object are wrapped as `{"#type": ..., "#scalar": ...}`.
//! Normalization itself is pluggable through the [`Normalizer`] trait; the default engine
//! is `serde_json`. Fields marked `#[document(embed)]` hold nested documents, which are
//! written with envelopes of their own (see [`Embedded`]).
//!
//! ### Serializer
//!
//! [`DocumentSerializer`] is the entry point. It is built once, frozen, and shared as an
//! `Arc` by every handle it creates.
//!
//! ## Usage
//!
//! ```rust
//! use jsonodm::{Context, Document, DocumentSerializer};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
//! #[document(name = "app::User")]
//! struct User {
//!     name: String,
//!     email: String,
//! }
//!
//! # fn main() -> jsonodm::Result<()> {
//! let serializer = DocumentSerializer::builder()
//!     .register_as::<User>("user")
//!     .build();
//!
//! let user = User { name: "Jane".into(), email: "jane@example.com".into() };
//! let json = serializer.serialize(&user, &Context::new())?;
//! assert!(json.starts_with(r##"{"#type":"user""##));
//!
//! let payload = serializer.deserialize(&json, &Context::new())?;
//! let lazy = payload.as_object().ok_or(jsonodm::OdmError::Internal("not an object".into()))?;
//! assert!(!lazy.is_materialized());
//!
//! // `name()` comes from the `UserFields` trait generated by `#[derive(Document)]`.
//! assert_eq!(lazy.name()?, "Jane");
//! assert!(lazy.is_materialized());
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! Handles are `Send + Sync`. Concurrent first observations of the same handle (or the
//! same sequence slot) block on a single cell and the decoder runs once. Outcomes,
//! including failures, are cached.
//!
//! ## Errors
//!
//! Every failure is an [`OdmError`]. Malformed JSON is reported when it is read; decode
//! failures of lazy handles are reported on first observation as
//! [`OdmError::MaterializationFailure`], and replayed unchanged afterwards.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

pub mod codec;
pub mod column;
pub mod config;
pub mod context;
pub mod document;
pub mod embed;
pub mod error;
pub mod lazy;
pub mod normalizer;
pub mod registry;
pub mod serializer;
pub mod sniff;

pub use codec::{SCALAR_KEY, TYPE_KEY, TaggedCodec};
pub use column::JsonColumn;
pub use config::{OdmConfig, SequenceMode, TypeMap};
pub use context::Context;
pub use document::{Document, DocumentType, FALLBACK_TYPE};
pub use embed::{Embedded, Fields};
pub use error::{OdmError, Result};
pub use lazy::{LazyObject, LazySequence, PersistentSequence};
pub use normalizer::{Normalizer, SerdeNormalizer};
pub use registry::{AliasMap, TypeBinding, TypeRegistry};
pub use serializer::{DocumentSerializer, DocumentSerializerBuilder, Payload};

/// Re-exports used by the code `#[derive(Document)]` generates.
#[doc(hidden)]
pub mod internal {
    pub use serde_json;
}

// Re-export the derive macro so it is accessible as `jsonodm::Document`
pub use jsonodm_derive::Document;
