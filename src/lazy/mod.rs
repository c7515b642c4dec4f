//! Lazy handles returned by [`DocumentSerializer::deserialize`](crate::DocumentSerializer::deserialize).
//!
//! Every handle keeps the raw JSON it was created from and decodes it on first
//! observation. The outcome, value or failure, is cached and replayed on every later
//! observation. Concurrent first observations are serialized per handle (per slot for
//! [`LazySequence`]), so the decoder runs at most once.

mod object;
mod persistent;
mod sequence;

pub use object::LazyObject;
pub use persistent::PersistentSequence;
pub use sequence::{Iter, LazySequence};
