//! The lazy sequence: a JSON array of tagged objects, materialized slot by slot.

use crate::codec::TYPE_KEY;
use crate::context::Context;
use crate::document::{Document, DocumentType, FALLBACK_TYPE};
use crate::error::{OdmError, Result};
use crate::serializer::DocumentSerializer;
use serde_json::value::RawValue;
use std::fmt;
use std::iter::FusedIterator;
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace, warn};

/// One element: its raw text plus the materialization cell.
struct Slot {
    raw: Box<RawValue>,
    value: OnceLock<Result<Box<dyn Document>>>,
}

impl Slot {
    fn pending(raw: Box<RawValue>) -> Self {
        Self {
            raw,
            value: OnceLock::new(),
        }
    }

    fn resolved(raw: Box<RawValue>, value: Box<dyn Document>) -> Self {
        Self {
            raw,
            value: OnceLock::from(Ok(value)),
        }
    }
}

/// A handle standing in for a JSON array of tagged objects.
///
/// Each element keeps its raw text and is decoded independently the first time it is
/// read. Reading element `i` never touches element `j`. All elements share one item type,
/// taken from the first element's tag; it is only consulted for elements that carry no
/// tag of their own.
///
/// Writes ([`set`](Self::set), [`append`](Self::append)) encode the new value right away
/// and keep it as the materialized slot, so neither reads nor [`to_json`](Self::to_json)
/// ever decode what the caller just handed over.
///
/// Mutating the sequence while iterating it leaves the element correspondence past the
/// mutation point unspecified.
pub struct LazySequence {
    slots: Vec<Slot>,
    item_alias: Option<String>,
    item_type: String,
    serializer: Arc<DocumentSerializer>,
    context: Arc<Context>,
}

impl LazySequence {
    /// Creates an empty sequence whose item type is the generic fallback.
    pub fn new(serializer: Arc<DocumentSerializer>, context: Arc<Context>) -> Self {
        Self::from_raw(Vec::new(), None, serializer, context)
    }

    /// Creates a sequence over raw element texts. Every slot starts pending.
    pub fn from_raw(
        raw: Vec<Box<RawValue>>,
        item_alias: Option<String>,
        serializer: Arc<DocumentSerializer>,
        context: Arc<Context>,
    ) -> Self {
        let item_type = item_alias
            .as_deref()
            .map_or(FALLBACK_TYPE, |alias| serializer.type_for(alias))
            .to_owned();
        trace!(len = raw.len(), item_type = %item_type, "lazy sequence created");
        Self {
            slots: raw.into_iter().map(Slot::pending).collect(),
            item_alias,
            item_type,
            serializer,
            context,
        }
    }

    /// Creates a sequence from values that are already materialized.
    pub fn from_documents(
        values: Vec<Box<dyn Document>>,
        serializer: Arc<DocumentSerializer>,
        context: Arc<Context>,
    ) -> Result<Self> {
        let item_alias = values
            .first()
            .map(|first| serializer.alias_for(first.type_name()).to_owned());
        let mut sequence = Self::from_raw(Vec::new(), item_alias, serializer, context);
        for value in values {
            sequence.append(value)?;
        }
        Ok(sequence)
    }

    /// Number of elements. Independent of materialization.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the sequence has no elements.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Shared item alias, if the sequence was read from a tagged array.
    pub fn item_alias(&self) -> Option<&str> {
        self.item_alias.as_deref()
    }

    /// Type identity used for elements without their own tag.
    pub fn item_type(&self) -> &str {
        &self.item_type
    }

    /// Materializes element `index` (only that one) and returns it.
    ///
    /// # Errors
    /// [`OdmError::IndexOutOfRange`], or the cached materialization failure of the slot.
    pub fn get(&self, index: usize) -> Result<&dyn Document> {
        let slot = self.slot(index)?;
        match slot.value.get_or_init(|| self.materialize(index, slot)) {
            Ok(value) => Ok(value.as_ref()),
            Err(err) => Err(err.clone()),
        }
    }

    /// Materializes element `index` and downcasts it to `T`.
    pub fn get_as<T: DocumentType>(&self, index: usize) -> Result<&T> {
        let value = self.get(index)?;
        value
            .downcast_ref::<T>()
            .ok_or_else(|| OdmError::UnexpectedType {
                expected: T::TYPE_NAME,
                found: value.type_name().to_owned(),
            })
    }

    /// The first element, materialized.
    pub fn first(&self) -> Result<Option<&dyn Document>> {
        if self.is_empty() {
            return Ok(None);
        }
        self.get(0).map(Some)
    }

    /// The last element, materialized.
    pub fn last(&self) -> Result<Option<&dyn Document>> {
        match self.len().checked_sub(1) {
            Some(index) => self.get(index).map(Some),
            None => Ok(None),
        }
    }

    /// Replaces element `index`. `index == len()` appends.
    ///
    /// The value is encoded immediately, under the serializer's configured write context,
    /// and cached as the slot's materialized value. Other slots are untouched.
    pub fn set(&mut self, index: usize, value: Box<dyn Document>) -> Result<()> {
        self.set_with(index, value, &Context::default())
    }

    /// [`set`](Self::set) with per-call write options merged over the configured ones.
    pub fn set_with(&mut self, index: usize, value: Box<dyn Document>, ctx: &Context) -> Result<()> {
        let len = self.len();
        if index == len {
            return self.append_with(value, ctx);
        }
        if index > len {
            return Err(OdmError::IndexOutOfRange { index, len });
        }
        let slot = self.encode_slot(value, ctx)?;
        self.slots[index] = slot;
        Ok(())
    }

    /// Appends a value, encoded immediately under the configured write context and cached
    /// as materialized.
    pub fn append(&mut self, value: Box<dyn Document>) -> Result<()> {
        self.append_with(value, &Context::default())
    }

    /// [`append`](Self::append) with per-call write options merged over the configured ones.
    pub fn append_with(&mut self, value: Box<dyn Document>, ctx: &Context) -> Result<()> {
        let slot = self.encode_slot(value, ctx)?;
        self.slots.push(slot);
        Ok(())
    }

    /// Deletes element `index`, shifting every later element down by one.
    pub fn remove_at(&mut self, index: usize) -> Result<()> {
        self.slot(index)?;
        self.slots.remove(index);
        Ok(())
    }

    /// Deletes the first element equal to `value`. Returns whether one was found.
    pub fn remove(&mut self, value: &dyn Document) -> Result<bool> {
        match self.index_of(value)? {
            Some(index) => {
                self.slots.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Position of the first element equal to `value`.
    ///
    /// Materializes elements left to right up to (and including) the first match.
    pub fn index_of(&self, value: &dyn Document) -> Result<Option<usize>> {
        for index in 0..self.len() {
            if self.get(index)?.eq_document(value) {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Returns `true` if some element equals `value`. See [`index_of`](Self::index_of).
    pub fn contains(&self, value: &dyn Document) -> Result<bool> {
        Ok(self.index_of(value)?.is_some())
    }

    /// Materializes every element, left to right, and returns them in order.
    pub fn to_sequence(&self) -> Result<Vec<&dyn Document>> {
        self.iter().collect()
    }

    /// Iterates over `[0, len())`, materializing each element when it is reached.
    ///
    /// Calling `iter()` again restarts from the beginning.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            sequence: self,
            front: 0,
            back: self.len(),
        }
    }

    /// Returns `true` if element `index` has been decoded successfully.
    pub fn is_materialized(&self, index: usize) -> bool {
        self.slots
            .get(index)
            .is_some_and(|slot| matches!(slot.value.get(), Some(Ok(_))))
    }

    /// Number of elements decoded successfully so far.
    pub fn materialized_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot.value.get(), Some(Ok(_))))
            .count()
    }

    /// Raw JSON text of element `index`.
    pub fn raw(&self, index: usize) -> Option<&str> {
        self.slots.get(index).map(|slot| slot.raw.get())
    }

    /// JSON for storage, assembled from the raw slots. Never decodes anything.
    pub fn to_json(&self) -> String {
        let mut out = String::with_capacity(
            2 + self.slots.iter().map(|s| s.raw.get().len() + 1).sum::<usize>(),
        );
        out.push('[');
        for (i, slot) in self.slots.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(slot.raw.get());
        }
        out.push(']');
        out
    }

    /// Materializes every pending element on the rayon pool.
    ///
    /// Each slot still decodes at most once; the first failure (by index) is returned.
    #[cfg(feature = "parallel")]
    pub fn materialize_all_par(&self) -> Result<()> {
        use rayon::prelude::*;

        self.slots
            .par_iter()
            .enumerate()
            .map(|(index, slot)| match slot.value.get_or_init(|| self.materialize(index, slot)) {
                Ok(_) => Ok(()),
                Err(err) => Err(err.clone()),
            })
            .collect::<Vec<_>>()
            .into_iter()
            .collect()
    }

    fn slot(&self, index: usize) -> Result<&Slot> {
        self.slots.get(index).ok_or(OdmError::IndexOutOfRange {
            index,
            len: self.slots.len(),
        })
    }

    fn materialize(&self, index: usize, slot: &Slot) -> Result<Box<dyn Document>> {
        debug!(index, "materializing sequence element");
        self.serializer
            .decode_str(slot.raw.get(), Some(self.item_type.as_str()), &self.context)
            .map_err(|err| {
                warn!(index, error = %err, "sequence element materialization failed");
                OdmError::materialization(format!("element {index}"), err)
            })
    }

    fn encode_slot(&self, value: Box<dyn Document>, ctx: &Context) -> Result<Slot> {
        let envelope = self
            .serializer
            .codec()
            .encode(value.as_ref(), &self.serializer.write_context(ctx))?;
        let raw = serde_json::value::to_raw_value(&envelope)
            .map_err(|e| OdmError::Serialization(e.to_string()))?;
        trace!(
            tag = envelope.get(TYPE_KEY).and_then(|t| t.as_str()),
            "sequence slot written"
        );
        Ok(Slot::resolved(raw, value))
    }
}

impl fmt::Debug for LazySequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazySequence")
            .field("item_type", &self.item_type)
            .field("len", &self.len())
            .field("materialized", &self.materialized_count())
            .finish()
    }
}

/// Iterator returned by [`LazySequence::iter`].
#[derive(Debug)]
pub struct Iter<'a> {
    sequence: &'a LazySequence,
    front: usize,
    back: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = Result<&'a dyn Document>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let item = self.sequence.get(self.front);
        self.front += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        Some(self.sequence.get(self.back))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl FusedIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a LazySequence {
    type Item = Result<&'a dyn Document>;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
