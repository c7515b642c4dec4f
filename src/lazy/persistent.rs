//! Copy-on-write lazy array.

use crate::context::Context;
use crate::document::{Document, FALLBACK_TYPE};
use crate::error::{OdmError, Result};
use crate::serializer::DocumentSerializer;
use crate::sniff;
use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace, warn};

const TARGET: &str = "sequence";

type Items = Arc<[Arc<dyn Document>]>;

/// An immutable handle over a JSON array of tagged objects.
///
/// Unlike [`LazySequence`](crate::LazySequence), the whole array is decoded on the first
/// access and never changes afterwards. Updates return a new handle; elements are shared
/// between the old and the new handle through `Arc`, so nothing is decoded or cloned twice.
pub struct PersistentSequence {
    raw: Option<String>,
    item_alias: Option<String>,
    item_type: String,
    serializer: Arc<DocumentSerializer>,
    context: Arc<Context>,
    items: OnceLock<Result<Items>>,
}

impl PersistentSequence {
    /// Creates a pending handle over the array text `raw`.
    pub fn from_raw(
        raw: String,
        item_alias: Option<String>,
        serializer: Arc<DocumentSerializer>,
        context: Arc<Context>,
    ) -> Self {
        let item_type = item_type(&serializer, item_alias.as_deref());
        trace!(bytes = raw.len(), item_type = %item_type, "persistent sequence created");
        Self {
            raw: Some(raw),
            item_alias,
            item_type,
            serializer,
            context,
            items: OnceLock::new(),
        }
    }

    /// Creates a handle over values that are already materialized.
    pub fn from_documents(
        values: Vec<Arc<dyn Document>>,
        serializer: Arc<DocumentSerializer>,
        context: Arc<Context>,
    ) -> Self {
        let item_alias = values
            .first()
            .map(|first| serializer.alias_for(first.type_name()).to_owned());
        let item_type = item_type(&serializer, item_alias.as_deref());
        Self {
            raw: None,
            item_alias,
            item_type,
            serializer,
            context,
            items: OnceLock::from(Ok(values.into())),
        }
    }

    /// Decodes the whole array (once) and returns its elements.
    ///
    /// # Errors
    /// [`OdmError::MaterializationFailure`] with target `"sequence"`, wrapping the first
    /// element that failed. Cached like any other materialization outcome.
    pub fn items(&self) -> Result<&[Arc<dyn Document>]> {
        match self.items.get_or_init(|| self.materialize()) {
            Ok(items) => Ok(&items[..]),
            Err(err) => Err(err.clone()),
        }
    }

    /// Number of elements. Decodes the array.
    pub fn len(&self) -> Result<usize> {
        Ok(self.items()?.len())
    }

    /// Returns `true` if the array has no elements. Decodes the array.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.items()?.is_empty())
    }

    /// Element `index`.
    pub fn get(&self, index: usize) -> Result<&dyn Document> {
        let items = self.items()?;
        items
            .get(index)
            .map(|item| &**item)
            .ok_or(OdmError::IndexOutOfRange {
                index,
                len: items.len(),
            })
    }

    /// Iterates over the decoded elements.
    pub fn iter(&self) -> Result<impl ExactSizeIterator<Item = &dyn Document>> {
        Ok(self.items()?.iter().map(|item| &**item))
    }

    /// Returns `true` once the array has been decoded successfully.
    pub fn is_materialized(&self) -> bool {
        matches!(self.items.get(), Some(Ok(_)))
    }

    /// Shared item alias, if the handle was read from a tagged array.
    pub fn item_alias(&self) -> Option<&str> {
        self.item_alias.as_deref()
    }

    /// Type identity used for elements without their own tag.
    pub fn item_type(&self) -> &str {
        &self.item_type
    }

    /// A new handle with `value` appended.
    pub fn append(&self, value: Arc<dyn Document>) -> Result<Self> {
        let mut items = self.items()?.to_vec();
        items.push(value);
        Ok(self.derive(items))
    }

    /// A new handle with element `index` replaced.
    pub fn update(&self, index: usize, value: Arc<dyn Document>) -> Result<Self> {
        let mut items = self.items()?.to_vec();
        let len = items.len();
        let slot = items
            .get_mut(index)
            .ok_or(OdmError::IndexOutOfRange { index, len })?;
        *slot = value;
        Ok(self.derive(items))
    }

    /// A new handle without element `index`.
    pub fn remove_at(&self, index: usize) -> Result<Self> {
        let mut items = self.items()?.to_vec();
        if index >= items.len() {
            return Err(OdmError::IndexOutOfRange {
                index,
                len: items.len(),
            });
        }
        items.remove(index);
        Ok(self.derive(items))
    }

    /// A new handle without the first element equal to `value`.
    ///
    /// Returns `None` when no element matches.
    pub fn remove(&self, value: &dyn Document) -> Result<Option<Self>> {
        let items = self.items()?;
        match items.iter().position(|item| item.eq_document(value)) {
            Some(index) => self.remove_at(index).map(Some),
            None => Ok(None),
        }
    }

    /// A new handle with the elements sorted by `compare`. The sort is stable.
    pub fn sort_by<F>(&self, mut compare: F) -> Result<Self>
    where
        F: FnMut(&dyn Document, &dyn Document) -> Ordering,
    {
        let mut items = self.items()?.to_vec();
        items.sort_by(|a, b| compare(&**a, &**b));
        Ok(self.derive(items))
    }

    /// JSON for storage.
    ///
    /// A handle read from storage writes back its original text (it cannot have changed);
    /// a derived handle encodes its elements.
    pub fn to_json(&self, ctx: &Context) -> Result<String> {
        match &self.raw {
            Some(raw) => Ok(raw.clone()),
            None => self
                .serializer
                .serialize_all(self.items()?.iter().map(|item| &**item), ctx),
        }
    }

    fn derive(&self, items: Vec<Arc<dyn Document>>) -> Self {
        Self {
            raw: None,
            item_alias: self.item_alias.clone(),
            item_type: self.item_type.clone(),
            serializer: Arc::clone(&self.serializer),
            context: Arc::clone(&self.context),
            items: OnceLock::from(Ok(items.into())),
        }
    }

    fn materialize(&self) -> Result<Items> {
        let Some(raw) = &self.raw else {
            return Err(OdmError::Internal(
                "derived persistent sequence has no items".into(),
            ));
        };
        debug!(bytes = raw.len(), "materializing persistent sequence");
        let decoded = sniff::split_elements(raw).and_then(|elements| {
            elements
                .iter()
                .enumerate()
                .map(|(index, element)| {
                    self.serializer
                        .decode_str(element.get(), Some(self.item_type.as_str()), &self.context)
                        .map(Arc::<dyn Document>::from)
                        .map_err(|err| OdmError::materialization(format!("element {index}"), err))
                })
                .collect::<Result<Vec<Arc<dyn Document>>>>()
        });
        decoded.map(Items::from).map_err(|err| {
            warn!(error = %err, "persistent sequence materialization failed");
            OdmError::materialization(TARGET, err)
        })
    }
}

fn item_type(serializer: &DocumentSerializer, alias: Option<&str>) -> String {
    alias
        .map_or(FALLBACK_TYPE, |alias| serializer.type_for(alias))
        .to_owned()
}

impl fmt::Debug for PersistentSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("PersistentSequence");
        out.field("item_type", &self.item_type);
        match self.items.get() {
            None => out.field("state", &"Pending"),
            Some(Ok(items)) => out.field("len", &items.len()),
            Some(Err(err)) => out.field("failed", err),
        };
        out.finish()
    }
}
