//! The dict: one named, typed entry-to-value mapping.
//!
//! A dict publishes its mapping through an [`ArcSwap`]. Every write builds a
//! [`DictStage`] (a private working copy), applies fragments to it and then
//! swaps it in, so readers see either the old mapping or the new one and
//! never a half-applied merge. Writers are serialized per dict.

mod mapping;
mod resolve;

use arc_swap::ArcSwap;
use rand::Rng;
use serde_json::{Map, Value as Raw};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, warn};

use crate::catalog::{DictKind, Entry};
use crate::codec::{FromValue, Value, ValueCodec, ValueType};
use crate::error::{DictError, DictResult};
use crate::fragment::Fragment;
use crate::identifier::{Identifier, TAG_MARKER};

use mapping::Mapping;
use resolve::{Resolved, resolve_key, resolve_tag};

/// Path prefix of tags built by [`Dict::to_tag`].
pub const TAG_FOLDER: &str = "dict";

/// A tag reference waiting for the tag source to become ready.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTag {
    pub tag: Identifier,
    pub value: Value,
    pub override_existing: bool,
}

/// Working copy of a dict's state while fragments are applied.
#[derive(Debug, Clone)]
pub(crate) struct DictStage<E: Entry> {
    mapping: Mapping<E>,
    pending: Vec<PendingTag>,
}

impl<E: Entry> DictStage<E> {
    pub(crate) fn len(&self) -> usize {
        self.mapping.len()
    }
}

pub struct Dict<E: Entry> {
    id: Identifier,
    value_type: ValueType,
    kind: DictKind<E>,
    codec: Arc<dyn ValueCodec>,
    mapping: ArcSwap<Mapping<E>>,
    pending: Mutex<Vec<PendingTag>>,
    writer: Mutex<()>,
}

impl<E: Entry> Dict<E> {
    /// Create an empty dict. Integer dicts get unboxed storage.
    pub(crate) fn new(
        id: Identifier,
        kind: DictKind<E>,
        value_type: ValueType,
        codec: Arc<dyn ValueCodec>,
    ) -> Self {
        let mapping = Mapping::new(value_type.is_int());
        Self {
            id,
            value_type,
            kind,
            codec,
            mapping: ArcSwap::from_pointee(mapping),
            pending: Mutex::new(Vec::new()),
            writer: Mutex::new(()),
        }
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn kind_name(&self) -> &str {
        self.kind.name()
    }

    // ---- Queries ----

    pub fn contains(&self, entry: &E) -> bool {
        self.current().contains(entry)
    }

    pub fn get(&self, entry: &E) -> Option<Value> {
        self.current().get(entry)
    }

    /// Typed lookup, `None` when absent or of a different shape.
    pub fn get_as<T: FromValue>(&self, entry: &E) -> Option<T> {
        self.get(entry).as_ref().and_then(T::from_value)
    }

    pub fn get_int(&self, entry: &E) -> Option<i32> {
        self.current().get_int(entry)
    }

    pub fn keys(&self) -> Vec<E> {
        self.current().keys()
    }

    pub fn values(&self) -> HashMap<E, Value> {
        self.current().to_values()
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }

    /// The key set as a tag named `namespace:dict/<path>`. Entries come in
    /// no particular order.
    pub fn to_tag(&self) -> (Identifier, Vec<E>) {
        (self.id.nested_in(TAG_FOLDER), self.keys())
    }

    /// Pick an entry uniformly at random.
    pub fn get_random<R: Rng + ?Sized>(&self, rng: &mut R) -> DictResult<E> {
        let mut keys = self.keys();
        if keys.is_empty() {
            return Err(DictError::empty_dict(&self.id).with_kind(self.kind.name()));
        }
        let index = rng.random_range(0..keys.len());
        Ok(keys.swap_remove(index))
    }

    /// Tag references still waiting on the tag source.
    pub fn pending_tags(&self) -> Vec<PendingTag> {
        self.pending.lock().unwrap().clone()
    }

    // ---- Writes ----

    /// Remove every value and every queued tag reference.
    pub fn clear(&self) {
        let _guard = self.writer.lock().unwrap();
        let mapping = self.mapping.load().empty_like();
        self.mapping.store(Arc::new(mapping));
        self.pending.lock().unwrap().clear();
    }

    /// Merge a fragment's values into this dict.
    ///
    /// With `replace` the dict is emptied first. Without `override_existing`
    /// entries that already have a value keep it. The first failing key
    /// aborts the rest of the fragment; keys applied before it stay applied.
    #[allow(clippy::wrong_self_convention)]
    pub fn from_document(
        &self,
        fragment: &Fragment,
        replace: bool,
        override_existing: bool,
    ) -> DictResult<()> {
        let _guard = self.writer.lock().unwrap();
        let mut stage = self.stage_current();
        self.resolve_pending(&mut stage);
        let result = self.apply_values(&mut stage, &fragment.values, replace, override_existing);
        self.publish(stage);
        result.map(|_| ())
    }

    /// Merge a fragment using the flags it carries itself.
    #[allow(clippy::wrong_self_convention)]
    pub fn from_fragment(&self, fragment: &Fragment) -> DictResult<()> {
        self.from_document(fragment, fragment.replace, fragment.override_existing)
    }

    /// Serialize the current mapping. Keys are sorted by identifier.
    pub fn to_document(&self) -> Fragment {
        let mapping = self.current();
        let mut pairs: Vec<(Identifier, Raw)> = Vec::with_capacity(mapping.len());
        for (entry, value) in mapping.to_values() {
            match self.kind.catalog().reverse_lookup(&entry) {
                Some(id) => pairs.push((id, self.codec.encode(&value))),
                None => warn!(
                    kind = %self.kind.name(),
                    dict = %self.id,
                    entry = ?entry,
                    "Skipping entry without a catalog identifier"
                ),
            }
        }
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        let mut values = Map::new();
        for (id, raw) in pairs {
            values.insert(id.to_string(), raw);
        }
        Fragment {
            replace: false,
            override_existing: false,
            values,
        }
    }

    /// The serialized document as a raw value.
    pub fn to_json(&self) -> Raw {
        self.to_document().to_value()
    }

    // ---- Staging (used by the reload pipeline) ----

    /// A stage starting from nothing, for full rebuilds.
    pub(crate) fn begin_rebuild(&self) -> DictStage<E> {
        DictStage {
            mapping: self.mapping.load().empty_like(),
            pending: Vec::new(),
        }
    }

    /// A stage starting from the current mapping, for additive loads.
    pub(crate) fn begin_update(&self) -> DictStage<E> {
        let mut stage = self.stage_current();
        self.resolve_pending(&mut stage);
        stage
    }

    /// Apply one fragment to a stage with the fragment's own flags.
    pub(crate) fn apply_to_stage(
        &self,
        stage: &mut DictStage<E>,
        fragment: &Fragment,
    ) -> DictResult<usize> {
        self.apply_values(
            stage,
            &fragment.values,
            fragment.replace,
            fragment.override_existing,
        )
    }

    /// Publish a stage as the new mapping.
    pub(crate) fn commit(&self, mut stage: DictStage<E>) {
        let _guard = self.writer.lock().unwrap();
        self.resolve_pending(&mut stage);
        self.publish(stage);
    }

    // ---- Internals ----

    /// The published mapping after retrying queued tags.
    fn current(&self) -> Arc<Mapping<E>> {
        self.flush_pending();
        self.mapping.load_full()
    }

    fn stage_current(&self) -> DictStage<E> {
        DictStage {
            mapping: Mapping::clone(&self.mapping.load()),
            pending: self.pending.lock().unwrap().clone(),
        }
    }

    fn publish(&self, stage: DictStage<E>) {
        self.mapping.store(Arc::new(stage.mapping));
        *self.pending.lock().unwrap() = stage.pending;
    }

    fn flush_pending(&self) {
        if self.pending.lock().unwrap().is_empty() || !self.kind.tags().is_ready() {
            return;
        }
        let _guard = self.writer.lock().unwrap();
        let mut stage = self.stage_current();
        if self.resolve_pending(&mut stage) {
            self.publish(stage);
        }
    }

    /// Resolve queued tags into the stage once the tag source is ready.
    /// Returns true when the queue was drained.
    fn resolve_pending(&self, stage: &mut DictStage<E>) -> bool {
        if stage.pending.is_empty() || !self.kind.tags().is_ready() {
            return false;
        }
        for pending in std::mem::take(&mut stage.pending) {
            let Some(members) = resolve_tag(&self.kind, &pending.tag) else {
                let err = DictError::unknown_tag(&format!("{}{}", TAG_MARKER, pending.tag))
                    .with_kind(self.kind.name())
                    .with_dict(&self.id);
                error!(
                    kind = %self.kind.name(),
                    dict = %self.id,
                    tag = %pending.tag,
                    "Dropping queued tag reference: {}",
                    err
                );
                continue;
            };
            debug!(
                dict = %self.id,
                tag = %pending.tag,
                members = members.len(),
                "Resolved queued tag reference"
            );
            for entry in members {
                if stage.mapping.contains(&entry) && !pending.override_existing {
                    continue;
                }
                // Queued values were decoded by this dict's codec.
                if let Err(rejected) = stage.mapping.insert(entry, pending.value.clone()) {
                    let err = self.contextualize(DictError::type_mismatch(
                        &format!("{}{}", TAG_MARKER, pending.tag),
                        format!("{} cannot be stored in a {} dict", rejected.shape(), self.value_type),
                    ));
                    error!(dict = %self.id, tag = %pending.tag, "Dropping queued tag reference: {}", err);
                    break;
                }
            }
        }
        true
    }

    fn apply_values(
        &self,
        stage: &mut DictStage<E>,
        values: &Map<String, Raw>,
        replace: bool,
        override_existing: bool,
    ) -> DictResult<usize> {
        if replace {
            stage.mapping.clear();
            stage.pending.clear();
        }

        let mut written = 0;
        for (key, raw) in values {
            let value = self
                .codec
                .decode(raw)
                .map_err(|err| self.contextualize(DictError::type_mismatch(key, err)))?;

            let entries = match resolve_key(&self.kind, key) {
                Ok(Resolved::Entries(entries)) => entries,
                Ok(Resolved::Deferred(tag)) => {
                    debug!(dict = %self.id, tag = %tag, "Tag source not ready, queueing");
                    stage.pending.push(PendingTag {
                        tag,
                        value,
                        override_existing,
                    });
                    continue;
                }
                Err(err) => return Err(self.contextualize(err)),
            };

            for entry in entries {
                if stage.mapping.contains(&entry) && !override_existing {
                    continue;
                }
                if let Err(rejected) = stage.mapping.insert(entry, value.clone()) {
                    return Err(self.contextualize(DictError::type_mismatch(
                        key,
                        format!("{} cannot be stored in a {} dict", rejected.shape(), self.value_type),
                    )));
                }
                written += 1;
            }
        }
        Ok(written)
    }

    fn contextualize(&self, err: DictError) -> DictError {
        err.with_kind(self.kind.name()).with_dict(&self.id)
    }
}

impl<E: Entry> fmt::Debug for Dict<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dict")
            .field("id", &self.id)
            .field("kind", &self.kind.name())
            .field("value_type", &self.value_type)
            .field("len", &self.mapping.load().len())
            .finish()
    }
}
