//! Capabilities supplied by the host: the entry catalog and the tag source.
//!
//! Dicts never construct entries. They look them up by identifier through a
//! [`Catalog`] and expand tag references through a [`TagSource`], both bound
//! to a [`DictKind`] at registration time.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::identifier::Identifier;

/// Opaque handle to a catalog element.
pub trait Entry: Clone + Eq + Hash + Send + Sync + fmt::Debug + 'static {}

impl<T> Entry for T where T: Clone + Eq + Hash + Send + Sync + fmt::Debug + 'static {}

/// Identifier-to-entry lookup for one kind of catalog element.
pub trait Catalog<E>: Send + Sync {
    /// Find the entry registered under `id`.
    fn lookup(&self, id: &Identifier) -> Option<E>;

    /// Find the identifier an entry is registered under.
    fn reverse_lookup(&self, entry: &E) -> Option<Identifier>;
}

/// Named sets of entries, which may only become available after startup.
pub trait TagSource<E>: Send + Sync {
    /// Whether tags can be resolved yet. While this is false, tag references
    /// are queued on the dict instead of failing.
    fn is_ready(&self) -> bool {
        true
    }

    /// Members of the tag, or `None` if no such tag exists.
    fn lookup_tag(&self, id: &Identifier) -> Option<Vec<E>>;
}

/// A named grouping of dicts sharing one catalog and one tag source.
///
/// The name doubles as the storage subfolder for fragment discovery.
pub struct DictKind<E> {
    name: String,
    catalog: Arc<dyn Catalog<E>>,
    tags: Arc<dyn TagSource<E>>,
}

impl<E> DictKind<E> {
    pub fn new(
        name: impl Into<String>,
        catalog: Arc<dyn Catalog<E>>,
        tags: Arc<dyn TagSource<E>>,
    ) -> Self {
        Self {
            name: name.into(),
            catalog,
            tags,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn catalog(&self) -> &dyn Catalog<E> {
        self.catalog.as_ref()
    }

    pub fn tags(&self) -> &dyn TagSource<E> {
        self.tags.as_ref()
    }
}

impl<E> Clone for DictKind<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            catalog: Arc::clone(&self.catalog),
            tags: Arc::clone(&self.tags),
        }
    }
}

impl<E> fmt::Debug for DictKind<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictKind").field("name", &self.name).finish()
    }
}

/// In-memory catalog whose entries are their own identifiers.
///
/// Serves as both [`Catalog`] and [`TagSource`]. Tags start out unavailable
/// when built with [`MemoryCatalog::with_deferred_tags`] and become
/// resolvable once [`MemoryCatalog::mark_tags_ready`] is called.
#[derive(Debug)]
pub struct MemoryCatalog {
    entries: RwLock<HashSet<Identifier>>,
    tags: RwLock<HashMap<Identifier, Vec<Identifier>>>,
    tags_ready: AtomicBool,
}

impl MemoryCatalog {
    /// Empty catalog with tags immediately available.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashSet::new()),
            tags: RwLock::new(HashMap::new()),
            tags_ready: AtomicBool::new(true),
        }
    }

    /// Empty catalog whose tags are not resolvable until marked ready.
    pub fn with_deferred_tags() -> Self {
        let catalog = Self::new();
        catalog.tags_ready.store(false, Ordering::Release);
        catalog
    }

    pub fn insert_entry(&self, id: Identifier) {
        self.entries.write().unwrap().insert(id);
    }

    pub fn extend_entries(&self, ids: impl IntoIterator<Item = Identifier>) {
        self.entries.write().unwrap().extend(ids);
    }

    /// Define or replace a tag. Members need not be catalog entries yet.
    pub fn set_tag(&self, tag: Identifier, members: Vec<Identifier>) {
        self.tags.write().unwrap().insert(tag, members);
    }

    pub fn mark_tags_ready(&self) {
        self.tags_ready.store(true, Ordering::Release);
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn tag_count(&self) -> usize {
        self.tags.read().unwrap().len()
    }
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog<Identifier> for MemoryCatalog {
    fn lookup(&self, id: &Identifier) -> Option<Identifier> {
        self.entries.read().unwrap().get(id).cloned()
    }

    fn reverse_lookup(&self, entry: &Identifier) -> Option<Identifier> {
        self.lookup(entry)
    }
}

impl TagSource<Identifier> for MemoryCatalog {
    fn is_ready(&self) -> bool {
        self.tags_ready.load(Ordering::Acquire)
    }

    fn lookup_tag(&self, id: &Identifier) -> Option<Vec<Identifier>> {
        let members = self.tags.read().unwrap().get(id).cloned()?;
        let entries = self.entries.read().unwrap();
        // Tag members that are not catalog entries are not resolvable.
        Some(
            members
                .into_iter()
                .filter(|member| entries.contains(member))
                .collect(),
        )
    }
}
