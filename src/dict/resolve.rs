//! Turning fragment keys into catalog entries.

use crate::catalog::{DictKind, Entry};
use crate::error::DictError;
use crate::identifier::{EntryKey, Identifier};

/// Outcome of resolving one fragment key.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Resolved<E> {
    Entries(Vec<E>),
    /// The tag source is not ready yet; queue and retry later.
    Deferred(Identifier),
}

/// Parse and resolve a textual key against a kind's catalog and tags.
pub(crate) fn resolve_key<E: Entry>(
    kind: &DictKind<E>,
    key: &str,
) -> Result<Resolved<E>, DictError> {
    let parsed: EntryKey = key
        .parse()
        .map_err(|err| DictError::syntax(format!("Invalid dict key {}: {}", key, err)).with_key(key))?;

    match parsed {
        EntryKey::Direct(id) => kind
            .catalog()
            .lookup(&id)
            .map(|entry| Resolved::Entries(vec![entry]))
            .ok_or_else(|| DictError::unknown_entry(key)),
        EntryKey::Tag(id) => {
            if !kind.tags().is_ready() {
                return Ok(Resolved::Deferred(id));
            }
            resolve_tag(kind, &id)
                .map(Resolved::Entries)
                .ok_or_else(|| DictError::unknown_tag(key))
        }
    }
}

/// Members of a tag once the tag source is ready.
pub(crate) fn resolve_tag<E: Entry>(kind: &DictKind<E>, tag: &Identifier) -> Option<Vec<E>> {
    kind.tags().lookup_tag(tag)
}
