//! Namespaced identifiers and the textual keys used inside fragments.
//!
//! An identifier is written `namespace:path`. Fragment keys are either a bare
//! identifier (a direct entry) or an identifier prefixed with [`TAG_MARKER`]
//! (every member of a tag).

use regex_lite::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

/// Prefix that turns a fragment key into a tag reference.
pub const TAG_MARKER: char = '#';

static NAMESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_.-]+$").expect("namespace pattern"));
static PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_./-]+$").expect("path pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("identifier {0:?} has no namespace (expected namespace:path)")]
    MissingNamespace(String),
    #[error("identifier {0:?} has an invalid namespace")]
    InvalidNamespace(String),
    #[error("identifier {0:?} has an invalid path")]
    InvalidPath(String),
}

/// A namespaced identifier such as `mymod:dicts/hardness`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier {
    namespace: String,
    path: String,
}

impl Identifier {
    /// Build an identifier from its two halves, validating both.
    pub fn new(
        namespace: impl Into<String>,
        path: impl Into<String>,
    ) -> Result<Self, IdentifierError> {
        let namespace = namespace.into();
        let path = path.into();
        if !NAMESPACE_RE.is_match(&namespace) {
            return Err(IdentifierError::InvalidNamespace(format!(
                "{}:{}",
                namespace, path
            )));
        }
        if !PATH_RE.is_match(&path) {
            return Err(IdentifierError::InvalidPath(format!("{}:{}", namespace, path)));
        }
        Ok(Self { namespace, path })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Same namespace, different path.
    pub fn with_path(&self, path: impl Into<String>) -> Result<Self, IdentifierError> {
        Self::new(self.namespace.clone(), path)
    }

    /// Same namespace, path nested under `folder`. `folder` must be a valid
    /// path segment such as `dict`.
    pub(crate) fn nested_in(&self, folder: &str) -> Self {
        debug_assert!(PATH_RE.is_match(folder));
        Self {
            namespace: self.namespace.clone(),
            path: format!("{}/{}", folder, self.path),
        }
    }
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((namespace, path)) => Self::new(namespace, path),
            None => Err(IdentifierError::MissingNamespace(s.to_string())),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A parsed fragment key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryKey {
    /// A single catalog entry.
    Direct(Identifier),
    /// Every entry of a tag.
    Tag(Identifier),
}

impl EntryKey {
    pub fn identifier(&self) -> &Identifier {
        match self {
            EntryKey::Direct(id) | EntryKey::Tag(id) => id,
        }
    }

    pub fn is_tag(&self) -> bool {
        matches!(self, EntryKey::Tag(_))
    }
}

impl FromStr for EntryKey {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_prefix(TAG_MARKER) {
            Some(rest) => Ok(EntryKey::Tag(rest.parse()?)),
            None => Ok(EntryKey::Direct(s.parse()?)),
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKey::Direct(id) => write!(f, "{}", id),
            EntryKey::Tag(id) => write!(f, "{}{}", TAG_MARKER, id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identifier() {
        let id: Identifier = "mymod:ores/copper".parse().unwrap();
        assert_eq!(id.namespace(), "mymod");
        assert_eq!(id.path(), "ores/copper");
        assert_eq!(id.to_string(), "mymod:ores/copper");
    }

    #[test]
    fn test_missing_namespace_rejected() {
        let err = "stone".parse::<Identifier>().unwrap_err();
        assert_eq!(err, IdentifierError::MissingNamespace("stone".to_string()));
    }

    #[test]
    fn test_invalid_characters_rejected() {
        assert!(matches!(
            "My Mod:stone".parse::<Identifier>(),
            Err(IdentifierError::InvalidNamespace(_))
        ));
        assert!(matches!(
            "mymod:Stone Block".parse::<Identifier>(),
            Err(IdentifierError::InvalidPath(_))
        ));
        assert!(matches!(
            "mymod:".parse::<Identifier>(),
            Err(IdentifierError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_entry_key_forms() {
        let direct: EntryKey = "a:b".parse().unwrap();
        let tag: EntryKey = "#a:t".parse().unwrap();
        assert!(!direct.is_tag());
        assert!(tag.is_tag());
        assert_eq!(tag.identifier().to_string(), "a:t");
        assert_eq!(tag.to_string(), "#a:t");
    }

    #[test]
    fn test_identifier_serde_as_string() {
        let id: Identifier = "a:b".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"a:b\"");
        let back: Identifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<Identifier>("\"nope\"").is_err());
    }
}
