//! Structured error types for registration, merge and reload reporting.

use serde::Serialize;
use std::fmt;

use crate::identifier::Identifier;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Registration errors
    DuplicateKind,
    UnknownKind,
    DuplicateDict,
    UnknownValueType,
    DuplicateCodec,

    // Merge errors (scoped to one fragment)
    UnknownEntry,
    UnknownTag,
    TypeMismatch,
    SyntaxError,

    // Reload errors
    UnregisteredDict,
    IoFailure,

    // Query errors
    EmptyDict,
}

impl ErrorCode {
    /// True for errors that abort a single fragment but never the cycle.
    pub fn is_merge_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::UnknownEntry
                | ErrorCode::UnknownTag
                | ErrorCode::TypeMismatch
                | ErrorCode::SyntaxError
        )
    }
}

/// Structured error carrying enough context to diagnose a failed fragment
/// without crashing the host.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DictError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dict: Option<Identifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl DictError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            kind: None,
            dict: None,
            key: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_dict(mut self, dict: &Identifier) -> Self {
        self.dict = Some(dict.clone());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    // Convenience constructors

    pub fn duplicate_kind(kind: &str) -> Self {
        Self::new(
            ErrorCode::DuplicateKind,
            format!("Dict kind {} is already registered", kind),
        )
        .with_kind(kind)
    }

    pub fn unknown_kind(kind: &str) -> Self {
        Self::new(
            ErrorCode::UnknownKind,
            format!("No dict kind named {}", kind),
        )
        .with_kind(kind)
    }

    pub fn duplicate_dict(kind: &str, id: &Identifier) -> Self {
        Self::new(
            ErrorCode::DuplicateDict,
            format!("Dict {} already exists for dict kind {}", id, kind),
        )
        .with_kind(kind)
        .with_dict(id)
    }

    pub fn unknown_value_type(value_type: &str) -> Self {
        Self::new(
            ErrorCode::UnknownValueType,
            format!("No value codec registered for type {}", value_type),
        )
    }

    pub fn duplicate_codec(value_type: &str) -> Self {
        Self::new(
            ErrorCode::DuplicateCodec,
            format!("A value codec for type {} is already registered", value_type),
        )
    }

    pub fn unknown_entry(key: &str) -> Self {
        Self::new(
            ErrorCode::UnknownEntry,
            format!("Dict references entry {} that does not exist", key),
        )
        .with_key(key)
    }

    pub fn unknown_tag(key: &str) -> Self {
        Self::new(
            ErrorCode::UnknownTag,
            format!("Dict references tag {} that does not exist", key),
        )
        .with_key(key)
    }

    pub fn type_mismatch(key: &str, reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::TypeMismatch,
            format!("Value for {} has the wrong type: {}", key, reason),
        )
        .with_key(key)
    }

    pub fn syntax(reason: impl fmt::Display) -> Self {
        Self::new(ErrorCode::SyntaxError, reason.to_string())
    }

    pub fn unregistered_dict(kind: &str, id: &Identifier) -> Self {
        Self::new(
            ErrorCode::UnregisteredDict,
            format!("Tried to load dict {} that wasn't registered", id),
        )
        .with_kind(kind)
        .with_dict(id)
    }

    pub fn io(location: impl fmt::Display, err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::IoFailure,
            format!("Failed to read {}: {}", location, err),
        )
    }

    pub fn empty_dict(id: &Identifier) -> Self {
        Self::new(
            ErrorCode::EmptyDict,
            format!("Cannot pick a random entry from empty dict {}", id),
        )
        .with_dict(id)
    }
}

impl fmt::Display for DictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.dict) {
            (Some(kind), Some(dict)) => write!(f, "[{} {}] {}", kind, dict, self.message),
            (None, Some(dict)) => write!(f, "[{}] {}", dict, self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for DictError {}

/// Result type for dict operations.
pub type DictResult<T> = std::result::Result<T, DictError>;
