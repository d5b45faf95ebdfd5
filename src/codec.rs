//! Typed value codecs.
//!
//! Each dict declares a [`ValueType`]. The codec registered for that type
//! turns raw fragment values into [`Value`]s and back. The set of types is
//! closed at startup but can be extended with [`CodecRegistry::register`].

use serde::{Deserialize, Serialize};
use serde_json::Value as Raw;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::error::{DictError, DictResult};

/// Runtime tag naming the value type of a dict.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueType(Cow<'static, str>);

impl ValueType {
    /// 32-bit signed integers, stored unboxed.
    pub const INT: ValueType = ValueType(Cow::Borrowed("int"));
    pub const LONG: ValueType = ValueType(Cow::Borrowed("long"));
    pub const FLOAT: ValueType = ValueType(Cow::Borrowed("float"));
    pub const BOOL: ValueType = ValueType(Cow::Borrowed("bool"));
    pub const STRING: ValueType = ValueType(Cow::Borrowed("string"));
    /// Any structured value, kept as-is.
    pub const JSON: ValueType = ValueType(Cow::Borrowed("json"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is_int(&self) -> bool {
        *self == Self::INT
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A decoded dict value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Long(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Json(Raw),
}

impl Value {
    /// Name of the raw shape, for mismatch messages.
    pub fn shape(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Text(_) => "string",
            Value::Json(_) => "json",
        }
    }
}

/// Describe a raw value's shape for error messages.
pub fn raw_shape(raw: &Raw) -> &'static str {
    match raw {
        Raw::Null => "null",
        Raw::Bool(_) => "boolean",
        Raw::Number(n) if n.is_f64() => "float",
        Raw::Number(_) => "integer",
        Raw::String(_) => "string",
        Raw::Array(_) => "array",
        Raw::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: ValueType,
        found: &'static str,
    },
    #[error("{value} does not fit in {expected}")]
    OutOfRange { expected: ValueType, value: String },
    #[error("{0}")]
    Invalid(String),
}

/// Decodes raw fragment values into one [`ValueType`] and back.
pub trait ValueCodec: Send + Sync {
    fn value_type(&self) -> ValueType;

    /// Decode a raw value. Anything not exactly representable as the
    /// declared type is a mismatch.
    fn decode(&self, raw: &Raw) -> Result<Value, CodecError>;

    /// Deterministic inverse of [`ValueCodec::decode`].
    fn encode(&self, value: &Value) -> Raw;
}

fn mismatch(expected: ValueType, raw: &Raw) -> CodecError {
    CodecError::Mismatch {
        expected,
        found: raw_shape(raw),
    }
}

/// Integer primitives only; floats and strings are rejected.
struct IntCodec;

impl ValueCodec for IntCodec {
    fn value_type(&self) -> ValueType {
        ValueType::INT
    }

    fn decode(&self, raw: &Raw) -> Result<Value, CodecError> {
        let Raw::Number(n) = raw else {
            return Err(mismatch(ValueType::INT, raw));
        };
        if n.is_f64() {
            return Err(mismatch(ValueType::INT, raw));
        }
        n.as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(Value::Int)
            .ok_or_else(|| CodecError::OutOfRange {
                expected: ValueType::INT,
                value: n.to_string(),
            })
    }

    fn encode(&self, value: &Value) -> Raw {
        match value {
            Value::Int(v) => Raw::from(*v),
            other => encode_generic(other),
        }
    }
}

struct LongCodec;

impl ValueCodec for LongCodec {
    fn value_type(&self) -> ValueType {
        ValueType::LONG
    }

    fn decode(&self, raw: &Raw) -> Result<Value, CodecError> {
        let Raw::Number(n) = raw else {
            return Err(mismatch(ValueType::LONG, raw));
        };
        if n.is_f64() {
            return Err(mismatch(ValueType::LONG, raw));
        }
        n.as_i64().map(Value::Long).ok_or_else(|| CodecError::OutOfRange {
            expected: ValueType::LONG,
            value: n.to_string(),
        })
    }

    fn encode(&self, value: &Value) -> Raw {
        encode_generic(value)
    }
}

struct FloatCodec;

impl ValueCodec for FloatCodec {
    fn value_type(&self) -> ValueType {
        ValueType::FLOAT
    }

    fn decode(&self, raw: &Raw) -> Result<Value, CodecError> {
        raw.as_f64()
            .map(Value::Float)
            .ok_or_else(|| mismatch(ValueType::FLOAT, raw))
    }

    fn encode(&self, value: &Value) -> Raw {
        encode_generic(value)
    }
}

struct BoolCodec;

impl ValueCodec for BoolCodec {
    fn value_type(&self) -> ValueType {
        ValueType::BOOL
    }

    fn decode(&self, raw: &Raw) -> Result<Value, CodecError> {
        raw.as_bool()
            .map(Value::Bool)
            .ok_or_else(|| mismatch(ValueType::BOOL, raw))
    }

    fn encode(&self, value: &Value) -> Raw {
        encode_generic(value)
    }
}

struct StringCodec;

impl ValueCodec for StringCodec {
    fn value_type(&self) -> ValueType {
        ValueType::STRING
    }

    fn decode(&self, raw: &Raw) -> Result<Value, CodecError> {
        raw.as_str()
            .map(|s| Value::Text(s.to_string()))
            .ok_or_else(|| mismatch(ValueType::STRING, raw))
    }

    fn encode(&self, value: &Value) -> Raw {
        encode_generic(value)
    }
}

struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn value_type(&self) -> ValueType {
        ValueType::JSON
    }

    fn decode(&self, raw: &Raw) -> Result<Value, CodecError> {
        Ok(Value::Json(raw.clone()))
    }

    fn encode(&self, value: &Value) -> Raw {
        encode_generic(value)
    }
}

/// Plain structural encoding shared by the built-in codecs.
pub fn encode_generic(value: &Value) -> Raw {
    match value {
        Value::Int(v) => Raw::from(*v),
        Value::Long(v) => Raw::from(*v),
        // Non-finite floats have no JSON form.
        Value::Float(v) => serde_json::Number::from_f64(*v)
            .map(Raw::Number)
            .unwrap_or(Raw::Null),
        Value::Bool(v) => Raw::Bool(*v),
        Value::Text(v) => Raw::String(v.clone()),
        Value::Json(v) => v.clone(),
    }
}

/// Codecs available to dict registration, keyed by value type.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<ValueType, Arc<dyn ValueCodec>>,
}

impl CodecRegistry {
    /// Registry holding the built-in codecs.
    pub fn with_builtins() -> Self {
        let builtins: [Arc<dyn ValueCodec>; 6] = [
            Arc::new(IntCodec),
            Arc::new(LongCodec),
            Arc::new(FloatCodec),
            Arc::new(BoolCodec),
            Arc::new(StringCodec),
            Arc::new(JsonCodec),
        ];
        let codecs = builtins
            .into_iter()
            .map(|codec| (codec.value_type(), codec))
            .collect();
        Self { codecs }
    }

    /// Add a codec for a new value type.
    pub fn register(&mut self, codec: Arc<dyn ValueCodec>) -> DictResult<()> {
        let value_type = codec.value_type();
        if self.codecs.contains_key(&value_type) {
            return Err(DictError::duplicate_codec(value_type.name()));
        }
        self.codecs.insert(value_type, codec);
        Ok(())
    }

    pub fn get(&self, value_type: &ValueType) -> Option<Arc<dyn ValueCodec>> {
        self.codecs.get(value_type).cloned()
    }

    pub fn contains(&self, value_type: &ValueType) -> bool {
        self.codecs.contains_key(value_type)
    }

    pub fn value_types(&self) -> Vec<ValueType> {
        let mut types: Vec<_> = self.codecs.keys().cloned().collect();
        types.sort();
        types
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("value_types", &self.value_types())
            .finish()
    }
}

/// Typed access to a [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(v) => Some(i64::from(*v)),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromValue for Raw {
    fn from_value(value: &Value) -> Option<Self> {
        Some(encode_generic(value))
    }
}
