//! Typed values carried in stream message fields

use crate::error::{RedisError, RedisResult};
use bytes::Bytes;
use redis::{FromRedisValue, RedisWrite, ToRedisArgs, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Field map of a stream message, ordered by field name
pub type Fields = BTreeMap<String, FieldValue>;

/// A single stream field value
///
/// Redis stores every field as a byte string. Values written as `Int` or
/// `Float` come back as `Text`; the numeric accessors parse text on demand.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// UTF-8 text
    Text(String),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Arbitrary bytes that are not valid UTF-8
    Binary(Bytes),
}

impl FieldValue {
    /// Borrow the value as text, if it is textual
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Read the value as an integer, parsing text if needed
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Read the value as a float, parsing text if needed
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            Self::Text(s) => s.parse().ok(),
            Self::Binary(_) => None,
        }
    }

    /// Raw bytes as they are stored in Redis
    #[must_use]
    pub fn as_bytes(&self) -> Bytes {
        match self {
            Self::Text(s) => Bytes::copy_from_slice(s.as_bytes()),
            Self::Binary(b) => b.clone(),
            Self::Int(i) => Bytes::from(i.to_string()),
            Self::Float(f) => Bytes::from(f.to_string()),
        }
    }

    /// Decode a raw byte string, keeping it as text when it is valid UTF-8
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(s) => Self::Text(s.to_string()),
            Err(_) => Self::Binary(Bytes::copy_from_slice(bytes)),
        }
    }

    /// Decode a driver reply value
    pub fn from_value(value: &Value) -> RedisResult<Self> {
        match value {
            Value::BulkString(bytes) => Ok(Self::from_bytes(bytes)),
            Value::SimpleString(s) => Ok(Self::Text(s.clone())),
            Value::Okay => Ok(Self::Text("OK".to_string())),
            Value::Int(i) => Ok(Self::Int(*i)),
            Value::Double(f) => Ok(Self::Float(*f)),
            other => Err(RedisError::Type(format!(
                "Cannot convert {:?} to a field value",
                other
            ))),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Binary(b) => write!(f, "{}", String::from_utf8_lossy(b)),
        }
    }
}

impl ToRedisArgs for FieldValue {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        match self {
            Self::Text(s) => out.write_arg(s.as_bytes()),
            Self::Binary(b) => out.write_arg(b),
            Self::Int(i) => i.write_redis_args(out),
            Self::Float(f) => f.write_redis_args(out),
        }
    }
}

impl FromRedisValue for FieldValue {
    fn from_redis_value(v: &Value) -> redis::RedisResult<Self> {
        Self::from_value(v).map_err(|e| {
            redis::RedisError::from((
                redis::ErrorKind::TypeError,
                "Response was of incompatible type",
                e.to_string(),
            ))
        })
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<u32> for FieldValue {
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Int(i64::from(b))
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(b: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(b))
    }
}

impl From<Bytes> for FieldValue {
    fn from(b: Bytes) -> Self {
        Self::Binary(b)
    }
}

/// Build a [`Fields`] map from `(name, value)` pairs
pub fn fields<I, K, V>(pairs: I) -> Fields
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<FieldValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Flatten a field map into `field value field value ...` command arguments
pub fn write_fields<W>(fields: &Fields, out: &mut W)
where
    W: ?Sized + RedisWrite,
{
    for (name, value) in fields {
        out.write_arg(name.as_bytes());
        value.write_redis_args(out);
    }
}

/// Render a reply value as text; nil becomes an empty string
///
/// Used where a command returns a mix of nil and bulk replies but the
/// caller wants plain strings.
#[must_use]
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Nil => String::new(),
        Value::BulkString(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        Value::SimpleString(s) => s.clone(),
        Value::Okay => "OK".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Double(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        other => format!("{:?}", other),
    }
}
