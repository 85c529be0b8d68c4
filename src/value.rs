use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single cell of a [`Frame`](crate::frame::Frame) or an insertion row.
///
/// Equality is exact: `Integer(1)`, `Real(1.0)` and `Text("1")` are three
/// different values. Reals compare by bit pattern so they can be hashed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// String form used when recording modifications and rendering output.
    pub fn as_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(i) => i.to_string(),
            // Debug keeps the fractional part ("2.0"), Display would print "2".
            Value::Real(f) => format!("{f:?}"),
            Value::Text(s) => s.clone(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(f) => Some(*f),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Integer(_) => 1,
            Value::Real(_) => 2,
            Value::Text(_) => 3,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Null => {}
            Value::Integer(i) => i.hash(state),
            Value::Real(f) => f.to_bits().hash(state),
            Value::Text(s) => s.hash(state),
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Real(a), Value::Real(b)) => a.total_cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Primitive storage class of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlType {
    Integer,
    Real,
    Text,
}

impl SqlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlType::Integer => "integer",
            SqlType::Real => "real",
            SqlType::Text => "text",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Converts `value` to the storage class `tag`.
///
/// Integers never come from reals: `"1.0"` and `Real(1.0)` are both rejected.
/// Text conversion always succeeds. Nulls pass through untouched.
pub fn cast(tag: SqlType, value: &Value) -> Result<Value> {
    match (tag, value) {
        (_, Value::Null) => Ok(Value::Null),
        (SqlType::Integer, Value::Integer(i)) => Ok(Value::Integer(*i)),
        (SqlType::Integer, Value::Real(f)) => Err(Error::Cast(format!(
            "cannot convert real {f:?} to integer"
        ))),
        (SqlType::Integer, Value::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|err| Error::Cast(format!("cannot convert '{s}' to integer: {err}"))),
        (SqlType::Real, Value::Integer(i)) => Ok(Value::Real(*i as f64)),
        (SqlType::Real, Value::Real(f)) => Ok(Value::Real(*f)),
        (SqlType::Real, Value::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Value::Real)
            .map_err(|err| Error::Cast(format!("cannot convert '{s}' to real: {err}"))),
        (SqlType::Text, Value::Text(s)) => Ok(Value::Text(s.clone())),
        (SqlType::Text, other) => Ok(Value::Text(other.as_display())),
    }
}
