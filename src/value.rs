use std::fmt;

use indexmap::IndexMap;
use itertools::Itertools;

/// An opaque value stored in problem metadata or returned by attribute lookups.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    U64(Vec<u64>),
    I64(Vec<i64>),
    F64(Vec<f64>),
    Bool(Vec<bool>),
    Strings(Vec<String>),
    ScalarString(String),
    ScalarU64(u64),
    ScalarI64(i64),
    ScalarF64(f64),
    ScalarBool(bool),
}

/// Free-form user data attached to an inference problem.
///
/// Insertion order is preserved so that display output is stable.
pub type Metadata = IndexMap<String, Value>;

impl From<Vec<u64>> for Value {
    fn from(value: Vec<u64>) -> Self {
        Value::U64(value)
    }
}
impl From<Vec<i64>> for Value {
    fn from(value: Vec<i64>) -> Self {
        Value::I64(value)
    }
}
impl From<Vec<f64>> for Value {
    fn from(value: Vec<f64>) -> Self {
        Value::F64(value)
    }
}
impl From<Vec<bool>> for Value {
    fn from(value: Vec<bool>) -> Self {
        Value::Bool(value)
    }
}
impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Value::Strings(value)
    }
}
impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::ScalarString(value)
    }
}
impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::ScalarString(value.to_string())
    }
}
impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::ScalarU64(value)
    }
}
impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::ScalarI64(value)
    }
}
impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::ScalarF64(value)
    }
}
impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::ScalarBool(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::U64(v) => write!(f, "[{}]", v.iter().join(", ")),
            Value::I64(v) => write!(f, "[{}]", v.iter().join(", ")),
            Value::F64(v) => write!(f, "[{}]", v.iter().join(", ")),
            Value::Bool(v) => write!(f, "[{}]", v.iter().join(", ")),
            Value::Strings(v) => write!(f, "[{}]", v.iter().join(", ")),
            Value::ScalarString(v) => write!(f, "{v:?}"),
            Value::ScalarU64(v) => write!(f, "{v}"),
            Value::ScalarI64(v) => write!(f, "{v}"),
            Value::ScalarF64(v) => write!(f, "{v}"),
            Value::ScalarBool(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_values() {
        assert_eq!(Value::from(vec![1.5, 2.0]).to_string(), "[1.5, 2]");
        assert_eq!(Value::from("run-7").to_string(), "\"run-7\"");
        assert_eq!(
            Value::from(vec!["a".to_string(), "b".to_string()]).to_string(),
            "[a, b]"
        );
        assert_eq!(Value::from(true).to_string(), "true");
    }
}
