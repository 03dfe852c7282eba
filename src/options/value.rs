// src/options/value.rs

//! Typed option values

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Option map of an object after validation, keyed by wire name
pub type OptionValues = BTreeMap<String, OptionValue>;

/// A normalized option value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl OptionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// JSON form used in templates and metadata
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => Value::from(*i),
            Self::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", if *b { "yes" } else { "no" }),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for OptionValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Compile-time value used for defaults and requirements in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstValue {
    Bool(bool),
    Integer(i64),
    Text(&'static str),
}

impl ConstValue {
    pub fn to_value(self) -> OptionValue {
        match self {
            Self::Bool(b) => OptionValue::Bool(b),
            Self::Integer(i) => OptionValue::Integer(i),
            Self::Text(s) => OptionValue::Text(s.to_string()),
        }
    }

    /// Whether a normalized value equals this constant
    pub fn matches(self, value: &OptionValue) -> bool {
        match (self, value) {
            (Self::Bool(a), OptionValue::Bool(b)) => a == *b,
            (Self::Integer(a), OptionValue::Integer(b)) => a == *b,
            (Self::Text(a), OptionValue::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_value().fmt(f)
    }
}
