#![forbid(unsafe_code)]

//! Explicit identity keys for child reconciliation.

use std::fmt;

use crate::props::PropValue;

/// Identity hint used to match sibling nodes across renders.
///
/// Children without a key fall back to positional identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Str(String),
    Int(i64),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Key {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl Key {
    /// Derive a key from a property value, for the `"key"` prop hoist.
    ///
    /// Bool and float values stringify; there is no meaningful ordering
    /// use for them as raw variants.
    #[must_use]
    pub fn from_prop(value: &PropValue) -> Self {
        match value {
            PropValue::Int(i) => Self::Int(*i),
            PropValue::Str(s) => Self::Str(s.clone()),
            other => Self::Str(other.to_string()),
        }
    }
}
