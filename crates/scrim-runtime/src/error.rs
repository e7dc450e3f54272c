#![forbid(unsafe_code)]

//! Store failures.

use thiserror::Error;

/// A reducer refused an intent.
///
/// The store's state is untouched when this surfaces: the failed
/// transition never happened and no subscriber was notified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("reducer failed: {message}")]
pub struct ReducerError {
    message: String,
}

impl ReducerError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for ReducerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ReducerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}
