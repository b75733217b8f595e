//! Configuration error types.

use thiserror::Error;

/// Raised while assembling configuration; fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Unknown {key}: {value:?}, expected one of {expected}")]
    UnknownVariant {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl ConfigError {
    pub fn invalid(key: &'static str, value: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidValue {
            key,
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

/// A failure policy name other than `open` or `closed`.
#[derive(Debug, Error)]
#[error("unknown failure policy {0:?}, expected open or closed")]
pub struct UnknownFailurePolicy(pub String);
