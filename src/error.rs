//! Error types for the crate

use thiserror::Error;

/// Main error type for the crate
///
/// Out-of-range state or action indices are not represented here: they indicate a grid
/// configuration bug and panic at the point of access.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no checkpoint found in slot `{slot}`")]
    MissingCheckpoint { slot: String },

    #[error("checkpoint in slot `{slot}` is unreadable: {reason}")]
    CorruptCheckpoint { slot: String, reason: String },

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("environment failure: {0}")]
    Environment(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub(crate) fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    pub(crate) fn corrupt(slot: &str, reason: impl Into<String>) -> Self {
        Self::CorruptCheckpoint {
            slot: slot.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
