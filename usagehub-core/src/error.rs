//! Core error types for `UsageHub`.

use thiserror::Error;

/// Core error type for `UsageHub` operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Provider id is empty or malformed.
    #[error("Invalid provider id: {0:?}")]
    InvalidProviderId(String),

    /// Invalid data from an API response.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
