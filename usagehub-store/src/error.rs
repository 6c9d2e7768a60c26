//! Store error types.

use thiserror::Error;
use usagehub_fetch::CacheError;

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<StoreError> for CacheError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io(e) => CacheError::Io(e),
            StoreError::Serialization(e) => CacheError::Serialization(e),
            StoreError::Config(msg) => CacheError::Io(std::io::Error::other(msg)),
        }
    }
}
