//! z.ai-specific errors.

use thiserror::Error;
use usagehub_fetch::{FetchError, FetchResult, KeychainError};

/// z.ai-specific errors.
#[derive(Debug, Error)]
pub enum ZaiError {
    /// No API token found.
    #[error("No z.ai API token found")]
    NoToken,

    /// The API rejected the token.
    #[error("z.ai API token rejected")]
    TokenRejected,

    /// Rate limited.
    #[error("Rate limited, retry after {0:?} seconds")]
    RateLimited(Option<u64>),

    /// Unexpected HTTP status.
    #[error("z.ai API returned HTTP {0}")]
    UnexpectedStatus(u16),

    /// The API answered with an error envelope.
    #[error("z.ai API error {code}: {message}")]
    Api {
        /// Envelope code.
        code: i64,
        /// Envelope message.
        message: String,
    },

    /// Invalid response.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Keychain error.
    #[error("Keychain error: {0}")]
    Keychain(#[from] KeychainError),

    /// Transport error.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl From<reqwest::Error> for ZaiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Fetch(err.into())
    }
}

impl From<usagehub_fetch::HttpError> for ZaiError {
    fn from(err: usagehub_fetch::HttpError) -> Self {
        Self::Fetch(err.into())
    }
}

impl From<ZaiError> for FetchResult {
    fn from(err: ZaiError) -> Self {
        match err {
            ZaiError::TokenRejected => FetchResult::fatal(err.to_string()),
            other => FetchResult::recoverable(other.to_string()),
        }
    }
}
