//! Codex-specific error types.

use thiserror::Error;
use usagehub_fetch::{FetchError, FetchResult};

/// Errors specific to Codex operations.
#[derive(Debug, Error)]
pub enum CodexError {
    /// Auth file not found.
    #[error("Auth file not found: {0}")]
    AuthNotFound(String),

    /// Invalid auth file format.
    #[error("Invalid auth file: {0}")]
    InvalidAuth(String),

    /// JWT decode error.
    #[error("JWT decode error: {0}")]
    JwtError(String),

    /// The usage endpoint rejected the token (401/403).
    #[error("ChatGPT session rejected (HTTP {0}); run `codex login`")]
    TokenRejected(u16),

    /// Rate limited.
    #[error("Rate limited, retry after {0:?} seconds")]
    RateLimited(Option<u64>),

    /// Unexpected HTTP status.
    #[error("Usage API returned HTTP {0}")]
    UnexpectedStatus(u16),

    /// Response body did not match the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Transport error.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for CodexError {
    fn from(err: reqwest::Error) -> Self {
        Self::Fetch(err.into())
    }
}

impl From<usagehub_fetch::HttpError> for CodexError {
    fn from(err: usagehub_fetch::HttpError) -> Self {
        Self::Fetch(err.into())
    }
}

impl From<CodexError> for FetchResult {
    fn from(err: CodexError) -> Self {
        match err {
            CodexError::TokenRejected(_) => FetchResult::fatal(err.to_string()),
            other => FetchResult::recoverable(other.to_string()),
        }
    }
}
