//! Claude-specific errors.

use thiserror::Error;
use usagehub_fetch::{FetchError, FetchResult};

/// Errors specific to Claude operations.
#[derive(Debug, Error)]
pub enum ClaudeError {
    /// Credentials file not found.
    #[error("Credentials not found: {0}")]
    CredentialsNotFound(String),

    /// Credentials file could not be parsed.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Token expired and there is nothing to refresh it with.
    #[error("OAuth token expired and no refresh token is stored")]
    MissingRefreshToken,

    /// The token endpoint rejected the refresh token (`invalid_grant`).
    #[error("Refresh token rejected: {0}")]
    RefreshRejected(String),

    /// The token endpoint failed for another reason.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// The usage API rejected the access token.
    #[error("OAuth token rejected")]
    TokenRejected,

    /// The token lacks a scope the usage API needs.
    #[error("OAuth token is missing the {0} scope")]
    MissingScope(String),

    /// Rate limited by the API.
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

impl ClaudeError {
    /// Returns true if retrying another way would not help.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::TokenRejected | Self::MissingScope(_))
    }
}

impl From<reqwest::Error> for ClaudeError {
    fn from(err: reqwest::Error) -> Self {
        Self::Fetch(err.into())
    }
}

impl From<usagehub_fetch::HttpError> for ClaudeError {
    fn from(err: usagehub_fetch::HttpError) -> Self {
        Self::Fetch(err.into())
    }
}

impl From<ClaudeError> for FetchResult {
    fn from(err: ClaudeError) -> Self {
        if err.is_fatal() {
            FetchResult::fatal(err.to_string())
        } else {
            FetchResult::recoverable(err.to_string())
        }
    }
}
