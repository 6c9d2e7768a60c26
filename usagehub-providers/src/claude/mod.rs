//! Claude (Anthropic) provider.
//!
//! Usage comes from the OAuth usage endpoint, authenticated with the token
//! the Claude CLI stores in `~/.claude/.credentials.json`.
//!
//! ## Periods
//!
//! - **Session**: rolling 5-hour window
//! - **Weekly**: 7-day window across all models
//! - **Weekly (Opus)** / **Weekly (Sonnet)**: per-model 7-day windows
//!
//! Paid overage ("extra usage") is reported as [`Overage`](usagehub_core::Overage).

mod api;
mod credentials;
mod error;
mod strategy;

use std::sync::Arc;

pub use api::{ClaudeApi, TokenResponse, UsageResponse, to_snapshot};
pub use credentials::{ClaudeCredentials, CredentialStore, default_credentials_path};
pub use error::ClaudeError;
pub use strategy::ClaudeOAuthStrategy;

use crate::descriptor::ProviderDescriptor;

/// Provider id.
pub const PROVIDER_ID: &str = "claude";

/// Creates the Claude descriptor.
pub fn claude_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::builder(PROVIDER_ID)
        .display_name("Claude")
        .alias("anthropic")
        .default_enabled(true)
        .strategy(Arc::new(ClaudeOAuthStrategy::new()))
        .build()
}
