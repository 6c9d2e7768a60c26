//! Codex (OpenAI) provider.
//!
//! Reads the ChatGPT login the Codex CLI keeps in `~/.codex/auth.json` and
//! asks the ChatGPT backend for the plan's rate limit windows.

mod api;
mod auth;
mod error;
mod strategy;

use std::sync::Arc;

pub use api::{UsageResponse, to_snapshot};
pub use auth::{CODEX_HOME_ENV, JwtPayload, OpenAiAuth, Tokens, auth_file_path, decode_jwt_payload};
pub use error::CodexError;
pub use strategy::CodexOAuthStrategy;

use crate::descriptor::ProviderDescriptor;

/// Provider id.
pub const PROVIDER_ID: &str = "codex";

/// Creates the Codex descriptor.
pub fn codex_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::builder(PROVIDER_ID)
        .display_name("Codex")
        .alias("openai")
        .alias("chatgpt")
        .default_enabled(true)
        .strategy(Arc::new(CodexOAuthStrategy::new()))
        .build()
}
