//! Codex authentication.
//!
//! The Codex CLI writes its ChatGPT login to `$CODEX_HOME/auth.json`
//! (default `~/.codex/auth.json`):
//!
//! ```json
//! {
//!   "tokens": {
//!     "id_token": "eyJ...",
//!     "access_token": "eyJ...",
//!     "refresh_token": "...",
//!     "account_id": "..."
//!   }
//! }
//! ```
//!
//! The id token is a JWT whose payload carries the account email and, under
//! `https://api.openai.com/auth`, the ChatGPT plan.

use base64::prelude::*;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, trace, warn};

use super::error::CodexError;

/// Environment variable overriding the Codex home directory.
pub const CODEX_HOME_ENV: &str = "CODEX_HOME";

// ============================================================================
// Auth File
// ============================================================================

/// Root of `auth.json`.
#[derive(Debug, Deserialize)]
pub struct AuthFile {
    /// ChatGPT login tokens.
    #[serde(default)]
    pub tokens: Option<Tokens>,
}

/// The `tokens` object. Older CLI versions wrote camelCase keys.
#[derive(Debug, Clone, Deserialize)]
pub struct Tokens {
    /// Id token (JWT).
    #[serde(default, alias = "idToken")]
    pub id_token: Option<String>,
    /// Bearer token for the usage endpoint.
    #[serde(alias = "accessToken")]
    pub access_token: String,
    /// ChatGPT account id.
    #[serde(default, alias = "accountId")]
    pub account_id: Option<String>,
}

/// Returns the auth file path, honoring `CODEX_HOME`.
pub fn auth_file_path() -> Option<PathBuf> {
    if let Some(home) = std::env::var_os(CODEX_HOME_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(home).join("auth.json"));
    }
    dirs::home_dir().map(|h| h.join(".codex").join("auth.json"))
}

/// Reads the login tokens.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable, or holds no tokens.
#[instrument(skip(path), fields(path = %path.display()))]
pub async fn read_tokens(path: &Path) -> Result<Tokens, CodexError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CodexError::AuthNotFound(path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let auth: AuthFile = serde_json::from_str(&content).map_err(|e| {
        warn!(error = %e, "Failed to parse auth file");
        CodexError::InvalidAuth(e.to_string())
    })?;

    let tokens = auth
        .tokens
        .ok_or_else(|| CodexError::InvalidAuth("no ChatGPT tokens (API key login?)".to_string()))?;
    if tokens.access_token.trim().is_empty() {
        return Err(CodexError::InvalidAuth("empty access token".to_string()));
    }
    debug!(has_account = tokens.account_id.is_some(), "Auth tokens loaded");
    Ok(tokens)
}

// ============================================================================
// JWT Payload
// ============================================================================

/// Claims read from the id token.
#[derive(Debug, Default, Deserialize)]
pub struct JwtPayload {
    /// Email address.
    #[serde(default)]
    pub email: Option<String>,
    /// OpenAI-specific claims.
    #[serde(default, rename = "https://api.openai.com/auth")]
    pub openai_auth: Option<OpenAiAuth>,
}

/// OpenAI claims embedded in the JWT.
#[derive(Debug, Default, Deserialize)]
pub struct OpenAiAuth {
    /// ChatGPT plan (e.g. "plus", "pro").
    #[serde(default)]
    pub chatgpt_plan_type: Option<String>,
}

/// Decodes a JWT payload without verifying its signature.
///
/// # Errors
///
/// Returns `CodexError::JwtError` if the token is not a three-part JWT with
/// a JSON payload.
pub fn decode_jwt_payload(token: &str) -> Result<JwtPayload, CodexError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(CodexError::JwtError(format!(
            "expected 3 parts, got {}",
            parts.len()
        )));
    }

    let decoded = BASE64_URL_SAFE_NO_PAD
        .decode(parts[1])
        .or_else(|_| BASE64_STANDARD.decode(parts[1]))
        .map_err(|e| CodexError::JwtError(format!("base64: {e}")))?;
    trace!(len = decoded.len(), "Decoded JWT payload");

    serde_json::from_slice(&decoded).map_err(|e| CodexError::JwtError(format!("json: {e}")))
}

// ============================================================================
// Tests
// ============================================================================
