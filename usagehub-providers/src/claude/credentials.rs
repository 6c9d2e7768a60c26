//! Claude OAuth credential file.
//!
//! The Claude CLI keeps its OAuth credentials in `~/.claude/.credentials.json`:
//!
//! ```json
//! {
//!   "claudeAiOauth": {
//!     "accessToken": "...",
//!     "refreshToken": "...",
//!     "expiresAt": 1735000000000,
//!     "scopes": ["user:inference", "user:profile"],
//!     "subscriptionType": "max"
//!   }
//! }
//! ```
//!
//! The file is shared with the CLI, so rewrites keep every field this module
//! does not understand and replace the file atomically.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use super::api::TokenResponse;
use super::error::ClaudeError;

/// Scope required by the usage endpoint.
pub const REQUIRED_SCOPE: &str = "user:profile";

/// Tokens this close to expiry are treated as expired.
const EXPIRY_BUFFER_MINUTES: i64 = 5;

// ============================================================================
// File Structures
// ============================================================================

/// Root of `.credentials.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsFile {
    /// Claude AI OAuth credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude_ai_oauth: Option<OAuthData>,
    /// Fields owned by other tools.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `claudeAiOauth` object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthData {
    /// Access token.
    pub access_token: String,
    /// Refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiration (milliseconds since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Granted scopes.
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Subscription type (e.g. "pro", "max").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_type: Option<String>,
    /// Rate limit tier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_tier: Option<String>,
    /// Fields owned by other tools.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ============================================================================
// Validated Credentials
// ============================================================================

/// OAuth credentials ready for use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaudeCredentials {
    /// Access token.
    pub access_token: String,
    /// Refresh token, if stored.
    pub refresh_token: Option<String>,
    /// Expiration time, if known.
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// Subscription type.
    pub subscription_type: Option<String>,
    /// Rate limit tier.
    pub rate_limit_tier: Option<String>,
}

impl ClaudeCredentials {
    fn from_data(data: &OAuthData) -> Self {
        Self {
            access_token: data.access_token.clone(),
            refresh_token: data.refresh_token.clone(),
            expires_at: data.expires_at.and_then(timestamp_to_datetime),
            scopes: data.scopes.clone(),
            subscription_type: data.subscription_type.clone(),
            rate_limit_tier: data.rate_limit_tier.clone(),
        }
    }

    /// Returns true if the token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|at| at <= Utc::now() + Duration::minutes(EXPIRY_BUFFER_MINUTES))
    }

    /// Returns true if the scope was granted. Unknown scopes pass.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.is_empty() || self.scopes.iter().any(|s| s == scope)
    }

    /// Plan name for display.
    pub fn plan(&self) -> Option<String> {
        self.subscription_type
            .as_deref()
            .or(self.rate_limit_tier.as_deref())
            .map(plan_label)
    }
}

/// Accepts both seconds and milliseconds.
fn timestamp_to_datetime(value: i64) -> Option<DateTime<Utc>> {
    if value > 10_000_000_000 {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

fn plan_label(raw: &str) -> String {
    match raw {
        "pro" => "Pro".to_string(),
        "max" => "Max".to_string(),
        "team" => "Team".to_string(),
        "enterprise" => "Enterprise".to_string(),
        "free" => "Free".to_string(),
        other => other.to_string(),
    }
}

/// Returns true if `contents` is a complete credentials file with a usable
/// access token.
pub fn is_complete(contents: &[u8]) -> bool {
    serde_json::from_slice::<CredentialsFile>(contents)
        .ok()
        .and_then(|file| file.claude_ai_oauth)
        .is_some_and(|data| !data.access_token.trim().is_empty())
}

// ============================================================================
// Credential Store
// ============================================================================

/// Returns the default credentials path.
pub fn default_credentials_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".claude").join(".credentials.json"))
}

/// Reads and rewrites one credentials file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.claude/.credentials.json`.
    pub fn at_default_location() -> Option<Self> {
        default_credentials_path().map(Self::new)
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cheap existence check.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    async fn read_file(&self) -> Result<CredentialsFile, ClaudeError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ClaudeError::CredentialsNotFound(self.path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "Failed to parse credentials");
            ClaudeError::InvalidCredentials(e.to_string())
        })
    }

    /// Loads the current credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, or has no
    /// usable access token.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load(&self) -> Result<ClaudeCredentials, ClaudeError> {
        let file = self.read_file().await?;
        let data = file
            .claude_ai_oauth
            .ok_or_else(|| ClaudeError::InvalidCredentials("no claudeAiOauth entry".to_string()))?;
        if data.access_token.trim().is_empty() {
            return Err(ClaudeError::InvalidCredentials("empty access token".to_string()));
        }

        let credentials = ClaudeCredentials::from_data(&data);
        debug!(
            expired = credentials.is_expired(),
            has_refresh = credentials.refresh_token.is_some(),
            "Credentials loaded"
        );
        Ok(credentials)
    }

    /// Writes a rotated token back, keeping every other field.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or replaced.
    #[instrument(skip(self, token), fields(path = %self.path.display()))]
    pub async fn store_rotated(&self, token: &TokenResponse) -> Result<ClaudeCredentials, ClaudeError> {
        let mut file = self.read_file().await?;
        let data = file
            .claude_ai_oauth
            .as_mut()
            .ok_or_else(|| ClaudeError::InvalidCredentials("no claudeAiOauth entry".to_string()))?;

        token.apply_to(data);
        let credentials = ClaudeCredentials::from_data(data);

        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| ClaudeError::InvalidCredentials(e.to_string()))?;
        write_atomic(&self.path, json.as_bytes()).await?;

        info!("Stored rotated Claude credentials");
        Ok(credentials)
    }
}

/// Replaces `path` via a sibling temp file, owner-only on Unix.
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ClaudeError> {
    let temp = path.with_extension("json.tmp");
    tokio::fs::write(&temp, contents).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&temp, std::fs::Permissions::from_mode(0o600)).await?;
    }

    if let Err(e) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e.into());
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
