//! z.ai fetch strategies.
//!
//! Both strategies call the same quota endpoint; they differ only in where
//! the API token comes from.

use async_trait::async_trait;
use tracing::{info, instrument};
use usagehub_fetch::{FetchContext, FetchError, FetchKind, FetchResult, FetchStrategy};

use super::api::{QUOTA_URL, fetch_quota};
use super::error::ZaiError;
use super::token::{ENV_VARS, env_token, keychain_token};

async fn fetch_with_token(ctx: &FetchContext, url: &str, token: &str) -> Result<FetchResult, FetchError> {
    match ctx.run_cancellable(fetch_quota(&ctx.http, url, token)).await? {
        Ok(snapshot) => {
            info!(periods = snapshot.periods.len(), "Fetched z.ai usage");
            Ok(FetchResult::Success(snapshot))
        }
        Err(ZaiError::RateLimited(retry_after)) => Err(FetchError::RateLimited { retry_after }),
        Err(e) => Ok(e.into()),
    }
}

// ============================================================================
// Environment Token
// ============================================================================

/// Token from `ZAI_API_KEY` / `ZAI_API_TOKEN`.
#[derive(Debug, Clone)]
pub struct ZaiApiStrategy {
    env_vars: Vec<String>,
    url: String,
}

impl Default for ZaiApiStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ZaiApiStrategy {
    /// Creates a new z.ai API strategy.
    pub fn new() -> Self {
        Self {
            env_vars: ENV_VARS.iter().map(ToString::to_string).collect(),
            url: QUOTA_URL.to_string(),
        }
    }

    /// Reads the token from other variables.
    #[must_use]
    pub fn with_env_vars<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env_vars = names.into_iter().map(Into::into).collect();
        self
    }

    /// Uses a different quota endpoint.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl FetchStrategy for ZaiApiStrategy {
    fn name(&self) -> &str {
        "api"
    }

    fn kind(&self) -> FetchKind {
        FetchKind::ApiKey
    }

    fn is_available(&self, _ctx: &FetchContext) -> bool {
        env_token(&self.env_vars).is_some()
    }

    #[instrument(skip(self, ctx), fields(provider = "zai"))]
    async fn fetch(&self, ctx: &FetchContext) -> Result<FetchResult, FetchError> {
        let Some(token) = env_token(&self.env_vars) else {
            return Ok(ZaiError::NoToken.into());
        };
        fetch_with_token(ctx, &self.url, &token).await
    }
}

// ============================================================================
// Keychain Token
// ============================================================================

/// Token stored in the system keychain.
///
/// Always reported available: probing the keychain can prompt the user, so
/// the lookup waits until the strategy actually runs.
#[derive(Debug, Clone)]
pub struct ZaiKeychainStrategy {
    url: String,
}

impl Default for ZaiKeychainStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ZaiKeychainStrategy {
    /// Creates a new z.ai keychain strategy.
    pub fn new() -> Self {
        Self {
            url: QUOTA_URL.to_string(),
        }
    }

    /// Uses a different quota endpoint.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl FetchStrategy for ZaiKeychainStrategy {
    fn name(&self) -> &str {
        "keychain"
    }

    fn kind(&self) -> FetchKind {
        FetchKind::ApiKey
    }

    fn is_available(&self, _ctx: &FetchContext) -> bool {
        true
    }

    #[instrument(skip(self, ctx), fields(provider = "zai"))]
    async fn fetch(&self, ctx: &FetchContext) -> Result<FetchResult, FetchError> {
        let token = match ctx.run_cancellable(keychain_token(ctx.keychain.as_ref())).await? {
            Ok(Some(token)) => token,
            Ok(None) => return Ok(ZaiError::NoToken.into()),
            Err(e) => return Ok(e.into()),
        };
        fetch_with_token(ctx, &self.url, &token).await
    }
}
