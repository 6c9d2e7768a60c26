//! Codex OAuth fetch strategy.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{info, instrument};
use usagehub_fetch::{FetchContext, FetchError, FetchKind, FetchResult, FetchStrategy};

use super::api::{self, USAGE_URL};
use super::auth::{auth_file_path, read_tokens};
use super::error::CodexError;

/// Calls the ChatGPT usage endpoint with the Codex CLI's login.
#[derive(Debug, Clone)]
pub struct CodexOAuthStrategy {
    auth_path: Option<PathBuf>,
    usage_url: String,
}

impl Default for CodexOAuthStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl CodexOAuthStrategy {
    /// Strategy using the default auth file and endpoint.
    pub fn new() -> Self {
        Self {
            auth_path: auth_file_path(),
            usage_url: USAGE_URL.to_string(),
        }
    }

    /// Uses a different auth file.
    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.auth_path = Some(path.into());
        self
    }

    /// Uses a different usage endpoint.
    #[must_use]
    pub fn with_usage_url(mut self, url: impl Into<String>) -> Self {
        self.usage_url = url.into();
        self
    }
}

#[async_trait]
impl FetchStrategy for CodexOAuthStrategy {
    fn name(&self) -> &str {
        "oauth"
    }

    fn kind(&self) -> FetchKind {
        FetchKind::OAuth
    }

    fn is_available(&self, _ctx: &FetchContext) -> bool {
        self.auth_path.as_ref().is_some_and(|p| p.is_file())
    }

    #[instrument(skip(self, ctx), fields(provider = "codex"))]
    async fn fetch(&self, ctx: &FetchContext) -> Result<FetchResult, FetchError> {
        let Some(path) = &self.auth_path else {
            return Ok(FetchResult::recoverable("no home directory"));
        };

        let tokens = match read_tokens(path).await {
            Ok(tokens) => tokens,
            Err(e) => return Ok(e.into()),
        };

        let response = ctx
            .run_cancellable(api::fetch_usage(&ctx.http, &self.usage_url, &tokens))
            .await?;
        match response {
            Ok(response) => {
                let snapshot = api::to_snapshot(&response, &tokens);
                info!(periods = snapshot.periods.len(), "Fetched Codex usage");
                Ok(FetchResult::Success(snapshot))
            }
            Err(CodexError::RateLimited(retry_after)) => Err(FetchError::RateLimited { retry_after }),
            Err(e) => Ok(e.into()),
        }
    }
}
