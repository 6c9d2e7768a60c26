//! Claude OAuth fetch strategy.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use usagehub_fetch::{
    FetchContext, FetchError, FetchKind, FetchResult, FetchStrategy, HelperRefresh, ProcessError,
    RefreshOutcome,
};

use super::api::{self, ClaudeApi};
use super::credentials::{self, ClaudeCredentials, CredentialStore, REQUIRED_SCOPE};
use super::error::ClaudeError;

/// Helper program that re-establishes Claude credentials.
const HELPER_PROGRAM: &str = "claude";

/// Arguments that make the helper touch its credentials and exit.
const HELPER_ARGS: &[&str] = &["/status"];

/// Reads the Claude CLI's OAuth credentials and calls the usage endpoint.
///
/// An expired access token is refreshed at the token endpoint and the
/// rotated credential written back. If the refresh token itself is
/// rejected, the Claude CLI is run briefly so it can log in again, and the
/// credential file is re-read as soon as it changes.
#[derive(Debug, Clone)]
pub struct ClaudeOAuthStrategy {
    store: Option<CredentialStore>,
    api: ClaudeApi,
    helper_program: String,
    helper_args: Vec<String>,
    helper_timeout: Option<Duration>,
}

impl Default for ClaudeOAuthStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaudeOAuthStrategy {
    /// Strategy using `~/.claude/.credentials.json` and the production API.
    pub fn new() -> Self {
        Self {
            store: CredentialStore::at_default_location(),
            api: ClaudeApi::new(),
            helper_program: HELPER_PROGRAM.to_string(),
            helper_args: HELPER_ARGS.iter().map(ToString::to_string).collect(),
            helper_timeout: None,
        }
    }

    /// Uses a different credentials file.
    #[must_use]
    pub fn with_store(mut self, store: CredentialStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Uses different endpoints.
    #[must_use]
    pub fn with_api(mut self, api: ClaudeApi) -> Self {
        self.api = api;
        self
    }

    /// Uses a different helper program.
    #[must_use]
    pub fn with_helper<I, S>(mut self, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.helper_program = program.into();
        self.helper_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Bounds the helper run.
    #[must_use]
    pub fn with_helper_timeout(mut self, timeout: Duration) -> Self {
        self.helper_timeout = Some(timeout);
        self
    }

    /// Returns credentials with a usable access token.
    async fn fresh_credentials(
        &self,
        ctx: &FetchContext,
        store: &CredentialStore,
    ) -> Result<ClaudeCredentials, ClaudeError> {
        let credentials = store.load().await?;
        if !credentials.is_expired() {
            return Ok(credentials);
        }

        let refresh_token = credentials
            .refresh_token
            .as_deref()
            .ok_or(ClaudeError::MissingRefreshToken)?;
        debug!("Access token expired, refreshing");

        let refreshed = ctx.run_cancellable(self.api.refresh(&ctx.http, refresh_token)).await?;
        match refreshed {
            Ok(token) => match store.store_rotated(&token).await {
                Ok(rotated) => Ok(rotated),
                Err(e) => {
                    warn!(error = %e, "Could not persist rotated credentials, using them anyway");
                    Ok(ClaudeCredentials {
                        access_token: token.access_token,
                        refresh_token: token.refresh_token.or(credentials.refresh_token),
                        expires_at: None,
                        ..credentials
                    })
                }
            },
            Err(ClaudeError::RefreshRejected(detail)) => self.helper_refresh(ctx, store, detail).await,
            Err(e) => Err(e),
        }
    }

    /// Last resort after `invalid_grant`: let the CLI refresh its own file.
    async fn helper_refresh(
        &self,
        ctx: &FetchContext,
        store: &CredentialStore,
        detail: String,
    ) -> Result<ClaudeCredentials, ClaudeError> {
        if !ctx.process.command_exists(&self.helper_program) {
            return Err(ClaudeError::RefreshRejected(format!(
                "{detail}; {} is not installed",
                self.helper_program
            )));
        }

        let mut helper = HelperRefresh::new(&self.helper_program, store.path())
            .args(&self.helper_args)
            .ready_when(credentials::is_complete);
        if let Some(timeout) = self.helper_timeout {
            helper = helper.timeout(timeout);
        }

        match helper.run(&ctx.process, ctx.cancellation()).await {
            Ok(RefreshOutcome::Observed) => {
                let credentials = store.load().await?;
                if credentials.is_expired() {
                    Err(ClaudeError::RefreshRejected(format!(
                        "{detail}; credentials still expired after {} ran",
                        self.helper_program
                    )))
                } else {
                    info!("Credentials refreshed by helper");
                    Ok(credentials)
                }
            }
            Ok(RefreshOutcome::TimedOut) => Err(ClaudeError::RefreshRejected(format!(
                "{detail}; {} did not refresh credentials",
                self.helper_program
            ))),
            Ok(RefreshOutcome::Cancelled) => Err(FetchError::Cancelled.into()),
            Err(ProcessError::NotFound(program)) => Err(ClaudeError::RefreshRejected(format!(
                "{detail}; {program} is not installed"
            ))),
            Err(e) => Err(ClaudeError::RefreshRejected(format!("{detail}; helper failed: {e}"))),
        }
    }
}

#[async_trait]
impl FetchStrategy for ClaudeOAuthStrategy {
    fn name(&self) -> &str {
        "oauth"
    }

    fn kind(&self) -> FetchKind {
        FetchKind::OAuth
    }

    fn is_available(&self, _ctx: &FetchContext) -> bool {
        self.store.as_ref().is_some_and(CredentialStore::exists)
    }

    #[instrument(skip(self, ctx), fields(provider = "claude"))]
    async fn fetch(&self, ctx: &FetchContext) -> Result<FetchResult, FetchError> {
        let Some(store) = &self.store else {
            return Ok(FetchResult::recoverable("no home directory"));
        };

        let credentials = match self.fresh_credentials(ctx, store).await {
            Ok(credentials) => credentials,
            Err(ClaudeError::Fetch(FetchError::Cancelled)) => return Err(FetchError::Cancelled),
            Err(e) => return Ok(e.into()),
        };

        if !credentials.has_scope(REQUIRED_SCOPE) {
            return Ok(ClaudeError::MissingScope(REQUIRED_SCOPE.to_string()).into());
        }

        let response = match ctx
            .run_cancellable(self.api.fetch_usage(&ctx.http, &credentials.access_token))
            .await?
        {
            Ok(response) => response,
            Err(ClaudeError::RateLimited(retry_after)) => {
                return Err(FetchError::RateLimited { retry_after });
            }
            Err(e) => return Ok(e.into()),
        };

        let snapshot = api::to_snapshot(&response, &credentials);
        info!(periods = snapshot.periods.len(), "Fetched Claude usage");
        Ok(FetchResult::Success(snapshot))
    }
}
