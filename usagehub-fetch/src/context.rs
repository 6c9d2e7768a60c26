//! Fetch context providing access to host APIs.
//!
//! The fetch context is passed to all strategies and provides unified
//! access to system resources (keychain, HTTP client, process runner) along
//! with the cancellation token for the current refresh.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::FetchError;
use crate::host::{http::HttpClient, keychain::KeychainApi, keychain::SystemKeychain, process::ProcessRunner};

// ============================================================================
// Fetch Settings
// ============================================================================

/// Settings for fetch operations.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Timeout for individual network and process operations.
    pub timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

impl FetchSettings {
    /// Creates settings with custom timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ============================================================================
// Fetch Context
// ============================================================================

/// Context provided to fetch strategies, giving access to host APIs.
///
/// Cloning is cheap; host APIs are shared behind `Arc`s. The orchestrator
/// clones the context once per refresh to attach that refresh's token.
#[derive(Clone)]
pub struct FetchContext {
    /// Secure credential storage.
    pub keychain: Arc<dyn KeychainApi>,
    /// HTTP client with tracing.
    pub http: Arc<HttpClient>,
    /// Process runner for CLI tools.
    pub process: Arc<ProcessRunner>,
    /// Fetch settings.
    pub settings: FetchSettings,
    cancel: CancellationToken,
}

impl FetchContext {
    /// Creates a new fetch context with default host API implementations.
    pub fn new() -> Self {
        Self::with_settings(FetchSettings::default())
    }

    /// Creates a context with custom settings.
    pub fn with_settings(settings: FetchSettings) -> Self {
        Self::builder().settings(settings).build()
    }

    /// Creates a builder for customizing the context.
    pub fn builder() -> FetchContextBuilder {
        FetchContextBuilder::new()
    }

    /// Returns a copy of this context bound to `token`.
    #[must_use]
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            cancel: token,
            ..self.clone()
        }
    }

    /// Returns the cancellation token for the current refresh.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns true once the current refresh has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Runs `fut` until it completes or the refresh is cancelled.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Cancelled` if the token fires first; `fut` is
    /// dropped at that point.
    pub async fn run_cancellable<F, T>(&self, fut: F) -> Result<T, FetchError>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(FetchError::Cancelled),
            value = fut => Ok(value),
        }
    }

    /// Returns the effective timeout for fetch operations.
    pub fn timeout(&self) -> Duration {
        self.settings.timeout
    }
}

impl Default for FetchContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchContext")
            .field("settings", &self.settings)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Fetch Context Builder
// ============================================================================

/// Builder for constructing a `FetchContext`.
pub struct FetchContextBuilder {
    keychain: Option<Arc<dyn KeychainApi>>,
    http: Option<Arc<HttpClient>>,
    process: Option<Arc<ProcessRunner>>,
    settings: FetchSettings,
    cancel: Option<CancellationToken>,
}

impl FetchContextBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            keychain: None,
            http: None,
            process: None,
            settings: FetchSettings::default(),
            cancel: None,
        }
    }

    /// Sets the keychain implementation.
    #[must_use]
    pub fn keychain(mut self, keychain: Arc<dyn KeychainApi>) -> Self {
        self.keychain = Some(keychain);
        self
    }

    /// Sets the HTTP client.
    #[must_use]
    pub fn http(mut self, http: Arc<HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Sets the process runner.
    #[must_use]
    pub fn process(mut self, process: Arc<ProcessRunner>) -> Self {
        self.process = Some(process);
        self
    }

    /// Sets the fetch settings.
    #[must_use]
    pub fn settings(mut self, settings: FetchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = timeout;
        self
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Builds the fetch context.
    pub fn build(self) -> FetchContext {
        let timeout = self.settings.timeout;
        FetchContext {
            keychain: self.keychain.unwrap_or_else(|| Arc::new(SystemKeychain::new())),
            http: self.http.unwrap_or_else(|| Arc::new(HttpClient::with_timeout(timeout))),
            process: self.process.unwrap_or_else(|| Arc::new(ProcessRunner::new())),
            settings: self.settings,
            cancel: self.cancel.unwrap_or_default(),
        }
    }
}

impl Default for FetchContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::keychain::MemoryKeychain;

    fn test_context() -> FetchContext {
        FetchContext::builder()
            .keychain(Arc::new(MemoryKeychain::new()))
            .build()
    }

    #[test]
    fn test_context_builder() {
        let ctx = FetchContext::builder()
            .keychain(Arc::new(MemoryKeychain::new()))
            .timeout(Duration::from_secs(60))
            .build();

        assert_eq!(ctx.settings.timeout, Duration::from_secs(60));
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn test_with_cancellation_shares_host_apis() {
        let ctx = test_context();
        let token = CancellationToken::new();
        let bound = ctx.with_cancellation(token.clone());

        assert!(Arc::ptr_eq(&ctx.http, &bound.http));
        token.cancel();
        assert!(bound.is_cancelled());
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_run_cancellable_completes() {
        let ctx = test_context();
        let value = ctx.run_cancellable(async { 7 }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_run_cancellable_stops_on_cancel() {
        let token = CancellationToken::new();
        let ctx = test_context().with_cancellation(token.clone());
        token.cancel();

        let result = ctx
            .run_cancellable(tokio::time::sleep(Duration::from_secs(3600)))
            .await;
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }
}
