//! Fetch strategy trait and types.
//!
//! A strategy represents one mechanism for acquiring a provider's usage data
//! (OAuth token, API key, CLI helper, ...). Providers declare an ordered list
//! of strategies and the pipeline tries them in that order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use usagehub_core::UsageSnapshot;

use crate::context::FetchContext;
use crate::error::FetchError;

// ============================================================================
// Fetch Kind
// ============================================================================

/// The kind of mechanism a strategy uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchKind {
    /// CLI tool.
    CLI,
    /// OAuth token authentication.
    OAuth,
    /// API key authentication.
    ApiKey,
    /// Browser session cookies.
    WebCookies,
    /// Local file/process probing.
    LocalProbe,
}

impl FetchKind {
    /// Returns the display name for this kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::CLI => "CLI",
            Self::OAuth => "OAuth",
            Self::ApiKey => "API Key",
            Self::WebCookies => "Web Cookies",
            Self::LocalProbe => "Local Probe",
        }
    }
}

impl fmt::Display for FetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Fetch Result
// ============================================================================

/// The result of one strategy attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    /// Fresh usage data.
    Success(UsageSnapshot),
    /// This mechanism failed; another strategy might still work.
    Recoverable(String),
    /// The account itself is the problem; stop trying strategies.
    Fatal(String),
}

impl FetchResult {
    /// Creates a recoverable failure.
    pub fn recoverable(reason: impl Into<String>) -> Self {
        Self::Recoverable(reason.into())
    }

    /// Creates a fatal failure.
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::Fatal(reason.into())
    }

    /// Returns true for `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns true for `Fatal`.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }

    /// Returns the failure reason, if this is a failure.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Recoverable(reason) | Self::Fatal(reason) => Some(reason),
        }
    }
}

impl From<FetchError> for FetchResult {
    fn from(err: FetchError) -> Self {
        Self::Recoverable(err.to_string())
    }
}

// ============================================================================
// Fetch Strategy Trait
// ============================================================================

/// A mechanism for fetching usage data from a provider.
///
/// ## Implementing a Strategy
///
/// ```ignore
/// struct ZaiApiStrategy;
///
/// #[async_trait]
/// impl FetchStrategy for ZaiApiStrategy {
///     fn name(&self) -> &str {
///         "api"
///     }
///
///     fn kind(&self) -> FetchKind {
///         FetchKind::ApiKey
///     }
///
///     fn is_available(&self, _ctx: &FetchContext) -> bool {
///         std::env::var("ZAI_API_KEY").is_ok()
///     }
///
///     async fn fetch(&self, ctx: &FetchContext) -> Result<FetchResult, FetchError> {
///         let response = ctx.run_cancellable(ctx.http.get(URL)).await??;
///         // map response into a snapshot
///     }
/// }
/// ```
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Strategy name, unique within its provider (e.g. "oauth", "api").
    ///
    /// Reported as the outcome's source when this strategy wins.
    fn name(&self) -> &str;

    /// The kind of mechanism this strategy uses.
    fn kind(&self) -> FetchKind;

    /// Check if this strategy can run right now.
    ///
    /// Must be cheap and local: no network I/O, no blocking, no keychain
    /// prompts. Environment variables and file existence are fine.
    fn is_available(&self, ctx: &FetchContext) -> bool;

    /// Fetch usage data using this strategy.
    ///
    /// Must observe `ctx.cancellation()` and return promptly once it fires.
    /// `Err` is treated as a recoverable failure.
    async fn fetch(&self, ctx: &FetchContext) -> Result<FetchResult, FetchError>;
}

// ============================================================================
// Strategy Info
// ============================================================================

/// Information about a strategy (for reporting).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    /// Strategy name.
    pub name: String,
    /// Strategy kind.
    pub kind: FetchKind,
    /// Whether the strategy is available.
    pub available: bool,
}

impl StrategyInfo {
    /// Creates strategy info from a strategy implementation.
    pub fn from_strategy(strategy: &dyn FetchStrategy, ctx: &FetchContext) -> Self {
        Self {
            name: strategy.name().to_string(),
            kind: strategy.kind(),
            available: strategy.is_available(ctx),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
