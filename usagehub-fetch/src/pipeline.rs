//! Provider pipeline: one provider's strategies tried in declared order.
//!
//! The pipeline walks its strategy list until one succeeds, stops early on a
//! fatal result, and falls back to the cached snapshot when every strategy
//! has been exhausted.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::{debug, info, instrument, warn};
use usagehub_core::{ProviderId, UsageSnapshot};

use crate::cache::SnapshotCache;
use crate::context::FetchContext;
use crate::error::FetchError;
use crate::strategy::{FetchKind, FetchResult, FetchStrategy, StrategyInfo};

/// Source reported for outcomes served from the cache.
pub const CACHE_SOURCE: &str = "cache";

/// Error reported when no strategy was available and nothing was cached.
pub const NO_STRATEGY_AVAILABLE: &str = "no strategy available";

#[allow(clippy::trivially_copy_pass_by_ref)]
pub(crate) fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u128(duration.as_millis())
}

// ============================================================================
// Fetch Attempt
// ============================================================================

/// Record of a single strategy invocation.
///
/// Unavailable strategies are skipped without a record.
#[derive(Debug, Clone, Serialize)]
pub struct FetchAttempt {
    /// The strategy that was invoked.
    pub strategy: String,
    /// The kind of fetch used.
    pub kind: FetchKind,
    /// Whether the attempt produced a snapshot.
    pub success: bool,
    /// Failure message, if the attempt failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// True if the failure stopped the pipeline.
    pub fatal: bool,
    /// How long the attempt took.
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl FetchAttempt {
    fn new(strategy: &dyn FetchStrategy, result: &FetchResult, duration: Duration) -> Self {
        Self {
            strategy: strategy.name().to_string(),
            kind: strategy.kind(),
            success: result.is_success(),
            error: result.reason().map(ToString::to_string),
            fatal: result.is_fatal(),
            duration,
        }
    }
}

// ============================================================================
// Fetch Outcome
// ============================================================================

/// How a pipeline run resolved.
#[derive(Debug, Clone)]
pub enum OutcomeResult {
    /// A strategy produced a new snapshot.
    Fresh {
        /// Name of the winning strategy.
        source: String,
        /// The new snapshot.
        snapshot: UsageSnapshot,
    },
    /// Every strategy failed; the last cached snapshot was returned.
    Cached {
        /// The cached snapshot, at whatever age.
        snapshot: UsageSnapshot,
    },
    /// Every strategy failed and nothing was cached.
    Failed {
        /// The most specific failure message.
        error: String,
    },
}

impl OutcomeResult {
    /// Wire name of the variant.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Fresh { .. } => "fresh",
            Self::Cached { .. } => "cached",
            Self::Failed { .. } => "failed",
        }
    }
}

/// The terminal result of one provider pipeline run.
///
/// Serializes flat: `provider_id`, `status`, `success`, `cached`, `source`
/// (`"cache"` when served from the cache), then `snapshot` or `error`,
/// `attempts` and `elapsed_ms`.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// The provider this outcome belongs to.
    pub provider_id: ProviderId,
    /// The resolved result.
    pub result: OutcomeResult,
    /// Every strategy invocation, in order.
    pub attempts: Vec<FetchAttempt>,
    /// Wall time of the whole run.
    pub elapsed: Duration,
}

impl Serialize for FetchOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("provider_id", &self.provider_id)?;
        map.serialize_entry("status", self.result.status())?;
        map.serialize_entry("success", &self.is_success())?;
        map.serialize_entry("cached", &self.is_cached())?;
        if let Some(source) = self.source() {
            map.serialize_entry("source", source)?;
        }
        if let Some(snapshot) = self.snapshot() {
            map.serialize_entry("snapshot", snapshot)?;
        }
        if let Some(error) = self.error() {
            map.serialize_entry("error", error)?;
        }
        map.serialize_entry("attempts", &self.attempts)?;
        map.serialize_entry("elapsed_ms", &self.elapsed.as_millis())?;
        map.end()
    }
}

impl FetchOutcome {
    /// Creates a failed outcome with no attempts.
    pub fn failed(provider_id: ProviderId, error: impl Into<String>) -> Self {
        Self {
            provider_id,
            result: OutcomeResult::Failed { error: error.into() },
            attempts: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Returns true if there is a snapshot to show, fresh or cached.
    pub fn is_success(&self) -> bool {
        !self.is_failed()
    }

    /// Returns true if a strategy produced fresh data.
    pub fn is_fresh(&self) -> bool {
        matches!(self.result, OutcomeResult::Fresh { .. })
    }

    /// Returns true if this outcome was served from the cache.
    pub fn is_cached(&self) -> bool {
        matches!(self.result, OutcomeResult::Cached { .. })
    }

    /// Returns true if there is no data at all.
    pub fn is_failed(&self) -> bool {
        matches!(self.result, OutcomeResult::Failed { .. })
    }

    /// The winning strategy name, or `"cache"` when served from the cache.
    pub fn source(&self) -> Option<&str> {
        match &self.result {
            OutcomeResult::Fresh { source, .. } => Some(source),
            OutcomeResult::Cached { .. } => Some(CACHE_SOURCE),
            OutcomeResult::Failed { .. } => None,
        }
    }

    /// The snapshot, fresh or cached.
    pub fn snapshot(&self) -> Option<&UsageSnapshot> {
        match &self.result {
            OutcomeResult::Fresh { snapshot, .. } | OutcomeResult::Cached { snapshot } => {
                Some(snapshot)
            }
            OutcomeResult::Failed { .. } => None,
        }
    }

    /// The failure message, if the outcome failed.
    pub fn error(&self) -> Option<&str> {
        match &self.result {
            OutcomeResult::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Number of strategies that were invoked.
    pub fn attempts_count(&self) -> usize {
        self.attempts.len()
    }
}

// ============================================================================
// Provider Pipeline
// ============================================================================

/// One provider's ordered strategy list.
///
/// Order is declared preference and is never re-sorted.
#[derive(Clone)]
pub struct ProviderPipeline {
    provider_id: ProviderId,
    strategies: Vec<Arc<dyn FetchStrategy>>,
}

impl ProviderPipeline {
    /// Creates a pipeline with no strategies.
    pub fn new(provider_id: impl Into<ProviderId>) -> Self {
        Self {
            provider_id: provider_id.into(),
            strategies: Vec::new(),
        }
    }

    /// Creates a pipeline with the given strategies.
    pub fn with_strategies(
        provider_id: impl Into<ProviderId>,
        strategies: Vec<Arc<dyn FetchStrategy>>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            strategies,
        }
    }

    /// Appends a strategy (lowest preference so far).
    #[must_use]
    pub fn strategy(mut self, strategy: Arc<dyn FetchStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// The provider this pipeline fetches.
    pub fn provider_id(&self) -> &ProviderId {
        &self.provider_id
    }

    /// Returns the number of strategies in the pipeline.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Returns true if the pipeline is empty.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Returns information about all strategies.
    pub fn strategy_info(&self, ctx: &FetchContext) -> Vec<StrategyInfo> {
        self.strategies
            .iter()
            .map(|s| StrategyInfo::from_strategy(s.as_ref(), ctx))
            .collect()
    }

    /// Runs strategies in order until one succeeds, then falls back to cache.
    #[instrument(skip(self, ctx, cache), fields(provider = %self.provider_id, strategies = self.strategies.len()))]
    pub async fn execute(&self, ctx: &FetchContext, cache: &dyn SnapshotCache) -> FetchOutcome {
        let start = Instant::now();
        let mut attempts = Vec::new();
        let mut last_error: Option<String> = None;

        for strategy in &self.strategies {
            let name = strategy.name();

            if ctx.is_cancelled() {
                debug!(strategy = %name, "Refresh cancelled, not starting strategy");
                last_error = Some(FetchError::Cancelled.to_string());
                break;
            }

            if !strategy.is_available(ctx) {
                debug!(strategy = %name, "Strategy not available, skipping");
                continue;
            }

            debug!(strategy = %name, kind = %strategy.kind(), "Executing strategy");
            let attempt_start = Instant::now();
            let result = match strategy.fetch(ctx).await {
                Ok(result) => result,
                Err(error) => FetchResult::from(error),
            };
            let duration = attempt_start.elapsed();
            attempts.push(FetchAttempt::new(strategy.as_ref(), &result, duration));

            match result {
                FetchResult::Success(mut snapshot) => {
                    info!(strategy = %name, duration = ?duration, "Strategy succeeded");
                    if snapshot.provider_id != self.provider_id {
                        debug!(reported = %snapshot.provider_id, "Snapshot provider id corrected");
                        snapshot.provider_id = self.provider_id.clone();
                    }
                    if let Err(e) = cache.save(&snapshot).await {
                        warn!(error = %e, "Failed to cache snapshot");
                    }
                    return FetchOutcome {
                        provider_id: self.provider_id.clone(),
                        result: OutcomeResult::Fresh {
                            source: name.to_string(),
                            snapshot,
                        },
                        attempts,
                        elapsed: start.elapsed(),
                    };
                }
                FetchResult::Recoverable(reason) => {
                    warn!(strategy = %name, error = %reason, duration = ?duration, "Strategy failed");
                    last_error = Some(reason);
                }
                FetchResult::Fatal(reason) => {
                    warn!(strategy = %name, error = %reason, "Strategy failed fatally, skipping remaining strategies");
                    last_error = Some(reason);
                    break;
                }
            }
        }

        let result = if let Some(snapshot) = cache.load(&self.provider_id).await {
            warn!(
                captured_at = %snapshot.captured_at,
                error = last_error.as_deref().unwrap_or(NO_STRATEGY_AVAILABLE),
                "All strategies failed, using cached snapshot"
            );
            OutcomeResult::Cached { snapshot }
        } else {
            let error = last_error.unwrap_or_else(|| NO_STRATEGY_AVAILABLE.to_string());
            warn!(error = %error, "All strategies failed, nothing cached");
            OutcomeResult::Failed { error }
        };

        FetchOutcome {
            provider_id: self.provider_id.clone(),
            result,
            attempts,
            elapsed: start.elapsed(),
        }
    }
}

impl std::fmt::Debug for ProviderPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderPipeline")
            .field("provider_id", &self.provider_id)
            .field(
                "strategies",
                &self.strategies.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
