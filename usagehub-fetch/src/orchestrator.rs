//! Bounded concurrent refresh across many providers.
//!
//! The orchestrator runs one [`ProviderPipeline`] per requested provider on
//! the tokio runtime, at most `max_concurrent` at a time, and reports each
//! outcome as it lands. It knows nothing about individual providers.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};
use usagehub_core::ProviderId;

use crate::cache::SnapshotCache;
use crate::context::FetchContext;
use crate::pipeline::{FetchOutcome, OutcomeResult, ProviderPipeline, serialize_millis};

/// Default number of providers fetched at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Default age after which a cached snapshot is considered stale.
pub const DEFAULT_STALE_THRESHOLD_MINUTES: u64 = 60;

// ============================================================================
// Settings
// ============================================================================

/// Orchestrator tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Maximum pipelines running at once. Zero is treated as one.
    pub max_concurrent: usize,
    /// Staleness threshold for cached snapshots, in minutes.
    pub stale_threshold_minutes: u64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            stale_threshold_minutes: DEFAULT_STALE_THRESHOLD_MINUTES,
        }
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Emitted once per provider as its outcome becomes available.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    /// The provider that finished.
    pub provider_id: ProviderId,
    /// True if data is available (fresh or cached).
    pub success: bool,
    /// True if the data came from the cache.
    pub cached: bool,
    /// Winning source on success, error message on failure.
    pub source_or_error: String,
    /// How long the provider took.
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    /// Providers finished so far, including this one.
    pub completed: usize,
    /// Providers requested in this refresh.
    pub total: usize,
}

impl ProgressEvent {
    fn new(outcome: &FetchOutcome, completed: usize, total: usize) -> Self {
        let source_or_error = match &outcome.result {
            OutcomeResult::Failed { error } => error.clone(),
            _ => outcome.source().unwrap_or_default().to_string(),
        };
        Self {
            provider_id: outcome.provider_id.clone(),
            success: !outcome.is_failed(),
            cached: outcome.is_cached(),
            source_or_error,
            elapsed: outcome.elapsed,
            completed,
            total,
        }
    }
}

/// Receives progress events. Called from the collecting task, never concurrently.
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

struct ProgressReporter {
    callback: Option<ProgressCallback>,
    completed: usize,
    total: usize,
}

impl ProgressReporter {
    fn report(&mut self, outcome: &FetchOutcome) {
        self.completed += 1;
        if let Some(callback) = &self.callback {
            callback(&ProgressEvent::new(outcome, self.completed, self.total));
        }
    }
}

// ============================================================================
// Fetch Orchestrator
// ============================================================================

/// Runs provider pipelines concurrently with a bounded worker count.
pub struct FetchOrchestrator {
    pipelines: HashMap<ProviderId, Arc<ProviderPipeline>>,
    cache: Arc<dyn SnapshotCache>,
    context: FetchContext,
    settings: OrchestratorSettings,
}

impl FetchOrchestrator {
    /// Creates an orchestrator over a fixed set of pipelines.
    ///
    /// A later pipeline with the same provider id replaces an earlier one.
    pub fn new(
        pipelines: impl IntoIterator<Item = ProviderPipeline>,
        cache: Arc<dyn SnapshotCache>,
        context: FetchContext,
        settings: OrchestratorSettings,
    ) -> Self {
        let pipelines = pipelines
            .into_iter()
            .map(|p| (p.provider_id().clone(), Arc::new(p)))
            .collect();
        Self {
            pipelines,
            cache,
            context,
            settings,
        }
    }

    /// Returns the orchestrator settings.
    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Returns the snapshot cache.
    pub fn cache(&self) -> &Arc<dyn SnapshotCache> {
        &self.cache
    }

    /// Returns the base fetch context.
    pub fn context(&self) -> &FetchContext {
        &self.context
    }

    /// Returns the pipeline for `id`, if registered.
    pub fn pipeline(&self, id: &ProviderId) -> Option<&ProviderPipeline> {
        self.pipelines.get(id).map(AsRef::as_ref)
    }

    /// Registered provider ids, sorted.
    pub fn provider_ids(&self) -> Vec<ProviderId> {
        let mut ids: Vec<_> = self.pipelines.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Refreshes `ids`, returning exactly one outcome per distinct id.
    ///
    /// Cancelling `cancel` stops in-flight strategies at their next
    /// cancellation point; providers still waiting for a slot resolve from
    /// the cache without running any strategy.
    #[instrument(skip_all, fields(requested = ids.len(), max_concurrent = self.settings.max_concurrent))]
    pub async fn refresh(
        &self,
        ids: &[ProviderId],
        cancel: CancellationToken,
        progress: Option<ProgressCallback>,
    ) -> HashMap<ProviderId, FetchOutcome> {
        let mut seen = HashSet::new();
        let requested: Vec<ProviderId> = ids.iter().filter(|id| seen.insert(*id)).cloned().collect();

        let start = Instant::now();
        let total = requested.len();
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent.max(1)));
        let ctx = self.context.with_cancellation(cancel.clone());

        let mut reporter = ProgressReporter {
            callback: progress,
            completed: 0,
            total,
        };
        let mut outcomes = HashMap::with_capacity(total);
        let mut tasks = JoinSet::new();

        for id in &requested {
            let Some(pipeline) = self.pipelines.get(id).map(Arc::clone) else {
                let outcome = FetchOutcome::failed(id.clone(), format!("unknown provider: {id}"));
                reporter.report(&outcome);
                outcomes.insert(id.clone(), outcome);
                continue;
            };

            let ctx = ctx.clone();
            let cache = Arc::clone(&self.cache);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                run_isolated(&pipeline, &ctx, cache.as_ref()).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    debug!(provider = %outcome.provider_id, source = ?outcome.source(), "Provider finished");
                    reporter.report(&outcome);
                    outcomes.insert(outcome.provider_id.clone(), outcome);
                }
                Err(e) => error!(error = %e, "Provider task failed"),
            }
        }

        for id in requested {
            if !outcomes.contains_key(&id) {
                let outcome = FetchOutcome::failed(id.clone(), "provider task failed");
                reporter.report(&outcome);
                outcomes.insert(id, outcome);
            }
        }

        let failed = outcomes.values().filter(|o| o.is_failed()).count();
        info!(
            total,
            failed,
            cancelled = cancel.is_cancelled(),
            elapsed = ?start.elapsed(),
            "Refresh complete"
        );
        outcomes
    }
}

impl std::fmt::Debug for FetchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchOrchestrator")
            .field("providers", &self.provider_ids())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

async fn run_isolated(
    pipeline: &ProviderPipeline,
    ctx: &FetchContext,
    cache: &dyn SnapshotCache,
) -> FetchOutcome {
    let start = Instant::now();
    match AssertUnwindSafe(pipeline.execute(ctx, cache)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(ToString::to_string)
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(provider = %pipeline.provider_id(), panic = %message, "Provider pipeline panicked");
            FetchOutcome {
                elapsed: start.elapsed(),
                ..FetchOutcome::failed(
                    pipeline.provider_id().clone(),
                    format!("pipeline panicked: {message}"),
                )
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
