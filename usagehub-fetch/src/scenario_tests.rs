//! End-to-end engine scenarios: orchestrator, pipelines and cache together.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use usagehub_core::{PeriodType, ProviderId, UsagePeriod, UsageSnapshot};

use crate::cache::{MemorySnapshotCache, SnapshotCache, is_stale};
use crate::context::FetchContext;
use crate::error::{CacheError, FetchError};
use crate::orchestrator::{FetchOrchestrator, OrchestratorSettings};
use crate::pipeline::ProviderPipeline;
use crate::strategy::{FetchKind, FetchResult, FetchStrategy};
use crate::test_support::{MockStrategy, test_context};

/// Cache wrapper that counts loads.
#[derive(Default)]
struct CountingCache {
    inner: MemorySnapshotCache,
    loads: AtomicUsize,
}

#[async_trait]
impl SnapshotCache for CountingCache {
    async fn save(&self, snapshot: &UsageSnapshot) -> Result<(), CacheError> {
        self.inner.save(snapshot).await
    }

    async fn load(&self, provider: &ProviderId) -> Option<UsageSnapshot> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(provider).await
    }

    async fn clear(&self, provider: &ProviderId) -> Result<(), CacheError> {
        self.inner.clear(provider).await
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        self.inner.clear_all().await
    }
}

/// Strategy that returns a fixed utilization.
struct FixedUsage {
    name: &'static str,
    utilization: f64,
}

#[async_trait]
impl FetchStrategy for FixedUsage {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> FetchKind {
        FetchKind::WebCookies
    }

    fn is_available(&self, _ctx: &FetchContext) -> bool {
        true
    }

    async fn fetch(&self, _ctx: &FetchContext) -> Result<FetchResult, FetchError> {
        Ok(FetchResult::Success(
            UsageSnapshot::new("x")
                .with_period(UsagePeriod::new("Session", self.utilization, PeriodType::Session)),
        ))
    }
}

fn single(pipeline: ProviderPipeline, cache: Arc<dyn SnapshotCache>) -> FetchOrchestrator {
    FetchOrchestrator::new([pipeline], cache, test_context(), OrchestratorSettings::default())
}

#[tokio::test]
async fn scenario_a_falls_through_to_web() {
    let env = MockStrategy::success("env", "x").unavailable();
    let file = MockStrategy::recoverable("file", "bad token");
    let pipeline = ProviderPipeline::new("x")
        .strategy(env.clone())
        .strategy(file.clone())
        .strategy(Arc::new(FixedUsage { name: "web", utilization: 42.0 }));

    let cache = Arc::new(CountingCache::default());
    let orchestrator = single(pipeline, cache.clone());

    let id = ProviderId::new("x");
    let outcomes = orchestrator
        .refresh(std::slice::from_ref(&id), CancellationToken::new(), None)
        .await;
    let outcome = &outcomes[&id];

    assert!(outcome.is_fresh());
    assert_eq!(outcome.source(), Some("web"));
    let snapshot = outcome.snapshot().unwrap();
    assert_eq!(snapshot.provider_id, id);
    assert!(snapshot.periods.iter().any(|p| p.utilization == 42.0));
    assert_eq!(env.calls(), 0);
    assert_eq!(file.calls(), 1);
    assert_eq!(cache.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn scenario_b_fatal_without_cache_fails() {
    let pipeline = ProviderPipeline::new("y").strategy(MockStrategy::fatal("oauth", "token rejected"));
    let orchestrator = single(pipeline, Arc::new(MemorySnapshotCache::new()));

    let id = ProviderId::new("y");
    let outcomes = orchestrator
        .refresh(std::slice::from_ref(&id), CancellationToken::new(), None)
        .await;
    let outcome = &outcomes[&id];

    assert!(!outcome.is_success());
    assert!(!outcome.is_cached());
    assert_eq!(outcome.error(), Some("token rejected"));
}

#[tokio::test]
async fn scenario_c_fatal_with_stale_cache_serves_cache() {
    let cached = UsageSnapshot::new("z")
        .captured_at(Utc::now() - chrono::Duration::hours(3))
        .with_period(UsagePeriod::new("Session", 10.0, PeriodType::Session));
    let cache = Arc::new(MemorySnapshotCache::with_snapshots([cached.clone()]));
    let pipeline = ProviderPipeline::new("z").strategy(MockStrategy::fatal("oauth", "token rejected"));
    let orchestrator = single(pipeline, cache);

    let id = ProviderId::new("z");
    let outcomes = orchestrator
        .refresh(std::slice::from_ref(&id), CancellationToken::new(), None)
        .await;
    let outcome = &outcomes[&id];

    assert!(outcome.is_success());
    assert!(outcome.is_cached());
    assert_eq!(outcome.source(), Some("cache"));
    assert!(outcome.error().is_none());
    let snapshot = outcome.snapshot().unwrap();
    assert_eq!(snapshot, &cached);
    assert_eq!(snapshot.periods[0].utilization, 10.0);
    assert!(is_stale(snapshot, orchestrator.settings().stale_threshold_minutes));
}

#[tokio::test]
async fn cancellation_returns_promptly_with_every_provider() {
    let names = ["a", "b", "c", "d", "e", "f"];
    let pipelines: Vec<_> = names
        .iter()
        .map(|n| ProviderPipeline::new(*n).strategy(MockStrategy::hanging("oauth")))
        .collect();
    let orchestrator = FetchOrchestrator::new(
        pipelines,
        Arc::new(MemorySnapshotCache::with_snapshots([UsageSnapshot::new("c")])),
        test_context(),
        OrchestratorSettings {
            max_concurrent: 2,
            ..Default::default()
        },
    );

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let ids: Vec<ProviderId> = names.iter().map(|n| ProviderId::new(*n)).collect();
    let start = Instant::now();
    let outcomes = tokio::time::timeout(Duration::from_secs(2), orchestrator.refresh(&ids, token, None))
        .await
        .expect("refresh did not return after cancellation");

    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(outcomes.len(), names.len());
    for id in &ids {
        let outcome = &outcomes[id];
        if id.as_str() == "c" {
            assert!(outcome.is_cached());
        } else {
            assert_eq!(outcome.error(), Some("refresh cancelled"));
        }
    }
}

#[tokio::test]
async fn refresh_writes_cache_for_next_run() {
    let cache = Arc::new(MemorySnapshotCache::new());
    let ok = ProviderPipeline::new("claude").strategy(MockStrategy::success("oauth", "claude"));
    single(ok, cache.clone())
        .refresh(&[ProviderId::new("claude")], CancellationToken::new(), None)
        .await;

    let broken = ProviderPipeline::new("claude").strategy(MockStrategy::recoverable("oauth", "expired"));
    let outcomes = single(broken, cache)
        .refresh(&[ProviderId::new("claude")], CancellationToken::new(), None)
        .await;

    let outcome = &outcomes[&ProviderId::new("claude")];
    assert!(outcome.is_cached());
    assert_eq!(outcome.source(), Some("cache"));
    assert_eq!(outcome.attempts.len(), 1);
}

#[tokio::test]
async fn partial_failure_returns_all_outcomes() {
    let orchestrator = FetchOrchestrator::new(
        [
            ProviderPipeline::new("claude").strategy(MockStrategy::success("oauth", "claude")),
            ProviderPipeline::new("codex").strategy(MockStrategy::error("oauth")),
            ProviderPipeline::new("zai").strategy(MockStrategy::panicking("api")),
        ],
        Arc::new(MemorySnapshotCache::new()),
        test_context(),
        OrchestratorSettings::default(),
    );

    let ids = [ProviderId::new("claude"), ProviderId::new("codex"), ProviderId::new("zai")];
    let outcomes = orchestrator.refresh(&ids, CancellationToken::new(), None).await;

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[&ids[0]].is_fresh());
    assert!(outcomes[&ids[1]].error().unwrap().contains("mock failure"));
    assert!(outcomes[&ids[2]].error().unwrap().contains("panicked"));
}
