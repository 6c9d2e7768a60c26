//! Mock strategies shared by the engine tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use usagehub_core::{PeriodType, UsagePeriod, UsageSnapshot};

use crate::context::FetchContext;
use crate::error::FetchError;
use crate::host::keychain::MemoryKeychain;
use crate::strategy::{FetchKind, FetchResult, FetchStrategy};

/// A context that never touches the system keychain.
pub fn test_context() -> FetchContext {
    FetchContext::builder()
        .keychain(Arc::new(MemoryKeychain::new()))
        .build()
}

/// Tracks how many strategies are inside `fetch` at once.
#[derive(Debug, Default)]
pub struct ConcurrencyTracker {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl ConcurrencyTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub enum Behavior {
    Success(String),
    Recoverable(String),
    Fatal(String),
    Error,
    Panic,
    WaitForCancel,
}

#[derive(Debug)]
pub struct MockStrategy {
    name: String,
    behavior: Behavior,
    available: AtomicBool,
    calls: AtomicUsize,
    delay: Duration,
    tracker: Option<Arc<ConcurrencyTracker>>,
}

impl MockStrategy {
    pub fn new(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            available: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            tracker: None,
        }
    }

    pub fn success(name: &str, provider: &str) -> Arc<Self> {
        Arc::new(Self::new(name, Behavior::Success(provider.to_string())))
    }

    pub fn recoverable(name: &str, reason: &str) -> Arc<Self> {
        Arc::new(Self::new(name, Behavior::Recoverable(reason.to_string())))
    }

    pub fn fatal(name: &str, reason: &str) -> Arc<Self> {
        Arc::new(Self::new(name, Behavior::Fatal(reason.to_string())))
    }

    pub fn error(name: &str) -> Arc<Self> {
        Arc::new(Self::new(name, Behavior::Error))
    }

    pub fn panicking(name: &str) -> Arc<Self> {
        Arc::new(Self::new(name, Behavior::Panic))
    }

    pub fn hanging(name: &str) -> Arc<Self> {
        Arc::new(Self::new(name, Behavior::WaitForCancel))
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn tracker(mut self, tracker: Arc<ConcurrencyTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn unavailable(self: Arc<Self>) -> Arc<Self> {
        self.available.store(false, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn run(&self, ctx: &FetchContext) -> Result<FetchResult, FetchError> {
        if !self.delay.is_zero() {
            ctx.run_cancellable(tokio::time::sleep(self.delay)).await?;
        }
        match &self.behavior {
            Behavior::Success(provider) => Ok(FetchResult::Success(
                UsageSnapshot::new(provider.as_str())
                    .with_period(UsagePeriod::new("Session", 25.0, PeriodType::Session)),
            )),
            Behavior::Recoverable(reason) => Ok(FetchResult::recoverable(reason.clone())),
            Behavior::Fatal(reason) => Ok(FetchResult::fatal(reason.clone())),
            Behavior::Error => Err(FetchError::InvalidResponse("mock failure".to_string())),
            Behavior::Panic => panic!("mock strategy {} panicked", self.name),
            Behavior::WaitForCancel => {
                ctx.cancellation().cancelled().await;
                Err(FetchError::Cancelled)
            }
        }
    }
}

#[async_trait]
impl FetchStrategy for MockStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> FetchKind {
        FetchKind::OAuth
    }

    fn is_available(&self, _ctx: &FetchContext) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn fetch(&self, ctx: &FetchContext) -> Result<FetchResult, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(tracker) = &self.tracker {
            tracker.enter();
        }
        let result = self.run(ctx).await;
        if let Some(tracker) = &self.tracker {
            tracker.exit();
        }
        result
    }
}
