// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # UsageHub Fetch
//!
//! The fetch orchestration engine for UsageHub.
//!
//! ## Host APIs
//!
//! The [`host`] module provides abstractions for system interactions:
//!
//! - [`host::keychain`] - Secure credential storage (system keychain)
//! - [`host::http`] - HTTP client with tracing and domain allowlist
//! - [`host::process`] - Subprocess execution for CLI tools
//! - [`host::helper`] - Bounded poll-then-kill credential refresh via a helper program
//!
//! ## Fetch Engine
//!
//! - [`strategy::FetchStrategy`] - One mechanism for acquiring a provider's usage
//! - [`pipeline::ProviderPipeline`] - Walks one provider's strategies in order
//! - [`orchestrator::FetchOrchestrator`] - Bounded fan-out over many pipelines
//! - [`cache::SnapshotCache`] - Last-known-good snapshot store
//! - [`context::FetchContext`] - Host APIs plus the cancellation token
//!
//! ## Example
//!
//! ```ignore
//! use usagehub_fetch::{FetchContext, FetchOrchestrator, MemorySnapshotCache, OrchestratorSettings};
//! use tokio_util::sync::CancellationToken;
//!
//! let orchestrator = FetchOrchestrator::new(
//!     pipelines,
//!     Arc::new(MemorySnapshotCache::new()),
//!     FetchContext::new(),
//!     OrchestratorSettings::default(),
//! );
//!
//! let outcomes = orchestrator
//!     .refresh(&ids, CancellationToken::new(), None)
//!     .await;
//! ```

pub mod cache;
pub mod context;
pub mod error;
pub mod host;
pub mod orchestrator;
pub mod pipeline;
pub mod strategy;

// Errors
pub use error::{CacheError, FetchError, HttpError, KeychainError, ProcessError};

// Host APIs
pub use host::{
    helper::{HelperRefresh, RefreshOutcome},
    http::HttpClient,
    keychain::{KeychainApi, MemoryKeychain, SystemKeychain},
    process::ProcessRunner,
};

// Engine
pub use cache::{MemorySnapshotCache, SnapshotCache, is_stale};
pub use context::{FetchContext, FetchContextBuilder, FetchSettings};
pub use orchestrator::{FetchOrchestrator, OrchestratorSettings, ProgressCallback, ProgressEvent};
pub use pipeline::{FetchAttempt, FetchOutcome, OutcomeResult, ProviderPipeline};
pub use strategy::{FetchKind, FetchResult, FetchStrategy, StrategyInfo};

// Re-exported so callers don't need a direct tokio-util dependency.
pub use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod scenario_tests;
#[cfg(test)]
pub(crate) mod test_support;
