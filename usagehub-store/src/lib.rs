// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # UsageHub Store
//!
//! Everything UsageHub keeps on disk.
//!
//! This crate provides:
//!
//! - **Settings**: User preferences loaded from `settings.json`
//! - **FileSnapshotCache**: The durable last-known-good snapshot cache
//! - **Persistence**: Atomic, owner-only JSON file helpers
//!
//! ## Usage
//!
//! ```ignore
//! use usagehub_store::{FileSnapshotCache, Settings};
//!
//! let settings = Settings::load_default().await;
//! let cache = FileSnapshotCache::at_default_location();
//!
//! let orchestrator = FetchOrchestrator::new(
//!     pipelines,
//!     Arc::new(cache),
//!     ctx,
//!     settings.orchestrator_settings(),
//! );
//! ```

pub mod error;
pub mod persistence;
pub mod settings;
pub mod snapshot_cache;

pub use error::StoreError;
pub use persistence::{
    default_cache_dir, default_config_dir, default_settings_path, default_snapshot_dir,
    ensure_dir, load_json, load_json_or_default, save_json,
};
pub use settings::{LogLevel, Settings};
pub use snapshot_cache::FileSnapshotCache;

#[cfg(test)]
mod persistence_tests;
