//! Last-known-good snapshot cache.
//!
//! The pipeline saves every fresh snapshot here and falls back to it when all
//! strategies fail. One entry per provider; a save replaces the previous
//! entry wholesale. The cache never expires entries on its own: staleness is
//! a presentation concern answered by [`is_stale`].

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Duration;
use usagehub_core::{ProviderId, UsageSnapshot};

use crate::error::CacheError;

// ============================================================================
// Snapshot Cache Trait
// ============================================================================

/// Storage for the most recent successful snapshot of each provider.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    /// Stores `snapshot` as the latest value for its provider.
    async fn save(&self, snapshot: &UsageSnapshot) -> Result<(), CacheError>;

    /// Loads the latest snapshot for `provider`, if any.
    ///
    /// An unreadable entry is reported as absent.
    async fn load(&self, provider: &ProviderId) -> Option<UsageSnapshot>;

    /// Removes the entry for `provider`.
    async fn clear(&self, provider: &ProviderId) -> Result<(), CacheError>;

    /// Removes every entry.
    async fn clear_all(&self) -> Result<(), CacheError>;
}

/// Returns true if `snapshot` is older than `threshold_minutes`.
pub fn is_stale(snapshot: &UsageSnapshot, threshold_minutes: u64) -> bool {
    let minutes = i64::try_from(threshold_minutes).unwrap_or(i64::MAX);
    snapshot.is_stale(Duration::try_minutes(minutes).unwrap_or(Duration::MAX))
}

// ============================================================================
// Memory Cache
// ============================================================================

/// In-process snapshot cache.
#[derive(Debug, Default)]
pub struct MemorySnapshotCache {
    entries: Mutex<HashMap<ProviderId, UsageSnapshot>>,
}

impl MemorySnapshotCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache pre-populated with snapshots keyed by their provider.
    pub fn with_snapshots(snapshots: impl IntoIterator<Item = UsageSnapshot>) -> Self {
        let entries = snapshots
            .into_iter()
            .map(|s| (s.provider_id.clone(), s))
            .collect();
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Number of cached providers.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SnapshotCache for MemorySnapshotCache {
    async fn save(&self, snapshot: &UsageSnapshot) -> Result<(), CacheError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(snapshot.provider_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn load(&self, provider: &ProviderId) -> Option<UsageSnapshot> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(provider)
            .cloned()
    }

    async fn clear(&self, provider: &ProviderId) -> Result<(), CacheError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(provider);
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
