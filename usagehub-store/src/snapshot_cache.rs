//! File-backed snapshot cache.
//!
//! One pretty-printed JSON file per provider under a single directory,
//! written with the same atomic, owner-only [`save_json`] used for settings.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use usagehub_core::{ProviderId, UsageSnapshot};
use usagehub_fetch::{CacheError, SnapshotCache};

use crate::error::StoreError;
use crate::persistence::{default_snapshot_dir, load_json, save_json};

/// Snapshot cache stored as `<dir>/<provider>.json`.
#[derive(Debug, Clone)]
pub struct FileSnapshotCache {
    dir: PathBuf,
}

impl FileSnapshotCache {
    /// Creates a cache rooted at `dir`. The directory is created lazily.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates a cache in the platform cache directory.
    pub fn at_default_location() -> Self {
        Self::new(default_snapshot_dir())
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file backing `provider`'s entry.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::InvalidKey` for ids that could escape the
    /// cache directory.
    pub fn path_for(&self, provider: &ProviderId) -> Result<PathBuf, CacheError> {
        if !provider.is_path_safe() {
            return Err(CacheError::InvalidKey(provider.to_string()));
        }
        Ok(self.dir.join(format!("{provider}.json")))
    }
}

#[async_trait]
impl SnapshotCache for FileSnapshotCache {
    async fn save(&self, snapshot: &UsageSnapshot) -> Result<(), CacheError> {
        let path = self.path_for(&snapshot.provider_id)?;
        save_json(&path, snapshot).await?;
        debug!(provider = %snapshot.provider_id, path = %path.display(), "Snapshot cached");
        Ok(())
    }

    async fn load(&self, provider: &ProviderId) -> Option<UsageSnapshot> {
        let path = match self.path_for(provider) {
            Ok(path) => path,
            Err(e) => {
                warn!(provider = %provider, error = %e, "Refusing cache lookup");
                return None;
            }
        };

        match load_json::<UsageSnapshot>(&path).await {
            Ok(snapshot) if snapshot.provider_id == *provider => Some(snapshot),
            Ok(snapshot) => {
                warn!(
                    provider = %provider,
                    found = %snapshot.provider_id,
                    "Cached snapshot belongs to another provider, ignoring"
                );
                None
            }
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(provider = %provider, "No cached snapshot");
                None
            }
            Err(e) => {
                warn!(provider = %provider, path = %path.display(), error = %e, "Unreadable cached snapshot, ignoring");
                None
            }
        }
    }

    async fn clear(&self, provider: &ProviderId) -> Result<(), CacheError> {
        let path = self.path_for(provider)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(provider = %provider, "Cleared cached snapshot");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                tokio::fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        info!(dir = %self.dir.display(), removed, "Cleared snapshot cache");
        Ok(())
    }
}
