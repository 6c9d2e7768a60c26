//! Persistence round-trip and edge case tests.
//!
//! Tests file I/O operations, settings round-trip and the file-backed
//! snapshot cache.

use chrono::{Duration, Utc};
use tempfile::TempDir;
use usagehub_core::{PeriodType, ProviderId, UsagePeriod, UsageSnapshot};
use usagehub_fetch::{CacheError, SnapshotCache};

use crate::persistence::{ensure_dir, load_json, load_json_or_default, save_json};
use crate::settings::{LogLevel, Settings};
use crate::snapshot_cache::FileSnapshotCache;

fn snapshot(id: &str, utilization: f64) -> UsageSnapshot {
    UsageSnapshot::new(id).with_period(UsagePeriod::new("Session", utilization, PeriodType::Session))
}

// ============================================================================
// JSON Persistence Tests
// ============================================================================

#[tokio::test]
async fn test_save_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let nested_path = temp_dir.path().join("deeply").join("nested").join("test.json");

    save_json(&nested_path, &serde_json::json!({"key": "value"})).await.unwrap();

    assert!(nested_path.exists());
    assert!(!nested_path.with_extension("json.tmp").exists());
}

#[tokio::test]
async fn test_save_overwrites_atomically() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("data.json");

    save_json(&path, &vec![1, 2, 3]).await.unwrap();
    save_json(&path, &vec![4]).await.unwrap();

    let loaded: Vec<i32> = load_json(&path).await.unwrap();
    assert_eq!(loaded, vec![4]);
}

#[tokio::test]
async fn test_load_nonexistent_file() {
    let temp_dir = TempDir::new().unwrap();
    let result: Result<Settings, _> = load_json(&temp_dir.path().join("missing.json")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_load_or_default_on_corrupt_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.json");
    tokio::fs::write(&path, "{ not json").await.unwrap();

    let settings: Settings = load_json_or_default(&path).await;
    assert_eq!(settings, Settings::default());
}

#[tokio::test]
async fn test_ensure_dir_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let dir_path = temp_dir.path().join("test_dir");

    ensure_dir(&dir_path).await.unwrap();
    ensure_dir(&dir_path).await.unwrap();

    assert!(dir_path.is_dir());
}

// ============================================================================
// Settings Tests
// ============================================================================

#[tokio::test]
async fn test_settings_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.json");

    let settings = Settings {
        max_concurrent_providers: 3,
        stale_threshold_minutes: 30,
        fetch_timeout_secs: 10,
        enabled_providers: vec![ProviderId::new("zai")],
        log_level: LogLevel::Debug,
    };
    settings.save(&path).await.unwrap();

    assert_eq!(Settings::load(&path).await, settings);
}

#[tokio::test]
async fn test_partial_settings_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.json");
    tokio::fs::write(&path, r#"{"max_concurrent_providers": 0, "log_level": "info"}"#)
        .await
        .unwrap();

    let settings = Settings::load(&path).await;
    assert_eq!(settings.max_concurrent_providers, 1);
    assert_eq!(settings.log_level, LogLevel::Info);
    assert_eq!(settings.stale_threshold_minutes, 60);
    assert_eq!(settings.enabled_providers.len(), 2);
}

#[tokio::test]
async fn test_missing_settings_file_uses_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let settings = Settings::load(&temp_dir.path().join("nope.json")).await;
    assert_eq!(settings, Settings::default());
}

// ============================================================================
// File Snapshot Cache Tests
// ============================================================================

#[tokio::test]
async fn test_cache_roundtrip_preserves_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let cache = FileSnapshotCache::new(temp_dir.path().join("snapshots"));
    let original = snapshot("claude", 104.5).captured_at(Utc::now() - Duration::hours(5));

    cache.save(&original).await.unwrap();

    assert_eq!(cache.load(&ProviderId::new("claude")).await, Some(original));
    assert!(temp_dir.path().join("snapshots").join("claude.json").exists());
}

#[tokio::test]
async fn test_cache_save_replaces() {
    let temp_dir = TempDir::new().unwrap();
    let cache = FileSnapshotCache::new(temp_dir.path());

    cache.save(&snapshot("codex", 10.0)).await.unwrap();
    cache.save(&snapshot("codex", 10.0)).await.unwrap();
    let replacement = snapshot("codex", 75.0);
    cache.save(&replacement).await.unwrap();

    let loaded = cache.load(&ProviderId::new("codex")).await.unwrap();
    assert_eq!(loaded, replacement);
    assert_eq!(loaded.periods.len(), 1);
}

#[tokio::test]
async fn test_cache_corrupt_entry_is_absent() {
    let temp_dir = TempDir::new().unwrap();
    let cache = FileSnapshotCache::new(temp_dir.path());
    tokio::fs::write(temp_dir.path().join("zai.json"), "garbage").await.unwrap();

    assert!(cache.load(&ProviderId::new("zai")).await.is_none());
}

#[tokio::test]
async fn test_cache_missing_dir_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    let cache = FileSnapshotCache::new(temp_dir.path().join("never-created"));

    assert!(cache.load(&ProviderId::new("claude")).await.is_none());
    cache.clear_all().await.unwrap();
    cache.clear(&ProviderId::new("claude")).await.unwrap();
}

#[tokio::test]
async fn test_cache_rejects_unsafe_ids() {
    let temp_dir = TempDir::new().unwrap();
    let cache = FileSnapshotCache::new(temp_dir.path());
    let evil = ProviderId::new("../escape");

    assert!(matches!(cache.path_for(&evil), Err(CacheError::InvalidKey(_))));
    assert!(cache.load(&evil).await.is_none());
    assert!(cache.save(&UsageSnapshot::new(evil)).await.is_err());
}

#[tokio::test]
async fn test_cache_clear() {
    let temp_dir = TempDir::new().unwrap();
    let cache = FileSnapshotCache::new(temp_dir.path());
    cache.save(&snapshot("claude", 1.0)).await.unwrap();
    cache.save(&snapshot("codex", 2.0)).await.unwrap();
    tokio::fs::write(temp_dir.path().join("notes.txt"), "keep").await.unwrap();

    cache.clear(&ProviderId::new("claude")).await.unwrap();
    assert!(cache.load(&ProviderId::new("claude")).await.is_none());
    assert!(cache.load(&ProviderId::new("codex")).await.is_some());

    cache.clear_all().await.unwrap();
    assert!(cache.load(&ProviderId::new("codex")).await.is_none());
    assert!(temp_dir.path().join("notes.txt").exists());
}
