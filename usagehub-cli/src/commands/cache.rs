//! Cache command - manage cached snapshots.

use anyhow::Result;
use clap::{Args, Subcommand};
use tracing::info;
use usagehub_fetch::SnapshotCache;
use usagehub_providers::ProviderRegistry;
use usagehub_store::FileSnapshotCache;

use crate::Cli;

/// Arguments for the cache command.
#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands.
#[derive(Subcommand)]
pub enum CacheAction {
    /// Delete cached snapshots (only those named by --provider, if given).
    Clear,
}

/// Runs the cache command.
pub async fn run(args: &CacheArgs, cli: &Cli) -> Result<()> {
    let cache = FileSnapshotCache::at_default_location();
    match args.action {
        CacheAction::Clear => clear(&cache, cli.provider.as_deref()).await,
    }
}

async fn clear(cache: &FileSnapshotCache, selection: Option<&str>) -> Result<()> {
    let Some(selection) = selection.filter(|s| !s.trim().eq_ignore_ascii_case("all")) else {
        cache.clear_all().await?;
        info!(dir = %cache.dir().display(), "Snapshot cache cleared");
        println!("Cleared all cached snapshots in {}", cache.dir().display());
        return Ok(());
    };

    let registry = ProviderRegistry::builtin();
    for name in selection.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let desc = registry
            .resolve(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown provider: {name}"))?;
        cache.clear(&desc.id).await?;
        println!("Cleared cached snapshot: {}", desc.display_name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use usagehub_core::{ProviderId, UsageSnapshot};

    async fn seeded() -> (TempDir, FileSnapshotCache) {
        let dir = TempDir::new().unwrap();
        let cache = FileSnapshotCache::new(dir.path());
        for id in ["claude", "codex", "zai"] {
            cache.save(&UsageSnapshot::new(id)).await.unwrap();
        }
        (dir, cache)
    }

    #[tokio::test]
    async fn test_clear_selected() {
        let (_dir, cache) = seeded().await;
        clear(&cache, Some("anthropic, zai")).await.unwrap();

        assert!(cache.load(&ProviderId::new("claude")).await.is_none());
        assert!(cache.load(&ProviderId::new("zai")).await.is_none());
        assert!(cache.load(&ProviderId::new("codex")).await.is_some());
    }

    #[tokio::test]
    async fn test_clear_all() {
        let (_dir, cache) = seeded().await;
        clear(&cache, None).await.unwrap();
        for id in ["claude", "codex", "zai"] {
            assert!(cache.load(&ProviderId::new(id)).await.is_none());
        }
    }

    #[tokio::test]
    async fn test_clear_unknown_provider() {
        let (_dir, cache) = seeded().await;
        assert!(clear(&cache, Some("cursor")).await.is_err());
        assert!(cache.load(&ProviderId::new("claude")).await.is_some());
    }
}
