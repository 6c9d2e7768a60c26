//! Usage command - refresh providers and display their usage.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tracing::{info, warn};
use usagehub_core::ProviderId;
use usagehub_fetch::{
    CancellationToken, FetchContext, FetchOrchestrator, FetchOutcome, HttpClient,
    MemorySnapshotCache, ProgressCallback, ProgressEvent, SnapshotCache,
};
use usagehub_providers::{ALLOWED_DOMAINS, ProviderRegistry};
use usagehub_store::settings::MAX_CONCURRENT_LIMIT;
use usagehub_store::{FileSnapshotCache, Settings};

use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the usage command.
#[derive(Args, Default)]
pub struct UsageArgs {
    /// Maximum providers fetched at once (default from settings).
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Per-request timeout in seconds (default from settings).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Neither read nor write the snapshot cache.
    #[arg(long)]
    pub no_cache: bool,
}

/// Runs the usage command.
pub async fn run(args: &UsageArgs, cli: &Cli, settings: &Settings) -> Result<()> {
    let registry = ProviderRegistry::builtin();
    let ids = select_providers(cli.provider.as_deref(), &registry, settings)?;
    info!(providers = ?ids, "Fetching usage");

    let timeout = args.timeout.map_or_else(|| settings.fetch_timeout(), Duration::from_secs);
    let http = HttpClient::with_timeout(timeout).allow_only(ALLOWED_DOMAINS);
    let ctx = FetchContext::builder()
        .http(Arc::new(http))
        .timeout(timeout)
        .build();

    let cache: Arc<dyn SnapshotCache> = if args.no_cache {
        Arc::new(MemorySnapshotCache::new())
    } else {
        Arc::new(FileSnapshotCache::at_default_location())
    };

    let mut orchestrator_settings = settings.orchestrator_settings();
    if let Some(max) = args.max_concurrent {
        orchestrator_settings.max_concurrent = max.clamp(1, MAX_CONCURRENT_LIMIT);
    }
    let stale_threshold = orchestrator_settings.stale_threshold_minutes;
    let orchestrator = FetchOrchestrator::new(registry.pipelines(), cache, ctx, orchestrator_settings);

    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling refresh");
                cancel.cancel();
            }
        }
    });

    let live = !cli.quiet && std::io::stderr().is_terminal();
    let progress = (!cli.quiet).then(|| progress_printer(live));
    let mut outcomes = orchestrator.refresh(&ids, cancel, progress).await;
    interrupt.abort();
    if live && !ids.is_empty() {
        eprintln!();
    }

    let ordered: Vec<FetchOutcome> = ids.iter().filter_map(|id| outcomes.remove(id)).collect();
    output_results(&ordered, &registry, stale_threshold, cli)?;

    if ordered.iter().all(FetchOutcome::is_failed) {
        std::process::exit(ExitCode::AllFailed as i32);
    }

    Ok(())
}

/// Resolves the `--provider` argument into registered ids.
///
/// Without an argument the enabled providers from settings are used, falling
/// back to the registry defaults when none of them is registered.
pub fn select_providers(
    arg: Option<&str>,
    registry: &ProviderRegistry,
    settings: &Settings,
) -> Result<Vec<ProviderId>> {
    let mut ids: Vec<ProviderId> = Vec::new();

    match arg.map(str::trim) {
        None | Some("") => {
            for id in &settings.enabled_providers {
                if registry.get(id).is_some() {
                    ids.push(id.clone());
                } else {
                    warn!(provider = %id, "Enabled provider is not registered, ignoring");
                }
            }
            if ids.is_empty() {
                ids = registry.default_enabled();
            }
        }
        Some(all) if all.eq_ignore_ascii_case("all") => ids = registry.ids(),
        Some(names) => {
            for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                let Some(desc) = registry.resolve(name) else {
                    anyhow::bail!("Unknown provider: {name}");
                };
                if !ids.contains(&desc.id) {
                    ids.push(desc.id.clone());
                }
            }
            if ids.is_empty() {
                anyhow::bail!("No valid providers specified");
            }
        }
    }

    Ok(ids)
}

/// One `[k/n]` line per finished provider, redrawn in place on a terminal.
fn progress_printer(live: bool) -> ProgressCallback {
    Arc::new(move |event: &ProgressEvent| {
        let line = progress_line(event);
        if live {
            eprint!("\r\x1b[2K{line}");
        } else {
            eprintln!("{line}");
        }
    })
}

fn progress_line(event: &ProgressEvent) -> String {
    let status = if !event.success {
        format!("failed ({})", event.source_or_error)
    } else if event.cached {
        "cached".to_string()
    } else {
        event.source_or_error.clone()
    };
    format!(
        "[{}/{}] {}: {status}",
        event.completed, event.total, event.provider_id
    )
}

fn output_results(
    outcomes: &[FetchOutcome],
    registry: &ProviderRegistry,
    stale_threshold_minutes: u64,
    cli: &Cli,
) -> Result<()> {
    let display_name = |id: &ProviderId| {
        registry
            .get(id)
            .map_or_else(|| id.to_string(), |d| d.display_name.clone())
    };

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color).with_stale_threshold(stale_threshold_minutes);
            let blocks: Vec<String> = outcomes
                .iter()
                .map(|o| formatter.format_outcome(o, &display_name(&o.provider_id)))
                .collect();
            println!("{}", blocks.join("\n\n"));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            let names: Vec<String> = outcomes.iter().map(|o| display_name(&o.provider_id)).collect();
            println!(
                "{}",
                formatter.format_outcomes(outcomes, &names, stale_threshold_minutes)?
            );
        }
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<ProviderId> {
        list.iter().map(|s| ProviderId::new(s)).collect()
    }

    #[test]
    fn test_select_default_from_settings() {
        let registry = ProviderRegistry::builtin();
        let selected = select_providers(None, &registry, &Settings::default()).unwrap();
        assert_eq!(selected, ids(&["claude", "codex"]));
    }

    #[test]
    fn test_select_skips_unregistered_settings() {
        let registry = ProviderRegistry::builtin();
        let settings = Settings {
            enabled_providers: ids(&["cursor", "zai"]),
            ..Settings::default()
        };
        assert_eq!(select_providers(None, &registry, &settings).unwrap(), ids(&["zai"]));

        let settings = Settings {
            enabled_providers: ids(&["cursor"]),
            ..Settings::default()
        };
        assert_eq!(
            select_providers(None, &registry, &settings).unwrap(),
            registry.default_enabled()
        );
    }

    #[test]
    fn test_select_all() {
        let registry = ProviderRegistry::builtin();
        let selected = select_providers(Some("ALL"), &registry, &Settings::default()).unwrap();
        assert_eq!(selected, registry.ids());
    }

    #[test]
    fn test_select_list_with_aliases() {
        let registry = ProviderRegistry::builtin();
        let selected =
            select_providers(Some("zai, anthropic,claude"), &registry, &Settings::default()).unwrap();
        assert_eq!(selected, ids(&["zai", "claude"]));
    }

    #[test]
    fn test_select_unknown() {
        let registry = ProviderRegistry::builtin();
        let err = select_providers(Some("codex,cursor"), &registry, &Settings::default()).unwrap_err();
        assert!(err.to_string().contains("cursor"));
        assert!(select_providers(Some(",,"), &registry, &Settings::default()).is_err());
    }

    #[test]
    fn test_progress_line() {
        let mut event = ProgressEvent {
            provider_id: ProviderId::new("claude"),
            success: true,
            cached: false,
            source_or_error: "oauth".to_string(),
            elapsed: Duration::from_millis(120),
            completed: 1,
            total: 3,
        };
        assert_eq!(progress_line(&event), "[1/3] claude: oauth");

        event.cached = true;
        event.source_or_error = "cache".to_string();
        assert_eq!(progress_line(&event), "[1/3] claude: cached");

        event.success = false;
        event.cached = false;
        event.source_or_error = "no strategy available".to_string();
        assert_eq!(progress_line(&event), "[1/3] claude: failed (no strategy available)");
    }
}
