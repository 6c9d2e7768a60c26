// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! `UsageHub` CLI - quota usage for AI coding assistants from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Usage for the enabled providers (Claude + Codex by default)
//! usagehub
//!
//! # One provider, or several
//! usagehub --provider codex
//! usagehub --provider claude,zai
//!
//! # Every registered provider
//! usagehub --provider all
//!
//! # JSON output
//! usagehub --format json --pretty
//!
//! # List providers and which strategies can run here
//! usagehub providers
//!
//! # Drop cached snapshots
//! usagehub cache clear --provider claude
//! ```

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use usagehub_store::{LogLevel, Settings};

use commands::{cache, config, providers, usage};

// ============================================================================
// CLI Definition
// ============================================================================

/// `UsageHub` CLI - AI coding assistant quota monitoring.
#[derive(Parser)]
#[command(name = "usagehub")]
#[command(about = "Quota usage for AI coding assistants")]
#[command(long_about = r#"
UsageHub fetches quota usage from several AI coding assistant accounts at
once and prints it in one place. Providers that cannot be reached fall back
to their last successful snapshot.

Supported providers:
  • Claude (claude)
  • Codex (codex)
  • z.ai (zai)

Examples:
  usagehub                      # Enabled providers (Claude + Codex)
  usagehub --provider all       # All providers
  usagehub --provider codex     # Single provider
  usagehub --format json        # JSON output
  usagehub providers            # Registered providers and strategies
"#)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run. If none, runs 'usage' by default.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Provider to query, "all", or a comma-separated list: "codex,claude".
    #[arg(long, short, global = true)]
    pub provider: Option<String>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (no logs, no progress).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Fetch current usage (default if no command specified).
    #[command(visible_alias = "u")]
    Usage(usage::UsageArgs),

    /// List registered providers.
    #[command(visible_alias = "p")]
    Providers,

    /// Manage the snapshot cache.
    Cache(cache::CacheArgs),

    /// Inspect configuration.
    Config(config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
pub enum ExitCode {
    /// General error.
    Error = 1,
    /// Every requested provider failed with nothing cached.
    AllFailed = 2,
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool, level: LogLevel) {
    if quiet {
        return;
    }

    let filter = if verbose {
        EnvFilter::new("usagehub=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("usagehub={}", level.as_filter())))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load_default().await;

    setup_logging(cli.verbose, cli.quiet, settings.log_level);

    let result = match &cli.command {
        Some(Commands::Usage(args)) => usage::run(args, &cli, &settings).await,
        Some(Commands::Providers) => providers::run(&cli, &settings),
        Some(Commands::Cache(args)) => cache::run(args, &cli).await,
        Some(Commands::Config(args)) => config::run(args, &cli, &settings),
        None => usage::run(&usage::UsageArgs::default(), &cli, &settings).await,
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(ExitCode::Error as i32);
    }

    Ok(())
}
