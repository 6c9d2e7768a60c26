//! Config command - inspect configuration.

use anyhow::Result;
use clap::{Args, Subcommand};
use usagehub_store::{Settings, default_config_dir, default_settings_path, default_snapshot_dir};

use crate::output::JsonFormatter;
use crate::{Cli, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration.
    Show,

    /// Show configuration and cache paths.
    Path,
}

/// Runs the config command.
pub fn run(args: &ConfigArgs, cli: &Cli, settings: &Settings) -> Result<()> {
    match args.action {
        ConfigAction::Show => show_config(cli, settings),
        ConfigAction::Path => show_paths(cli),
    }
}

fn show_config(cli: &Cli, settings: &Settings) -> Result<()> {
    match cli.format {
        OutputFormat::Text => {
            println!("UsageHub Configuration");
            println!("{}", "─".repeat(40));
            println!();
            println!("Enabled providers:");
            for provider in &settings.enabled_providers {
                println!("  • {provider}");
            }
            println!();
            println!("Max concurrent providers: {}", settings.max_concurrent_providers);
            println!("Fetch timeout:            {}s", settings.fetch_timeout_secs);
            println!("Stale after:              {}m", settings.stale_threshold_minutes);
            println!("Log level:                {}", settings.log_level);
        }
        OutputFormat::Json => {
            println!("{}", JsonFormatter::new(cli.pretty).format(settings)?);
        }
    }

    Ok(())
}

fn show_paths(cli: &Cli) -> Result<()> {
    let config_dir = default_config_dir();
    let settings_path = default_settings_path();
    let snapshot_dir = default_snapshot_dir();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config dir:    {}", config_dir.display());
            println!("Settings file: {}", settings_path.display());
            println!("Snapshot dir:  {}", snapshot_dir.display());
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_dir": config_dir.display().to_string(),
                "settings_file": settings_path.display().to_string(),
                "snapshot_dir": snapshot_dir.display().to_string(),
            });
            println!("{}", JsonFormatter::new(cli.pretty).format(&paths)?);
        }
    }

    Ok(())
}
