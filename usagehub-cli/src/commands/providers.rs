//! Providers command - list registered providers.

use anyhow::Result;
use tracing::info;
use usagehub_fetch::FetchContext;
use usagehub_providers::ProviderRegistry;
use usagehub_store::Settings;

use crate::output::{JsonFormatter, ProviderInfoOutput, TextFormatter};
use crate::{Cli, OutputFormat};

/// Runs the providers command.
///
/// Availability comes from each strategy's cheap local check; nothing is
/// fetched.
pub fn run(cli: &Cli, settings: &Settings) -> Result<()> {
    info!("Listing providers");

    let registry = ProviderRegistry::builtin();
    let ctx = FetchContext::new();

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);

            println!("{}", formatter.format_providers_header());
            println!("{}", "─".repeat(70));

            for desc in registry.all() {
                println!("{}", formatter.format_provider_line(desc, &desc.strategy_info(&ctx)));
            }

            let enabled: Vec<&str> = settings.enabled_providers.iter().map(|id| id.as_str()).collect();
            println!();
            println!("Total: {} providers (enabled: {})", registry.len(), enabled.join(", "));
        }
        OutputFormat::Json => {
            let output: Vec<ProviderInfoOutput<'_>> = registry
                .all()
                .iter()
                .map(|desc| {
                    let enabled = settings.enabled_providers.contains(&desc.id);
                    ProviderInfoOutput::new(desc, enabled, desc.strategy_info(&ctx))
                })
                .collect();
            println!("{}", JsonFormatter::new(cli.pretty).format(&output)?);
        }
    }

    Ok(())
}
