//! JSON output formatting.

use anyhow::Result;
use serde::Serialize;
use usagehub_fetch::{FetchOutcome, StrategyInfo, is_stale};
use usagehub_providers::ProviderDescriptor;

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for one provider's refresh.
///
/// The outcome's own fields (`provider_id`, `status`, `success`, `cached`, `source`,
/// `attempts`, ...) are inlined next to the display fields.
#[derive(Debug, Serialize)]
pub struct ProviderOutput<'a> {
    pub display_name: &'a str,
    #[serde(flatten)]
    pub outcome: &'a FetchOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale: Option<bool>,
}

impl<'a> ProviderOutput<'a> {
    fn new(outcome: &'a FetchOutcome, display_name: &'a str, stale_threshold_minutes: u64) -> Self {
        let snapshot = outcome.snapshot();
        Self {
            display_name,
            outcome,
            age_seconds: snapshot.map(|s| s.age().num_seconds().max(0)),
            stale: snapshot.map(|s| is_stale(s, stale_threshold_minutes)),
        }
    }
}

/// Provider info output.
#[derive(Debug, Serialize)]
pub struct ProviderInfoOutput<'a> {
    pub id: &'a str,
    pub display_name: &'a str,
    pub aliases: &'a [String],
    pub default_enabled: bool,
    pub enabled: bool,
    pub strategies: Vec<StrategyInfo>,
}

impl<'a> ProviderInfoOutput<'a> {
    pub fn new(desc: &'a ProviderDescriptor, enabled: bool, strategies: Vec<StrategyInfo>) -> Self {
        Self {
            id: desc.id.as_str(),
            display_name: &desc.display_name,
            aliases: &desc.aliases,
            default_enabled: desc.default_enabled,
            enabled,
            strategies,
        }
    }
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize + ?Sized>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats refresh outcomes as an array, in the given order.
    ///
    /// `names` holds the display name for each outcome at the same index.
    pub fn format_outcomes(
        &self,
        outcomes: &[FetchOutcome],
        names: &[String],
        stale_threshold_minutes: u64,
    ) -> Result<String> {
        let output: Vec<ProviderOutput<'_>> = outcomes
            .iter()
            .zip(names)
            .map(|(outcome, name)| ProviderOutput::new(outcome, name, stale_threshold_minutes))
            .collect();
        self.format(&output)
    }
}
