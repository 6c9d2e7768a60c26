//! Upstream provider status.

use serde::{Deserialize, Serialize};

// ============================================================================
// Provider Status
// ============================================================================

/// Provider service status as reported alongside usage data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStatus {
    /// Status indicator level.
    pub indicator: StatusIndicator,
    /// Human-readable status description.
    pub description: String,
    /// URL to the full status page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ProviderStatus {
    /// Creates a new operational status.
    pub fn operational() -> Self {
        Self::new(StatusIndicator::None, "All systems operational")
    }

    /// Creates a new status with the given indicator and description.
    pub fn new(indicator: StatusIndicator, description: impl Into<String>) -> Self {
        Self {
            indicator,
            description: description.into(),
            url: None,
        }
    }

    /// Returns true if there's any degradation or outage.
    pub fn has_issues(&self) -> bool {
        !matches!(self.indicator, StatusIndicator::None | StatusIndicator::Unknown)
    }
}

// ============================================================================
// Status Indicator
// ============================================================================

/// Status indicator levels, following statuspage.io conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatusIndicator {
    /// Operational - no issues.
    #[default]
    None,
    /// Minor issues - degraded performance.
    Minor,
    /// Major issues - partial outage.
    Major,
    /// Critical issues - major outage.
    Critical,
    /// Under scheduled maintenance.
    Maintenance,
    /// Status unknown.
    Unknown,
}

impl StatusIndicator {
    /// Returns a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "Operational",
            Self::Minor => "Degraded",
            Self::Major => "Partial Outage",
            Self::Critical => "Major Outage",
            Self::Maintenance => "Under Maintenance",
            Self::Unknown => "Unknown",
        }
    }

    /// Parses a statuspage.io indicator string.
    pub fn from_statuspage(value: &str) -> Self {
        match value {
            "none" => Self::None,
            "minor" => Self::Minor,
            "major" => Self::Major,
            "critical" => Self::Critical,
            "maintenance" => Self::Maintenance,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for StatusIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Tests
// ============================================================================
