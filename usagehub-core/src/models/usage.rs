//! Usage-related types.
//!
//! This module contains types related to usage tracking:
//! - [`UsageSnapshot`] - Captured usage state for one provider
//! - [`UsagePeriod`] - Individual quota period
//! - [`PeriodType`] - Session/daily/weekly/monthly tag
//! - [`Overage`] - Overage and billing figures

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::provider::{ProviderId, ProviderIdentity};
use super::status::ProviderStatus;
use crate::error::CoreError;

// ============================================================================
// Usage Snapshot
// ============================================================================

/// A captured record of one provider's usage state.
///
/// Snapshots are produced by a successful fetch or loaded verbatim from the
/// cache. A refresh never edits a snapshot in place; it produces a new one
/// that replaces the cached value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// The provider this snapshot belongs to.
    pub provider_id: ProviderId,
    /// When this snapshot was captured.
    pub captured_at: DateTime<Utc>,
    /// Quota periods in display order.
    #[serde(default)]
    pub periods: Vec<UsagePeriod>,
    /// Overage/billing figures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overage: Option<Overage>,
    /// Account identity for this provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<ProviderIdentity>,
    /// Upstream service status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProviderStatus>,
}

impl UsageSnapshot {
    /// Creates an empty snapshot captured now.
    pub fn new(provider_id: impl Into<ProviderId>) -> Self {
        Self {
            provider_id: provider_id.into(),
            captured_at: Utc::now(),
            periods: Vec::new(),
            overage: None,
            identity: None,
            status: None,
        }
    }

    /// Appends a period.
    #[must_use]
    pub fn with_period(mut self, period: UsagePeriod) -> Self {
        self.periods.push(period);
        self
    }

    /// Sets the identity.
    #[must_use]
    pub fn with_identity(mut self, identity: ProviderIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Sets the overage figures.
    #[must_use]
    pub fn with_overage(mut self, overage: Overage) -> Self {
        self.overage = Some(overage);
        self
    }

    /// Overrides the capture time.
    #[must_use]
    pub fn captured_at(mut self, at: DateTime<Utc>) -> Self {
        self.captured_at = at;
        self
    }

    /// Returns how long ago this snapshot was captured.
    pub fn age(&self) -> Duration {
        Utc::now() - self.captured_at
    }

    /// Returns true if this snapshot is older than `threshold`.
    pub fn is_stale(&self, threshold: Duration) -> bool {
        self.age() > threshold
    }

    /// Returns the first period of the given type.
    pub fn period(&self, period: PeriodType) -> Option<&UsagePeriod> {
        self.periods.iter().find(|p| p.period == period)
    }

    /// Returns the highest raw utilization across all periods.
    pub fn max_utilization(&self) -> Option<f64> {
        self.periods
            .iter()
            .map(|p| p.utilization)
            .filter(|u| u.is_finite())
            .reduce(f64::max)
    }

    /// Returns true if any period data is present.
    pub fn has_data(&self) -> bool {
        !self.periods.is_empty() || self.overage.is_some()
    }

    /// Validates the snapshot data.
    ///
    /// Utilization above 100 is accepted (providers over-report); negative
    /// and non-finite values are not.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidData` naming the first offending period.
    pub fn validate(&self) -> Result<(), CoreError> {
        for period in &self.periods {
            period
                .validate()
                .map_err(|e| CoreError::InvalidData(format!("{} period: {e}", period.name)))?;
        }
        Ok(())
    }
}

// ============================================================================
// Usage Period
// ============================================================================

/// Kind of quota period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    /// Rolling session window (e.g. 5 hours).
    Session,
    /// Daily quota.
    Daily,
    /// Weekly quota.
    Weekly,
    /// Monthly/billing-cycle quota.
    Monthly,
}

impl PeriodType {
    /// Returns a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Session => "Session",
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
            Self::Monthly => "Monthly",
        }
    }
}

impl std::fmt::Display for PeriodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A single quota period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsagePeriod {
    /// Display name (e.g. "Session", "Weekly (Opus)").
    pub name: String,
    /// Raw utilization percentage. May exceed 100.
    pub utilization: f64,
    /// Period tag.
    pub period: PeriodType,
    /// When this period resets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<DateTime<Utc>>,
    /// Model this period applies to, if model-specific.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl UsagePeriod {
    /// Creates a new period.
    pub fn new(name: impl Into<String>, utilization: f64, period: PeriodType) -> Self {
        Self {
            name: name.into(),
            utilization,
            period,
            resets_at: None,
            model: None,
        }
    }

    /// Sets the reset time.
    #[must_use]
    pub fn with_resets_at(mut self, resets_at: Option<DateTime<Utc>>) -> Self {
        self.resets_at = resets_at;
        self
    }

    /// Sets the model name.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Utilization clamped to `[0, 100]` for display.
    pub fn display_utilization(&self) -> f64 {
        if self.utilization.is_finite() {
            self.utilization.clamp(0.0, 100.0)
        } else {
            0.0
        }
    }

    /// Returns the remaining percentage (100 - used, never negative).
    pub fn remaining_percent(&self) -> f64 {
        100.0 - self.display_utilization()
    }

    /// Returns true if usage is at or over the limit.
    pub fn is_over_limit(&self) -> bool {
        self.utilization >= 100.0
    }

    /// Returns time until reset, if known.
    pub fn time_until_reset(&self) -> Option<Duration> {
        self.resets_at.map(|reset| reset - Utc::now())
    }

    fn validate(&self) -> Result<(), CoreError> {
        if !self.utilization.is_finite() {
            return Err(CoreError::InvalidData(
                "utilization is not a finite number".to_string(),
            ));
        }
        if self.utilization < 0.0 {
            return Err(CoreError::InvalidData(format!(
                "utilization {} is negative",
                self.utilization
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Overage
// ============================================================================

/// Overage/extra-usage billing figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overage {
    /// Amount spent beyond the included quota.
    pub spent: f64,
    /// Spending limit, if one is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<f64>,
    /// ISO currency code.
    pub currency: String,
}

impl Overage {
    /// Returns the spend as a percentage of the limit.
    pub fn percent_of_limit(&self) -> Option<f64> {
        self.limit
            .filter(|limit| *limit > 0.0)
            .map(|limit| self.spent / limit * 100.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
