//! User settings.
//!
//! A small JSON document read once at startup. Missing fields take their
//! defaults, so an older or hand-trimmed file still loads.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};
use usagehub_core::ProviderId;
use usagehub_fetch::OrchestratorSettings;

use crate::error::StoreError;
use crate::persistence::{default_settings_path, load_json_or_default, save_json};

/// Upper bound on concurrent providers.
pub const MAX_CONCURRENT_LIMIT: usize = 32;

// ============================================================================
// Settings
// ============================================================================

/// User preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// How many providers are fetched at once.
    pub max_concurrent_providers: usize,
    /// Age after which a cached snapshot is flagged stale.
    pub stale_threshold_minutes: u64,
    /// Per-request timeout for network and helper calls.
    pub fetch_timeout_secs: u64,
    /// Providers refreshed when none are named explicitly.
    pub enabled_providers: Vec<ProviderId>,
    /// Default log level.
    pub log_level: LogLevel,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_concurrent_providers: 5,
            stale_threshold_minutes: 60,
            fetch_timeout_secs: 30,
            enabled_providers: vec![ProviderId::new("claude"), ProviderId::new("codex")],
            log_level: LogLevel::default(),
        }
    }
}

impl Settings {
    /// Loads settings from the default path.
    pub async fn load_default() -> Self {
        Self::load(&default_settings_path()).await
    }

    /// Loads settings from `path`, falling back to defaults.
    pub async fn load(path: &Path) -> Self {
        let settings: Self = load_json_or_default(path).await;
        debug!(path = %path.display(), ?settings, "Settings loaded");
        settings.normalized()
    }

    /// Saves settings to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<(), StoreError> {
        save_json(path, self).await?;
        info!(path = %path.display(), "Settings saved");
        Ok(())
    }

    /// Clamps out-of-range values.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.max_concurrent_providers = self.max_concurrent_providers.clamp(1, MAX_CONCURRENT_LIMIT);
        self.fetch_timeout_secs = self.fetch_timeout_secs.max(1);
        let mut seen = std::collections::HashSet::new();
        self.enabled_providers.retain(|id| seen.insert(id.clone()));
        self
    }

    /// The orchestrator configuration these settings describe.
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            max_concurrent: self.max_concurrent_providers.max(1),
            stale_threshold_minutes: self.stale_threshold_minutes,
        }
    }

    /// Per-request fetch timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

// ============================================================================
// Log Level
// ============================================================================

/// Log level setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only.
    Error,
    /// Warnings and errors.
    #[default]
    Warn,
    /// Informational messages.
    Info,
    /// Debug output.
    Debug,
    /// Everything.
    Trace,
}

impl LogLevel {
    /// The `tracing` filter directive for this level.
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_filter())
    }
}

impl FromStr for LogLevel {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(StoreError::Config(format!("unknown log level: {other}"))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
