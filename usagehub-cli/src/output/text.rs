//! Text output formatting with progress bars and colors.

use chrono::{DateTime, Duration, Local, Utc};
use usagehub_core::{Overage, UsagePeriod, UsageSnapshot};
use usagehub_fetch::{FetchOutcome, OutcomeResult, StrategyInfo, is_stale};
use usagehub_providers::ProviderDescriptor;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const BLUE: &str = "\x1b[34m";
const CYAN: &str = "\x1b[36m";

// Progress bar characters
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    bar_width: usize,
    stale_threshold_minutes: u64,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            bar_width: 10,
            stale_threshold_minutes: 60,
        }
    }

    /// Sets the age after which cached data is marked stale.
    #[must_use]
    pub fn with_stale_threshold(mut self, minutes: u64) -> Self {
        self.stale_threshold_minutes = minutes;
        self
    }

    /// Formats one provider's outcome.
    ///
    /// ```text
    /// Claude (oauth)
    /// Session  ████████░░ 75% left
    ///          Resets in 2h 5m
    /// ```
    pub fn format_outcome(&self, outcome: &FetchOutcome, name: &str) -> String {
        match &outcome.result {
            OutcomeResult::Fresh { source, snapshot } => {
                let header = format!("{} ({source})", self.bold(name));
                self.format_snapshot(header, snapshot)
            }
            OutcomeResult::Cached { snapshot } => {
                let mut tag = format!("cached, {}", format_age(snapshot.age()));
                if is_stale(snapshot, self.stale_threshold_minutes) {
                    tag.push_str(", stale");
                }
                let header = format!("{} ({})", self.bold(name), self.yellow(&tag));
                self.format_snapshot(header, snapshot)
            }
            OutcomeResult::Failed { error } => self.format_error(name, error),
        }
    }

    fn format_snapshot(&self, header: String, snapshot: &UsageSnapshot) -> String {
        let mut lines = vec![header];

        if snapshot.periods.is_empty() {
            lines.push(self.dim("No usage periods reported"));
        }
        for period in &snapshot.periods {
            lines.push(self.format_period(period));
        }

        if let Some(overage) = &snapshot.overage {
            lines.push(format_overage(overage));
        }

        if let Some(identity) = &snapshot.identity {
            if let Some(email) = &identity.account_email {
                lines.push(format!("Account: {}", self.cyan(email)));
            }
            if let Some(org) = &identity.account_organization {
                lines.push(format!("Org:     {org}"));
            }
            if let Some(plan) = &identity.plan_name {
                lines.push(format!("Plan:    {}", self.blue(plan)));
            }
        }

        lines.join("\n")
    }

    /// Formats a usage period with progress bar.
    fn format_period(&self, period: &UsagePeriod) -> String {
        let remaining = period.remaining_percent();
        let bar = self.progress_bar(remaining);
        let pct = if period.is_over_limit() {
            self.red(&format!("{:.0}% used", period.utilization))
        } else {
            self.color_for_percent(remaining, &format!("{remaining:.0}% left"))
        };

        let mut result = format!("{:<8} {bar} {pct}", format!("{}:", period.name));
        if let Some(resets_at) = period.resets_at {
            result.push_str(&format!("\n         Resets {}", self.dim(&format_reset_time(resets_at))));
        }
        result
    }

    /// Formats a progress bar.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn progress_bar(&self, percent_remaining: f64) -> String {
        let fraction = (percent_remaining / 100.0).clamp(0.0, 1.0);
        let filled = (fraction * self.bar_width as f64).round() as usize;
        let empty = self.bar_width.saturating_sub(filled);

        let bar = format!(
            "{}{}",
            BAR_FULL.to_string().repeat(filled),
            BAR_EMPTY.to_string().repeat(empty)
        );

        self.color_for_percent(percent_remaining, &bar)
    }

    /// Formats an error for a provider.
    pub fn format_error(&self, name: &str, error: &str) -> String {
        format!("{}: {}", self.bold(name), self.red(error))
    }

    /// Header for the providers table.
    pub fn format_providers_header(&self) -> String {
        self.bold(&format!(
            "{:<10} {:<10} {:<9} {:<22} {}",
            "ID", "NAME", "DEFAULT", "ALIASES", "STRATEGIES"
        ))
    }

    /// One row of the providers table.
    pub fn format_provider_line(&self, desc: &ProviderDescriptor, strategies: &[StrategyInfo]) -> String {
        let default = if desc.default_enabled { "yes" } else { "no" };
        let aliases = if desc.aliases.is_empty() {
            "-".to_string()
        } else {
            desc.aliases.join(", ")
        };
        let strategies = strategies
            .iter()
            .map(|s| {
                if s.available {
                    self.green(&format!("{} ✓", s.name))
                } else {
                    self.dim(&format!("{} ✗", s.name))
                }
            })
            .collect::<Vec<_>>()
            .join("  ");

        format!(
            "{:<10} {:<10} {default:<9} {aliases:<22} {strategies}",
            desc.id.as_str(),
            desc.display_name
        )
    }

    // ========================================================================
    // Color helpers
    // ========================================================================

    fn color_for_percent(&self, percent_remaining: f64, text: &str) -> String {
        if !self.use_colors {
            return text.to_string();
        }
        let color = if percent_remaining < 20.0 {
            RED
        } else if percent_remaining < 50.0 {
            YELLOW
        } else {
            GREEN
        };
        format!("{color}{text}{RESET}")
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_colors {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn blue(&self, text: &str) -> String {
        self.paint(BLUE, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}

/// "just now", "12m ago", "3h 5m ago", "2d ago".
pub fn format_age(age: Duration) -> String {
    let minutes = age.num_minutes();
    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else if minutes < 24 * 60 {
        let rem = minutes % 60;
        if rem == 0 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}h {rem}m ago", minutes / 60)
        }
    } else {
        format!("{}d ago", minutes / (24 * 60))
    }
}

/// Countdown under a day, local wall-clock time beyond that.
fn format_reset_time(resets_at: DateTime<Utc>) -> String {
    let now = Utc::now();
    if resets_at <= now {
        return "now".to_string();
    }

    let diff = resets_at - now;
    if diff < Duration::hours(1) {
        let mins = diff.num_minutes();
        return format!("in {mins} minute{}", if mins == 1 { "" } else { "s" });
    }
    if diff < Duration::hours(24) {
        let hours = diff.num_hours();
        let mins = diff.num_minutes() % 60;
        return if mins > 0 {
            format!("in {hours}h {mins}m")
        } else {
            format!("in {hours} hour{}", if hours == 1 { "" } else { "s" })
        };
    }

    let local = resets_at.with_timezone(&Local);
    if local.date_naive() == Local::now().date_naive() + chrono::Days::new(1) {
        format!("tomorrow at {}", local.format("%l:%M %p").to_string().trim())
    } else {
        local.format("%a %b %e at %l:%M %p").to_string()
    }
}

fn format_overage(overage: &Overage) -> String {
    match overage.limit {
        Some(limit) => format!(
            "Extra:   {:.2} / {:.2} {}",
            overage.spent, limit, overage.currency
        ),
        None => format!("Extra:   {:.2} {}", overage.spent, overage.currency),
    }
}
