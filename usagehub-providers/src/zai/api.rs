//! z.ai quota endpoint.
//!
//! ```text
//! GET https://api.z.ai/api/monitor/usage/quota/limit
//! Authorization: Bearer <token>
//! ```
//!
//! ```json
//! {
//!   "code": 200, "msg": "ok", "success": true,
//!   "data": {
//!     "planName": "GLM Coding Pro",
//!     "limits": [
//!       {"type": "TOKENS_LIMIT", "unit": 3, "number": 5, "usage": 1000, "currentValue": 250,
//!        "remaining": 750, "percentage": 25, "nextResetTime": 1735000000000},
//!       {"type": "TIME_LIMIT", "unit": 5, "number": 0, "percentage": 3}
//!     ]
//!   }
//! }
//! ```

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument};
use usagehub_core::{LoginMethod, PeriodType, ProviderIdentity, UsagePeriod, UsageSnapshot};
use usagehub_fetch::HttpClient;
use usagehub_fetch::host::ResponseExt;

use super::error::ZaiError;

/// Quota endpoint.
pub const QUOTA_URL: &str = "https://api.z.ai/api/monitor/usage/quota/limit";

const TOKENS_LIMIT: &str = "TOKENS_LIMIT";
const TIME_LIMIT: &str = "TIME_LIMIT";

// ============================================================================
// Response Structures
// ============================================================================

/// Response envelope.
#[derive(Debug, Deserialize)]
pub struct QuotaResponse {
    /// Envelope code (200 on success).
    #[serde(default)]
    pub code: i64,
    /// Envelope message.
    #[serde(default)]
    pub msg: String,
    /// Success flag.
    #[serde(default)]
    pub success: bool,
    /// Payload.
    #[serde(default)]
    pub data: Option<QuotaData>,
}

/// Quota payload.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaData {
    /// Individual limits.
    #[serde(default)]
    pub limits: Vec<QuotaLimit>,
    /// Plan name.
    #[serde(default)]
    pub plan_name: Option<String>,
    /// Package name (older plans).
    #[serde(default)]
    pub package_name: Option<String>,
}

/// One quota limit.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaLimit {
    /// `TOKENS_LIMIT` or `TIME_LIMIT`.
    #[serde(rename = "type")]
    pub limit_type: String,
    /// Window unit: 1 = days, 3 = hours, 5 = minutes.
    #[serde(default)]
    pub unit: i64,
    /// Window length in `unit`s; 0 means the billing month.
    #[serde(default)]
    pub number: i64,
    /// Total allowance.
    #[serde(default)]
    pub usage: i64,
    /// Consumed so far.
    #[serde(default)]
    pub current_value: i64,
    /// Left in the window.
    #[serde(default)]
    pub remaining: i64,
    /// Server-computed percentage.
    #[serde(default)]
    pub percentage: f64,
    /// Reset time (Unix milliseconds).
    #[serde(default)]
    pub next_reset_time: Option<i64>,
}

impl QuotaLimit {
    /// Window length in minutes, if the limit has one.
    fn window_minutes(&self) -> Option<i64> {
        if self.number <= 0 {
            return None;
        }
        match self.unit {
            5 => Some(self.number),
            3 => Some(self.number * 60),
            1 => Some(self.number * 24 * 60),
            _ => None,
        }
    }

    fn period_type(&self) -> PeriodType {
        match self.window_minutes() {
            None => PeriodType::Monthly,
            Some(m) if m >= 28 * 24 * 60 => PeriodType::Monthly,
            Some(m) if m >= 7 * 24 * 60 => PeriodType::Weekly,
            Some(m) if m >= 24 * 60 => PeriodType::Daily,
            Some(_) => PeriodType::Session,
        }
    }

    /// Used percentage; counts win over the server's rounded percentage.
    #[allow(clippy::cast_precision_loss)]
    fn used_percent(&self) -> f64 {
        if self.usage > 0 {
            let used = self.current_value.max(self.usage - self.remaining).max(0);
            return used as f64 / self.usage as f64 * 100.0;
        }
        self.percentage
    }

    fn to_period(&self) -> UsagePeriod {
        let name = match self.limit_type.as_str() {
            TOKENS_LIMIT => "Tokens",
            TIME_LIMIT => "Tool calls",
            other => other,
        };
        let resets_at = self.next_reset_time.and_then(DateTime::<Utc>::from_timestamp_millis);
        UsagePeriod::new(name, self.used_percent(), self.period_type()).with_resets_at(resets_at)
    }
}

/// Unwraps the envelope and maps the payload into a snapshot.
///
/// # Errors
///
/// Returns `ZaiError::Api` if the envelope reports failure.
pub fn to_snapshot(response: QuotaResponse) -> Result<UsageSnapshot, ZaiError> {
    if !response.success || response.code != 200 {
        return Err(ZaiError::Api {
            code: response.code,
            message: response.msg,
        });
    }
    let data = response
        .data
        .ok_or_else(|| ZaiError::InvalidResponse("no data".to_string()))?;

    let mut limits = data.limits;
    limits.sort_by_key(|l| l.limit_type != TOKENS_LIMIT);

    let mut snapshot = UsageSnapshot::new(super::PROVIDER_ID);
    snapshot.periods = limits.iter().map(QuotaLimit::to_period).collect();
    snapshot.identity = Some(ProviderIdentity {
        plan_name: data.plan_name.or(data.package_name),
        login_method: Some(LoginMethod::ApiKey),
        ..Default::default()
    });
    Ok(snapshot)
}

/// Fetches and maps the quota.
///
/// # Errors
///
/// `TokenRejected` on 401, `RateLimited` on 429.
#[instrument(skip(http, token))]
pub async fn fetch_quota(http: &HttpClient, url: &str, token: &str) -> Result<UsageSnapshot, ZaiError> {
    let response = http.get_with_auth(url, &format!("Bearer {token}")).await?;
    let status = response.status();
    debug!(status = %status, "Quota response");

    if status == StatusCode::UNAUTHORIZED {
        return Err(ZaiError::TokenRejected);
    }
    if response.is_rate_limited() {
        return Err(ZaiError::RateLimited(response.retry_after_secs()));
    }
    if !status.is_success() {
        return Err(ZaiError::UnexpectedStatus(status.as_u16()));
    }

    let body = response.text().await?;
    let parsed: QuotaResponse =
        serde_json::from_str(&body).map_err(|e| ZaiError::InvalidResponse(e.to_string()))?;
    to_snapshot(parsed)
}

// ============================================================================
// Tests
// ============================================================================
