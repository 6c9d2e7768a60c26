//! ChatGPT usage endpoint.
//!
//! ```text
//! GET https://chatgpt.com/backend-api/wham/usage
//! Authorization: Bearer <access_token>
//! ChatGPT-Account-Id: <account_id>
//! ```
//!
//! ```json
//! {
//!   "plan_type": "plus",
//!   "rate_limit": {
//!     "primary_window": {"used_percent": 12, "reset_at": 1735000000, "limit_window_seconds": 18000},
//!     "secondary_window": {"used_percent": 40, "reset_at": 1735500000, "limit_window_seconds": 604800}
//!   }
//! }
//! ```

use chrono::{DateTime, Utc};
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, instrument};
use usagehub_core::{LoginMethod, PeriodType, ProviderIdentity, UsagePeriod, UsageSnapshot};
use usagehub_fetch::HttpClient;
use usagehub_fetch::host::ResponseExt;

use super::auth::{Tokens, decode_jwt_payload};
use super::error::CodexError;

/// Usage endpoint.
pub const USAGE_URL: &str = "https://chatgpt.com/backend-api/wham/usage";

/// Windows at least this long are reported as weekly.
const WEEKLY_WINDOW_SECS: i64 = 7 * 24 * 3600;

// ============================================================================
// Response Structures
// ============================================================================

/// Response from the usage endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageResponse {
    /// Plan (e.g. "plus", "pro").
    #[serde(default)]
    pub plan_type: Option<String>,
    /// Rate limit windows.
    #[serde(default)]
    pub rate_limit: Option<RateLimit>,
}

/// Rate limit windows.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RateLimit {
    /// Short window (usually 5 hours).
    #[serde(default)]
    pub primary_window: Option<Window>,
    /// Long window (usually 7 days).
    #[serde(default)]
    pub secondary_window: Option<Window>,
}

/// One rate limit window.
#[derive(Debug, Clone, Deserialize)]
pub struct Window {
    /// Used percentage.
    #[serde(default)]
    pub used_percent: Option<f64>,
    /// Reset time (Unix seconds).
    #[serde(default)]
    pub reset_at: Option<i64>,
    /// Window length in seconds.
    #[serde(default)]
    pub limit_window_seconds: Option<i64>,
}

impl Window {
    fn to_period(&self, fallback: PeriodType) -> Option<UsagePeriod> {
        let used = self.used_percent?;
        let period = match self.limit_window_seconds {
            Some(secs) if secs >= WEEKLY_WINDOW_SECS => PeriodType::Weekly,
            Some(_) => PeriodType::Session,
            None => fallback,
        };
        let resets_at = self.reset_at.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0));
        Some(UsagePeriod::new(period.label(), used, period).with_resets_at(resets_at))
    }
}

fn plan_label(raw: &str) -> String {
    match raw {
        "free" => "Free".to_string(),
        "plus" => "Plus".to_string(),
        "pro" => "Pro".to_string(),
        "team" => "Team".to_string(),
        "business" => "Business".to_string(),
        "enterprise" => "Enterprise".to_string(),
        other => other.to_string(),
    }
}

/// Maps a usage response into a snapshot, taking identity from the id token.
pub fn to_snapshot(response: &UsageResponse, tokens: &Tokens) -> UsageSnapshot {
    let mut snapshot = UsageSnapshot::new(super::PROVIDER_ID);

    if let Some(limits) = &response.rate_limit {
        let periods = [
            limits.primary_window.as_ref().and_then(|w| w.to_period(PeriodType::Session)),
            limits.secondary_window.as_ref().and_then(|w| w.to_period(PeriodType::Weekly)),
        ];
        snapshot.periods = periods.into_iter().flatten().collect();
    }

    let claims = tokens
        .id_token
        .as_deref()
        .and_then(|token| match decode_jwt_payload(token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                debug!(error = %e, "Ignoring undecodable id token");
                None
            }
        })
        .unwrap_or_default();

    let plan = response.plan_type.clone().or_else(|| {
        claims
            .openai_auth
            .as_ref()
            .and_then(|auth| auth.chatgpt_plan_type.clone())
    });

    snapshot.identity = Some(ProviderIdentity {
        account_email: claims.email,
        plan_name: plan.as_deref().map(plan_label),
        login_method: Some(LoginMethod::OAuth),
        ..Default::default()
    });
    snapshot
}

/// Fetches the usage response.
///
/// # Errors
///
/// `TokenRejected` on 401/403, `RateLimited` on 429.
#[instrument(skip(http, tokens))]
pub async fn fetch_usage(http: &HttpClient, url: &str, tokens: &Tokens) -> Result<UsageResponse, CodexError> {
    let mut headers = HeaderMap::new();
    let bearer = HeaderValue::from_str(&format!("Bearer {}", tokens.access_token))
        .map_err(|_| CodexError::InvalidAuth("access token is not a valid header".to_string()))?;
    headers.insert(header::AUTHORIZATION, bearer);
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    if let Some(account) = tokens.account_id.as_deref().and_then(|a| HeaderValue::from_str(a).ok()) {
        headers.insert("ChatGPT-Account-Id", account);
    }

    let response = http.get_with_headers(url, headers).await?;
    let status = response.status();
    debug!(status = %status, "Usage response");

    if response.is_auth_rejected() {
        return Err(CodexError::TokenRejected(status.as_u16()));
    }
    if response.is_rate_limited() {
        return Err(CodexError::RateLimited(response.retry_after_secs()));
    }
    if !status.is_success() {
        return Err(CodexError::UnexpectedStatus(status.as_u16()));
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| CodexError::InvalidResponse(e.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
