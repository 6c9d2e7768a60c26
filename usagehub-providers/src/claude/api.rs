//! Anthropic OAuth usage and token endpoints.
//!
//! # Usage
//!
//! ```text
//! GET https://api.anthropic.com/api/oauth/usage
//! Authorization: Bearer <access_token>
//! anthropic-beta: oauth-2025-04-20
//! ```
//!
//! ```json
//! {
//!   "five_hour": {"utilization": 25.0, "resets_at": "2025-01-01T12:00:00Z"},
//!   "seven_day": {"utilization": 45.0, "resets_at": "2025-01-05T00:00:00Z"},
//!   "seven_day_opus": {"utilization": 10.0, "resets_at": null},
//!   "extra_usage": {"is_enabled": true, "used_credits": 1250, "monthly_limit": 5000}
//! }
//! ```
//!
//! # Token refresh
//!
//! ```text
//! POST https://console.anthropic.com/v1/oauth/token
//! {"grant_type": "refresh_token", "refresh_token": "...", "client_id": "..."}
//! ```

use chrono::{DateTime, Duration, Utc};
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use usagehub_core::{LoginMethod, Overage, PeriodType, ProviderIdentity, UsagePeriod, UsageSnapshot};
use usagehub_fetch::HttpClient;
use usagehub_fetch::host::ResponseExt;

use super::credentials::{ClaudeCredentials, OAuthData, REQUIRED_SCOPE};
use super::error::ClaudeError;

// ============================================================================
// Constants
// ============================================================================

/// Usage endpoint.
pub const USAGE_URL: &str = "https://api.anthropic.com/api/oauth/usage";

/// OAuth token endpoint.
pub const TOKEN_URL: &str = "https://console.anthropic.com/v1/oauth/token";

/// Public OAuth client id of the Claude CLI.
pub const OAUTH_CLIENT_ID: &str = "9d1c250a-e61b-44d9-88ed-5944d1962f5e";

/// Beta header the OAuth endpoints require.
const OAUTH_BETA: &str = "oauth-2025-04-20";

// ============================================================================
// Usage Response
// ============================================================================

/// Response from the usage endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageResponse {
    /// Rolling 5-hour session window.
    #[serde(default)]
    pub five_hour: Option<UsageWindow>,
    /// 7-day window across all models.
    #[serde(default)]
    pub seven_day: Option<UsageWindow>,
    /// 7-day Opus window.
    #[serde(default)]
    pub seven_day_opus: Option<UsageWindow>,
    /// 7-day Sonnet window.
    #[serde(default)]
    pub seven_day_sonnet: Option<UsageWindow>,
    /// Paid overage.
    #[serde(default)]
    pub extra_usage: Option<ExtraUsage>,
}

/// One usage window.
#[derive(Debug, Clone, Deserialize)]
pub struct UsageWindow {
    /// Used percentage.
    #[serde(default)]
    pub utilization: Option<f64>,
    /// Reset time (RFC 3339).
    #[serde(default)]
    pub resets_at: Option<String>,
}

impl UsageWindow {
    fn resets_at(&self) -> Option<DateTime<Utc>> {
        self.resets_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn to_period(&self, name: &str, period: PeriodType) -> Option<UsagePeriod> {
        let utilization = self.utilization?;
        Some(UsagePeriod::new(name, utilization, period).with_resets_at(self.resets_at()))
    }
}

/// Overage ("extra usage") figures, reported in cents.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtraUsage {
    /// Whether overage is enabled.
    #[serde(default)]
    pub is_enabled: Option<bool>,
    /// Spent this month.
    #[serde(default)]
    pub used_credits: Option<f64>,
    /// Monthly cap.
    #[serde(default)]
    pub monthly_limit: Option<f64>,
    /// Currency code.
    #[serde(default)]
    pub currency: Option<String>,
}

impl ExtraUsage {
    fn to_overage(&self) -> Option<Overage> {
        if self.is_enabled != Some(true) {
            return None;
        }
        Some(Overage {
            spent: self.used_credits.unwrap_or(0.0) / 100.0,
            limit: self.monthly_limit.map(|cents| cents / 100.0),
            currency: self.currency.clone().unwrap_or_else(|| "USD".to_string()),
        })
    }
}

/// Maps a usage response into a snapshot.
pub fn to_snapshot(response: &UsageResponse, credentials: &ClaudeCredentials) -> UsageSnapshot {
    let mut snapshot = UsageSnapshot::new(super::PROVIDER_ID);

    let periods = [
        response.five_hour.as_ref().and_then(|w| w.to_period("Session", PeriodType::Session)),
        response.seven_day.as_ref().and_then(|w| w.to_period("Weekly", PeriodType::Weekly)),
        response
            .seven_day_opus
            .as_ref()
            .and_then(|w| w.to_period("Weekly (Opus)", PeriodType::Weekly))
            .map(|p| p.with_model("opus")),
        response
            .seven_day_sonnet
            .as_ref()
            .and_then(|w| w.to_period("Weekly (Sonnet)", PeriodType::Weekly))
            .map(|p| p.with_model("sonnet")),
    ];
    snapshot.periods = periods.into_iter().flatten().collect();
    snapshot.overage = response.extra_usage.as_ref().and_then(ExtraUsage::to_overage);
    snapshot.identity = Some(ProviderIdentity {
        plan_name: credentials.plan(),
        login_method: Some(LoginMethod::OAuth),
        ..Default::default()
    });
    snapshot
}

// ============================================================================
// Token Refresh
// ============================================================================

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
    client_id: &'a str,
}

/// Successful token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// New access token.
    pub access_token: String,
    /// Rotated refresh token, if issued.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Space-separated scopes.
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Writes this token into a stored credential.
    pub fn apply_to(&self, data: &mut OAuthData) {
        data.access_token.clone_from(&self.access_token);
        if let Some(refresh) = &self.refresh_token {
            data.refresh_token = Some(refresh.clone());
        }
        if let Some(secs) = self.expires_in {
            data.expires_at = Some((Utc::now() + Duration::seconds(secs)).timestamp_millis());
        }
        if let Some(scope) = &self.scope {
            data.scopes = scope.split_whitespace().map(ToString::to_string).collect();
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

// ============================================================================
// API Client
// ============================================================================

/// Client for the usage and token endpoints.
#[derive(Debug, Clone)]
pub struct ClaudeApi {
    usage_url: String,
    token_url: String,
}

impl Default for ClaudeApi {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaudeApi {
    /// Client for the production endpoints.
    pub fn new() -> Self {
        Self::with_urls(USAGE_URL, TOKEN_URL)
    }

    /// Client for custom endpoints.
    pub fn with_urls(usage_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        Self {
            usage_url: usage_url.into(),
            token_url: token_url.into(),
        }
    }

    /// Fetches the usage response.
    ///
    /// # Errors
    ///
    /// `TokenRejected` on 401, `MissingScope` on 403, `RateLimited` on 429.
    #[instrument(skip(self, http, access_token))]
    pub async fn fetch_usage(&self, http: &HttpClient, access_token: &str) -> Result<UsageResponse, ClaudeError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {access_token}"))
            .map_err(|_| ClaudeError::InvalidCredentials("access token is not a valid header".to_string()))?;
        headers.insert(header::AUTHORIZATION, bearer);
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("anthropic-beta", HeaderValue::from_static(OAUTH_BETA));

        let response = http.get_with_headers(&self.usage_url, headers).await?;
        let status = response.status();
        debug!(status = %status, "Usage response");

        if status == StatusCode::UNAUTHORIZED {
            return Err(ClaudeError::TokenRejected);
        }
        if status == StatusCode::FORBIDDEN {
            return Err(ClaudeError::MissingScope(REQUIRED_SCOPE.to_string()));
        }
        if response.is_rate_limited() {
            return Err(ClaudeError::RateLimited(response.retry_after_secs()));
        }
        if !status.is_success() {
            return Err(ClaudeError::UnexpectedStatus(status.as_u16()));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ClaudeError::InvalidResponse(e.to_string()))
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// `RefreshRejected` when the endpoint answers `invalid_grant`,
    /// `RefreshFailed` for any other failure.
    #[instrument(skip(self, http, refresh_token))]
    pub async fn refresh(&self, http: &HttpClient, refresh_token: &str) -> Result<TokenResponse, ClaudeError> {
        let request = RefreshRequest {
            grant_type: "refresh_token",
            refresh_token,
            client_id: OAUTH_CLIENT_ID,
        };
        let response = http.post_json(&self.token_url, &request).await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            debug!("Token refreshed");
            return serde_json::from_str(&body).map_err(|e| ClaudeError::RefreshFailed(e.to_string()));
        }

        let error: TokenErrorResponse = serde_json::from_str(&body).unwrap_or_default();
        let detail = error.error_description.unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        if error.error == "invalid_grant" {
            warn!(detail = %detail, "Refresh token rejected");
            Err(ClaudeError::RefreshRejected(detail))
        } else {
            warn!(status = %status, error = %error.error, "Token refresh failed");
            Err(ClaudeError::RefreshFailed(detail))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(subscription: Option<&str>) -> ClaudeCredentials {
        ClaudeCredentials {
            access_token: "t".to_string(),
            refresh_token: None,
            expires_at: None,
            scopes: Vec::new(),
            subscription_type: subscription.map(ToString::to_string),
            rate_limit_tier: None,
        }
    }

    #[test]
    fn test_full_response_mapping() {
        let json = r#"{
            "five_hour": {"utilization": 25.0, "resets_at": "2025-01-01T12:00:00Z"},
            "seven_day": {"utilization": 45.5, "resets_at": "2025-01-05T00:00:00+00:00"},
            "seven_day_opus": {"utilization": 10.0, "resets_at": null},
            "seven_day_sonnet": null,
            "extra_usage": {"is_enabled": true, "used_credits": 1250, "monthly_limit": 5000}
        }"#;
        let response: UsageResponse = serde_json::from_str(json).unwrap();
        let snapshot = to_snapshot(&response, &credentials(Some("pro")));

        assert_eq!(snapshot.provider_id.as_str(), "claude");
        assert_eq!(snapshot.periods.len(), 3);

        let session = snapshot.period(PeriodType::Session).unwrap();
        assert_eq!(session.utilization, 25.0);
        assert!(session.resets_at.is_some());

        let opus = &snapshot.periods[2];
        assert_eq!(opus.name, "Weekly (Opus)");
        assert_eq!(opus.model.as_deref(), Some("opus"));
        assert!(opus.resets_at.is_none());

        let overage = snapshot.overage.unwrap();
        assert_eq!(overage.spent, 12.5);
        assert_eq!(overage.limit, Some(50.0));
        assert_eq!(overage.currency, "USD");

        let identity = snapshot.identity.unwrap();
        assert_eq!(identity.plan_name.as_deref(), Some("Pro"));
        assert_eq!(identity.login_method, Some(LoginMethod::OAuth));
    }

    #[test]
    fn test_over_limit_is_kept() {
        let response: UsageResponse =
            serde_json::from_str(r#"{"five_hour": {"utilization": 104.5}}"#).unwrap();
        let snapshot = to_snapshot(&response, &credentials(None));
        assert_eq!(snapshot.periods[0].utilization, 104.5);
        assert!(snapshot.periods[0].is_over_limit());
    }

    #[test]
    fn test_disabled_overage_and_null_windows() {
        let json = r#"{
            "five_hour": {"utilization": null},
            "extra_usage": {"is_enabled": false, "used_credits": 100}
        }"#;
        let response: UsageResponse = serde_json::from_str(json).unwrap();
        let snapshot = to_snapshot(&response, &credentials(None));
        assert!(snapshot.periods.is_empty());
        assert!(snapshot.overage.is_none());
    }

    #[test]
    fn test_token_apply_keeps_refresh_when_not_rotated() {
        let mut data: OAuthData = serde_json::from_str(
            r#"{"accessToken": "old", "refreshToken": "keep", "scopes": ["a"]}"#,
        )
        .unwrap();
        let token = TokenResponse {
            access_token: "new".to_string(),
            refresh_token: None,
            expires_in: Some(60),
            scope: Some("user:inference user:profile".to_string()),
        };
        token.apply_to(&mut data);

        assert_eq!(data.access_token, "new");
        assert_eq!(data.refresh_token.as_deref(), Some("keep"));
        assert!(data.expires_at.unwrap() > Utc::now().timestamp_millis());
        assert_eq!(data.scopes, vec!["user:inference", "user:profile"]);
    }
}
