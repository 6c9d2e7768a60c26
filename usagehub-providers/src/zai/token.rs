//! z.ai API token lookup.
//!
//! Tokens come from the environment (`ZAI_API_KEY`, then `ZAI_API_TOKEN`)
//! or from the system keychain entry `usagehub:zai / api_key`.

use tracing::debug;
use usagehub_fetch::KeychainApi;
use usagehub_fetch::host::keychain::{accounts, services};

use super::error::ZaiError;

/// Environment variables checked, in order.
pub const ENV_VARS: &[&str] = &["ZAI_API_KEY", "ZAI_API_TOKEN"];

/// Strips whitespace and one pair of surrounding quotes.
pub fn clean_token(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| trimmed.strip_prefix(*q).and_then(|s| s.strip_suffix(*q)))
        .unwrap_or(trimmed)
        .trim();
    (!unquoted.is_empty()).then(|| unquoted.to_string())
}

/// First non-empty token among `names`, read through `lookup`.
pub fn token_from<F>(names: &[String], lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names.iter().find_map(|name| {
        let token = lookup(name).as_deref().and_then(clean_token);
        if token.is_some() {
            debug!(source = %name, "Loaded z.ai token from environment");
        }
        token
    })
}

/// First non-empty token among the given environment variables.
pub fn env_token(names: &[String]) -> Option<String> {
    token_from(names, |name| std::env::var(name).ok())
}

/// Token stored in the keychain.
///
/// # Errors
///
/// Returns an error if the keychain cannot be read.
pub async fn keychain_token(keychain: &dyn KeychainApi) -> Result<Option<String>, ZaiError> {
    let stored = keychain.get(services::ZAI, accounts::API_KEY).await?;
    let token = stored.as_deref().and_then(clean_token);
    if token.is_some() {
        debug!(source = "keychain", "Loaded z.ai token");
    }
    Ok(token)
}
