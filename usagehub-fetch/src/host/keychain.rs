//! Secure credential storage using the system keychain.
//!
//! This module provides access to the system's secure credential storage:
//! - macOS: Keychain Services
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring, KDE Wallet)
//!
//! Keychain calls can block on a user prompt, so [`SystemKeychain`] runs them
//! on the blocking pool. [`MemoryKeychain`] is an in-process stand-in for
//! tests and headless environments.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use keyring::Entry;
use tracing::{debug, warn};

use crate::error::KeychainError;

/// Service name prefix for UsageHub credentials.
const SERVICE_PREFIX: &str = "usagehub";

// ============================================================================
// Keychain API Trait
// ============================================================================

/// API for secure credential storage.
#[async_trait]
pub trait KeychainApi: Send + Sync {
    /// Get a credential from the keychain.
    ///
    /// # Arguments
    /// * `service` - Service identifier (e.g., "zai")
    /// * `account` - Account identifier (e.g., `api_key`)
    ///
    /// # Returns
    /// * `Ok(Some(secret))` - Credential found
    /// * `Ok(None)` - Credential not found
    /// * `Err(e)` - Error accessing keychain
    async fn get(&self, service: &str, account: &str) -> Result<Option<String>, KeychainError>;

    /// Set a credential in the keychain.
    async fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), KeychainError>;

    /// Delete a credential from the keychain.
    async fn delete(&self, service: &str, account: &str) -> Result<(), KeychainError>;

    /// Check if a credential exists.
    async fn exists(&self, service: &str, account: &str) -> bool {
        matches!(self.get(service, account).await, Ok(Some(_)))
    }
}

// ============================================================================
// System Keychain Implementation
// ============================================================================

/// Default implementation using the system keychain via the `keyring` crate.
#[derive(Debug, Clone, Default)]
pub struct SystemKeychain;

impl SystemKeychain {
    /// Creates a new system keychain instance.
    pub fn new() -> Self {
        Self
    }

    /// Builds the full service name with prefix.
    fn full_service(service: &str) -> String {
        format!("{SERVICE_PREFIX}:{service}")
    }

    fn entry(service: &str, account: &str) -> Result<Entry, KeychainError> {
        let full_service = Self::full_service(service);
        Entry::new(&full_service, account).map_err(|e| KeychainError::Platform(e.to_string()))
    }

    async fn blocking<T, F>(f: F) -> Result<T, KeychainError>
    where
        F: FnOnce() -> Result<T, KeychainError> + Send + 'static,
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| KeychainError::Other(e.to_string()))?
    }
}

#[async_trait]
impl KeychainApi for SystemKeychain {
    async fn get(&self, service: &str, account: &str) -> Result<Option<String>, KeychainError> {
        debug!(service = %service, account = %account, "Getting credential from keychain");

        let entry = Self::entry(service, account)?;
        let result = Self::blocking(move || match entry.get_password() {
            Ok(secret) if !secret.is_empty() => Ok(Some(secret)),
            Ok(_) | Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(KeychainError::from(e)),
        })
        .await;

        match &result {
            Ok(Some(_)) => debug!(service = %service, account = %account, "Credential found"),
            Ok(None) => debug!(service = %service, account = %account, "Credential not found"),
            Err(e) => warn!(service = %service, account = %account, error = %e, "Failed to get credential"),
        }
        result
    }

    async fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), KeychainError> {
        debug!(service = %service, account = %account, "Setting credential in keychain");

        let entry = Self::entry(service, account)?;
        let secret = secret.to_string();
        Self::blocking(move || entry.set_password(&secret).map_err(KeychainError::from))
            .await
            .inspect_err(|e| {
                warn!(service = %service, account = %account, error = %e, "Failed to set credential");
            })
    }

    async fn delete(&self, service: &str, account: &str) -> Result<(), KeychainError> {
        debug!(service = %service, account = %account, "Deleting credential from keychain");

        let entry = Self::entry(service, account)?;
        Self::blocking(move || match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(KeychainError::from(e)),
        })
        .await
        .inspect_err(|e| {
            warn!(service = %service, account = %account, error = %e, "Failed to delete credential");
        })
    }
}

// ============================================================================
// Memory Keychain
// ============================================================================

/// In-memory keychain.
#[derive(Debug, Default)]
pub struct MemoryKeychain {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemoryKeychain {
    /// Creates an empty keychain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a keychain holding one credential.
    #[must_use]
    pub fn with_entry(self, service: &str, account: &str, secret: &str) -> Self {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((service.to_string(), account.to_string()), secret.to_string());
        self
    }
}

#[async_trait]
impl KeychainApi for MemoryKeychain {
    async fn get(&self, service: &str, account: &str) -> Result<Option<String>, KeychainError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .get(&(service.to_string(), account.to_string()))
            .cloned())
    }

    async fn set(&self, service: &str, account: &str, secret: &str) -> Result<(), KeychainError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((service.to_string(), account.to_string()), secret.to_string());
        Ok(())
    }

    async fn delete(&self, service: &str, account: &str) -> Result<(), KeychainError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(service.to_string(), account.to_string()));
        Ok(())
    }
}

// ============================================================================
// Common Credential Keys
// ============================================================================

/// Common service names for providers.
pub mod services {
    /// Anthropic Claude service.
    pub const CLAUDE: &str = "claude";
    /// `OpenAI` Codex service.
    pub const CODEX: &str = "codex";
    /// z.ai service.
    pub const ZAI: &str = "zai";
}

/// Common account names for credentials.
pub mod accounts {
    /// API key credential.
    pub const API_KEY: &str = "api_key";
    /// OAuth access token.
    pub const OAUTH_TOKEN: &str = "oauth_token";
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_service_name() {
        assert_eq!(SystemKeychain::full_service("zai"), "usagehub:zai");
    }

    #[tokio::test]
    async fn test_memory_keychain_roundtrip() {
        let keychain = MemoryKeychain::new();
        assert!(!keychain.exists(services::ZAI, accounts::API_KEY).await);

        keychain.set(services::ZAI, accounts::API_KEY, "secret").await.unwrap();
        assert_eq!(
            keychain.get(services::ZAI, accounts::API_KEY).await.unwrap().as_deref(),
            Some("secret")
        );

        keychain.delete(services::ZAI, accounts::API_KEY).await.unwrap();
        assert!(keychain.get(services::ZAI, accounts::API_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_with_entry() {
        let keychain = MemoryKeychain::new().with_entry("claude", "oauth_token", "tok");
        assert!(keychain.exists("claude", "oauth_token").await);
        assert!(!keychain.exists("claude", "api_key").await);
    }
}
