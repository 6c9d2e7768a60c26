//! Host APIs for UsageHub fetch strategies.
//!
//! This module provides abstractions for interacting with external systems:
//!
//! - [`keychain`] - Secure credential storage (system keychain)
//! - [`http`] - HTTP client with tracing and domain allowlist
//! - [`process`] - Helper program lookup and spawning
//! - [`helper`] - Credential refresh by running a helper program

pub mod helper;
pub mod http;
pub mod keychain;
pub mod process;

pub use helper::{HelperRefresh, RefreshOutcome};
pub use http::{HttpClient, ResponseExt};
pub use keychain::{KeychainApi, MemoryKeychain, SystemKeychain};
pub use process::ProcessRunner;
