// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `UsageHub` Providers
//!
//! Concrete providers for the `UsageHub` fetch engine.
//!
//! Each provider module contributes:
//!
//! - **Descriptor**: id, display name, CLI aliases and the ranked strategy list
//! - **Strategies**: [`FetchStrategy`](usagehub_fetch::FetchStrategy) implementations
//! - **Response mapping**: provider JSON into a [`UsageSnapshot`](usagehub_core::UsageSnapshot)
//!
//! ## Supported Providers
//!
//! | Provider | Strategies (in order) |
//! |----------|-----------------------|
//! | Claude (Anthropic) | `oauth` |
//! | Codex (OpenAI) | `oauth` |
//! | z.ai | `api`, `keychain` |
//!
//! ## Usage
//!
//! ```ignore
//! use usagehub_providers::ProviderRegistry;
//!
//! let registry = ProviderRegistry::builtin();
//! let orchestrator = FetchOrchestrator::new(
//!     registry.pipelines(),
//!     cache,
//!     FetchContext::new(),
//!     settings.orchestrator_settings(),
//! );
//! ```

pub mod descriptor;
pub mod registry;

// Provider modules (alphabetical)
pub mod claude;
pub mod codex;
pub mod zai;

pub use descriptor::{ProviderDescriptor, ProviderDescriptorBuilder};
pub use registry::{ProviderRegistry, ProviderRegistryBuilder};

pub use claude::claude_descriptor;
pub use codex::codex_descriptor;
pub use zai::zai_descriptor;

/// Every domain a built-in provider talks to.
///
/// Used to restrict the shared HTTP client.
pub const ALLOWED_DOMAINS: &[&str] = &[
    "api.anthropic.com",
    "console.anthropic.com",
    "chatgpt.com",
    "api.z.ai",
];

#[cfg(test)]
pub(crate) mod test_support;
