//! z.ai provider.
//!
//! z.ai authenticates with an API token, taken from the environment first
//! and the system keychain second.

mod api;
mod error;
mod strategies;
mod token;

use std::sync::Arc;

pub use api::{QuotaResponse, to_snapshot};
pub use error::ZaiError;
pub use strategies::{ZaiApiStrategy, ZaiKeychainStrategy};
pub use token::{ENV_VARS, clean_token};

use crate::descriptor::ProviderDescriptor;

/// Provider id.
pub const PROVIDER_ID: &str = "zai";

/// Creates the z.ai descriptor.
pub fn zai_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::builder(PROVIDER_ID)
        .display_name("z.ai")
        .alias("z.ai")
        .alias("glm")
        .strategy(Arc::new(ZaiApiStrategy::new()))
        .strategy(Arc::new(ZaiKeychainStrategy::new()))
        .build()
}
