// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `UsageHub` Core
//!
//! Core types and models shared by every `UsageHub` crate.
//!
//! ## Key Types
//!
//! ### Provider Types
//! - [`ProviderId`] - Stable identifier of a provider account source
//! - [`ProviderIdentity`] - Account identity reported by a provider
//! - [`LoginMethod`] - How the account authenticated
//!
//! ### Usage Types
//! - [`UsageSnapshot`] - Captured usage state for one provider
//! - [`UsagePeriod`] - One quota period (session, daily, weekly, monthly)
//! - [`PeriodType`] - Period tag
//! - [`Overage`] - Optional overage/billing figures
//!
//! ### Status
//! - [`ProviderStatus`] - Upstream service health
//! - [`StatusIndicator`] - Status indicator levels

pub mod error;
pub mod models;

pub use error::CoreError;

pub use models::{
    // Provider types
    LoginMethod,
    ProviderId,
    ProviderIdentity,
    // Usage types
    Overage,
    PeriodType,
    UsagePeriod,
    UsageSnapshot,
    // Status
    ProviderStatus,
    StatusIndicator,
};
