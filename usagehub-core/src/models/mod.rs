//! Domain models for `UsageHub`.
//!
//! ## Submodules
//!
//! - [`provider`] - Provider id and account identity
//! - [`usage`] - Usage snapshot and periods
//! - [`status`] - Upstream provider status

mod provider;
mod status;
mod usage;

pub use provider::{LoginMethod, ProviderId, ProviderIdentity};
pub use status::{ProviderStatus, StatusIndicator};
pub use usage::{Overage, PeriodType, UsagePeriod, UsageSnapshot};
