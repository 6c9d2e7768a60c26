//! CLI command implementations.

pub mod cache;
pub mod config;
pub mod providers;
pub mod usage;
