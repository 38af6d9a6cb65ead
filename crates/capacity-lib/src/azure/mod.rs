//! Resource Manager integration
//!
//! Concrete implementations of the fleet enumeration and metric query
//! capabilities, plus bearer token acquisition.

mod auth;
mod client;
mod wire;

pub use auth::{AzureCliToken, StaticToken, TokenSource, MANAGEMENT_RESOURCE};
pub use client::{ArmClient, ArmClientConfig, SubscriptionMetrics, DEFAULT_MANAGEMENT_ENDPOINT};
