//! Report assembly
//!
//! This module turns an enumerated fleet into report rows:
//! - Per-cluster planning and metric collection
//! - Fleet-wide iteration over subscriptions and clusters

mod assembler;
mod builder;

pub use assembler::{AssemblerConfig, FleetReportAssembler};
pub use builder::{
    bytes_to_megabytes, round_to, ClusterPlan, ClusterRowBuilder, ShardMetricNames,
};

use crate::error::EnumerationError;
use crate::metrics::MetricSource;
use crate::models::{Cluster, Subscription};
use async_trait::async_trait;
use std::sync::Arc;

/// Capability for enumerating subscriptions and their clusters
#[async_trait]
pub trait FleetInventory: Send + Sync {
    /// List all subscriptions visible to the caller
    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, EnumerationError>;

    /// List clusters in a subscription: classic first, then pooled when requested
    async fn list_clusters(
        &self,
        subscription_id: &str,
        include_pooled: bool,
    ) -> Result<Vec<Cluster>, EnumerationError>;
}

/// Builds a metric source bound to one subscription
pub trait MetricSourceFactory: Send + Sync {
    fn metric_source(&self, subscription_id: &str)
        -> Result<Arc<dyn MetricSource>, EnumerationError>;
}
