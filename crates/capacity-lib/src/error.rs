//! Error taxonomy for the report engine

use thiserror::Error;

/// The SKU family or capacity unit has no row in the capacity table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no capacity profile for SKU family {family} with capacity unit {capacity_unit}")]
pub struct CapacityResolutionError {
    pub family: String,
    pub capacity_unit: u32,
}

/// The SKU name matches no tier known to the replica defaults
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown SKU tier {sku_name} for {family} cluster")]
pub struct UnknownSkuTierError {
    pub family: &'static str,
    pub sku_name: String,
}

/// Failure talking to the metric source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricQueryError {
    #[error("metric query timed out after {0} ms")]
    Timeout(u64),

    #[error("metric query rejected ({status}): {body}")]
    Http { status: u16, body: String },

    #[error("metric query transport failure: {0}")]
    Transport(String),

    #[error("not authorized to query metrics: {0}")]
    Auth(String),

    #[error("could not decode metric response: {0}")]
    Decode(String),
}

impl MetricQueryError {
    /// Whether a retry could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            MetricQueryError::Timeout(_) | MetricQueryError::Transport(_) => true,
            MetricQueryError::Http { status, .. } => *status == 429 || *status >= 500,
            MetricQueryError::Auth(_) | MetricQueryError::Decode(_) => false,
        }
    }
}

/// A cluster whose rows could not be built
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowBuildError {
    #[error(transparent)]
    Capacity(#[from] CapacityResolutionError),

    #[error(transparent)]
    Tier(#[from] UnknownSkuTierError),

    #[error("resource id {0} has no resource group segment")]
    MalformedResourceId(String),
}

/// Failure enumerating subscriptions or clusters; fatal for the run
#[derive(Debug, Error)]
pub enum EnumerationError {
    #[error("failed to list subscriptions: {0}")]
    Subscriptions(String),

    #[error("failed to list clusters in subscription {subscription_id}: {message}")]
    Clusters {
        subscription_id: String,
        message: String,
    },

    #[error("failed to acquire credentials: {0}")]
    Credentials(String),
}

/// Failure of a whole assembly pass
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error(transparent)]
    Enumeration(#[from] EnumerationError),

    #[error("cluster {resource_id} could not be reported: {source}")]
    RowBuild {
        resource_id: String,
        #[source]
        source: RowBuildError,
    },
}
