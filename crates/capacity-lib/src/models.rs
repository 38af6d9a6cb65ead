//! Core data models for the capacity report

use serde::{Deserialize, Serialize};

/// Position of the resource group segment in an ARM resource id
/// (`/subscriptions/{sub}/resourceGroups/{rg}/providers/...`)
const RESOURCE_GROUP_SEGMENT: usize = 4;

/// A subscription visible to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub subscription_id: String,
}

impl Subscription {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
        }
    }
}

/// Cluster family, resolved once per cluster from its resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterFamily {
    /// Sharded tier, one metric stream per shard
    Classic,
    /// Pooled enterprise tier, one metric stream per cluster
    Pooled,
    /// Any other resource type; contributes no rows
    Unrecognized(String),
}

impl ClusterFamily {
    pub const CLASSIC_RESOURCE_TYPE: &'static str = "Microsoft.Cache/Redis";
    pub const POOLED_RESOURCE_TYPE: &'static str = "Microsoft.Cache/redisEnterprise";

    /// Map an ARM resource type onto a family (comparison is case-insensitive,
    /// ARM does not normalize the casing of provider types)
    pub fn from_resource_type(resource_type: &str) -> Self {
        if resource_type.eq_ignore_ascii_case(Self::CLASSIC_RESOURCE_TYPE) {
            ClusterFamily::Classic
        } else if resource_type.eq_ignore_ascii_case(Self::POOLED_RESOURCE_TYPE) {
            ClusterFamily::Pooled
        } else {
            ClusterFamily::Unrecognized(resource_type.to_string())
        }
    }
}

/// SKU as reported by the management API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sku {
    /// Tier name for classic clusters (`Basic`, `Standard`, `Premium`),
    /// family name for pooled clusters (`Enterprise_E10`)
    pub name: String,
    /// Single-letter family for classic clusters (`C`, `P`); absent for pooled
    pub family: Option<String>,
    /// Capacity unit
    pub capacity: u32,
}

/// Immutable snapshot of one cache cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub resource_id: String,
    pub name: String,
    pub location: String,
    pub family: ClusterFamily,
    pub sku: Sku,
    /// Absent or zero means one shard
    pub declared_shard_count: Option<u32>,
    pub declared_replicas_per_master: Option<u32>,
}

impl Cluster {
    /// Resource group, taken from its fixed position in the resource id
    pub fn resource_group(&self) -> Option<&str> {
        self.resource_id
            .split('/')
            .nth(RESOURCE_GROUP_SEGMENT)
            .filter(|segment| !segment.is_empty())
    }
}

/// Nominal capacity of a pooled cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityProfile {
    pub vcpus: u32,
    pub master_shard_count: u32,
}

/// One logical shard of a cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardRef {
    pub cluster_id: String,
    pub shard_index: u32,
}

/// One flattened, shard-level row of the final report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub subscription_id: String,
    pub resource_group: String,
    pub region: String,
    pub cluster_name: String,
    pub sku_capacity_label: String,
    pub sku_family_label: String,
    pub replicas_per_master: u32,
    pub total_shard_count: u32,
    pub shard_index: u32,
    pub ops_per_second: f64,
    pub used_memory_mb: f64,
    pub max_connections: f64,
}

impl ReportRow {
    /// Column titles, in field order
    pub const COLUMNS: [&'static str; 12] = [
        "Subscription ID",
        "Resource Group",
        "Region",
        "DB Name",
        "SKU Capacity",
        "SKU Name",
        "Replicas per Master",
        "Shard Count",
        "Shard Number",
        "Avg Ops/Sec",
        "Used Memory (MB)",
        "Max Total Connections",
    ];
}

/// A cluster left out of the report, with the reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCluster {
    pub subscription_id: String,
    pub resource_id: String,
    pub reason: String,
}

/// Result of one assembly pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetReport {
    /// Rows in subscription, cluster, then shard order
    pub rows: Vec<ReportRow>,
    pub skipped: Vec<SkippedCluster>,
    pub clusters_processed: usize,
}

/// Statistic requested from the metric source per time bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aggregation {
    Average,
    Maximum,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Average => "Average",
            Aggregation::Maximum => "Maximum",
        }
    }
}

/// One time bucket of a metric series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricValue {
    #[serde(default)]
    pub time_stamp: Option<String>,
    #[serde(default)]
    pub average: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub count: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
}

/// One segment of a metric series (one per dimension combination)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesElement {
    #[serde(default)]
    pub data: Vec<MetricValue>,
}

/// All segments returned for one metric name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub name: String,
    pub timeseries: Vec<TimeSeriesElement>,
}
