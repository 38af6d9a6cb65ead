//! Per-cluster row construction
//!
//! Building rows is split in two: a pure planning step that resolves
//! labels, replica and capacity metadata and the metric names for every
//! shard, and a collection step that runs the metric queries.

use crate::capacity::{is_managed_tier_sku, SkuCapacityResolver};
use crate::error::RowBuildError;
use crate::metrics::{MetricWindowReducer, ReductionKind};
use crate::models::{Cluster, ClusterFamily, ReportRow};
use crate::topology::{resolve_replicas_per_master, ShardTopologyExpander};
use futures::future::join_all;

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// Round to a fixed number of decimal places, ties to even
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

/// Bytes to megabytes, two decimals
pub fn bytes_to_megabytes(bytes: f64) -> f64 {
    round_to(bytes / BYTES_PER_MEGABYTE, 2)
}

/// Metric names carrying one shard's readings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardMetricNames {
    pub shard_index: u32,
    pub operations: String,
    pub used_memory: String,
    pub connected_clients: String,
}

impl ShardMetricNames {
    /// Classic shards carry the shard index as a suffix
    pub fn classic(shard_index: u32) -> Self {
        Self {
            shard_index,
            operations: format!("operationspersecond{}", shard_index),
            used_memory: format!("usedmemory{}", shard_index),
            connected_clients: format!("connectedclients{}", shard_index),
        }
    }

    /// Pooled clusters report one unqualified stream
    pub fn pooled() -> Self {
        Self {
            shard_index: 0,
            operations: "operationspersecond".to_string(),
            used_memory: "usedmemory".to_string(),
            connected_clients: "connectedclients".to_string(),
        }
    }
}

/// Everything about a cluster's rows except the metric readings
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterPlan {
    pub resource_id: String,
    pub resource_group: String,
    pub region: String,
    pub cluster_name: String,
    pub sku_capacity_label: String,
    pub sku_family_label: String,
    pub replicas_per_master: u32,
    pub total_shard_count: u32,
    pub shards: Vec<ShardMetricNames>,
}

/// Builds report rows for one cluster
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterRowBuilder {
    resolver: SkuCapacityResolver,
    expander: ShardTopologyExpander,
}

impl ClusterRowBuilder {
    pub fn new(resolver: SkuCapacityResolver, expander: ShardTopologyExpander) -> Self {
        Self { resolver, expander }
    }

    /// Resolve the cluster's row metadata.
    ///
    /// Returns `Ok(None)` for clusters the report does not cover: resource
    /// types that are neither classic nor pooled, and managed-tier SKUs.
    pub fn plan(&self, cluster: &Cluster) -> Result<Option<ClusterPlan>, RowBuildError> {
        let (sku_capacity_label, sku_family_label, total_shard_count, shards) = match &cluster
            .family
        {
            ClusterFamily::Unrecognized(_) => return Ok(None),
            ClusterFamily::Pooled if is_managed_tier_sku(&cluster.sku.name) => return Ok(None),
            ClusterFamily::Classic => {
                let shards: Vec<ShardMetricNames> = self
                    .expander
                    .expand(cluster)
                    .into_iter()
                    .map(|shard| ShardMetricNames::classic(shard.shard_index))
                    .collect();
                (
                    format!(
                        "{}{}",
                        cluster.sku.family.as_deref().unwrap_or_default(),
                        cluster.sku.capacity
                    ),
                    cluster.sku.name.clone(),
                    shards.len() as u32,
                    shards,
                )
            }
            ClusterFamily::Pooled => {
                let profile = self
                    .resolver
                    .resolve(&cluster.sku.name, cluster.sku.capacity)?;
                let shards: Vec<ShardMetricNames> = self
                    .expander
                    .expand(cluster)
                    .into_iter()
                    .map(|_| ShardMetricNames::pooled())
                    .collect();
                let (tier, size) = cluster
                    .sku
                    .name
                    .rsplit_once('_')
                    .unwrap_or((cluster.sku.name.as_str(), cluster.sku.name.as_str()));
                (
                    format!("{}-Capacity{}", size, cluster.sku.capacity),
                    tier.to_string(),
                    profile.master_shard_count,
                    shards,
                )
            }
        };

        let replicas_per_master = resolve_replicas_per_master(cluster, &self.resolver)?;
        let resource_group = cluster
            .resource_group()
            .ok_or_else(|| RowBuildError::MalformedResourceId(cluster.resource_id.clone()))?
            .to_string();

        Ok(Some(ClusterPlan {
            resource_id: cluster.resource_id.clone(),
            resource_group,
            region: cluster.location.clone(),
            cluster_name: cluster.name.clone(),
            sku_capacity_label,
            sku_family_label,
            replicas_per_master,
            total_shard_count,
            shards,
        }))
    }

    /// Query every shard's metrics and emit one row per shard, in shard order
    pub async fn collect(
        &self,
        subscription_id: &str,
        plan: &ClusterPlan,
        reducer: &MetricWindowReducer,
    ) -> Vec<ReportRow> {
        join_all(
            plan.shards
                .iter()
                .map(|shard| self.collect_shard(subscription_id, plan, shard, reducer)),
        )
        .await
    }

    async fn collect_shard(
        &self,
        subscription_id: &str,
        plan: &ClusterPlan,
        shard: &ShardMetricNames,
        reducer: &MetricWindowReducer,
    ) -> ReportRow {
        let peak_metrics = [shard.used_memory.as_str(), shard.connected_clients.as_str()];
        let (ops, peaks) = futures::join!(
            reducer.reduce(&plan.resource_id, &shard.operations, ReductionKind::MaxOfAverage),
            reducer.reduce_many(&plan.resource_id, &peak_metrics, ReductionKind::MaxOfMaximum),
        );
        let used_memory_bytes = peaks.first().copied().unwrap_or(0.0);
        let connections = peaks.get(1).copied().unwrap_or(0.0);

        ReportRow {
            subscription_id: subscription_id.to_string(),
            resource_group: plan.resource_group.clone(),
            region: plan.region.clone(),
            cluster_name: plan.cluster_name.clone(),
            sku_capacity_label: plan.sku_capacity_label.clone(),
            sku_family_label: plan.sku_family_label.clone(),
            replicas_per_master: plan.replicas_per_master,
            total_shard_count: plan.total_shard_count,
            shard_index: shard.shard_index,
            ops_per_second: round_to(ops, 0),
            used_memory_mb: bytes_to_megabytes(used_memory_bytes),
            max_connections: connections,
        }
    }

    /// Plan and collect in one step; unsupported clusters yield no rows
    pub async fn build_rows(
        &self,
        subscription_id: &str,
        cluster: &Cluster,
        reducer: &MetricWindowReducer,
    ) -> Result<Vec<ReportRow>, RowBuildError> {
        match self.plan(cluster)? {
            Some(plan) => Ok(self.collect(subscription_id, &plan, reducer).await),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetricQueryError;
    use crate::metrics::{async_trait, MetricQuery, MetricSource, ReducerConfig};
    use crate::models::{MetricSeries, MetricValue, Sku, TimeSeriesElement};
    use crate::observability::RunLogger;
    use std::sync::{Arc, Mutex};

    /// Returns the same readings for every metric name and records requests
    struct ConstantSource {
        average: f64,
        maximum: f64,
        requested: Mutex<Vec<String>>,
    }

    impl ConstantSource {
        fn new(average: f64, maximum: f64) -> Self {
            Self {
                average,
                maximum,
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MetricSource for ConstantSource {
        async fn query_metrics(
            &self,
            query: &MetricQuery,
        ) -> Result<Vec<MetricSeries>, MetricQueryError> {
            self.requested
                .lock()
                .unwrap()
                .push(query.metric_names.clone());
            Ok(query
                .metric_names
                .split(',')
                .map(|name| MetricSeries {
                    name: name.to_string(),
                    timeseries: vec![TimeSeriesElement {
                        data: vec![MetricValue {
                            average: Some(self.average),
                            maximum: Some(self.maximum),
                            ..Default::default()
                        }],
                    }],
                })
                .collect())
        }
    }

    fn classic(sku_name: &str, shards: Option<u32>, replicas: Option<u32>) -> Cluster {
        Cluster {
            resource_id:
                "/subscriptions/sub-1/resourceGroups/rg-east/providers/Microsoft.Cache/Redis/orders"
                    .to_string(),
            name: "orders".to_string(),
            location: "eastus".to_string(),
            family: ClusterFamily::Classic,
            sku: Sku {
                name: sku_name.to_string(),
                family: Some("P".to_string()),
                capacity: 2,
            },
            declared_shard_count: shards,
            declared_replicas_per_master: replicas,
        }
    }

    fn pooled(sku_name: &str, capacity: u32) -> Cluster {
        Cluster {
            resource_id: "/subscriptions/sub-1/resourceGroups/rg-west/providers/Microsoft.Cache/redisEnterprise/sessions"
                .to_string(),
            name: "sessions".to_string(),
            location: "westus2".to_string(),
            family: ClusterFamily::Pooled,
            sku: Sku {
                name: sku_name.to_string(),
                family: None,
                capacity,
            },
            declared_shard_count: None,
            declared_replicas_per_master: None,
        }
    }

    fn reducer(source: Arc<dyn MetricSource>) -> MetricWindowReducer {
        MetricWindowReducer::new(source, ReducerConfig::default(), RunLogger::new("test"))
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round_to(123.4, 0), 123.0);
        assert_eq!(round_to(123.6, 0), 124.0);
        assert_eq!(bytes_to_megabytes(104_857_600.0), 100.0);
        assert_eq!(bytes_to_megabytes(200e6), 190.73);
        assert_eq!(bytes_to_megabytes(0.0), 0.0);
    }

    #[test]
    fn test_rounding_ties_to_even() {
        assert_eq!(round_to(122.5, 0), 122.0);
        assert_eq!(round_to(123.5, 0), 124.0);
        assert_eq!(round_to(0.5, 0), 0.0);
        assert_eq!(round_to(1.5, 0), 2.0);
    }

    #[test]
    fn test_classic_metric_names() {
        let names = ShardMetricNames::classic(3);
        assert_eq!(names.operations, "operationspersecond3");
        assert_eq!(names.used_memory, "usedmemory3");
        assert_eq!(names.connected_clients, "connectedclients3");
    }

    #[test]
    fn test_plan_classic() {
        let plan = ClusterRowBuilder::default()
            .plan(&classic("Premium", Some(3), Some(2)))
            .unwrap()
            .unwrap();
        assert_eq!(plan.resource_group, "rg-east");
        assert_eq!(plan.sku_capacity_label, "P2");
        assert_eq!(plan.sku_family_label, "Premium");
        assert_eq!(plan.replicas_per_master, 2);
        assert_eq!(plan.total_shard_count, 3);
        assert_eq!(plan.shards.len(), 3);
        assert_eq!(plan.shards[2], ShardMetricNames::classic(2));
    }

    #[test]
    fn test_plan_pooled() {
        let plan = ClusterRowBuilder::default()
            .plan(&pooled("Enterprise_E10", 8))
            .unwrap()
            .unwrap();
        assert_eq!(plan.sku_capacity_label, "E10-Capacity8");
        assert_eq!(plan.sku_family_label, "Enterprise");
        assert_eq!(plan.replicas_per_master, 1);
        assert_eq!(plan.total_shard_count, 6);
        assert_eq!(plan.shards, vec![ShardMetricNames::pooled()]);
    }

    #[test]
    fn test_plan_pooled_invalid_capacity() {
        let err = ClusterRowBuilder::default()
            .plan(&pooled("Enterprise_E10", 1))
            .unwrap_err();
        assert!(matches!(err, RowBuildError::Capacity(_)));
    }

    #[test]
    fn test_plan_unknown_tier() {
        let err = ClusterRowBuilder::default()
            .plan(&classic("Gold", None, None))
            .unwrap_err();
        assert!(matches!(err, RowBuildError::Tier(_)));
    }

    #[test]
    fn test_plan_malformed_resource_id() {
        let mut cluster = classic("Standard", None, None);
        cluster.resource_id = "orders".to_string();
        let err = ClusterRowBuilder::default().plan(&cluster).unwrap_err();
        assert_eq!(err, RowBuildError::MalformedResourceId("orders".to_string()));
    }

    #[test]
    fn test_plan_skips_uncovered_clusters() {
        let builder = ClusterRowBuilder::default();

        let mut other = classic("Premium", Some(2), None);
        other.family = ClusterFamily::Unrecognized("Microsoft.Cache/somethingElse".to_string());
        assert_eq!(builder.plan(&other).unwrap(), None);

        assert_eq!(builder.plan(&pooled("Balanced_B10", 2)).unwrap(), None);
    }

    #[tokio::test]
    async fn test_build_rows_classic_two_shards() {
        let source = Arc::new(ConstantSource::new(50.0, 200e6));
        let reducer = reducer(source.clone());

        let rows = ClusterRowBuilder::default()
            .build_rows("sub-1", &classic("Premium", Some(2), Some(2)), &reducer)
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        for (index, row) in rows.iter().enumerate() {
            assert_eq!(row.shard_index, index as u32);
            assert_eq!(row.subscription_id, "sub-1");
            assert_eq!(row.replicas_per_master, 2);
            assert_eq!(row.total_shard_count, 2);
            assert_eq!(row.ops_per_second, 50.0);
            assert_eq!(row.used_memory_mb, 190.73);
            assert_eq!(row.max_connections, 200e6);
        }

        let mut requested = source.requested.lock().unwrap().clone();
        requested.sort();
        assert_eq!(
            requested,
            vec![
                "operationspersecond0",
                "operationspersecond1",
                "usedmemory0,connectedclients0",
                "usedmemory1,connectedclients1",
            ]
        );
    }

    #[tokio::test]
    async fn test_build_rows_pooled_unqualified_names() {
        let source = Arc::new(ConstantSource::new(123.6, 104_857_600.0));
        let reducer = reducer(source.clone());

        let rows = ClusterRowBuilder::default()
            .build_rows("sub-1", &pooled("Enterprise_E20", 4), &reducer)
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].shard_index, 0);
        assert_eq!(rows[0].total_shard_count, 6);
        assert_eq!(rows[0].ops_per_second, 124.0);
        assert_eq!(rows[0].used_memory_mb, 100.0);

        let requested = source.requested.lock().unwrap();
        assert!(requested.contains(&"operationspersecond".to_string()));
        assert!(requested.contains(&"usedmemory,connectedclients".to_string()));
    }

    #[tokio::test]
    async fn test_build_rows_unrecognized_is_empty() {
        let source = Arc::new(ConstantSource::new(1.0, 1.0));
        let reducer = reducer(source.clone());

        let mut cluster = classic("Premium", Some(2), None);
        cluster.family = ClusterFamily::Unrecognized("Microsoft.Cache/other".to_string());

        let rows = ClusterRowBuilder::default()
            .build_rows("sub-1", &cluster, &reducer)
            .await
            .unwrap();
        assert!(rows.is_empty());
        assert!(source.requested.lock().unwrap().is_empty());
    }
}
