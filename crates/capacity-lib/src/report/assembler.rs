//! Fleet-wide report assembly
//!
//! Walks subscriptions in enumeration order. Within a subscription every
//! cluster is planned up front, then all shards are collected concurrently
//! against one reducer, whose semaphore bounds the in-flight queries.
//! `join_all` keeps results in input order, so rows come out in
//! subscription, cluster, shard order.

use super::{ClusterPlan, ClusterRowBuilder, FleetInventory, MetricSourceFactory};
use crate::error::AssemblyError;
use crate::metrics::{MetricWindowReducer, ReducerConfig};
use crate::models::{FleetReport, SkippedCluster, Subscription};
use crate::observability::{ReportMetrics, RunLogger};
use futures::future::join_all;
use std::sync::Arc;
use tracing::debug;

/// Configuration for report assembly
#[derive(Debug, Clone, Default)]
pub struct AssemblerConfig {
    /// Metric reduction settings, applied per subscription
    pub reducer: ReducerConfig,
    /// Fail the run on the first cluster that cannot be reported
    pub strict: bool,
}

/// Assembles the fleet report from injected capabilities
pub struct FleetReportAssembler {
    inventory: Arc<dyn FleetInventory>,
    sources: Arc<dyn MetricSourceFactory>,
    builder: ClusterRowBuilder,
    config: AssemblerConfig,
    logger: RunLogger,
    metrics: ReportMetrics,
}

impl FleetReportAssembler {
    pub fn new(
        inventory: Arc<dyn FleetInventory>,
        sources: Arc<dyn MetricSourceFactory>,
        config: AssemblerConfig,
        logger: RunLogger,
    ) -> Self {
        Self {
            inventory,
            sources,
            builder: ClusterRowBuilder::default(),
            config,
            logger,
            metrics: ReportMetrics::new(),
        }
    }

    /// Replace the row builder (e.g. for a different capacity table)
    pub fn with_builder(mut self, builder: ClusterRowBuilder) -> Self {
        self.builder = builder;
        self
    }

    /// Run one pass over the fleet.
    ///
    /// Only enumeration failures abort the run, unless strict mode is on.
    pub async fn assemble(&self, include_pooled: bool) -> Result<FleetReport, AssemblyError> {
        let subscriptions = self.inventory.list_subscriptions().await?;
        let mut report = FleetReport::default();

        for subscription in &subscriptions {
            self.assemble_subscription(subscription, include_pooled, &mut report)
                .await?;
        }

        Ok(report)
    }

    async fn assemble_subscription(
        &self,
        subscription: &Subscription,
        include_pooled: bool,
        report: &mut FleetReport,
    ) -> Result<(), AssemblyError> {
        let subscription_id = subscription.subscription_id.as_str();
        let clusters = self
            .inventory
            .list_clusters(subscription_id, include_pooled)
            .await?;
        self.logger.log_subscription(subscription_id, clusters.len());

        let mut plans: Vec<ClusterPlan> = Vec::with_capacity(clusters.len());
        for cluster in &clusters {
            match self.builder.plan(cluster) {
                Ok(Some(plan)) => plans.push(plan),
                Ok(None) => {
                    debug!(
                        subscription_id = %subscription_id,
                        resource_id = %cluster.resource_id,
                        family = ?cluster.family,
                        sku = %cluster.sku.name,
                        "Cluster type not covered by the report, skipping"
                    );
                }
                Err(e) if self.config.strict => {
                    return Err(AssemblyError::RowBuild {
                        resource_id: cluster.resource_id.clone(),
                        source: e,
                    });
                }
                Err(e) => {
                    let reason = e.to_string();
                    self.logger
                        .log_cluster_skipped(subscription_id, &cluster.resource_id, &reason);
                    self.metrics.inc_clusters_skipped();
                    report.skipped.push(SkippedCluster {
                        subscription_id: subscription_id.to_string(),
                        resource_id: cluster.resource_id.clone(),
                        reason,
                    });
                }
            }
        }

        if plans.is_empty() {
            return Ok(());
        }

        let source = self.sources.metric_source(subscription_id)?;
        let reducer = MetricWindowReducer::new(source, self.config.reducer.clone(), self.logger.clone());

        let cluster_rows = join_all(
            plans
                .iter()
                .map(|plan| self.builder.collect(subscription_id, plan, &reducer)),
        )
        .await;

        for rows in cluster_rows {
            self.metrics.inc_clusters_processed();
            self.metrics.add_rows_emitted(rows.len() as u64);
            report.clusters_processed += 1;
            report.rows.extend(rows);
        }

        Ok(())
    }
}
