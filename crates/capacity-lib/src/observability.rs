//! Observability for report runs
//!
//! Provides:
//! - Prometheus run metrics (query latency, retries, failures, cluster and row counts)
//! - Structured JSON logging of run events with tracing

use prometheus::{register_histogram, register_int_counter, Histogram, IntCounter};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for metric query latency (in seconds)
const QUERY_LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ReportMetricsInner> = OnceLock::new();

struct ReportMetricsInner {
    query_latency_seconds: Histogram,
    metric_queries: IntCounter,
    metric_query_retries: IntCounter,
    metric_query_failures: IntCounter,
    clusters_processed: IntCounter,
    clusters_skipped: IntCounter,
    rows_emitted: IntCounter,
}

impl ReportMetricsInner {
    fn new() -> Self {
        Self {
            query_latency_seconds: register_histogram!(
                "cache_capacity_query_latency_seconds",
                "Time spent on a single metric query attempt",
                QUERY_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register query_latency_seconds"),

            metric_queries: register_int_counter!(
                "cache_capacity_metric_queries_total",
                "Metric queries issued, retries excluded"
            )
            .expect("Failed to register metric_queries"),

            metric_query_retries: register_int_counter!(
                "cache_capacity_metric_query_retries_total",
                "Metric query attempts repeated after a transient failure"
            )
            .expect("Failed to register metric_query_retries"),

            metric_query_failures: register_int_counter!(
                "cache_capacity_metric_query_failures_total",
                "Metric queries that failed and were reported as zero"
            )
            .expect("Failed to register metric_query_failures"),

            clusters_processed: register_int_counter!(
                "cache_capacity_clusters_processed_total",
                "Clusters that contributed rows to the report"
            )
            .expect("Failed to register clusters_processed"),

            clusters_skipped: register_int_counter!(
                "cache_capacity_clusters_skipped_total",
                "Clusters left out of the report after a resolution error"
            )
            .expect("Failed to register clusters_skipped"),

            rows_emitted: register_int_counter!(
                "cache_capacity_rows_emitted_total",
                "Report rows produced"
            )
            .expect("Failed to register rows_emitted"),
        }
    }
}

/// Handle to the global run metrics.
///
/// Clones share the same underlying Prometheus metrics.
#[derive(Clone)]
pub struct ReportMetrics {
    _private: (),
}

impl Default for ReportMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the run counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub metric_queries: u64,
    pub metric_query_retries: u64,
    pub metric_query_failures: u64,
    pub clusters_processed: u64,
    pub clusters_skipped: u64,
    pub rows_emitted: u64,
}

impl ReportMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ReportMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ReportMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_query_latency(&self, duration_secs: f64) {
        self.inner().query_latency_seconds.observe(duration_secs);
    }

    pub fn inc_metric_queries(&self) {
        self.inner().metric_queries.inc();
    }

    pub fn inc_query_retries(&self) {
        self.inner().metric_query_retries.inc();
    }

    pub fn inc_query_failures(&self) {
        self.inner().metric_query_failures.inc();
    }

    pub fn inc_clusters_processed(&self) {
        self.inner().clusters_processed.inc();
    }

    pub fn inc_clusters_skipped(&self) {
        self.inner().clusters_skipped.inc();
    }

    pub fn add_rows_emitted(&self, rows: u64) {
        self.inner().rows_emitted.inc_by(rows);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner();
        MetricsSnapshot {
            metric_queries: inner.metric_queries.get(),
            metric_query_retries: inner.metric_query_retries.get(),
            metric_query_failures: inner.metric_query_failures.get(),
            clusters_processed: inner.clusters_processed.get(),
            clusters_skipped: inner.clusters_skipped.get(),
            rows_emitted: inner.rows_emitted.get(),
        }
    }
}

/// Structured logger for run events
#[derive(Clone)]
pub struct RunLogger {
    run_id: String,
}

impl RunLogger {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log_run_started(&self, version: &str, window_days: u32, include_pooled: bool) {
        info!(
            event = "run_started",
            run_id = %self.run_id,
            version = %version,
            window_days = window_days,
            include_pooled = include_pooled,
            "Capacity report run started"
        );
    }

    pub fn log_subscription(&self, subscription_id: &str, clusters: usize) {
        info!(
            event = "subscription_enumerated",
            run_id = %self.run_id,
            subscription_id = %subscription_id,
            clusters = clusters,
            "Gathering cluster metrics for subscription"
        );
    }

    pub fn log_cluster_skipped(&self, subscription_id: &str, resource_id: &str, reason: &str) {
        warn!(
            event = "cluster_skipped",
            run_id = %self.run_id,
            subscription_id = %subscription_id,
            resource_id = %resource_id,
            reason = %reason,
            "Cluster left out of the report"
        );
    }

    pub fn log_metric_query_failed(
        &self,
        resource_id: &str,
        metric_names: &str,
        attempts: u32,
        error: &str,
    ) {
        warn!(
            event = "metric_query_failed",
            run_id = %self.run_id,
            resource_id = %resource_id,
            metric_names = %metric_names,
            attempts = attempts,
            error = %error,
            "Metric query failed, reporting zero"
        );
    }

    pub fn log_run_completed(&self, rows: usize, snapshot: &MetricsSnapshot) {
        info!(
            event = "run_completed",
            run_id = %self.run_id,
            rows = rows,
            metric_queries = snapshot.metric_queries,
            metric_query_retries = snapshot.metric_query_retries,
            metric_query_failures = snapshot.metric_query_failures,
            clusters_processed = snapshot.clusters_processed,
            clusters_skipped = snapshot.clusters_skipped,
            "Capacity report run completed"
        );
    }
}
