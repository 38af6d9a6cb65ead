//! Windowed metric reduction with bounded concurrency and retries
//!
//! One reducer is built per subscription. It owns the semaphore that caps
//! in-flight queries against that subscription's metric source, so every
//! shard of every cluster in the subscription shares the same budget.

use super::{reduce_series, MetricQuery, MetricSource, MetricWindow, ReductionKind};
use super::{DEFAULT_GRANULARITY, DEFAULT_WINDOW_DAYS};
use crate::error::MetricQueryError;
use crate::models::MetricSeries;
use crate::observability::{ReportMetrics, RunLogger};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};
use tracing::debug;

/// Configuration for metric reduction
#[derive(Debug, Clone)]
pub struct ReducerConfig {
    /// Days of history before today
    pub window_days: u32,
    /// Bucket size (ISO-8601 duration)
    pub granularity: String,
    /// Maximum in-flight queries per metric source
    pub max_concurrent_queries: usize,
    /// Timeout for a single query attempt
    pub query_timeout: Duration,
    /// Retries after a transient failure
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_backoff: Duration,
    /// Upper bound for the retry delay
    pub max_backoff: Duration,
}

impl Default for ReducerConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            granularity: DEFAULT_GRANULARITY.to_string(),
            max_concurrent_queries: 4,
            query_timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

/// Reduces metric series from one metric source to scalars
pub struct MetricWindowReducer {
    source: Arc<dyn MetricSource>,
    config: ReducerConfig,
    permits: Arc<Semaphore>,
    metrics: ReportMetrics,
    logger: RunLogger,
}

impl MetricWindowReducer {
    pub fn new(source: Arc<dyn MetricSource>, config: ReducerConfig, logger: RunLogger) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_queries.max(1)));
        Self {
            source,
            config,
            permits,
            metrics: ReportMetrics::new(),
            logger,
        }
    }

    pub fn config(&self) -> &ReducerConfig {
        &self.config
    }

    /// Reduce a single metric; failures and missing data yield `0.0`
    pub async fn reduce(&self, resource_id: &str, metric_name: &str, kind: ReductionKind) -> f64 {
        self.reduce_many(resource_id, &[metric_name], kind)
            .await
            .into_iter()
            .next()
            .unwrap_or(0.0)
    }

    /// Reduce several metrics sharing one aggregation in a single request.
    ///
    /// Returns one value per requested name, matched to the response by
    /// series name (ASCII case-insensitive). Names the source did not
    /// answer for are `0.0`.
    pub async fn reduce_many(
        &self,
        resource_id: &str,
        metric_names: &[&str],
        kind: ReductionKind,
    ) -> Vec<f64> {
        if metric_names.is_empty() {
            return Vec::new();
        }

        let query = MetricQuery {
            resource_id: resource_id.to_string(),
            metric_names: metric_names.join(","),
            timespan: MetricWindow::current(self.config.window_days).timespan(),
            interval: self.config.granularity.clone(),
            aggregation: kind.aggregation(),
        };

        match self.fetch(&query).await {
            Ok(series) => metric_names
                .iter()
                .map(|name| {
                    series
                        .iter()
                        .find(|s| s.name.eq_ignore_ascii_case(name))
                        .map_or(0.0, |s| reduce_series(s, kind))
                })
                .collect(),
            Err((attempts, e)) => {
                self.metrics.inc_query_failures();
                self.logger.log_metric_query_failed(
                    resource_id,
                    &query.metric_names,
                    attempts,
                    &e.to_string(),
                );
                vec![0.0; metric_names.len()]
            }
        }
    }

    /// Run a query with a per-attempt timeout, retrying transient failures.
    /// On failure returns the attempt count along with the last error.
    async fn fetch(&self, query: &MetricQuery) -> Result<Vec<MetricSeries>, (u32, MetricQueryError)> {
        self.metrics.inc_metric_queries();

        let mut backoff = self.config.initial_backoff;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let result = self.attempt(query).await;

            match result {
                Ok(series) => return Ok(series),
                Err(e) if e.is_transient() && attempts <= self.config.max_retries => {
                    self.metrics.inc_query_retries();
                    debug!(
                        resource_id = %query.resource_id,
                        metric_names = %query.metric_names,
                        attempt = attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Transient metric query failure, retrying"
                    );
                    sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, self.config.max_backoff);
                }
                Err(e) => return Err((attempts, e)),
            }
        }
    }

    /// One query attempt holding a concurrency permit
    async fn attempt(&self, query: &MetricQuery) -> Result<Vec<MetricSeries>, MetricQueryError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| MetricQueryError::Transport("query limiter closed".to_string()))?;

        let start = Instant::now();
        let result = match timeout(self.config.query_timeout, self.source.query_metrics(query)).await
        {
            Ok(result) => result,
            Err(_) => Err(MetricQueryError::Timeout(
                self.config.query_timeout.as_millis() as u64,
            )),
        };
        self.metrics
            .observe_query_latency(start.elapsed().as_secs_f64());

        result
    }
}
