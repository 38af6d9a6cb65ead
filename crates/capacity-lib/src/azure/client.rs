//! Resource Manager REST client
//!
//! Implements the fleet enumeration and metric query capabilities on top
//! of plain HTTPS calls against the management endpoint.

use super::auth::TokenSource;
use super::wire::{CacheResource, MetricsResponse, Page, SubscriptionResource};
use crate::error::{EnumerationError, MetricQueryError};
use crate::metrics::{MetricQuery, MetricSource};
use crate::models::{Cluster, MetricSeries, Subscription};
use crate::report::{FleetInventory, MetricSourceFactory};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

const SUBSCRIPTIONS_API_VERSION: &str = "2020-01-01";
const CLASSIC_API_VERSION: &str = "2023-08-01";
const POOLED_API_VERSION: &str = "2023-11-01";
const METRICS_API_VERSION: &str = "2018-01-01";

/// Guards against a misbehaving `nextLink` chain
const MAX_PAGES: usize = 1000;

/// Configuration for the Resource Manager client
#[derive(Debug, Clone)]
pub struct ArmClientConfig {
    /// Management endpoint base URL
    pub endpoint: String,
    /// HTTP request timeout
    pub request_timeout: Duration,
}

impl Default for ArmClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_MANAGEMENT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Client for the Resource Manager API
#[derive(Clone)]
pub struct ArmClient {
    client: Client,
    base_url: Url,
    tokens: Arc<dyn TokenSource>,
}

impl ArmClient {
    /// Create a new client
    pub fn new(config: ArmClientConfig, tokens: Arc<dyn TokenSource>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(&config.endpoint)
            .with_context(|| format!("Invalid management endpoint: {}", config.endpoint))?;

        Ok(Self {
            client,
            base_url,
            tokens,
        })
    }

    fn url(&self, path: &str, api_version: &str) -> Result<Url, MetricQueryError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| MetricQueryError::Transport(format!("invalid path {}: {}", path, e)))?;
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url)
    }

    /// GET a JSON document with the current bearer token
    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, MetricQueryError> {
        let token = self
            .tokens
            .token()
            .await
            .map_err(|e| MetricQueryError::Auth(e.to_string()))?;

        debug!(url = %url, "Resource Manager request");

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    MetricQueryError::Auth(format!("{}: {}", status, body))
                }
                _ => MetricQueryError::Http {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        response
            .json()
            .await
            .map_err(|e| MetricQueryError::Decode(e.to_string()))
    }

    /// Follow `nextLink` until the listing is exhausted
    async fn get_all<T: DeserializeOwned>(&self, first: Url) -> Result<Vec<T>, MetricQueryError> {
        let mut items = Vec::new();
        let mut next = Some(first);
        let mut pages = 0;

        while let Some(url) = next.take() {
            pages += 1;
            if pages > MAX_PAGES {
                return Err(MetricQueryError::Decode(format!(
                    "listing exceeded {} pages",
                    MAX_PAGES
                )));
            }

            let page: Page<T> = self.get(url).await?;
            items.extend(page.value);
            next = match page.next_link.filter(|link| !link.is_empty()) {
                Some(link) => Some(Url::parse(&link).map_err(|e| {
                    MetricQueryError::Decode(format!("invalid nextLink {}: {}", link, e))
                })?),
                None => None,
            };
        }

        Ok(items)
    }

    async fn list_caches(
        &self,
        subscription_id: &str,
        provider_type: &str,
        api_version: &str,
    ) -> Result<Vec<Cluster>, MetricQueryError> {
        let url = self.url(
            &format!(
                "/subscriptions/{}/providers/{}",
                subscription_id, provider_type
            ),
            api_version,
        )?;
        let resources: Vec<CacheResource> = self.get_all(url).await?;
        Ok(resources.into_iter().map(Cluster::from).collect())
    }

    /// Query the metrics endpoint of one resource
    pub async fn metrics(&self, query: &MetricQuery) -> Result<Vec<MetricSeries>, MetricQueryError> {
        let mut url = self.url(
            &format!("{}/providers/Microsoft.Insights/metrics", query.resource_id),
            METRICS_API_VERSION,
        )?;
        url.query_pairs_mut()
            .append_pair("metricnames", &query.metric_names)
            .append_pair("timespan", &query.timespan)
            .append_pair("interval", &query.interval)
            .append_pair("aggregation", query.aggregation.as_str());

        let response: MetricsResponse = self.get(url).await?;
        Ok(response.value.into_iter().map(MetricSeries::from).collect())
    }
}

fn transport_error(e: reqwest::Error) -> MetricQueryError {
    if e.is_timeout() {
        MetricQueryError::Timeout(0)
    } else {
        MetricQueryError::Transport(e.to_string())
    }
}

#[async_trait]
impl FleetInventory for ArmClient {
    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, EnumerationError> {
        let url = self
            .url("/subscriptions", SUBSCRIPTIONS_API_VERSION)
            .map_err(|e| EnumerationError::Subscriptions(e.to_string()))?;
        let resources: Vec<SubscriptionResource> = self
            .get_all(url)
            .await
            .map_err(|e| EnumerationError::Subscriptions(e.to_string()))?;
        Ok(resources.into_iter().map(Subscription::from).collect())
    }

    async fn list_clusters(
        &self,
        subscription_id: &str,
        include_pooled: bool,
    ) -> Result<Vec<Cluster>, EnumerationError> {
        let cluster_error = |e: MetricQueryError| EnumerationError::Clusters {
            subscription_id: subscription_id.to_string(),
            message: e.to_string(),
        };

        let mut clusters = self
            .list_caches(subscription_id, "Microsoft.Cache/redis", CLASSIC_API_VERSION)
            .await
            .map_err(cluster_error)?;

        if include_pooled {
            let pooled = self
                .list_caches(
                    subscription_id,
                    "Microsoft.Cache/redisEnterprise",
                    POOLED_API_VERSION,
                )
                .await
                .map_err(cluster_error)?;
            clusters.extend(pooled);
        }

        Ok(clusters)
    }
}

/// Metric source bound to one subscription
pub struct SubscriptionMetrics {
    client: ArmClient,
    subscription_id: String,
}

impl SubscriptionMetrics {
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }
}

#[async_trait]
impl MetricSource for SubscriptionMetrics {
    async fn query_metrics(
        &self,
        query: &MetricQuery,
    ) -> Result<Vec<MetricSeries>, MetricQueryError> {
        self.client.metrics(query).await
    }
}

impl MetricSourceFactory for ArmClient {
    fn metric_source(
        &self,
        subscription_id: &str,
    ) -> Result<Arc<dyn MetricSource>, EnumerationError> {
        Ok(Arc::new(SubscriptionMetrics {
            client: self.clone(),
            subscription_id: subscription_id.to_string(),
        }))
    }
}
