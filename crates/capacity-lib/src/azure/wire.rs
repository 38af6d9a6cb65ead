//! Resource Manager response payloads

use crate::models::{Cluster, ClusterFamily, MetricSeries, Sku, Subscription, TimeSeriesElement};
use serde::{Deserialize, Deserializer};

/// One page of a list operation
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "nextLink", default)]
    pub next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionResource {
    #[serde(rename = "subscriptionId")]
    pub subscription_id: String,
}

impl From<SubscriptionResource> for Subscription {
    fn from(resource: SubscriptionResource) -> Self {
        Subscription::new(resource.subscription_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct SkuResource {
    pub name: String,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub capacity: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CacheProperties {
    #[serde(rename = "shardCount", default, deserialize_with = "lenient_count")]
    pub shard_count: Option<u32>,
    #[serde(rename = "replicasPerMaster", default, deserialize_with = "lenient_count")]
    pub replicas_per_master: Option<u32>,
}

/// A classic or pooled cache resource
#[derive(Debug, Deserialize)]
pub struct CacheResource {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub sku: SkuResource,
    #[serde(default)]
    pub properties: CacheProperties,
}

impl From<CacheResource> for Cluster {
    fn from(resource: CacheResource) -> Self {
        Cluster {
            family: ClusterFamily::from_resource_type(&resource.resource_type),
            resource_id: resource.id,
            name: resource.name,
            location: resource.location,
            sku: Sku {
                name: resource.sku.name,
                family: resource.sku.family,
                capacity: resource.sku.capacity.unwrap_or(0),
            },
            declared_shard_count: resource.properties.shard_count,
            declared_replicas_per_master: resource.properties.replicas_per_master,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LocalizableString {
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct MetricResource {
    pub name: LocalizableString,
    #[serde(default)]
    pub timeseries: Vec<TimeSeriesElement>,
}

impl From<MetricResource> for MetricSeries {
    fn from(resource: MetricResource) -> Self {
        MetricSeries {
            name: resource.name.value,
            timeseries: resource.timeseries,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MetricsResponse {
    #[serde(default)]
    pub value: Vec<MetricResource>,
}

/// Counts arrive as numbers, numeric strings, empty strings or null
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
