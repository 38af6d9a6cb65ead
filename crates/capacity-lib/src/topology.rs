//! Shard topology and replica defaults per cluster family

use crate::capacity::SkuCapacityResolver;
use crate::error::UnknownSkuTierError;
use crate::models::{Cluster, ClusterFamily, ShardRef};

/// Expands a cluster into the shards that carry their own metric streams
#[derive(Debug, Clone, Copy, Default)]
pub struct ShardTopologyExpander;

impl ShardTopologyExpander {
    pub fn new() -> Self {
        Self
    }

    /// Number of metric-bearing shards.
    ///
    /// Classic clusters report an absent or zero shard count when they
    /// have exactly one shard. Pooled clusters expose a single stream no
    /// matter how many master shards back them.
    pub fn shard_count(&self, cluster: &Cluster) -> u32 {
        match cluster.family {
            ClusterFamily::Classic => match cluster.declared_shard_count {
                Some(count) if count > 0 => count,
                _ => 1,
            },
            ClusterFamily::Pooled => 1,
            ClusterFamily::Unrecognized(_) => 0,
        }
    }

    /// One shard reference per shard, ascending index
    pub fn expand(&self, cluster: &Cluster) -> Vec<ShardRef> {
        (0..self.shard_count(cluster))
            .map(|shard_index| ShardRef {
                cluster_id: cluster.resource_id.clone(),
                shard_index,
            })
            .collect()
    }
}

/// Replica tiers that drive the replicas-per-master default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaTier {
    Basic,
    Standard,
    Premium,
    Enterprise,
}

impl ReplicaTier {
    /// Classify a cluster's SKU name; pooled tiers must be known to the
    /// capacity table
    pub fn classify(
        family: &ClusterFamily,
        sku_name: &str,
        resolver: &SkuCapacityResolver,
    ) -> Result<Self, UnknownSkuTierError> {
        match family {
            ClusterFamily::Classic => match sku_name {
                "Basic" => Ok(ReplicaTier::Basic),
                "Standard" => Ok(ReplicaTier::Standard),
                "Premium" => Ok(ReplicaTier::Premium),
                _ => Err(UnknownSkuTierError {
                    family: "classic",
                    sku_name: sku_name.to_string(),
                }),
            },
            ClusterFamily::Pooled if resolver.knows_family(sku_name) => Ok(ReplicaTier::Enterprise),
            ClusterFamily::Pooled => Err(UnknownSkuTierError {
                family: "pooled",
                sku_name: sku_name.to_string(),
            }),
            ClusterFamily::Unrecognized(_) => Err(UnknownSkuTierError {
                family: "unrecognized",
                sku_name: sku_name.to_string(),
            }),
        }
    }

    /// Replicas per master, falling back where the API omits the value
    pub fn replicas_per_master(&self, declared: Option<u32>) -> u32 {
        match self {
            ReplicaTier::Basic => 0,
            ReplicaTier::Standard => 1,
            ReplicaTier::Premium => match declared {
                Some(replicas) if replicas > 0 => replicas,
                _ => 1,
            },
            ReplicaTier::Enterprise => 1,
        }
    }
}

/// Replicas per master for a cluster
pub fn resolve_replicas_per_master(
    cluster: &Cluster,
    resolver: &SkuCapacityResolver,
) -> Result<u32, UnknownSkuTierError> {
    let tier = ReplicaTier::classify(&cluster.family, &cluster.sku.name, resolver)?;
    Ok(tier.replicas_per_master(cluster.declared_replicas_per_master))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sku;

    fn cluster(family: ClusterFamily, sku_name: &str, shards: Option<u32>) -> Cluster {
        Cluster {
            resource_id: "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Cache/Redis/c"
                .to_string(),
            name: "c".to_string(),
            location: "eastus".to_string(),
            family,
            sku: Sku {
                name: sku_name.to_string(),
                family: Some("P".to_string()),
                capacity: 8,
            },
            declared_shard_count: shards,
            declared_replicas_per_master: None,
        }
    }

    #[test]
    fn test_classic_absent_shard_count() {
        let shards = ShardTopologyExpander::new().expand(&cluster(ClusterFamily::Classic, "Premium", None));
        assert_eq!(shards.len(), 1);
        assert_eq!(shards[0].shard_index, 0);
    }

    #[test]
    fn test_classic_zero_shard_count() {
        let shards =
            ShardTopologyExpander::new().expand(&cluster(ClusterFamily::Classic, "Premium", Some(0)));
        assert_eq!(shards.len(), 1);
        assert_eq!(shards[0].shard_index, 0);
    }

    #[test]
    fn test_classic_declared_shards_ascending() {
        let c = cluster(ClusterFamily::Classic, "Premium", Some(4));
        let shards = ShardTopologyExpander::new().expand(&c);
        let indices: Vec<u32> = shards.iter().map(|s| s.shard_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert!(shards.iter().all(|s| s.cluster_id == c.resource_id));
    }

    #[test]
    fn test_pooled_single_shard() {
        // capacity 8 on E10 means 6 master shards, still one stream
        let shards = ShardTopologyExpander::new()
            .expand(&cluster(ClusterFamily::Pooled, "Enterprise_E10", Some(6)));
        assert_eq!(shards.len(), 1);
        assert_eq!(shards[0].shard_index, 0);
    }

    #[test]
    fn test_unrecognized_has_no_shards() {
        let shards = ShardTopologyExpander::new().expand(&cluster(
            ClusterFamily::Unrecognized("Microsoft.Cache/other".to_string()),
            "Premium",
            Some(3),
        ));
        assert!(shards.is_empty());
    }

    #[test]
    fn test_replica_defaults() {
        let resolver = SkuCapacityResolver::default();

        let basic = cluster(ClusterFamily::Classic, "Basic", None);
        assert_eq!(resolve_replicas_per_master(&basic, &resolver).unwrap(), 0);

        let standard = cluster(ClusterFamily::Classic, "Standard", None);
        assert_eq!(resolve_replicas_per_master(&standard, &resolver).unwrap(), 1);

        let mut premium = cluster(ClusterFamily::Classic, "Premium", None);
        premium.declared_replicas_per_master = Some(0);
        assert_eq!(resolve_replicas_per_master(&premium, &resolver).unwrap(), 1);

        premium.declared_replicas_per_master = Some(3);
        assert_eq!(resolve_replicas_per_master(&premium, &resolver).unwrap(), 3);

        let mut pooled = cluster(ClusterFamily::Pooled, "Enterprise_E20", None);
        pooled.declared_replicas_per_master = Some(4);
        assert_eq!(resolve_replicas_per_master(&pooled, &resolver).unwrap(), 1);
    }

    #[test]
    fn test_unknown_tier() {
        let resolver = SkuCapacityResolver::default();

        let err = resolve_replicas_per_master(&cluster(ClusterFamily::Classic, "Gold", None), &resolver)
            .unwrap_err();
        assert_eq!(err.sku_name, "Gold");
        assert_eq!(err.family, "classic");

        assert!(resolve_replicas_per_master(
            &cluster(ClusterFamily::Pooled, "Enterprise_E7", None),
            &resolver
        )
        .is_err());
    }
}
