//! Static SKU capacity table
//!
//! Each pooled SKU family owns an ordered slice of rows. Row `n` describes
//! capacity unit `2 * (n + 1)`, so the row for a unit is found by position
//! rather than by key.

use crate::error::CapacityResolutionError;
use crate::models::CapacityProfile;

/// Rows for one SKU family, smallest capacity unit first
#[derive(Debug, Clone, Copy)]
pub struct FamilyCapacity {
    pub family: &'static str,
    pub rows: &'static [CapacityProfile],
}

const fn row(vcpus: u32, master_shard_count: u32) -> CapacityProfile {
    CapacityProfile {
        vcpus,
        master_shard_count,
    }
}

/// Enterprise capacity table, aligned by capacity unit 2, 4, 6, 8, 10
pub const ENTERPRISE_CAPACITY_TABLE: &[FamilyCapacity] = &[
    FamilyCapacity {
        family: "Enterprise_E1",
        rows: &[row(1, 1)],
    },
    FamilyCapacity {
        family: "Enterprise_E5",
        rows: &[row(2, 1), row(4, 2), row(6, 6)],
    },
    FamilyCapacity {
        family: "Enterprise_E10",
        rows: &[row(4, 2), row(8, 6), row(12, 6), row(16, 6), row(20, 30)],
    },
    FamilyCapacity {
        family: "Enterprise_E20",
        rows: &[row(4, 2), row(8, 6), row(12, 6), row(16, 30), row(20, 30)],
    },
    FamilyCapacity {
        family: "Enterprise_E50",
        rows: &[row(8, 6), row(16, 6), row(24, 6), row(32, 30), row(40, 30)],
    },
    FamilyCapacity {
        family: "Enterprise_E100",
        rows: &[row(16, 6), row(32, 30), row(48, 30), row(64, 30), row(80, 30)],
    },
    FamilyCapacity {
        family: "Enterprise_E200",
        rows: &[
            row(32, 30),
            row(64, 60),
            row(96, 60),
            row(128, 120),
            row(160, 120),
        ],
    },
    FamilyCapacity {
        family: "Enterprise_E400",
        rows: &[
            row(64, 60),
            row(128, 120),
            row(192, 120),
            row(256, 240),
            row(320, 240),
        ],
    },
];

/// Tier prefixes of the managed offering, which shares the pooled resource
/// type but is not described by the enterprise table
const MANAGED_TIER_PREFIXES: &[&str] = &[
    "GeneralPurpose_",
    "Balanced_",
    "MemoryOptimized_",
    "ComputeOptimized_",
    "FlashOptimized_",
];

/// Whether a pooled-type SKU belongs to the managed tier set
pub fn is_managed_tier_sku(sku_name: &str) -> bool {
    MANAGED_TIER_PREFIXES
        .iter()
        .any(|prefix| sku_name.starts_with(prefix))
}

/// Resolves (SKU family, capacity unit) to a capacity profile
#[derive(Debug, Clone, Copy)]
pub struct SkuCapacityResolver {
    table: &'static [FamilyCapacity],
}

impl Default for SkuCapacityResolver {
    fn default() -> Self {
        Self::new(ENTERPRISE_CAPACITY_TABLE)
    }
}

impl SkuCapacityResolver {
    pub fn new(table: &'static [FamilyCapacity]) -> Self {
        Self { table }
    }

    /// Whether the family has any row in the table
    pub fn knows_family(&self, family: &str) -> bool {
        self.rows_for(family).is_some()
    }

    fn rows_for(&self, family: &str) -> Option<&'static [CapacityProfile]> {
        self.table
            .iter()
            .find(|entry| entry.family == family)
            .map(|entry| entry.rows)
    }

    /// Look up the profile for a family and capacity unit.
    ///
    /// The unit must be an even number >= 2 whose index `unit / 2 - 1`
    /// falls inside the family's rows.
    pub fn resolve(
        &self,
        family: &str,
        capacity_unit: u32,
    ) -> Result<CapacityProfile, CapacityResolutionError> {
        let err = || CapacityResolutionError {
            family: family.to_string(),
            capacity_unit,
        };

        if capacity_unit % 2 != 0 {
            return Err(err());
        }
        let index = (capacity_unit / 2).checked_sub(1).ok_or_else(err)? as usize;

        self.rows_for(family)
            .and_then(|rows| rows.get(index))
            .copied()
            .ok_or_else(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_e10_capacity_8() {
        let resolver = SkuCapacityResolver::default();
        let profile = resolver.resolve("Enterprise_E10", 8).unwrap();
        assert_eq!(profile.vcpus, 16);
        assert_eq!(profile.master_shard_count, 6);
    }

    #[test]
    fn test_resolve_smallest_unit() {
        let resolver = SkuCapacityResolver::default();
        assert_eq!(resolver.resolve("Enterprise_E1", 2).unwrap(), row(1, 1));
        assert_eq!(resolver.resolve("Enterprise_E400", 10).unwrap(), row(320, 240));
    }

    #[test]
    fn test_resolve_odd_unit_fails() {
        let resolver = SkuCapacityResolver::default();
        let err = resolver.resolve("Enterprise_E10", 1).unwrap_err();
        assert_eq!(err.family, "Enterprise_E10");
        assert_eq!(err.capacity_unit, 1);

        assert!(resolver.resolve("Enterprise_E10", 3).is_err());
    }

    #[test]
    fn test_resolve_zero_unit_fails() {
        let resolver = SkuCapacityResolver::default();
        assert!(resolver.resolve("Enterprise_E10", 0).is_err());
    }

    #[test]
    fn test_resolve_past_last_row_fails() {
        let resolver = SkuCapacityResolver::default();
        assert!(resolver.resolve("Enterprise_E1", 4).is_err());
        assert!(resolver.resolve("Enterprise_E5", 8).is_err());
        assert!(resolver.resolve("Enterprise_E10", 12).is_err());
    }

    #[test]
    fn test_resolve_unknown_family_fails() {
        let resolver = SkuCapacityResolver::default();
        let err = resolver.resolve("Enterprise_E7", 2).unwrap_err();
        assert_eq!(err.family, "Enterprise_E7");
        assert!(!resolver.knows_family("Enterprise_E7"));
        assert!(resolver.knows_family("Enterprise_E20"));
    }

    #[test]
    fn test_table_shape() {
        for entry in ENTERPRISE_CAPACITY_TABLE {
            assert!(!entry.rows.is_empty(), "{} has no rows", entry.family);
            assert!(entry.rows.len() <= 5, "{} has too many rows", entry.family);
        }
    }

    #[test]
    fn test_managed_tier_skus() {
        assert!(is_managed_tier_sku("Balanced_B10"));
        assert!(is_managed_tier_sku("ComputeOptimized_X20"));
        assert!(is_managed_tier_sku("FlashOptimized_A250"));
        assert!(!is_managed_tier_sku("Enterprise_E10"));
        assert!(!is_managed_tier_sku("EnterpriseFlash_F300"));
    }
}
