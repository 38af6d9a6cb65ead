//! Capacity report library for cache cluster fleets
//!
//! This crate provides the core functionality for:
//! - SKU capacity resolution from a static table
//! - Shard topology expansion per cluster family
//! - Windowed metric reduction with bounded concurrency
//! - Row building and fleet-wide report assembly
//! - Resource Manager enumeration and metric clients

pub mod azure;
pub mod capacity;
pub mod error;
pub mod metrics;
pub mod models;
pub mod observability;
pub mod report;
pub mod topology;

pub use capacity::SkuCapacityResolver;
pub use error::{
    AssemblyError, CapacityResolutionError, EnumerationError, MetricQueryError, RowBuildError,
    UnknownSkuTierError,
};
pub use metrics::{MetricSource, MetricWindowReducer, ReducerConfig, ReductionKind};
pub use models::*;
pub use observability::{ReportMetrics, RunLogger};
pub use report::{
    AssemblerConfig, ClusterRowBuilder, FleetInventory, FleetReportAssembler, MetricSourceFactory,
};
pub use topology::ShardTopologyExpander;
