//! Run configuration, read from `CACHE_CAPACITY_*` environment variables

use anyhow::{Context, Result};
use capacity_lib::azure::{ArmClientConfig, DEFAULT_MANAGEMENT_ENDPOINT};
use capacity_lib::metrics::{DEFAULT_GRANULARITY, DEFAULT_WINDOW_DAYS};
use capacity_lib::{AssemblerConfig, ReducerConfig};
use serde::Deserialize;
use std::time::Duration;

const ENV_PREFIX: &str = "CACHE_CAPACITY";

/// Longest accepted history window, ten years
const MAX_WINDOW_DAYS: u32 = 3650;

/// Report run configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// Days of history to reduce over
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Metric bucket size (ISO-8601 duration)
    #[serde(default = "default_granularity")]
    pub granularity: String,

    /// Metric queries in flight per subscription
    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,

    /// Per-attempt metric query timeout in seconds
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    /// Retries after the first failed metric query attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Resource Manager endpoint
    #[serde(default = "default_management_endpoint")]
    pub management_endpoint: String,

    /// Bearer token; the Azure CLI is asked for one when unset
    #[serde(default)]
    pub access_token: Option<String>,

    /// Abort on the first cluster that cannot be reported
    #[serde(default)]
    pub strict: bool,
}

fn default_window_days() -> u32 {
    DEFAULT_WINDOW_DAYS
}

fn default_granularity() -> String {
    DEFAULT_GRANULARITY.to_string()
}

fn default_max_concurrent_queries() -> usize {
    4
}

fn default_query_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    10_000
}

fn default_management_endpoint() -> String {
    DEFAULT_MANAGEMENT_ENDPOINT.to_string()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            granularity: default_granularity(),
            max_concurrent_queries: default_max_concurrent_queries(),
            query_timeout_secs: default_query_timeout(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            management_endpoint: default_management_endpoint(),
            access_token: None,
            strict: false,
        }
    }
}

impl ReportConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix(ENV_PREFIX))
    }

    fn from_source(environment: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(environment.try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        let loaded: Self = config
            .try_deserialize()
            .context("Invalid CACHE_CAPACITY_* configuration")?;
        loaded.validate()?;
        Ok(loaded)
    }

    fn validate(&self) -> Result<()> {
        if self.window_days == 0 || self.window_days > MAX_WINDOW_DAYS {
            anyhow::bail!(
                "window_days must be between 1 and {}, got {}",
                MAX_WINDOW_DAYS,
                self.window_days
            );
        }
        if self.max_concurrent_queries == 0 {
            anyhow::bail!("max_concurrent_queries must be at least 1");
        }
        Ok(())
    }

    pub fn reducer(&self) -> ReducerConfig {
        ReducerConfig {
            window_days: self.window_days,
            granularity: self.granularity.clone(),
            max_concurrent_queries: self.max_concurrent_queries,
            query_timeout: Duration::from_secs(self.query_timeout_secs),
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }

    pub fn assembler(&self) -> AssemblerConfig {
        AssemblerConfig {
            reducer: self.reducer(),
            strict: self.strict,
        }
    }

    pub fn arm_client(&self) -> ArmClientConfig {
        ArmClientConfig {
            endpoint: self.management_endpoint.clone(),
            ..ArmClientConfig::default()
        }
    }
}
