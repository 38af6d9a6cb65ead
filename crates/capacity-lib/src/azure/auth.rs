//! Bearer token acquisition for Resource Manager calls

use crate::error::EnumerationError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Audience for Resource Manager tokens
pub const MANAGEMENT_RESOURCE: &str = "https://management.azure.com/";

/// Tokens closer than this to expiry are refreshed
const REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Source of bearer tokens
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<String, EnumerationError>;
}

/// A fixed token supplied through configuration
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<String, EnumerationError> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct CliToken {
    #[serde(rename = "accessToken")]
    access_token: String,
    /// Expiry as unix seconds; older CLI versions omit it
    #[serde(default)]
    expires_on: Option<i64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_on: Option<i64>,
}

impl CachedToken {
    fn is_fresh(&self, now: i64) -> bool {
        match self.expires_on {
            Some(expires_on) => expires_on - REFRESH_MARGIN.as_secs() as i64 > now,
            None => true,
        }
    }
}

/// Tokens from the locally signed-in Azure CLI, cached until near expiry
pub struct AzureCliToken {
    program: String,
    cached: RwLock<Option<CachedToken>>,
}

impl Default for AzureCliToken {
    fn default() -> Self {
        Self::new()
    }
}

impl AzureCliToken {
    pub fn new() -> Self {
        Self::with_program("az")
    }

    /// Use a specific CLI executable
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            cached: RwLock::new(None),
        }
    }

    async fn fetch(&self) -> Result<CachedToken, EnumerationError> {
        debug!(program = %self.program, "Requesting access token from Azure CLI");

        let output = Command::new(&self.program)
            .args([
                "account",
                "get-access-token",
                "--resource",
                MANAGEMENT_RESOURCE,
                "--output",
                "json",
            ])
            .output()
            .await
            .map_err(|e| {
                EnumerationError::Credentials(format!("failed to run {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            return Err(EnumerationError::Credentials(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let parsed = parse_cli_token(&output.stdout)?;
        info!(expires_on = ?parsed.expires_on, "Acquired access token from Azure CLI");
        Ok(parsed)
    }
}

fn parse_cli_token(stdout: &[u8]) -> Result<CachedToken, EnumerationError> {
    let token: CliToken = serde_json::from_slice(stdout).map_err(|e| {
        EnumerationError::Credentials(format!("unexpected Azure CLI output: {}", e))
    })?;
    Ok(CachedToken {
        token: token.access_token,
        expires_on: token.expires_on,
    })
}

#[async_trait]
impl TokenSource for AzureCliToken {
    async fn token(&self) -> Result<String, EnumerationError> {
        let now = chrono::Utc::now().timestamp();

        if let Some(cached) = self.cached.read().await.as_ref() {
            if cached.is_fresh(now) {
                return Ok(cached.token.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // another caller may have refreshed while we waited for the lock
        if let Some(current) = cached.as_ref() {
            if current.is_fresh(now) {
                return Ok(current.token.clone());
            }
        }

        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}
