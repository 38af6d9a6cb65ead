//! Cache fleet capacity report
//!
//! Enumerates every cache cluster visible to the signed-in identity,
//! reduces their recent metrics to peaks and writes one row per shard.

mod config;
mod output;

use anyhow::{Context, Result};
use capacity_lib::azure::{ArmClient, AzureCliToken, StaticToken, TokenSource};
use capacity_lib::{FleetReportAssembler, ReportMetrics, RunLogger};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const REPORT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Cache fleet capacity report
#[derive(Parser)]
#[command(name = "cache-capacity")]
#[command(author, version, about = "Capacity report for cache cluster fleets", long_about = None)]
pub struct Cli {
    /// Directory the report is written to
    #[arg(short = 'd', long, value_name = "PATH", default_value = ".")]
    pub out_dir: PathBuf,

    /// Include pooled enterprise clusters
    #[arg(short = 'e', long, alias = "pullAcre")]
    pub pull_enterprise: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout only carries the summary
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    run(cli).await
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::ReportConfig::load()?;

    let tokens: Arc<dyn TokenSource> = match &config.access_token {
        Some(token) => Arc::new(StaticToken::new(token.clone())),
        None => Arc::new(AzureCliToken::new()),
    };
    let client = Arc::new(ArmClient::new(config.arm_client(), tokens)?);

    let logger = RunLogger::new(chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string());
    logger.log_run_started(REPORT_VERSION, config.window_days, cli.pull_enterprise);

    let assembler = FleetReportAssembler::new(
        client.clone(),
        client,
        config.assembler(),
        logger.clone(),
    );
    let report = assembler
        .assemble(cli.pull_enterprise)
        .await
        .context("Failed to assemble capacity report")?;

    let path = output::write_report(&cli.out_dir, &report.rows).await?;
    info!(path = %path.display(), rows = report.rows.len(), "Report written");

    logger.log_run_completed(report.rows.len(), &ReportMetrics::new().snapshot());
    output::print_summary(&report, &path);

    Ok(())
}
