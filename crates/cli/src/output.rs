//! Report file and terminal output

use anyhow::{Context, Result};
use capacity_lib::{FleetReport, ReportRow, SkippedCluster};
use colored::Colorize;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};

/// Name of the workbook written into the output directory
pub const REPORT_FILE_NAME: &str = "AzureStats.xlsx";

/// Worksheet holding one row per shard
pub const REPORT_SHEET_NAME: &str = "ClusterData";

/// Write the report rows, under a header line, into `out_dir`.
///
/// The header is written even when there are no rows.
pub async fn write_report(out_dir: &Path, rows: &[ReportRow]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;

    let buffer = render_workbook(rows).context("Failed to render report workbook")?;

    let path = out_dir.join(REPORT_FILE_NAME);
    tokio::fs::write(&path, buffer)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(path)
}

fn render_workbook(rows: &[ReportRow]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let sheet = workbook.add_worksheet();
    sheet.set_name(REPORT_SHEET_NAME)?;

    for (col, title) in ReportRow::COLUMNS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write_string(r, 0, &row.subscription_id)?;
        sheet.write_string(r, 1, &row.resource_group)?;
        sheet.write_string(r, 2, &row.region)?;
        sheet.write_string(r, 3, &row.cluster_name)?;
        sheet.write_string(r, 4, &row.sku_capacity_label)?;
        sheet.write_string(r, 5, &row.sku_family_label)?;
        sheet.write_number(r, 6, row.replicas_per_master)?;
        sheet.write_number(r, 7, row.total_shard_count)?;
        sheet.write_number(r, 8, row.shard_index)?;
        sheet.write_number(r, 9, row.ops_per_second)?;
        sheet.write_number(r, 10, row.used_memory_mb)?;
        sheet.write_number(r, 11, row.max_connections)?;
    }

    workbook.save_to_buffer()
}

#[derive(Tabled)]
struct SkippedRow {
    #[tabled(rename = "Subscription")]
    subscription_id: String,
    #[tabled(rename = "Cluster")]
    resource_id: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

impl From<&SkippedCluster> for SkippedRow {
    fn from(skipped: &SkippedCluster) -> Self {
        Self {
            subscription_id: skipped.subscription_id.clone(),
            resource_id: skipped.resource_id.clone(),
            reason: skipped.reason.clone(),
        }
    }
}

/// Render skipped clusters as a table
fn skipped_table(skipped: &[SkippedCluster]) -> String {
    let rows: Vec<SkippedRow> = skipped.iter().map(SkippedRow::from).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print the end-of-run summary
pub fn print_summary(report: &FleetReport, path: &Path) {
    print_success(&format!(
        "Wrote {} rows for {} clusters to {}",
        report.rows.len(),
        report.clusters_processed,
        path.display()
    ));

    if report.skipped.is_empty() {
        return;
    }

    print_warning(&format!("Skipped {} clusters", report.skipped.len()));
    println!("{}", skipped_table(&report.skipped));
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}
