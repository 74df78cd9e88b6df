use spendsync_core::SyncReport;

use crate::commands::common::{open_engine, AppPaths};
use crate::error::CliError;

pub async fn run_sync(as_json: bool, paths: &AppPaths) -> Result<(), CliError> {
    let engine = open_engine(paths).await?;
    if engine.gateway().base_url().is_none() {
        return Err(CliError::ServerNotConfigured);
    }

    let report = engine.run_pass().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in format_sync_report(&report) {
        println!("{line}");
    }
    Ok(())
}

pub fn format_sync_report(report: &SyncReport) -> Vec<String> {
    if report.skipped {
        return vec!["Another sync is already running.".to_string()];
    }

    let mut lines = vec![format!(
        "Sync completed: {} synced, {} failed, {} held back",
        report.synced.len(),
        report.failed.len(),
        report.parked.len()
    )];
    lines.extend(
        report
            .synced
            .iter()
            .map(|expense| format!("  synced  {}  {}", expense.id, expense.expense.name)),
    );
    lines.extend(report.failed.iter().map(|id| format!("  failed  {id}")));
    lines.extend(report.parked.iter().map(|id| format!("  held    {id}")));
    lines
}
