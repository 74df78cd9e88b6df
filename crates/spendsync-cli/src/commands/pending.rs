use chrono::Utc;

use crate::commands::common::{format_pending_lines, open_engine, pending_to_list_item, AppPaths};
use crate::error::CliError;

pub async fn run_pending(as_json: bool, paths: &AppPaths) -> Result<(), CliError> {
    let engine = open_engine(paths).await?;
    let pending = engine.list_pending_expenses().await;

    if as_json {
        let json_items = pending.iter().map(pending_to_list_item).collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if pending.is_empty() {
        println!("No expenses waiting to sync.");
        return Ok(());
    }

    for line in format_pending_lines(&pending, Utc::now().timestamp_millis()) {
        println!("{line}");
    }
    Ok(())
}
