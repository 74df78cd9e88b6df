use serde::Serialize;
use spendsync_core::gateway::RemoteGateway;

use crate::commands::common::{open_engine, AppPaths};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub server: Option<String>,
    pub online: bool,
    pub force_offline: bool,
    pub signed_in_as: Option<String>,
    pub pending: usize,
}

pub async fn run_status(as_json: bool, paths: &AppPaths) -> Result<(), CliError> {
    let engine = open_engine(paths).await?;
    let online = engine.is_online().await;

    let signed_in_as = if online {
        match engine.gateway().current_identity().await {
            Ok(identity) => identity.map(|identity| identity.username),
            Err(error) => {
                tracing::warn!("Identity check failed: {}", error);
                None
            }
        }
    } else {
        None
    };

    let status = StatusReport {
        server: engine.gateway().base_url().map(str::to_string),
        online,
        force_offline: engine.is_force_offline(),
        signed_in_as,
        pending: engine.pending_count().await,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        for line in format_status_lines(&status) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_status_lines(status: &StatusReport) -> Vec<String> {
    let connection = match (status.force_offline, status.online) {
        (true, _) => "offline (forced)",
        (false, true) => "online",
        (false, false) => "offline",
    };
    vec![
        format!(
            "Server:     {}",
            status.server.as_deref().unwrap_or("(not configured)")
        ),
        format!("Connection: {connection}"),
        format!(
            "Signed in:  {}",
            status.signed_in_as.as_deref().unwrap_or("no")
        ),
        format!("Pending:    {}", status.pending),
    ]
}
