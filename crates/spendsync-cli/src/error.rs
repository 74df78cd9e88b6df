use std::io;

use spendsync_core::gateway::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] spendsync_core::Error),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid amount '{0}': expected a positive decimal such as 12.50")]
    InvalidAmount(String),
    #[error("Invalid category id '{0}'")]
    InvalidCategory(String),
    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Expense server is not configured. Set api_base_url in the config file or SPENDSYNC_API_URL."
    )]
    ServerNotConfigured,
}
