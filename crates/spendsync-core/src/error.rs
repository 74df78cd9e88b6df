//! Error types for spendsync-core

use thiserror::Error;

use crate::gateway::GatewayError;

/// Result type alias using spendsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in spendsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Persisted read/write was rejected by the storage layer
    #[error("Storage fault: {0}")]
    StorageFault(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The device is offline, so a reconciliation pass cannot start
    #[error("No network connection")]
    Offline,

    /// The identity probe failed or reported no signed-in user
    #[error("Authentication required: {0}")]
    AuthRequired(String),

    /// Remote gateway failure outside of a reconciliation pass
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error came from the persistence layer.
    pub const fn is_storage_fault(&self) -> bool {
        matches!(self, Self::StorageFault(_) | Self::LibSql(_) | Self::Io(_))
    }
}
