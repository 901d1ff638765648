//! Error types for the CLI.

use tasksync_core::ConfigError;
use tasksync_storage::{ApiClientError, LmdbStoreError};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiClientError),
    #[error(transparent)]
    Store(#[from] LmdbStoreError),
    #[error("Failed to initialize logging: {0}")]
    Telemetry(String),
}
