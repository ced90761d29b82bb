//! Error types for benchbox-core.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for benchbox-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while provisioning or driving a benchmark.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Error from the Docker Engine API
    #[error("Docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// Image build reported an error
    #[error("image build failed: {0}")]
    ImageBuild(String),

    /// Build context could not be packed
    #[error("invalid build context {path}: {message}")]
    BuildContext {
        /// Context directory
        path: PathBuf,
        /// What went wrong
        message: String,
    },

    /// Execution unit did not finish in time
    #[error("container timed out after {0:?}")]
    Timeout(Duration),

    /// Execution unit was not found by the backend
    #[error("container not found: {0}")]
    UnitNotFound(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
