//! Error types shared across the workspace

use thiserror::Error;

/// Result type alias for bulkload operations
pub type Result<T> = std::result::Result<T, BulkloadError>;

/// Main error type for bulkload
#[derive(Error, Debug)]
pub enum BulkloadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),
}
