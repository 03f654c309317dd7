//! Ingestion error types

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for ingestion operations
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Error type for the ingestion pipeline
#[derive(Error, Debug)]
pub enum IngestError {
    /// Malformed input that aborts the whole job (bad top-level JSON
    /// shape, unreadable CSV framing, truncated stream).
    #[error("Format error: {0}")]
    Format(String),

    /// Rejected synchronously at submission time (empty file, missing
    /// required CSV columns). No job is created for these.
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        IngestError::Format(err.to_string())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::Format(err.to_string())
    }
}
