//! Configuration management

use bulkload_common::{BulkloadError, Result};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Ingestion Configuration Constants
// ============================================================================

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/bulkload";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default number of rows decoded per batch.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Default number of rows per upsert statement chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Default number of jobs processed concurrently.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;

/// Default directory for spooled upload payloads.
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Ingestion service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub pipeline: PipelineConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

/// Pipeline sizing and filesystem configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub batch_size: usize,
    pub chunk_size: usize,
    pub max_concurrent_jobs: usize,
    pub upload_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
                connect_timeout_secs: std::env::var("DATABASE_CONNECT_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
            },
            pipeline: PipelineConfig {
                batch_size: std::env::var("BULKLOAD_BATCH_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_BATCH_SIZE),
                chunk_size: std::env::var("BULKLOAD_CHUNK_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_CHUNK_SIZE),
                max_concurrent_jobs: std::env::var("BULKLOAD_MAX_CONCURRENT_JOBS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_MAX_CONCURRENT_JOBS),
                upload_dir: std::env::var("BULKLOAD_UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            return Err(BulkloadError::Config("Database URL cannot be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(BulkloadError::Config(
                "Database max_connections must be greater than 0".into(),
            ));
        }

        if self.pipeline.batch_size == 0 {
            return Err(BulkloadError::Config("Batch size must be greater than 0".into()));
        }

        if self.pipeline.chunk_size == 0 {
            return Err(BulkloadError::Config("Chunk size must be greater than 0".into()));
        }

        if self.pipeline.max_concurrent_jobs == 0 {
            return Err(BulkloadError::Config(
                "Max concurrent jobs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Open the Postgres pool described by this configuration
    pub async fn connect_pool(&self) -> Result<PgPool> {
        PgPoolOptions::new()
            .max_connections(self.database.max_connections)
            .acquire_timeout(Duration::from_secs(self.database.connect_timeout_secs))
            .connect(&self.database.url)
            .await
            .map_err(|err| BulkloadError::Database(err.to_string()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            },
            pipeline: PipelineConfig {
                batch_size: DEFAULT_BATCH_SIZE,
                chunk_size: DEFAULT_CHUNK_SIZE,
                max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
                upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            },
        }
    }
}
