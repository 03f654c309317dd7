//! Chunked batch execution
//!
//! A decoded batch can be larger than what we want in a single
//! multi-row statement, so it is split into chunks first. A failing
//! chunk is logged and skipped; later chunks still run, and the
//! chunk's rows are reported as failed rather than silently dropped.

use futures::future::BoxFuture;
use tracing::warn;

/// Row accounting for one chunked execution
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Rows affected by succeeding chunks; inserts and updates are
    /// conflated, matching what the database reports
    pub affected: u64,
    /// Rows belonging to chunks whose statement failed
    pub failed: u64,
}

pub struct BatchUpserter {
    chunk_size: usize,
}

impl BatchUpserter {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Run `run_chunk` over `rows` in chunks of the configured size
    pub async fn execute<'a, T, F>(&self, rows: &'a [T], mut run_chunk: F) -> UpsertOutcome
    where
        F: FnMut(&'a [T]) -> BoxFuture<'a, Result<u64, sqlx::Error>>,
    {
        let mut outcome = UpsertOutcome::default();
        for chunk in rows.chunks(self.chunk_size) {
            match run_chunk(chunk).await {
                Ok(affected) => outcome.affected += affected,
                Err(err) => {
                    warn!(rows = chunk.len(), error = %err, "chunk upsert failed, skipping chunk");
                    outcome.failed += chunk.len() as u64;
                }
            }
        }
        outcome
    }
}
