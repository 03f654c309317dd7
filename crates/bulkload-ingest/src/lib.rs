//! Bulkload Ingestion Library
//!
//! Asynchronous bulk ingestion of business records (customers,
//! products, orders) from CSV and JSON uploads into PostgreSQL.
//!
//! # Overview
//!
//! An upload travels through a fixed pipeline:
//!
//! - **Decode**: streaming batch decoders for CSV and JSON that never
//!   materialize the whole file
//! - **Validate**: per-row field validation with absolute row numbers,
//!   tolerating partial failure
//! - **Resolve**: memoized natural-key lookups for cross-entity
//!   references
//! - **Upsert**: chunked multi-row `ON CONFLICT` statements, so
//!   re-ingesting a file converges
//! - **Track**: a `load_jobs` row per upload with a
//!   PENDING -> PROCESSING -> {COMPLETED, FAILED, PARTIAL} lifecycle
//!
//! The [`orchestrator::Ingestor`] ties these together: submission
//! returns immediately and the pipeline runs in a detached,
//! semaphore-bounded tokio task.
//!
//! # Framework Stack
//!
//! - **Tokio**: async runtime and background job tasks
//! - **SQLx**: PostgreSQL access with runtime-checked queries
//! - **Serde**: row deserialization shared by both input formats

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod coerce;
pub mod config;
pub mod decode;
pub mod entities;
pub mod error;
pub mod jobs;
pub mod orchestrator;
pub mod resolve;
pub mod rows;
pub mod store;
pub mod upsert;
pub mod validate;

pub use config::Config;
pub use error::{IngestError, IngestResult};
pub use jobs::{DataType, FileFormat, JobStatus, JobTracker, LoadJob, ProgressSink};
pub use orchestrator::Ingestor;
pub use store::PgStore;
