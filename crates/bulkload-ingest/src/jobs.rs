//! Load job tracking
//!
//! Every upload gets a row in `load_jobs` that callers poll for
//! progress. The status machine is
//! PENDING -> PROCESSING -> {COMPLETED, FAILED, PARTIAL}; terminal
//! states are absorbing, enforced by status guards in the UPDATE
//! statements so a late writer cannot resurrect a finished job.

use crate::error::{IngestError, IngestResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Upload payload format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileFormat {
    Csv,
    Json,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Csv => "CSV",
            FileFormat::Json => "JSON",
        }
    }
}

impl FromStr for FileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CSV" => Ok(FileFormat::Csv),
            "JSON" => Ok(FileFormat::Json),
            other => Err(format!("unknown file format: {other}")),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for FileFormat {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Which entity an upload carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Customers,
    Products,
    Orders,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Customers => "CUSTOMERS",
            DataType::Products => "PRODUCTS",
            DataType::Orders => "ORDERS",
        }
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CUSTOMERS" => Ok(DataType::Customers),
            "PRODUCTS" => Ok(DataType::Products),
            "ORDERS" => Ok(DataType::Orders),
            other => Err(format!("unknown data type: {other}")),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for DataType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Load job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Partial,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Partial => "PARTIAL",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Partial
        )
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Ok(JobStatus::Pending),
            "PROCESSING" => Ok(JobStatus::Processing),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            "PARTIAL" => Ok(JobStatus::Partial),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for JobStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One row of `load_jobs`
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LoadJob {
    pub id: Uuid,
    pub file_name: String,
    #[sqlx(try_from = "String")]
    pub file_type: FileFormat,
    #[sqlx(try_from = "String")]
    pub data_type: DataType,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    pub total_rows: i64,
    pub processed_rows: i64,
    pub failed_rows: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Polling view of a job, with derived progress
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusView {
    #[serde(flatten)]
    pub job: LoadJob,
    pub progress_percent: f64,
}

impl From<LoadJob> for JobStatusView {
    fn from(job: LoadJob) -> Self {
        let progress_percent = progress_percent(job.processed_rows, job.total_rows);
        Self {
            job,
            progress_percent,
        }
    }
}

/// Percentage of processed rows, rounded to two decimals; 0 while the
/// total is still unknown
pub fn progress_percent(processed: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let pct = processed as f64 * 100.0 / total as f64;
    (pct * 100.0).round() / 100.0
}

/// Terminal status for a finished run
pub fn terminal_status(processed: u64, failed: u64) -> JobStatus {
    if failed == 0 {
        JobStatus::Completed
    } else if processed == 0 {
        JobStatus::Failed
    } else {
        JobStatus::Partial
    }
}

/// Progress publication seam between the pipeline loop and the
/// Pg-backed tracker
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn update_progress(
        &self,
        id: Uuid,
        total: u64,
        processed: u64,
        failed: u64,
    ) -> IngestResult<()>;
}

/// Persistence for job rows
#[derive(Clone)]
pub struct JobTracker {
    pool: PgPool,
}

impl JobTracker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_job(
        &self,
        file_name: &str,
        file_type: FileFormat,
        data_type: DataType,
    ) -> IngestResult<LoadJob> {
        let job = LoadJob {
            id: Uuid::new_v4(),
            file_name: file_name.to_owned(),
            file_type,
            data_type,
            status: JobStatus::Pending,
            total_rows: 0,
            processed_rows: 0,
            failed_rows: 0,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        sqlx::query(
            "INSERT INTO load_jobs (id, file_name, file_type, data_type, status, total_rows, \
             processed_rows, failed_rows, created_at) \
             VALUES ($1, $2, $3, $4, $5, 0, 0, 0, $6)",
        )
        .bind(job.id)
        .bind(&job.file_name)
        .bind(job.file_type.as_str())
        .bind(job.data_type.as_str())
        .bind(job.status.as_str())
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;
        Ok(job)
    }

    pub async fn mark_processing(&self, id: Uuid) -> IngestResult<()> {
        sqlx::query(
            "UPDATE load_jobs SET status = 'PROCESSING', started_at = NOW() \
             WHERE id = $1 AND status = 'PENDING'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_completed(
        &self,
        id: Uuid,
        total: u64,
        processed: u64,
        failed: u64,
    ) -> IngestResult<JobStatus> {
        let status = terminal_status(processed, failed);
        sqlx::query(
            "UPDATE load_jobs SET status = $2, total_rows = $3, processed_rows = $4, \
             failed_rows = $5, completed_at = NOW() \
             WHERE id = $1 AND status = 'PROCESSING'",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(total as i64)
        .bind(processed as i64)
        .bind(failed as i64)
        .execute(&self.pool)
        .await?;
        Ok(status)
    }

    pub async fn mark_failed(&self, id: Uuid, message: &str) -> IngestResult<()> {
        sqlx::query(
            "UPDATE load_jobs SET status = 'FAILED', error_message = $2, completed_at = NOW() \
             WHERE id = $1 AND status IN ('PENDING', 'PROCESSING')",
        )
        .bind(id)
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_status(&self, id: Uuid) -> IngestResult<JobStatusView> {
        let job = sqlx::query_as::<_, LoadJob>(
            "SELECT id, file_name, file_type, data_type, status, total_rows, processed_rows, \
             failed_rows, error_message, created_at, started_at, completed_at \
             FROM load_jobs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(IngestError::JobNotFound(id))?;
        Ok(job.into())
    }
}

#[async_trait]
impl ProgressSink for JobTracker {
    /// Provisional counters while the run is still going; the guard
    /// keeps a slow writer from touching an already finished job
    async fn update_progress(
        &self,
        id: Uuid,
        total: u64,
        processed: u64,
        failed: u64,
    ) -> IngestResult<()> {
        sqlx::query(
            "UPDATE load_jobs SET total_rows = $2, processed_rows = $3, failed_rows = $4 \
             WHERE id = $1 AND status = 'PROCESSING'",
        )
        .bind(id)
        .bind(total as i64)
        .bind(processed as i64)
        .bind(failed as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_status_decision_table() {
        assert_eq!(terminal_status(10, 0), JobStatus::Completed);
        assert_eq!(terminal_status(0, 0), JobStatus::Completed);
        assert_eq!(terminal_status(0, 5), JobStatus::Failed);
        assert_eq!(terminal_status(7, 3), JobStatus::Partial);
    }

    #[test]
    fn test_progress_percent_rounding() {
        assert_eq!(progress_percent(1, 3), 33.33);
        assert_eq!(progress_percent(2, 3), 66.67);
        assert_eq!(progress_percent(5, 5), 100.0);
        assert_eq!(progress_percent(0, 0), 0.0);
        assert_eq!(progress_percent(3, 0), 0.0);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Partial,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("BOGUS".parse::<JobStatus>().is_err());
        assert_eq!("processing".parse::<JobStatus>().unwrap(), JobStatus::Processing);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Partial.is_terminal());
    }

    #[test]
    fn test_format_and_data_type_parsing() {
        assert_eq!("csv".parse::<FileFormat>().unwrap(), FileFormat::Csv);
        assert_eq!(" JSON ".parse::<FileFormat>().unwrap(), FileFormat::Json);
        assert!("xml".parse::<FileFormat>().is_err());
        assert_eq!("orders".parse::<DataType>().unwrap(), DataType::Orders);
        assert!("invoices".parse::<DataType>().is_err());
    }
}
