//! Upload orchestration
//!
//! `Ingestor::submit` is the synchronous half: it streams the payload
//! to a spool file, rejects obviously bad uploads, records the job row
//! and returns it immediately. The actual ingestion runs in a detached
//! tokio task bounded by a semaphore, so a flood of uploads queues
//! instead of overwhelming the database. Each run drives
//! decode -> process -> progress strictly batch by batch; one file is
//! one task, and nothing of a run outlives it but the job row.

use crate::config::PipelineConfig;
use crate::decode::{read_csv_headers, BatchSource, CsvBatchSource, JsonBatchSource};
use crate::entities::{
    CustomerProcessor, EntityProcessor, OrderProcessor, ProductProcessor,
};
use crate::error::{IngestError, IngestResult};
use crate::jobs::{
    DataType, FileFormat, JobStatus, JobStatusView, JobTracker, LoadJob, ProgressSink,
};
use crate::store::PgStore;
use crate::validate::{
    CUSTOMER_REQUIRED_COLUMNS, ORDER_REQUIRED_COLUMNS, PRODUCT_REQUIRED_COLUMNS,
};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::sync::Semaphore;
use tokio::task;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Copy buffer for spooling uploads to disk
const SPOOL_BUF_BYTES: usize = 8 * 1024;

pub struct Ingestor {
    store: Arc<PgStore>,
    tracker: JobTracker,
    config: PipelineConfig,
    permits: Arc<Semaphore>,
}

impl Ingestor {
    pub fn new(store: PgStore, tracker: JobTracker, config: PipelineConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        Self {
            store: Arc::new(store),
            tracker,
            config,
            permits,
        }
    }

    /// Accept an upload and start processing it in the background.
    ///
    /// The payload is streamed to a spool file in fixed-size chunks,
    /// so arbitrarily large uploads never sit in memory. Returns the
    /// freshly created job (status PENDING) as soon as the payload is
    /// spooled; callers poll `job_status` for progress. Empty payloads
    /// and CSV files missing required columns are rejected here,
    /// before any job row exists.
    pub async fn submit<R>(
        &self,
        file_name: &str,
        file_type: FileFormat,
        data_type: DataType,
        payload: R,
    ) -> IngestResult<LoadJob>
    where
        R: AsyncRead + Unpin + Send,
    {
        tokio::fs::create_dir_all(&self.config.upload_dir).await?;
        let staging = self
            .config
            .upload_dir
            .join(format!("{}.part", Uuid::new_v4()));

        let (bytes, blank) = match spool_stream(&staging, payload).await {
            Ok(spooled) => spooled,
            Err(err) => {
                discard_spool(&staging).await;
                return Err(err.into());
            }
        };
        if blank {
            discard_spool(&staging).await;
            return Err(IngestError::InvalidUpload("uploaded file is empty".into()));
        }
        if file_type == FileFormat::Csv {
            if let Err(err) = preflight_csv(&staging, data_type) {
                discard_spool(&staging).await;
                return Err(err);
            }
        }

        let job = match self.tracker.create_job(file_name, file_type, data_type).await {
            Ok(job) => job,
            Err(err) => {
                discard_spool(&staging).await;
                return Err(err);
            }
        };

        let path = self
            .config
            .upload_dir
            .join(spool_file_name(job.id, file_name));
        if let Err(err) = tokio::fs::rename(&staging, &path).await {
            discard_spool(&staging).await;
            // Don't leave the job stranded in PENDING
            if let Err(mark_err) = self
                .tracker
                .mark_failed(job.id, &format!("failed to spool upload: {err}"))
                .await
            {
                error!(job_id = %job.id, error = %mark_err, "failed to record job failure");
            }
            return Err(err.into());
        }

        info!(
            job_id = %job.id,
            file_name,
            file_type = %file_type,
            data_type = %data_type,
            bytes,
            "upload accepted"
        );

        let store = Arc::clone(&self.store);
        let tracker = self.tracker.clone();
        let config = self.config.clone();
        let permits = Arc::clone(&self.permits);
        let job_for_task = job.clone();
        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            run_job(&store, &tracker, &config, job_for_task, path).await;
        });

        Ok(job)
    }

    pub async fn job_status(&self, id: Uuid) -> IngestResult<JobStatusView> {
        self.tracker.get_status(id).await
    }
}

/// Stream an upload to the spool file in fixed-size chunks. Returns
/// the byte count and whether the payload was all whitespace.
async fn spool_stream<R>(path: &Path, mut payload: R) -> std::io::Result<(u64, bool)>
where
    R: AsyncRead + Unpin,
{
    let file = tokio::fs::File::create(path).await?;
    let mut writer = BufWriter::new(file);
    let mut buf = [0u8; SPOOL_BUF_BYTES];
    let mut bytes = 0u64;
    let mut blank = true;
    loop {
        let n = payload.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        if blank && !buf[..n].iter().all(u8::is_ascii_whitespace) {
            blank = false;
        }
        bytes += n as u64;
        writer.write_all(&buf[..n]).await?;
    }
    writer.flush().await?;
    Ok((bytes, blank))
}

/// Check the header record of a spooled CSV upload; only the first
/// record is read
fn preflight_csv(path: &Path, data_type: DataType) -> IngestResult<()> {
    let headers = read_csv_headers(File::open(path)?)?;
    let missing = missing_columns(&headers, required_columns(data_type));
    if missing.is_empty() {
        Ok(())
    } else {
        Err(IngestError::InvalidUpload(format!(
            "missing required CSV columns: {}",
            missing.join(", ")
        )))
    }
}

async fn discard_spool(path: &Path) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %err, "failed to remove spool file");
    }
}

/// Process one spooled upload end to end, then clean up the spool file
async fn run_job(
    store: &PgStore,
    tracker: &JobTracker,
    config: &PipelineConfig,
    job: LoadJob,
    path: PathBuf,
) {
    let job_id = job.id;
    let result = process_file(store, tracker, config, &job, &path).await;

    discard_spool(&path).await;

    match result {
        Ok(status) => {
            info!(job_id = %job_id, status = %status, "ingestion finished");
        }
        Err(err) => {
            error!(job_id = %job_id, error = %err, "ingestion failed");
            if let Err(mark_err) = tracker.mark_failed(job_id, &err.to_string()).await {
                error!(job_id = %job_id, error = %mark_err, "failed to record job failure");
            }
        }
    }
}

async fn process_file(
    store: &PgStore,
    tracker: &JobTracker,
    config: &PipelineConfig,
    job: &LoadJob,
    path: &Path,
) -> IngestResult<JobStatus> {
    tracker.mark_processing(job.id).await?;
    info!(job_id = %job.id, data_type = %job.data_type, "ingestion started");

    let file = File::open(path)?;
    let batch = config.batch_size;
    let chunk = config.chunk_size;

    let (total, processed, failed) = match (job.file_type, job.data_type) {
        (FileFormat::Csv, DataType::Customers) => {
            run_pipeline(
                CsvBatchSource::new(file, batch)?,
                CustomerProcessor::new(store, chunk),
                tracker,
                job.id,
            )
            .await?
        }
        (FileFormat::Csv, DataType::Products) => {
            run_pipeline(
                CsvBatchSource::new(file, batch)?,
                ProductProcessor::new(store, chunk),
                tracker,
                job.id,
            )
            .await?
        }
        (FileFormat::Csv, DataType::Orders) => {
            run_pipeline(
                CsvBatchSource::new(file, batch)?,
                OrderProcessor::new(store),
                tracker,
                job.id,
            )
            .await?
        }
        (FileFormat::Json, DataType::Customers) => {
            run_pipeline(
                JsonBatchSource::new(file, batch),
                CustomerProcessor::new(store, chunk),
                tracker,
                job.id,
            )
            .await?
        }
        (FileFormat::Json, DataType::Products) => {
            run_pipeline(
                JsonBatchSource::new(file, batch),
                ProductProcessor::new(store, chunk),
                tracker,
                job.id,
            )
            .await?
        }
        (FileFormat::Json, DataType::Orders) => {
            run_pipeline(
                JsonBatchSource::new(file, batch),
                OrderProcessor::new(store),
                tracker,
                job.id,
            )
            .await?
        }
    };

    tracker.mark_completed(job.id, total, processed, failed).await
}

/// Drive one source/processor pair to exhaustion, publishing counters
/// after every batch. Returns (total, processed, failed).
async fn run_pipeline<T, SRC, P, PS>(
    mut source: SRC,
    mut processor: P,
    progress: &PS,
    job_id: Uuid,
) -> IngestResult<(u64, u64, u64)>
where
    T: DeserializeOwned,
    SRC: BatchSource<T>,
    P: EntityProcessor<T>,
    PS: ProgressSink,
{
    let mut processed = 0u64;
    let mut failed = 0u64;
    // Decoding is blocking file I/O; keep it off the async workers
    while let Some(batch) = task::block_in_place(|| source.next_batch())? {
        let outcome = processor.process_batch(&batch).await?;
        processed += outcome.processed;
        failed += outcome.failed;
        progress
            .update_progress(job_id, source.total(), processed, failed)
            .await?;
    }
    Ok((source.total(), processed, failed))
}

/// Columns a CSV upload of the given type must declare
pub fn required_columns(data_type: DataType) -> &'static [&'static str] {
    match data_type {
        DataType::Customers => CUSTOMER_REQUIRED_COLUMNS,
        DataType::Products => PRODUCT_REQUIRED_COLUMNS,
        DataType::Orders => ORDER_REQUIRED_COLUMNS,
    }
}

fn missing_columns(headers: &[String], required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .map(|column| (*column).to_owned())
        .collect()
}

/// Spool name for an upload; prefixing the job id keeps concurrent
/// uploads of the same file apart
fn spool_file_name(job_id: Uuid, original: &str) -> String {
    let base = Path::new(original)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload");
    format!("{job_id}_{base}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::entities::testing::FakeStore;
    use crate::jobs::terminal_status;
    use crate::rows::CustomerRow;
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingProgress {
        updates: Mutex<Vec<(u64, u64, u64)>>,
    }

    #[async_trait]
    impl ProgressSink for RecordingProgress {
        async fn update_progress(
            &self,
            _id: Uuid,
            total: u64,
            processed: u64,
            failed: u64,
        ) -> IngestResult<()> {
            self.updates.lock().unwrap().push((total, processed, failed));
            Ok(())
        }
    }

    fn customer_source(data: &str, batch: usize) -> CsvBatchSource<Cursor<Vec<u8>>, CustomerRow> {
        CsvBatchSource::new(Cursor::new(data.as_bytes().to_vec()), batch).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pipeline_partial_run_over_batches() {
        let store = FakeStore::default();
        let progress = RecordingProgress::default();
        let data = "customerCode,firstName,lastName,email\n\
                    C1,Ada,Lovelace,ada@example.com\n\
                    C2,Bad,Row,not-an-email\n\
                    C3,Grace,Hopper,grace@example.com\n";

        let (total, processed, failed) = run_pipeline(
            customer_source(data, 2),
            CustomerProcessor::new(&store, 10),
            &progress,
            Uuid::nil(),
        )
        .await
        .unwrap();

        assert_eq!((total, processed, failed), (3, 2, 1));
        assert_eq!(processed + failed, total);
        assert_eq!(terminal_status(processed, failed), JobStatus::Partial);
        assert_eq!(store.customers.lock().unwrap().len(), 2);

        // Running totals published once per batch
        let updates = progress.updates.lock().unwrap();
        assert_eq!(*updates, vec![(2, 1, 1), (3, 2, 1)]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pipeline_clean_run_is_completed() {
        let store = FakeStore::default();
        let progress = RecordingProgress::default();
        let data = "customerCode,firstName,lastName,email\n\
                    C1,Ada,Lovelace,ada@example.com\n\
                    C2,Grace,Hopper,grace@example.com\n";

        let (total, processed, failed) = run_pipeline(
            customer_source(data, 10),
            CustomerProcessor::new(&store, 10),
            &progress,
            Uuid::nil(),
        )
        .await
        .unwrap();

        assert_eq!((total, processed, failed), (2, 2, 0));
        assert_eq!(terminal_status(processed, failed), JobStatus::Completed);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pipeline_all_rows_invalid_is_failed() {
        let store = FakeStore::default();
        let progress = RecordingProgress::default();
        let data = "customerCode,firstName,lastName,email\n\
                    ,Ada,Lovelace,ada@example.com\n\
                    C2,Bad,Row,not-an-email\n";

        let (total, processed, failed) = run_pipeline(
            customer_source(data, 10),
            CustomerProcessor::new(&store, 10),
            &progress,
            Uuid::nil(),
        )
        .await
        .unwrap();

        assert_eq!((total, processed, failed), (2, 0, 2));
        assert_eq!(terminal_status(processed, failed), JobStatus::Failed);
        assert!(store.customers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_spool_stream_detects_blank_payloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.part");

        let (bytes, blank) = spool_stream(&path, Cursor::new(b"  \n\t ".to_vec()))
            .await
            .unwrap();
        assert_eq!(bytes, 5);
        assert!(blank);

        let (_, blank) = spool_stream(&path, Cursor::new(Vec::new())).await.unwrap();
        assert!(blank);

        let (_, blank) = spool_stream(&path, Cursor::new(b"a,b,c".to_vec()))
            .await
            .unwrap();
        assert!(!blank);
    }

    #[tokio::test]
    async fn test_spool_stream_copies_payload_across_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.part");

        // Larger than one copy buffer, non-whitespace near the end
        let mut payload = vec![b' '; SPOOL_BUF_BYTES * 2];
        payload.push(b'x');

        let (bytes, blank) = spool_stream(&path, Cursor::new(payload.clone()))
            .await
            .unwrap();
        assert_eq!(bytes, payload.len() as u64);
        assert!(!blank);
        assert_eq!(std::fs::read(&path).unwrap(), payload);
    }

    #[tokio::test]
    async fn test_preflight_csv_reports_missing_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("customers.csv");
        std::fs::write(&path, "customerCode,firstName,email\nC1,A,a@x.com\n").unwrap();

        let err = preflight_csv(&path, DataType::Customers).unwrap_err();
        assert!(err.to_string().contains("lastName"));

        std::fs::write(
            &path,
            "customerCode,firstName,lastName,email\nC1,A,B,a@x.com\n",
        )
        .unwrap();
        assert!(preflight_csv(&path, DataType::Customers).is_ok());
    }

    #[test]
    fn test_missing_columns() {
        let headers: Vec<String> = ["customerCode", "firstName", "email"]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        let missing = missing_columns(&headers, required_columns(DataType::Customers));
        assert_eq!(missing, vec!["lastName"]);

        let all: Vec<String> = CUSTOMER_REQUIRED_COLUMNS
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        assert!(missing_columns(&all, CUSTOMER_REQUIRED_COLUMNS).is_empty());
    }

    #[test]
    fn test_required_columns_per_type() {
        assert!(required_columns(DataType::Orders).contains(&"quantity"));
        assert!(required_columns(DataType::Products).contains(&"unitPrice"));
    }

    #[test]
    fn test_spool_file_name_strips_directories() {
        let id = Uuid::nil();
        assert_eq!(
            spool_file_name(id, "customers.csv"),
            format!("{id}_customers.csv")
        );
        assert_eq!(
            spool_file_name(id, "../../etc/passwd"),
            format!("{id}_passwd")
        );
    }
}
