//! Bulkload - bulk data loading tool

use anyhow::{Context, Result};
use bulkload_common::logging::{init_logging, LogConfig, LogLevel};
use bulkload_ingest::jobs::JobTracker;
use bulkload_ingest::{Config, DataType, FileFormat, Ingestor, PgStore};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "bulkload")]
#[command(author, version, about = "Bulk business-record loading tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Load a CSV or JSON file and wait for the job to finish
    Load {
        /// File to ingest
        file: PathBuf,

        /// Entity the file carries: customers, products or orders
        #[arg(short, long, value_parser = parse_data_type)]
        data_type: DataType,

        /// File format; inferred from the extension when omitted
        #[arg(short, long, value_parser = parse_format)]
        format: Option<FileFormat>,
    },

    /// Show the status of a load job
    Status {
        /// Job id
        job_id: Uuid,
    },
}

fn parse_data_type(s: &str) -> Result<DataType, String> {
    s.parse()
}

fn parse_format(s: &str) -> Result<FileFormat, String> {
    s.parse()
}

fn infer_format(path: &Path) -> Result<FileFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(FileFormat::Csv),
        Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(FileFormat::Json),
        _ => anyhow::bail!(
            "cannot infer file format from '{}'; pass --format",
            path.display()
        ),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbose flag
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("bulkload".to_string())
        .build();

    // Merge with environment variables (they take precedence)
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    init_logging(&log_config)?;

    let config = Config::load()?;
    let pool = config
        .connect_pool()
        .await
        .context("Failed to connect to database")?;
    let store = PgStore::new(pool.clone());
    let tracker = JobTracker::new(pool);
    let ingestor = Ingestor::new(store, tracker, config.pipeline.clone());

    match cli.command {
        Command::Load {
            file,
            data_type,
            format,
        } => {
            let format = match format {
                Some(format) => format,
                None => infer_format(&file)?,
            };
            let payload = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("Failed to open {}", file.display()))?;
            let file_name = file
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("upload");

            let job = ingestor.submit(file_name, format, data_type, payload).await?;
            info!(job_id = %job.id, data_type = %data_type, format = %format, "job submitted");

            // Submission is detached; poll until the job settles
            loop {
                tokio::time::sleep(Duration::from_millis(500)).await;
                let view = ingestor.job_status(job.id).await?;
                if view.job.status.is_terminal() {
                    println!("{}", serde_json::to_string_pretty(&view)?);
                    break;
                }
                info!(
                    job_id = %job.id,
                    status = %view.job.status,
                    progress = view.progress_percent,
                    "in progress"
                );
            }
        }
        Command::Status { job_id } => {
            let view = ingestor.job_status(job_id).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
    }

    Ok(())
}
