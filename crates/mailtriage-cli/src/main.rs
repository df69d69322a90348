use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;

use mailtriage::logging::{self, LogFormat};
use mailtriage::{load_config, JobRecord, JobService, JobStatus, Runtime, Submission};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
/// Classify emails and draft replies
struct Args {
    /// Path to the JSON config file
    #[arg(long, value_name = "PATH", default_value = "mailtriage.json")]
    config: PathBuf,

    /// Log output format: text or json
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a text or a file for classification
    Submit {
        /// Owner of the new job
        #[arg(long, value_name = "OWNER_ID")]
        owner: String,

        /// Inline text to classify
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,

        /// File whose contents to classify
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },
    /// List an owner's jobs, newest first
    List {
        #[arg(long, value_name = "OWNER_ID")]
        owner: String,
    },
    /// Show one job
    Show {
        job_id: String,
    },
    /// Count jobs per status
    Stats,
}

#[derive(Serialize)]
struct StatusCount {
    status: JobStatus,
    count: u64,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn find_job(service: &JobService, job_id: &str) -> Result<JobRecord> {
    service
        .get_job(job_id)?
        .with_context(|| format!("job {} not found", job_id))
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.log_format)?;

    let config = load_config(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let runtime = Runtime::start(&config)?;
    let service = runtime.service();

    let result = match args.command {
        Command::Submit { owner, text, file } => {
            let submission = match (text, file) {
                (Some(text), None) => Submission::Text(text),
                (None, Some(path)) => {
                    let bytes = std::fs::read(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    Submission::File {
                        bytes,
                        filename: path
                            .file_name()
                            .map(|name| name.to_string_lossy().into_owned()),
                    }
                }
                _ => bail!("pass exactly one of --text or --file"),
            };

            let outcome = service.submit_job(&owner, submission);
            match outcome {
                Ok(outcome) => {
                    print_json(&outcome)?;
                    if outcome.queued {
                        info!("Waiting for job {} to finish", outcome.job_id);
                        runtime.stop();
                        print_json(&find_job(service, &outcome.job_id)?)?;
                    }
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        }
        Command::List { owner } => print_json(&service.list_jobs(&owner)?),
        Command::Show { job_id } => print_json(&find_job(service, &job_id)?),
        Command::Stats => {
            let counts: Vec<StatusCount> = service
                .status_counts()?
                .into_iter()
                .map(|(status, count)| StatusCount { status, count })
                .collect();
            if let Some(processing) = counts.iter().find(|c| c.status == JobStatus::Processing) {
                if processing.count > 0 {
                    warn!(
                        "{} job(s) still PROCESSING; any without a live worker are orphaned",
                        processing.count
                    );
                }
            }
            print_json(&counts)
        }
    };

    runtime.stop();
    result
}
