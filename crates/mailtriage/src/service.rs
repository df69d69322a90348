//! Submission and query boundary in front of the store and dispatcher.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::content::{loader, remove_temp_file, ContentError, ContentSource, UploadStorage};
use crate::dispatch::{Dispatch, Dispatcher};
use crate::pipeline::PipelineError;
use crate::providers::Category;
use crate::sanitize;
use crate::store::{JobRecord, JobStatus, JobStore, NewJob, StoreError};

/// What a client sends.
#[derive(Debug, Clone)]
pub enum Submission {
    Text(String),
    File {
        bytes: Vec<u8>,
        filename: Option<String>,
    },
}

/// Immediate answer to a submission.
///
/// Terminal fields are only set when the job ran inline.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub job_id: String,
    pub queued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub status: JobStatus,
    pub category: Option<Category>,
    pub confidence: Option<f64>,
    pub generated_reply: Option<String>,
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Nothing to process: send 'text' or 'file'")]
    EmptySubmission,

    #[error("Upload failed: {0}")]
    Upload(#[from] ContentError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Job {job_id} failed: {source}")]
    Pipeline {
        job_id: String,
        #[source]
        source: PipelineError,
    },
}

pub struct JobService {
    store: Arc<dyn JobStore>,
    uploads: UploadStorage,
    dispatcher: Dispatcher,
    default_top_n: usize,
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        uploads: UploadStorage,
        dispatcher: Dispatcher,
        default_top_n: usize,
    ) -> Self {
        Self {
            store,
            uploads,
            dispatcher,
            default_top_n,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Creates a `PROCESSING` job for `submission` and hands it to the
    /// dispatcher.
    pub fn submit_job(
        &self,
        owner_id: &str,
        submission: Submission,
    ) -> Result<SubmitOutcome, ServiceError> {
        let (new_job, source) = self.prepare(owner_id, submission)?;
        let upload = source.upload_path().cloned();

        let job = match self.store.create(new_job) {
            Ok(job) => job,
            Err(e) => {
                if let Some(path) = upload {
                    if let Err(io) = remove_temp_file(&path) {
                        warn!(
                            "Failed to remove upload {}: {}",
                            sanitize::redact_path(&path),
                            io
                        );
                    }
                }
                return Err(e.into());
            }
        };
        info!("Created job {} for owner {}", job.id, owner_id);
        debug!("Job {} text: {}", job.id, sanitize::preview(&job.original_text));

        match self.dispatcher.submit(&job, source, self.default_top_n) {
            Dispatch::Queued(handle) => Ok(SubmitOutcome {
                job_id: job.id,
                queued: true,
                task_id: Some(handle.id),
                status: JobStatus::Processing,
                category: None,
                confidence: None,
                generated_reply: None,
            }),
            Dispatch::Completed(output) => Ok(SubmitOutcome {
                job_id: job.id,
                queued: false,
                task_id: None,
                status: if output.persisted {
                    JobStatus::Completed
                } else {
                    JobStatus::Processing
                },
                category: Some(output.category),
                confidence: output.confidence,
                generated_reply: Some(output.generated_reply),
            }),
            Dispatch::Failed(source) => Err(ServiceError::Pipeline {
                job_id: job.id,
                source,
            }),
        }
    }

    fn prepare(
        &self,
        owner_id: &str,
        submission: Submission,
    ) -> Result<(NewJob, ContentSource), ServiceError> {
        match submission {
            Submission::Text(text) => {
                if text.trim().is_empty() {
                    return Err(ServiceError::EmptySubmission);
                }
                let job = NewJob {
                    owner_id: owner_id.to_string(),
                    original_text: text.clone(),
                    file_reference: None,
                };
                Ok((job, ContentSource::Text(text)))
            }
            Submission::File { bytes, filename } => {
                if bytes.is_empty() {
                    return Err(ServiceError::EmptySubmission);
                }
                let path = self.uploads.store(&bytes, filename.as_deref())?;
                let job = NewJob {
                    owner_id: owner_id.to_string(),
                    original_text: loader::decode(&bytes),
                    file_reference: filename,
                };
                Ok((job, ContentSource::Upload(path)))
            }
        }
    }

    pub fn list_jobs(&self, owner_id: &str) -> Result<Vec<JobRecord>, ServiceError> {
        Ok(self.store.list_by_owner(owner_id)?)
    }

    pub fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, ServiceError> {
        Ok(self.store.get(job_id)?)
    }

    /// Job counts for every status, in [`JobStatus::ALL`] order.
    pub fn status_counts(&self) -> Result<Vec<(JobStatus, u64)>, ServiceError> {
        JobStatus::ALL
            .iter()
            .map(|status| {
                self.store
                    .count_by_status(*status)
                    .map(|count| (*status, count))
                    .map_err(ServiceError::from)
            })
            .collect()
    }
}
