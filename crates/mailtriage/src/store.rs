//! Durable job records.
//!
//! A job is created `PROCESSING` and moves exactly once to `COMPLETED` or
//! `FAILED`. Result fields are only ever written together with the
//! `COMPLETED` transition.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::db::job_repo::{self, JobRow};
use crate::db::{Database, DatabaseError};
use crate::providers::{Category, Inference};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 3] = [
        JobStatus::Processing,
        JobStatus::Completed,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| StoreError::Corrupt {
                id: None,
                reason: format!("unknown status '{}'", s),
            })
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {id} is already {status}")]
    AlreadyTerminal { id: String, status: JobStatus },

    #[error("Corrupt job row {}: {reason}", .id.as_deref().unwrap_or("<unknown>"))]
    Corrupt { id: Option<String>, reason: String },
}

/// Input for [`JobStore::create`].
#[derive(Debug, Clone)]
pub struct NewJob {
    pub owner_id: String,
    pub original_text: String,
    /// Original upload filename, for display.
    pub file_reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub owner_id: String,
    pub original_text: String,
    pub file_reference: Option<String>,
    pub category: Option<Category>,
    pub generated_reply: Option<String>,
    pub confidence: Option<f64>,
    pub status: JobStatus,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<JobStatus>().map_err(|e| match e {
            StoreError::Corrupt { reason, .. } => StoreError::Corrupt {
                id: Some(row.id.clone()),
                reason,
            },
            other => other,
        })?;
        let category = row
            .category
            .as_deref()
            .map(Category::from_str)
            .transpose()
            .map_err(|e| StoreError::Corrupt {
                id: Some(row.id.clone()),
                reason: e.to_string(),
            })?;

        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            original_text: row.original_text,
            file_reference: row.file_reference,
            category,
            generated_reply: row.generated_reply,
            confidence: row.confidence,
            status,
            error: row.error,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}

/// Persistence boundary for jobs.
pub trait JobStore: Send + Sync {
    /// Inserts a new `PROCESSING` job with a fresh id.
    fn create(&self, job: NewJob) -> Result<JobRecord, StoreError>;

    fn get(&self, id: &str) -> Result<Option<JobRecord>, StoreError>;

    /// An owner's jobs, newest first.
    fn list_by_owner(&self, owner_id: &str) -> Result<Vec<JobRecord>, StoreError>;

    /// Writes category, confidence and reply and moves the job to
    /// `COMPLETED`, all at once.
    fn mark_completed(&self, id: &str, inference: &Inference) -> Result<(), StoreError>;

    fn mark_failed(&self, id: &str, message: &str) -> Result<(), StoreError>;

    fn count_by_status(&self, status: JobStatus) -> Result<u64, StoreError>;
}

#[derive(Clone)]
pub struct SqliteJobStore {
    db: Database,
}

impl SqliteJobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Explains why a conditional transition touched no rows.
    fn transition_refused(&self, id: &str) -> StoreError {
        match job_repo::status_of(&self.db, id) {
            Ok(None) => StoreError::NotFound(id.to_string()),
            Ok(Some(raw)) => match raw.parse::<JobStatus>() {
                Ok(status) => StoreError::AlreadyTerminal {
                    id: id.to_string(),
                    status,
                },
                Err(e) => e,
            },
            Err(e) => StoreError::Database(e),
        }
    }
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

impl JobStore for SqliteJobStore {
    fn create(&self, job: NewJob) -> Result<JobRecord, StoreError> {
        let timestamp = now();
        let row = JobRow {
            id: Uuid::new_v4().to_string(),
            owner_id: job.owner_id,
            original_text: job.original_text,
            file_reference: job.file_reference,
            category: None,
            generated_reply: None,
            confidence: None,
            status: JobStatus::Processing.as_str().to_string(),
            error: None,
            created_at: timestamp.clone(),
            updated_at: timestamp,
            completed_at: None,
        };
        job_repo::insert(&self.db, &row)?;
        log::debug!("Created job {}", row.id);
        JobRecord::try_from(row)
    }

    fn get(&self, id: &str) -> Result<Option<JobRecord>, StoreError> {
        job_repo::find_by_id(&self.db, id)?
            .map(JobRecord::try_from)
            .transpose()
    }

    fn list_by_owner(&self, owner_id: &str) -> Result<Vec<JobRecord>, StoreError> {
        job_repo::list_by_owner(&self.db, owner_id)?
            .into_iter()
            .map(JobRecord::try_from)
            .collect()
    }

    fn mark_completed(&self, id: &str, inference: &Inference) -> Result<(), StoreError> {
        let updated = job_repo::mark_completed(
            &self.db,
            id,
            inference.category.as_str(),
            inference.confidence,
            &inference.generated_reply,
            &now(),
        )?;
        if updated == 0 {
            return Err(self.transition_refused(id));
        }
        Ok(())
    }

    fn mark_failed(&self, id: &str, message: &str) -> Result<(), StoreError> {
        let updated = job_repo::mark_failed(&self.db, id, message, &now())?;
        if updated == 0 {
            return Err(self.transition_refused(id));
        }
        Ok(())
    }

    fn count_by_status(&self, status: JobStatus) -> Result<u64, StoreError> {
        Ok(job_repo::count_by_status(&self.db, status.as_str())?)
    }
}
