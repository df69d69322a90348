use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::providers::Category;

/// Phase of job processing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Queued,
    Loading,
    Preprocessing,
    Inferring,
    Persisting,
    Completed,
    Failed,
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobPhase::Queued => write!(f, "Queued"),
            JobPhase::Loading => write!(f, "Loading content"),
            JobPhase::Preprocessing => write!(f, "Preprocessing"),
            JobPhase::Inferring => write!(f, "Classifying"),
            JobPhase::Persisting => write!(f, "Saving result"),
            JobPhase::Completed => write!(f, "Completed"),
            JobPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Progress of one job. Never carries submitted text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub job_id: String,
    pub phase: JobPhase,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Set on completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// Set on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressEvent {
    pub fn phase(job_id: &str, phase: JobPhase, message: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            phase,
            message: message.to_string(),
            timestamp: Utc::now(),
            category: None,
            error: None,
        }
    }

    pub fn completed(job_id: &str, category: Category, persisted: bool) -> Self {
        let message = if persisted {
            "Job completed"
        } else {
            "Job completed but the result was not saved"
        };
        Self {
            category: Some(category),
            ..Self::phase(job_id, JobPhase::Completed, message)
        }
    }

    pub fn failed(job_id: &str, error: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::phase(job_id, JobPhase::Failed, "Job failed")
        }
    }
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests and headless runs.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Fans progress events out to any number of subscribers.
pub struct BroadcastProgress {
    sender: broadcast::Sender<ProgressEvent>,
}

impl BroadcastProgress {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }
}
