//! Task queue boundary.
//!
//! Submissions are handed to a queue as a named task with a flat JSON
//! payload. The queue only has to accept or refuse; whether a refused
//! submission runs inline is the dispatcher's decision.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::content::ContentSource;

/// Name of the task that runs the full pipeline for one job.
pub const PROCESS_PIPELINE_TASK: &str = "process_pipeline_task";

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Task queue is full")]
    Full,

    #[error("Task queue is closed")]
    Closed,

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Invalid task payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Succeeded,
    Failed,
}

/// Receipt for an accepted task. Task ids are unrelated to job ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub id: String,
    pub state: TaskState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueHealth {
    Healthy,
    Unhealthy(String),
}

impl QueueHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, QueueHealth::Healthy)
    }
}

pub trait TaskQueue: Send + Sync {
    /// Hands a task over without waiting for it to run.
    fn enqueue(&self, task_name: &str, payload: serde_json::Value)
        -> Result<TaskHandle, QueueError>;
}

/// Cheap probe consulted before every enqueue.
pub trait QueueHealthCheck: Send + Sync {
    fn check(&self) -> QueueHealth;
}

/// Arguments of [`PROCESS_PIPELINE_TASK`].
///
/// Exactly one of `text` and `file_path` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPayload {
    pub job_id: String,
    pub top_n: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_path: Option<String>,
}

impl TaskPayload {
    pub fn new(job_id: &str, source: &ContentSource, top_n: usize) -> Result<Self, QueueError> {
        let (text, file_path) = match source {
            ContentSource::Text(text) => (Some(text.clone()), None),
            ContentSource::Upload(path) => {
                let path = path.to_str().ok_or_else(|| {
                    QueueError::InvalidPayload("upload path is not valid UTF-8".to_string())
                })?;
                (None, Some(path.to_string()))
            }
        };
        Ok(Self {
            job_id: job_id.to_string(),
            top_n,
            text,
            file_path,
        })
    }

    pub fn encode(&self) -> Result<serde_json::Value, QueueError> {
        serde_json::to_value(self).map_err(|e| QueueError::InvalidPayload(e.to_string()))
    }

    pub fn decode(value: serde_json::Value) -> Result<Self, QueueError> {
        let payload: TaskPayload =
            serde_json::from_value(value).map_err(|e| QueueError::InvalidPayload(e.to_string()))?;
        match (&payload.text, &payload.file_path) {
            (Some(_), None) | (None, Some(_)) => Ok(payload),
            (Some(_), Some(_)) => Err(QueueError::InvalidPayload(
                "both text and file_path are set".to_string(),
            )),
            (None, None) => Err(QueueError::InvalidPayload(
                "one of text or file_path is required".to_string(),
            )),
        }
    }

    pub fn into_source(self) -> Result<ContentSource, QueueError> {
        match (self.text, self.file_path) {
            (Some(text), None) => Ok(ContentSource::Text(text)),
            (None, Some(path)) => Ok(ContentSource::Upload(PathBuf::from(path))),
            _ => Err(QueueError::InvalidPayload(
                "exactly one of text or file_path is required".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_payload_shape() {
        let payload = TaskPayload::new(
            "job-1",
            &ContentSource::Text("Preciso do relatório".to_string()),
            15,
        )
        .unwrap();
        let value = payload.encode().unwrap();
        assert_eq!(
            value,
            json!({"job_id": "job-1", "top_n": 15, "text": "Preciso do relatório"})
        );
    }

    #[test]
    fn test_upload_payload_shape() {
        let payload = TaskPayload::new(
            "job-2",
            &ContentSource::Upload(PathBuf::from("/tmp/uploads/upload-abc.txt")),
            5,
        )
        .unwrap();
        let value = payload.encode().unwrap();
        assert_eq!(
            value,
            json!({"job_id": "job-2", "top_n": 5, "file_path": "/tmp/uploads/upload-abc.txt"})
        );
        assert_eq!(
            TaskPayload::decode(value).unwrap().into_source().unwrap(),
            ContentSource::Upload(PathBuf::from("/tmp/uploads/upload-abc.txt"))
        );
    }

    #[test]
    fn test_decode_rejects_both_or_neither() {
        let both = json!({"job_id": "j", "top_n": 1, "text": "a", "file_path": "/b"});
        assert!(matches!(
            TaskPayload::decode(both),
            Err(QueueError::InvalidPayload(_))
        ));

        let neither = json!({"job_id": "j", "top_n": 1});
        assert!(matches!(
            TaskPayload::decode(neither),
            Err(QueueError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_types() {
        let value = json!({"job_id": 7, "top_n": "many", "text": "a"});
        assert!(TaskPayload::decode(value).is_err());
    }

    #[test]
    fn test_queue_health() {
        assert!(QueueHealth::Healthy.is_healthy());
        assert!(!QueueHealth::Unhealthy("down".to_string()).is_healthy());
    }
}
