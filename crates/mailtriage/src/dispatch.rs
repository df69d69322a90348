//! Deciding, once per submission, whether a job runs on the queue or inline.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::content::ContentSource;
use crate::pipeline::{
    JobPhase, NoopProgress, Pipeline, PipelineError, PipelineOutput, ProgressEvent,
    ProgressReporter,
};
use crate::queue::{
    QueueError, QueueHealth, QueueHealthCheck, TaskHandle, TaskPayload, TaskQueue,
    PROCESS_PIPELINE_TASK,
};
use crate::store::JobRecord;

/// How a submission was handled.
#[derive(Debug)]
pub enum Dispatch {
    /// Accepted by the queue; a worker will record the outcome.
    Queued(TaskHandle),
    /// Ran inline and succeeded.
    Completed(PipelineOutput),
    /// Ran inline and failed. The job has been marked `FAILED` if the store
    /// allowed it.
    Failed(PipelineError),
}

/// Why a submission ran inline.
#[derive(Debug)]
pub enum FallbackReason {
    NotConfigured,
    Unhealthy(String),
    EnqueueFailed(QueueError),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::NotConfigured => write!(f, "no queue configured"),
            FallbackReason::Unhealthy(reason) => write!(f, "queue unhealthy: {}", reason),
            FallbackReason::EnqueueFailed(e) => write!(f, "enqueue failed: {}", e),
        }
    }
}

pub struct Dispatcher {
    queue: Option<Arc<dyn TaskQueue>>,
    health: Option<Arc<dyn QueueHealthCheck>>,
    pipeline: Arc<Pipeline>,
    progress: Arc<dyn ProgressReporter>,
    fallbacks: AtomicU64,
}

impl Dispatcher {
    /// A dispatcher that prefers `queue`. Without a health check the queue is
    /// assumed healthy and only enqueue failures trigger fallback.
    pub fn new(
        pipeline: Arc<Pipeline>,
        queue: Arc<dyn TaskQueue>,
        health: Option<Arc<dyn QueueHealthCheck>>,
    ) -> Self {
        Self {
            queue: Some(queue),
            health,
            pipeline,
            progress: Arc::new(NoopProgress),
            fallbacks: AtomicU64::new(0),
        }
    }

    pub fn inline_only(pipeline: Arc<Pipeline>) -> Self {
        Self {
            queue: None,
            health: None,
            pipeline,
            progress: Arc::new(NoopProgress),
            fallbacks: AtomicU64::new(0),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Number of submissions that ran inline.
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Hands `job` to exactly one execution path.
    ///
    /// An upload in `source` belongs to whichever path is chosen and is
    /// removed by it.
    pub fn submit(&self, job: &JobRecord, source: ContentSource, top_n: usize) -> Dispatch {
        match self.try_enqueue(&job.id, &source, top_n) {
            Ok(handle) => {
                info!("Job {} queued as task {}", job.id, handle.id);
                self.progress.report(ProgressEvent::phase(
                    &job.id,
                    JobPhase::Queued,
                    "Waiting for a worker",
                ));
                Dispatch::Queued(handle)
            }
            Err(reason) => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                warn!("Job {} running inline: {}", job.id, reason);
                match self
                    .pipeline
                    .run(&job.id, source, top_n, self.progress.as_ref())
                {
                    Ok(output) => Dispatch::Completed(output),
                    Err(e) => Dispatch::Failed(e),
                }
            }
        }
    }

    fn try_enqueue(
        &self,
        job_id: &str,
        source: &ContentSource,
        top_n: usize,
    ) -> Result<TaskHandle, FallbackReason> {
        let queue = self.queue.as_ref().ok_or(FallbackReason::NotConfigured)?;

        if let Some(health) = &self.health {
            if let QueueHealth::Unhealthy(reason) = health.check() {
                return Err(FallbackReason::Unhealthy(reason));
            }
        }

        let payload = TaskPayload::new(job_id, source, top_n)
            .and_then(|p| p.encode())
            .map_err(FallbackReason::EnqueueFailed)?;
        debug!("Enqueueing {} for job {}", PROCESS_PIPELINE_TASK, job_id);
        queue
            .enqueue(PROCESS_PIPELINE_TASK, payload)
            .map_err(FallbackReason::EnqueueFailed)
    }
}
