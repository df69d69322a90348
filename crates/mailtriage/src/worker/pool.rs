use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::content::{remove_temp_file, ContentSource};
use crate::pipeline::{NoopProgress, Pipeline, ProgressReporter};
use crate::queue::{
    QueueError, QueueHealth, QueueHealthCheck, TaskHandle, TaskPayload, TaskQueue, TaskState,
    PROCESS_PIPELINE_TASK,
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What happened to one queued task.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task_id: String,
    pub job_id: String,
    pub state: TaskState,
    /// Whether the result reached the store. Always false on failure.
    pub persisted: bool,
    pub error: Option<String>,
}

struct Task {
    id: String,
    payload: TaskPayload,
}

/// In-process task queue backed by a fixed set of worker threads.
pub struct WorkerPool {
    task_sender: Sender<Task>,
    outcome_limit: usize,
    // Kept to discard tasks left behind by an immediate shutdown
    task_receiver: Receiver<Task>,
    outcome_receiver: Receiver<TaskOutcome>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
    draining: Arc<AtomicBool>,
    live_workers: Arc<AtomicUsize>,
}

impl WorkerPool {
    pub fn new(pipeline: Arc<Pipeline>, worker_count: usize, capacity: usize) -> Self {
        Self::with_progress(pipeline, worker_count, capacity, Arc::new(NoopProgress))
    }

    /// Creates a worker pool that reports job progress.
    ///
    /// # Panics
    /// Panics if `worker_count` or `capacity` is 0.
    pub fn with_progress(
        pipeline: Arc<Pipeline>,
        worker_count: usize,
        capacity: usize,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        assert!(capacity > 0, "capacity must be > 0");
        let (task_sender, task_receiver) = bounded::<Task>(capacity);
        // Outcomes nobody reads are dropped once this many are waiting
        let outcome_limit = worker_count + capacity;
        let (outcome_sender, outcome_receiver) = bounded::<TaskOutcome>(outcome_limit);
        let shutdown = Arc::new(AtomicBool::new(false));
        let draining = Arc::new(AtomicBool::new(false));
        let live_workers = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let worker = Worker {
                id: worker_id,
                tasks: task_receiver.clone(),
                outcomes: outcome_sender.clone(),
                shutdown: Arc::clone(&shutdown),
                draining: Arc::clone(&draining),
                pipeline: Arc::clone(&pipeline),
                progress: Arc::clone(&progress),
            };
            live_workers.fetch_add(1, Ordering::SeqCst);
            let live = LiveWorker(Arc::clone(&live_workers));

            workers.push(thread::spawn(move || {
                let _live = live;
                worker.run();
            }));
        }

        info!("Started {} workers (capacity {})", worker_count, capacity);

        Self {
            task_sender,
            outcome_limit,
            task_receiver,
            outcome_receiver,
            workers: Mutex::new(workers),
            shutdown,
            draining,
            live_workers,
        }
    }

    pub fn try_recv_outcome(&self) -> Option<TaskOutcome> {
        self.outcome_receiver.try_recv().ok()
    }

    pub fn recv_outcome_timeout(&self, timeout: Duration) -> Option<TaskOutcome> {
        self.outcome_receiver.recv_timeout(timeout).ok()
    }

    /// Most outcomes held for [`Self::try_recv_outcome`] at any time.
    pub fn outcome_limit(&self) -> usize {
        self.outcome_limit
    }

    /// Number of tasks waiting for a worker.
    pub fn backlog(&self) -> usize {
        self.task_sender.len()
    }

    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::SeqCst)
    }

    /// Stops accepting tasks; workers exit after their current task.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Stops accepting tasks; workers exit once the backlog is empty.
    pub fn drain(&self) {
        info!("Draining worker pool ({} queued)...", self.backlog());
        self.draining.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Joins every worker. Drains first if no stop was requested.
    pub fn wait(&self) {
        if !self.is_shutdown() && !self.is_draining() {
            self.drain();
        }

        let handles = match self.workers.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for (i, worker) in handles.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        self.discard_abandoned();
        info!("All workers have stopped");
    }

    /// Removes uploads of tasks that no worker will ever run. Their jobs stay
    /// `PROCESSING`.
    fn discard_abandoned(&self) {
        while let Ok(task) = self.task_receiver.try_recv() {
            warn!("Task {} for job {} abandoned at shutdown", task.id, task.payload.job_id);
            if let Ok(ContentSource::Upload(path)) = task.payload.into_source() {
                discard_upload(&path);
            }
        }
    }
}

fn discard_upload(path: &Path) {
    if let Err(e) = remove_temp_file(path) {
        warn!("Failed to remove abandoned upload: {}", e);
    }
}

impl TaskQueue for WorkerPool {
    fn enqueue(
        &self,
        task_name: &str,
        payload: serde_json::Value,
    ) -> Result<TaskHandle, QueueError> {
        if task_name != PROCESS_PIPELINE_TASK {
            return Err(QueueError::UnknownTask(task_name.to_string()));
        }
        if self.is_shutdown() || self.is_draining() {
            return Err(QueueError::Closed);
        }

        let payload = TaskPayload::decode(payload)?;
        let task = Task {
            id: Uuid::new_v4().to_string(),
            payload,
        };
        let task_id = task.id.clone();
        let job_id = task.payload.job_id.clone();

        self.task_sender.try_send(task).map_err(|e| match e {
            TrySendError::Full(_) => QueueError::Full,
            TrySendError::Disconnected(_) => QueueError::Closed,
        })?;

        debug!("Queued task {} for job {}", task_id, job_id);
        Ok(TaskHandle {
            id: task_id,
            state: TaskState::Queued,
        })
    }
}

impl QueueHealthCheck for WorkerPool {
    fn check(&self) -> QueueHealth {
        if self.is_shutdown() {
            return QueueHealth::Unhealthy("worker pool is shut down".to_string());
        }
        if self.is_draining() {
            return QueueHealth::Unhealthy("worker pool is draining".to_string());
        }
        if self.live_workers() == 0 {
            return QueueHealth::Unhealthy("no live workers".to_string());
        }
        if self.task_sender.is_full() {
            return QueueHealth::Unhealthy("task backlog is full".to_string());
        }
        QueueHealth::Healthy
    }
}

/// Decrements the live-worker count when a worker thread ends, even by panic.
struct LiveWorker(Arc<AtomicUsize>);

impl Drop for LiveWorker {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Worker {
    id: usize,
    tasks: Receiver<Task>,
    outcomes: Sender<TaskOutcome>,
    shutdown: Arc<AtomicBool>,
    draining: Arc<AtomicBool>,
    pipeline: Arc<Pipeline>,
    progress: Arc<dyn ProgressReporter>,
}

impl Worker {
    fn run(self) {
        debug!("Worker {} started", self.id);

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                debug!("Worker {} received shutdown signal", self.id);
                break;
            }

            match self.tasks.recv_timeout(POLL_INTERVAL) {
                Ok(task) => {
                    let outcome = self.process(task);
                    match self.outcomes.try_send(outcome) {
                        Ok(()) => {}
                        Err(TrySendError::Full(outcome)) => {
                            debug!(
                                "Worker {} dropped outcome of task {}: nobody is reading",
                                self.id, outcome.task_id
                            );
                        }
                        Err(TrySendError::Disconnected(_)) => {
                            debug!("Worker {} outcome receiver dropped", self.id);
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.draining.load(Ordering::SeqCst) {
                        debug!("Worker {} drained", self.id);
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Worker {} task channel disconnected", self.id);
                    break;
                }
            }
        }

        debug!("Worker {} stopped", self.id);
    }

    fn process(&self, task: Task) -> TaskOutcome {
        let job_id = task.payload.job_id.clone();
        let top_n = task.payload.top_n;
        debug!("Worker {} processing task {} (job {})", self.id, task.id, job_id);

        let source = match task.payload.into_source() {
            Ok(source) => source,
            Err(e) => {
                error!("Worker {} dropped task {}: {}", self.id, task.id, e);
                return TaskOutcome {
                    task_id: task.id,
                    job_id,
                    state: TaskState::Failed,
                    persisted: false,
                    error: Some(e.to_string()),
                };
            }
        };

        // Failures are already recorded on the job by the pipeline
        match self.pipeline.run(&job_id, source, top_n, self.progress.as_ref()) {
            Ok(output) => TaskOutcome {
                task_id: task.id,
                job_id,
                state: TaskState::Succeeded,
                persisted: output.persisted,
                error: None,
            },
            Err(e) => {
                debug!("Worker {} task {} failed: {}", self.id, task.id, e);
                TaskOutcome {
                    task_id: task.id,
                    job_id,
                    state: TaskState::Failed,
                    persisted: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
