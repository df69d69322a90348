//! Isolated environment for end-to-end job tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use mailtriage::config::{load_config_from_str, Config};
use mailtriage::content::UploadStorage;
use mailtriage::db::Database;
use mailtriage::dispatch::Dispatcher;
use mailtriage::pipeline::Pipeline;
use mailtriage::providers::{InferenceProvider, Preprocessor};
use mailtriage::queue::{QueueHealthCheck, TaskQueue};
use mailtriage::service::JobService;
use mailtriage::store::{JobRecord, JobStatus, JobStore, SqliteJobStore};
use mailtriage::worker::WorkerPool;

pub struct TestHarness {
    temp_dir: TempDir,
    pub upload_dir: PathBuf,
    pub store: Arc<SqliteJobStore>,
}

impl TestHarness {
    /// A fresh on-disk database and an empty upload directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let upload_dir = temp_dir.path().join("uploads");
        std::fs::create_dir_all(&upload_dir).expect("Failed to create upload dir");
        let db = Database::open(&temp_dir.path().join("data").join("jobs.db"))
            .expect("Failed to open test database");

        Self {
            temp_dir,
            upload_dir,
            store: Arc::new(SqliteJobStore::new(db)),
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn pipeline(
        &self,
        preprocessor: Arc<dyn Preprocessor>,
        inference: Arc<dyn InferenceProvider>,
    ) -> Arc<Pipeline> {
        Arc::new(Pipeline::new(self.store.clone(), preprocessor, inference))
    }

    pub fn uploads(&self) -> UploadStorage {
        UploadStorage::new(&self.upload_dir)
    }

    /// A service that runs every job on the caller.
    pub fn inline_service(&self, pipeline: Arc<Pipeline>) -> JobService {
        JobService::new(
            self.store.clone(),
            self.uploads(),
            Dispatcher::inline_only(pipeline),
            15,
        )
    }

    /// A service in front of `queue`, falling back to `pipeline`.
    pub fn queued_service<Q>(&self, pipeline: Arc<Pipeline>, queue: Arc<Q>) -> JobService
    where
        Q: TaskQueue + QueueHealthCheck + 'static,
    {
        let dispatcher = Dispatcher::new(
            pipeline,
            queue.clone() as Arc<dyn TaskQueue>,
            Some(queue as Arc<dyn QueueHealthCheck>),
        );
        JobService::new(self.store.clone(), self.uploads(), dispatcher, 15)
    }

    pub fn worker_pool(&self, pipeline: Arc<Pipeline>) -> Arc<WorkerPool> {
        Arc::new(WorkerPool::new(pipeline, 2, 16))
    }

    pub fn job(&self, id: &str) -> JobRecord {
        self.store
            .get(id)
            .expect("Failed to read job")
            .expect("Job not found")
    }

    /// Polls until the job leaves `PROCESSING`.
    pub fn wait_terminal(&self, id: &str) -> JobRecord {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let job = self.job(id);
            if job.status.is_terminal() || Instant::now() > deadline {
                return job;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    pub fn upload_count(&self) -> usize {
        std::fs::read_dir(&self.upload_dir)
            .expect("Failed to read upload dir")
            .count()
    }

    /// A valid config whose data lives under the harness directory.
    pub fn config(&self, preprocessing_url: &str, inference_url: &str, queue: bool) -> Config {
        self.config_with_timeout(preprocessing_url, inference_url, queue, 5)
    }

    pub fn config_with_timeout(
        &self,
        preprocessing_url: &str,
        inference_url: &str,
        queue: bool,
        timeout_secs: u64,
    ) -> Config {
        let json = serde_json::json!({
            "version": "1.0",
            "database_path": self.temp_path().join("runtime").join("jobs.db"),
            "upload_directory": self.upload_dir,
            "queue": { "enabled": queue, "worker_count": 1, "capacity": 4 },
            "preprocessing": { "url": preprocessing_url, "timeout_secs": timeout_secs },
            "inference": { "url": inference_url, "timeout_secs": timeout_secs },
        });
        load_config_from_str(&json.to_string()).expect("Failed to build config")
    }

    pub fn count(&self, status: JobStatus) -> u64 {
        self.store.count_by_status(status).expect("Failed to count jobs")
    }
}
