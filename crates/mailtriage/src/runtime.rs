//! Wiring of store, pipeline, worker pool and service from a [`Config`].

use std::path::Path;
use std::sync::Arc;

use log::info;

use crate::config::Config;
use crate::content::UploadStorage;
use crate::db::Database;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::pipeline::{BroadcastProgress, Pipeline, PipelineConfig, ProgressReporter};
use crate::queue::{QueueHealthCheck, TaskQueue};
use crate::service::JobService;
use crate::store::{JobStore, SqliteJobStore};
use crate::worker::WorkerPool;

const PROGRESS_CAPACITY: usize = 256;

/// Everything a running process needs, built once at startup.
pub struct Runtime {
    pub store: Arc<SqliteJobStore>,
    pub pipeline: Arc<Pipeline>,
    /// Present when the queue is enabled.
    pub worker_pool: Option<Arc<WorkerPool>>,
    pub progress: Arc<BroadcastProgress>,
    service: JobService,
}

impl Runtime {
    /// Opens the database and builds both HTTP providers.
    pub fn start(config: &Config) -> Result<Self> {
        let db = Database::open(Path::new(&config.database_path))?;
        let store = Arc::new(SqliteJobStore::new(db));
        let pipeline_config = PipelineConfig::from_config(config);
        let pipeline = Arc::new(Pipeline::from_config(
            &pipeline_config,
            store.clone() as Arc<dyn JobStore>,
        )?);
        Ok(Self::assemble(config, store, pipeline))
    }

    /// Builds the runtime around an existing store and pipeline.
    pub fn assemble(config: &Config, store: Arc<SqliteJobStore>, pipeline: Arc<Pipeline>) -> Self {
        let progress = Arc::new(BroadcastProgress::new(PROGRESS_CAPACITY));
        let reporter: Arc<dyn ProgressReporter> = progress.clone();

        let (worker_pool, dispatcher) = if config.queue.enabled {
            let pool = Arc::new(WorkerPool::with_progress(
                Arc::clone(&pipeline),
                config.queue.worker_count,
                config.queue.capacity,
                Arc::clone(&reporter),
            ));
            let dispatcher = Dispatcher::new(
                Arc::clone(&pipeline),
                pool.clone() as Arc<dyn TaskQueue>,
                Some(pool.clone() as Arc<dyn QueueHealthCheck>),
            );
            (Some(pool), dispatcher)
        } else {
            info!("Queue disabled; jobs run inline");
            (None, Dispatcher::inline_only(Arc::clone(&pipeline)))
        };

        let service = JobService::new(
            store.clone(),
            UploadStorage::new(&config.upload_directory),
            dispatcher.with_progress(reporter),
            config.pipeline.top_n,
        );

        Self {
            store,
            pipeline,
            worker_pool,
            progress,
            service,
        }
    }

    pub fn service(&self) -> &JobService {
        &self.service
    }

    /// Lets queued jobs finish, then stops the workers.
    pub fn stop(&self) {
        if let Some(pool) = &self.worker_pool {
            pool.drain();
            pool.wait();
        }
    }
}
