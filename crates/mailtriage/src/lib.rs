pub mod config;
pub mod content;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod providers;
pub mod queue;
pub mod runtime;
pub mod sanitize;
pub mod secrets;
pub mod service;
pub mod store;
pub mod worker;

pub use config::{load_config, Config};
pub use content::{ContentSource, UploadStorage};
pub use db::Database;
pub use dispatch::{Dispatch, Dispatcher, FallbackReason};
pub use error::{ConfigError, Result, TriageError};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, PipelineOutput};
pub use providers::{Category, Inference, ProviderError};
pub use queue::{QueueError, QueueHealth, TaskHandle, TaskQueue};
pub use runtime::Runtime;
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use service::{JobService, ServiceError, Submission, SubmitOutcome};
pub use store::{JobRecord, JobStatus, JobStore, SqliteJobStore, StoreError};
pub use worker::WorkerPool;
