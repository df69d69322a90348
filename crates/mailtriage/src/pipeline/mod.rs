pub mod config;
pub mod context;
pub mod error;
pub mod progress;
pub mod runner;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::{PipelineError, PipelineStage};
pub use progress::{BroadcastProgress, JobPhase, NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::{MetricsSnapshot, Pipeline, PipelineMetrics, PipelineOutput};
