use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};

use crate::content::{ContentLoader, ContentSource};
use crate::providers::{
    Category, HttpInference, HttpPreprocessor, Inference, InferenceProvider, Preprocessed,
    Preprocessor, ProviderError,
};
use crate::store::JobStore;

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::PipelineError;
use super::progress::{JobPhase, ProgressEvent, ProgressReporter};

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    pub job_id: String,
    pub category: Category,
    pub confidence: Option<f64>,
    pub generated_reply: String,
    pub preprocessing: Preprocessed,
    /// False when the result could not be written and the job is still
    /// `PROCESSING`.
    pub persisted: bool,
}

/// Outcome counters shared by every path that runs the pipeline.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    completed: AtomicU64,
    failed: AtomicU64,
    orphaned: AtomicU64,
    unpersisted: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub completed: u64,
    pub failed: u64,
    /// Failed runs whose `FAILED` write also failed.
    pub orphaned: u64,
    /// Successful runs whose result write failed.
    pub unpersisted: u64,
}

impl PipelineMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            orphaned: self.orphaned.load(Ordering::Relaxed),
            unpersisted: self.unpersisted.load(Ordering::Relaxed),
        }
    }
}

pub struct Pipeline {
    store: Arc<dyn JobStore>,
    preprocessor: Arc<dyn Preprocessor>,
    inference: Arc<dyn InferenceProvider>,
    metrics: PipelineMetrics,
}

impl Pipeline {
    /// Production constructor: builds both HTTP providers from config.
    pub fn from_config(
        config: &PipelineConfig,
        store: Arc<dyn JobStore>,
    ) -> Result<Self, ProviderError> {
        let preprocessor = HttpPreprocessor::from_config(&config.preprocessing)?;
        let inference = HttpInference::from_config(&config.inference)?;
        Ok(Self::new(store, Arc::new(preprocessor), Arc::new(inference)))
    }

    pub fn new(
        store: Arc<dyn JobStore>,
        preprocessor: Arc<dyn Preprocessor>,
        inference: Arc<dyn InferenceProvider>,
    ) -> Self {
        Self {
            store,
            preprocessor,
            inference,
            metrics: PipelineMetrics::default(),
        }
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Runs the full pipeline for one job and records the outcome on it.
    ///
    /// An upload source is deleted before this returns, on every path.
    pub fn run(
        &self,
        job_id: &str,
        source: ContentSource,
        top_n: usize,
        progress: &dyn ProgressReporter,
    ) -> Result<PipelineOutput, PipelineError> {
        let ctx = PipelineContext::new(job_id, source, top_n);
        let _pipeline_span = info_span!("pipeline",
            job_id = %ctx.job_id,
            source = %ctx.source_label(),
            top_n = ctx.top_n,
        )
        .entered();

        match self.execute(&ctx, progress) {
            Ok((preprocessing, inference)) => {
                let persisted = {
                    let _step = info_span!("persist").entered();
                    progress.report(ProgressEvent::phase(
                        &ctx.job_id,
                        JobPhase::Persisting,
                        "Saving result...",
                    ));
                    self.step_persist(&ctx, &inference)
                };

                progress.report(ProgressEvent::completed(
                    &ctx.job_id,
                    inference.category,
                    persisted,
                ));

                Ok(PipelineOutput {
                    job_id: ctx.job_id.clone(),
                    category: inference.category,
                    confidence: inference.confidence,
                    generated_reply: inference.generated_reply,
                    preprocessing,
                    persisted,
                })
            }
            Err(e) => {
                self.record_failure(&ctx, &e);
                progress.report(ProgressEvent::failed(&ctx.job_id, &e.to_string()));
                Err(e)
            }
        }
    }

    fn execute(
        &self,
        ctx: &PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> Result<(Preprocessed, Inference), PipelineError> {
        // Step 1: Load content
        let text = {
            let _step = info_span!("load_content").entered();
            progress.report(ProgressEvent::phase(
                &ctx.job_id,
                JobPhase::Loading,
                "Loading content...",
            ));
            self.step_load_content(ctx)?
        };

        // Step 2: Preprocess
        let preprocessed = {
            let _step = info_span!("preprocess").entered();
            progress.report(ProgressEvent::phase(
                &ctx.job_id,
                JobPhase::Preprocessing,
                "Cleaning and tokenizing text...",
            ));
            self.step_preprocess(ctx, &text)?
        };

        // Step 3: Infer
        let inference = {
            let _step = info_span!("infer").entered();
            progress.report(ProgressEvent::phase(
                &ctx.job_id,
                JobPhase::Inferring,
                "Classifying and drafting reply...",
            ));
            self.step_infer(&preprocessed)?
        };

        Ok((preprocessed, inference))
    }

    fn step_load_content(&self, ctx: &PipelineContext) -> Result<String, PipelineError> {
        let text = ContentLoader::load(&ctx.source)?;
        debug!(chars = text.chars().count(), "Content loaded");
        Ok(text)
    }

    fn step_preprocess(
        &self,
        ctx: &PipelineContext,
        text: &str,
    ) -> Result<Preprocessed, PipelineError> {
        let preprocessed = self
            .preprocessor
            .preprocess(text, ctx.top_n)
            .map_err(PipelineError::Preprocessing)?;
        debug!(
            total_tokens = preprocessed.total_tokens,
            unique_tokens = preprocessed.unique_tokens,
            "Text preprocessed"
        );
        Ok(preprocessed)
    }

    fn step_infer(&self, preprocessed: &Preprocessed) -> Result<Inference, PipelineError> {
        let inference = self
            .inference
            .infer(&preprocessed.cleaned_text)
            .map_err(PipelineError::Inference)?;
        debug!(
            category = %inference.category,
            confidence = ?inference.confidence,
            "Inference received"
        );
        Ok(inference)
    }

    /// Returns whether the result reached the store.
    fn step_persist(&self, ctx: &PipelineContext, inference: &Inference) -> bool {
        match self.store.mark_completed(&ctx.job_id, inference) {
            Ok(()) => {
                self.metrics.completed.fetch_add(1, Ordering::Relaxed);
                info!(category = %inference.category, "Job completed");
                true
            }
            Err(e) => {
                self.metrics.unpersisted.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "Result computed but not persisted; job left PROCESSING");
                false
            }
        }
    }

    /// Marks the job `FAILED`, best effort.
    fn record_failure(&self, ctx: &PipelineContext, err: &PipelineError) {
        self.metrics.failed.fetch_add(1, Ordering::Relaxed);
        warn!(stage = %err.stage(), error = %err, "Pipeline failed");

        if let Err(store_err) = self.store.mark_failed(&ctx.job_id, &err.to_string()) {
            self.metrics.orphaned.fetch_add(1, Ordering::Relaxed);
            error!(
                orphaned = true,
                stage = %err.stage(),
                error = %store_err,
                "Could not mark job FAILED; job left PROCESSING"
            );
        }
    }
}
