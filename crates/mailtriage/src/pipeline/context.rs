use crate::content::{ContentSource, TempFile};
use crate::sanitize;

/// Inputs of a single pipeline run.
pub struct PipelineContext {
    pub job_id: String,
    pub source: ContentSource,
    pub top_n: usize,

    // Removes the upload when the run ends, however it ends
    _upload: Option<TempFile>,
}

impl PipelineContext {
    pub fn new(job_id: &str, source: ContentSource, top_n: usize) -> Self {
        let upload = source.upload_path().cloned().map(TempFile::adopt);
        Self {
            job_id: job_id.to_string(),
            source,
            top_n,
            _upload: upload,
        }
    }

    /// Span-safe description of the source.
    pub fn source_label(&self) -> String {
        match &self.source {
            ContentSource::Text(_) => "inline".to_string(),
            ContentSource::Upload(path) => sanitize::redact_path(path),
        }
    }
}
