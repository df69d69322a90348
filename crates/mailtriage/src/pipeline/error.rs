use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::content::ContentError;
use crate::providers::ProviderError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Content unavailable: {0}")]
    Content(#[from] ContentError),

    #[error("Preprocessing unavailable: {0}")]
    Preprocessing(#[source] ProviderError),

    #[error("Inference unavailable: {0}")]
    Inference(#[source] ProviderError),
}

impl PipelineError {
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineError::Content(_) => PipelineStage::ContentLoad,
            PipelineError::Preprocessing(_) => PipelineStage::Preprocessing,
            PipelineError::Inference(_) => PipelineStage::Inference,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    ContentLoad,
    Preprocessing,
    Inference,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::ContentLoad => write!(f, "content load"),
            PipelineStage::Preprocessing => write!(f, "preprocessing"),
            PipelineStage::Inference => write!(f, "inference"),
        }
    }
}
