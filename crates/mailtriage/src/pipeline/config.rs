use crate::config::{Config, InferenceConfig, ProviderConfig};

pub struct PipelineConfig {
    pub preprocessing: ProviderConfig,
    pub inference: InferenceConfig,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            preprocessing: config.preprocessing.clone(),
            inference: config.inference.clone(),
        }
    }
}
