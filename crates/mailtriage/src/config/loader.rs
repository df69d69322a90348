use std::path::Path;

use crate::config::schema::{Config, ProviderConfig};
use crate::error::ConfigError;

const SUPPORTED_VERSION: &str = "1.0";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != SUPPORTED_VERSION {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.pipeline.top_n == 0 {
        return Err(ConfigError::Validation {
            message: "pipeline.top_n must be at least 1".to_string(),
        });
    }

    if config.queue.enabled {
        if config.queue.worker_count == 0 {
            return Err(ConfigError::Validation {
                message: "queue.worker_count must be at least 1 when the queue is enabled"
                    .to_string(),
            });
        }
        if config.queue.capacity == 0 {
            return Err(ConfigError::Validation {
                message: "queue.capacity must be at least 1 when the queue is enabled".to_string(),
            });
        }
    }

    validate_provider("preprocessing", &config.preprocessing)?;
    validate_provider("inference", &config.inference.provider)?;

    Ok(())
}

fn validate_provider(name: &str, provider: &ProviderConfig) -> Result<(), ConfigError> {
    let url = provider.url.trim();
    if url.is_empty() {
        return Err(ConfigError::InvalidProvider {
            name: name.to_string(),
            reason: "url is empty".to_string(),
        });
    }
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::InvalidProvider {
            name: name.to_string(),
            reason: format!("url must be http(s): {}", url),
        });
    }
    if provider.timeout_secs == 0 {
        return Err(ConfigError::InvalidProvider {
            name: name.to_string(),
            reason: "timeout_secs must be greater than zero".to_string(),
        });
    }
    Ok(())
}
