use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_upload_directory")]
    pub upload_directory: String,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    pub preprocessing: ProviderConfig,
    pub inference: InferenceConfig,
}

fn default_data_root() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".mailtriage")
}

fn default_database_path() -> String {
    default_data_root()
        .join("data")
        .join("mailtriage.db")
        .to_string_lossy()
        .into_owned()
}

fn default_upload_directory() -> String {
    default_data_root()
        .join("uploads")
        .to_string_lossy()
        .into_owned()
}

/// Asynchronous execution settings.
///
/// With `enabled: false` every submission runs inline on the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Maximum number of tasks waiting for a worker.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_true() -> bool {
    true
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_capacity() -> usize {
    64
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            worker_count: default_worker_count(),
            capacity: default_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Number of most frequent tokens requested from the preprocessor.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

fn default_top_n() -> usize {
    15
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
        }
    }
}

/// Connection settings shared by both providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env_var: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl ProviderConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            api_key_file: None,
            api_key_env_var: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(flatten)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub format: InferenceFormat,
    /// Name of the mailbox owner, added to completion prompts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl InferenceConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            provider: ProviderConfig::new(url),
            format: InferenceFormat::default(),
            username: None,
        }
    }
}

/// Shape of the inference provider's response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceFormat {
    /// `{category, confidence, generated_response}` JSON.
    #[default]
    Structured,
    /// Free-form LLM completion, parsed line by line.
    Completion,
}
