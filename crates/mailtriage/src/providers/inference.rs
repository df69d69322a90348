use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::{InferenceConfig, InferenceFormat};

use super::category::Category;
use super::completion;
use super::error::ProviderError;
use super::http::JsonEndpoint;

const PROVIDER: &str = "inference";

/// Classification plus suggested reply for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inference {
    pub category: Category,
    /// Always within `[0, 1]` when present.
    pub confidence: Option<f64>,
    pub generated_reply: String,
}

impl Inference {
    pub fn new(category: Category, confidence: Option<f64>, generated_reply: String) -> Self {
        Self {
            category,
            confidence: valid_confidence(confidence),
            generated_reply,
        }
    }
}

fn valid_confidence(confidence: Option<f64>) -> Option<f64> {
    match confidence {
        Some(value) if value.is_finite() && (0.0..=1.0).contains(&value) => Some(value),
        Some(value) => {
            log::warn!("Dropping confidence outside [0, 1]: {}", value);
            None
        }
        None => None,
    }
}

/// Classifies cleaned text and drafts a reply.
pub trait InferenceProvider: Send + Sync {
    fn infer(&self, cleaned_text: &str) -> Result<Inference, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct StructuredResponse {
    category: Option<String>,
    confidence: Option<f64>,
    generated_response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    text: String,
}

/// Calls a remote model, either for structured JSON or for a raw completion.
pub struct HttpInference {
    endpoint: JsonEndpoint,
    format: InferenceFormat,
    username: Option<String>,
}

impl HttpInference {
    pub fn from_config(config: &InferenceConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            endpoint: JsonEndpoint::from_config(PROVIDER, &config.provider)?,
            format: config.format,
            username: config.username.clone(),
        })
    }

    fn infer_structured(&self, cleaned_text: &str) -> Result<Inference, ProviderError> {
        let body = self.endpoint.post(&json!({
            "task": "infer",
            "text": cleaned_text,
        }))?;
        parse_structured(&body)
    }

    fn infer_completion(&self, cleaned_text: &str) -> Result<Inference, ProviderError> {
        let prompt = completion::build_prompt(cleaned_text, self.username.as_deref());
        let body = self.endpoint.post(&json!({
            "task": "generate",
            "text": prompt,
        }))?;

        // Providers either wrap the completion in `{"text": ...}` or return it bare
        let text = match serde_json::from_str::<CompletionResponse>(&body) {
            Ok(wrapped) => wrapped.text,
            Err(_) => body,
        };
        if text.trim().is_empty() {
            return Err(ProviderError::malformed(PROVIDER, "empty completion"));
        }
        Ok(completion::parse_completion(&text))
    }
}

/// Parses a `{category, confidence, generated_response}` body.
pub fn parse_structured(body: &str) -> Result<Inference, ProviderError> {
    let raw: StructuredResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::malformed(PROVIDER, e.to_string()))?;
    let reply = raw
        .generated_response
        .ok_or_else(|| ProviderError::malformed(PROVIDER, "missing generated_response"))?;
    Ok(Inference::new(
        Category::normalize(raw.category.as_deref()),
        raw.confidence,
        reply,
    ))
}

impl InferenceProvider for HttpInference {
    fn infer(&self, cleaned_text: &str) -> Result<Inference, ProviderError> {
        match self.format {
            InferenceFormat::Structured => self.infer_structured(cleaned_text),
            InferenceFormat::Completion => self.infer_completion(cleaned_text),
        }
    }
}
