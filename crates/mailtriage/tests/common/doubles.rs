//! Scripted stand-ins for the providers and the queue.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use mailtriage::providers::{
    Category, Inference, InferenceProvider, Preprocessed, Preprocessor, ProviderError,
};
use mailtriage::queue::{QueueError, QueueHealth, QueueHealthCheck, TaskHandle, TaskQueue};

/// Lowercases and splits on whitespace.
pub struct LowercasePreprocessor;

impl Preprocessor for LowercasePreprocessor {
    fn preprocess(&self, text: &str, top_n: usize) -> Result<Preprocessed, ProviderError> {
        let tokens: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
        Ok(Preprocessed {
            cleaned_text: tokens.join(" "),
            unique_tokens: tokens.len(),
            total_tokens: tokens.len(),
            top_tokens: tokens.iter().take(top_n).map(|t| (t.clone(), 1)).collect(),
            tokens,
            original_len: text.chars().count(),
        })
    }
}

/// Returns the same inference for every call and counts calls.
pub struct FixedInference {
    inference: Inference,
    pub calls: AtomicUsize,
}

impl FixedInference {
    pub fn new(category: Category, confidence: Option<f64>, reply: &str) -> Self {
        Self {
            inference: Inference::new(category, confidence, reply.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn produtivo() -> Self {
        Self::new(Category::Produtivo, Some(0.9), "Obrigado, vamos revisar.")
    }
}

impl InferenceProvider for FixedInference {
    fn infer(&self, _cleaned_text: &str) -> Result<Inference, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.inference.clone())
    }
}

/// Always times out.
pub struct TimeoutInference;

impl InferenceProvider for TimeoutInference {
    fn infer(&self, _cleaned_text: &str) -> Result<Inference, ProviderError> {
        Err(ProviderError::Timeout {
            provider: "inference",
        })
    }
}

/// A queue whose broker is gone: unhealthy, and refuses every task.
pub struct BrokenQueue {
    pub attempts: AtomicUsize,
}

impl BrokenQueue {
    pub fn new() -> Self {
        Self {
            attempts: AtomicUsize::new(0),
        }
    }
}

impl TaskQueue for BrokenQueue {
    fn enqueue(
        &self,
        _task_name: &str,
        _payload: serde_json::Value,
    ) -> Result<TaskHandle, QueueError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(QueueError::Closed)
    }
}

impl QueueHealthCheck for BrokenQueue {
    fn check(&self) -> QueueHealth {
        QueueHealth::Unhealthy("connection refused".to_string())
    }
}
