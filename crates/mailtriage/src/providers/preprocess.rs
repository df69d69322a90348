use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::ProviderConfig;

use super::error::ProviderError;
use super::http::JsonEndpoint;

const PROVIDER: &str = "preprocessing";

/// Normalized preprocessing output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessed {
    pub cleaned_text: String,
    pub tokens: Vec<String>,
    pub unique_tokens: usize,
    pub total_tokens: usize,
    /// Most frequent tokens with their counts, at most `top_n` entries.
    pub top_tokens: Vec<(String, u64)>,
    /// Character count of the submitted text.
    pub original_len: usize,
}

/// Only `cleaned_text` is strict. Everything else is coerced or defaulted.
#[derive(Debug, Deserialize)]
struct RawPreprocessed {
    cleaned_text: Option<String>,
    #[serde(default)]
    tokens: Value,
    #[serde(default)]
    unique_tokens: Value,
    #[serde(default)]
    total_tokens: Value,
    #[serde(default)]
    top_tokens: Value,
    #[serde(default)]
    original_len: Value,
}

/// Integer counts sent as `3`, `3.0` or `"3"`.
fn count(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64))
            .map(|n| n as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_tokens(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// One `top_tokens` entry, either `["token", 3]` or `{"token": "token", "count": 3}`.
fn top_token(value: &Value) -> Option<(String, u64)> {
    let (token, freq) = match value {
        Value::Array(pair) if pair.len() == 2 => (pair[0].as_str()?, &pair[1]),
        Value::Object(entry) => {
            let token = ["token", "word", "text"]
                .iter()
                .find_map(|key| entry.get(*key).and_then(Value::as_str))?;
            let freq = ["count", "freq", "frequency"]
                .iter()
                .find_map(|key| entry.get(*key))?;
            (token, freq)
        }
        _ => return None,
    };
    Some((token.to_string(), count(freq)? as u64))
}

fn top_tokens(value: &Value) -> Vec<(String, u64)> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    let parsed: Vec<(String, u64)> = items.iter().filter_map(top_token).collect();
    if parsed.len() < items.len() {
        log::debug!(
            "Skipped {} unrecognized top_tokens entries",
            items.len() - parsed.len()
        );
    }
    parsed
}

impl Preprocessed {
    /// Parses a provider response body, filling omitted fields from the
    /// request.
    pub fn from_response(body: &str, text: &str, top_n: usize) -> Result<Self, ProviderError> {
        let raw: RawPreprocessed = serde_json::from_str(body)
            .map_err(|e| ProviderError::malformed(PROVIDER, e.to_string()))?;

        let cleaned_text = raw
            .cleaned_text
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::malformed(PROVIDER, "missing cleaned_text"))?;

        let tokens = string_tokens(&raw.tokens);
        let mut top_tokens = top_tokens(&raw.top_tokens);
        top_tokens.truncate(top_n);

        Ok(Self {
            cleaned_text,
            unique_tokens: count(&raw.unique_tokens).unwrap_or(tokens.len()),
            total_tokens: count(&raw.total_tokens).unwrap_or(tokens.len()),
            tokens,
            top_tokens,
            original_len: count(&raw.original_len).unwrap_or_else(|| text.chars().count()),
        })
    }
}

/// Cleans and tokenizes raw text ahead of inference.
pub trait Preprocessor: Send + Sync {
    fn preprocess(&self, text: &str, top_n: usize) -> Result<Preprocessed, ProviderError>;
}

/// Calls a remote NLP service.
pub struct HttpPreprocessor {
    endpoint: JsonEndpoint,
}

impl HttpPreprocessor {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            endpoint: JsonEndpoint::from_config(PROVIDER, config)?,
        })
    }
}

impl Preprocessor for HttpPreprocessor {
    fn preprocess(&self, text: &str, top_n: usize) -> Result<Preprocessed, ProviderError> {
        let body = self.endpoint.post(&json!({
            "task": "nlp",
            "text": text,
            "top_n": top_n,
        }))?;
        log::debug!("{} responded with {} bytes", self.endpoint.name(), body.len());
        Preprocessed::from_response(&body, text, top_n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use std::io::Write;

    fn provider_for(url: String) -> HttpPreprocessor {
        HttpPreprocessor::from_config(&ProviderConfig::new(url)).unwrap()
    }

    #[test]
    fn test_defaults_from_tokens() {
        let body = r#"{"cleaned_text": "preciso relatorio sexta", "tokens": ["preciso", "relatorio", "sexta"]}"#;
        let out = Preprocessed::from_response(body, "Preciso do relatório até sexta", 15).unwrap();
        assert_eq!(out.unique_tokens, 3);
        assert_eq!(out.total_tokens, 3);
        assert!(out.top_tokens.is_empty());
        assert_eq!(out.original_len, "Preciso do relatório até sexta".chars().count());
    }

    #[test]
    fn test_explicit_counts_kept_and_top_tokens_truncated() {
        let body = r#"{
            "cleaned_text": "a b a c",
            "tokens": ["a", "b", "a", "c"],
            "unique_tokens": 3,
            "total_tokens": 4,
            "top_tokens": [["a", 2], ["b", 1], ["c", 1]],
            "original_len": 99
        }"#;
        let out = Preprocessed::from_response(body, "a b a c", 2).unwrap();
        assert_eq!(out.unique_tokens, 3);
        assert_eq!(out.total_tokens, 4);
        assert_eq!(
            out.top_tokens,
            vec![("a".to_string(), 2), ("b".to_string(), 1)]
        );
        assert_eq!(out.original_len, 99);
    }

    #[test]
    fn test_loose_optional_fields_are_coerced() {
        let body = r#"{
            "cleaned_text": "reuniao amanha",
            "tokens": ["reuniao", 7, "amanha"],
            "unique_tokens": 2.0,
            "total_tokens": "2",
            "top_tokens": [
                {"token": "reuniao", "count": 1.0},
                ["amanha", "1"],
                "solto"
            ],
            "original_len": 14.0
        }"#;
        let out = Preprocessed::from_response(body, "Reunião amanhã", 15).unwrap();
        assert_eq!(out.tokens, vec!["reuniao", "amanha"]);
        assert_eq!(out.unique_tokens, 2);
        assert_eq!(out.total_tokens, 2);
        assert_eq!(
            out.top_tokens,
            vec![("reuniao".to_string(), 1), ("amanha".to_string(), 1)]
        );
        assert_eq!(out.original_len, 14);
    }

    #[test]
    fn test_unusable_counts_fall_back_to_defaults() {
        let body = r#"{"cleaned_text": "oi", "tokens": ["oi"], "unique_tokens": "muitos", "total_tokens": null, "top_tokens": {"oi": 1}}"#;
        let out = Preprocessed::from_response(body, "Oi!", 15).unwrap();
        assert_eq!(out.unique_tokens, 1);
        assert_eq!(out.total_tokens, 1);
        assert!(out.top_tokens.is_empty());
        assert_eq!(out.original_len, 3);
    }

    #[test]
    fn test_missing_or_empty_cleaned_text_is_malformed() {
        for body in [r#"{}"#, r#"{"cleaned_text": null}"#, r#"{"cleaned_text": ""}"#] {
            let result = Preprocessed::from_response(body, "x", 15);
            assert!(
                matches!(result, Err(ProviderError::Malformed { .. })),
                "body {} should be malformed",
                body
            );
        }
    }

    #[test]
    fn test_non_object_is_malformed() {
        let result = Preprocessed::from_response("[1, 2]", "x", 15);
        assert!(matches!(result, Err(ProviderError::Malformed { .. })));
    }

    #[test]
    fn test_http_request_shape() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::Json(json!({
                "task": "nlp",
                "text": "Olá mundo",
                "top_n": 5
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"cleaned_text": "ola mundo", "tokens": ["ola", "mundo"]}"#)
            .create();

        let out = provider_for(server.url()).preprocess("Olá mundo", 5).unwrap();
        assert_eq!(out.cleaned_text, "ola mundo");
        assert_eq!(out.unique_tokens, 2);
        mock.assert();
    }

    #[test]
    fn test_bearer_token_sent_when_configured() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/")
            .match_header("authorization", "Bearer secret-key")
            .with_status(200)
            .with_body(r#"{"cleaned_text": "ok"}"#)
            .create();

        let mut config = ProviderConfig::new(server.url());
        config.api_key = Some("secret-key".to_string());
        let provider = HttpPreprocessor::from_config(&config).unwrap();
        provider.preprocess("ok", 15).unwrap();
        mock.assert();
    }

    #[test]
    fn test_http_error_status() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/")
            .with_status(503)
            .with_body("service unavailable")
            .create();

        match provider_for(server.url()).preprocess("x", 15) {
            Err(ProviderError::Status { status, body, .. }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "service unavailable");
            }
            other => panic!("expected Status error, got {:?}", other),
        }
    }

    #[test]
    fn test_slow_provider_times_out() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/")
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(std::time::Duration::from_secs(3));
                w.write_all(br#"{"cleaned_text": "tarde demais"}"#)
            })
            .create();

        let mut config = ProviderConfig::new(server.url());
        config.timeout_secs = 1;
        let provider = HttpPreprocessor::from_config(&config).unwrap();

        let err = provider.preprocess("x", 15).unwrap_err();
        assert!(
            matches!(err, ProviderError::Timeout { provider: "preprocessing" }),
            "unexpected error: {:?}",
            err
        );
    }

    #[test]
    fn test_connection_refused_is_transport_error() {
        let result = provider_for("http://127.0.0.1:1/".to_string()).preprocess("x", 15);
        let err = result.unwrap_err();
        assert!(err.is_unavailable(), "unexpected error: {:?}", err);
    }
}
