//! Blocking JSON-over-HTTP endpoint shared by both providers.

use std::time::Duration;

use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};

use crate::config::ProviderConfig;
use crate::sanitize;
use crate::secrets;

use super::error::ProviderError;

/// Error bodies are kept in messages, but never in full.
const MAX_ERROR_BODY: usize = 512;

pub(crate) struct JsonEndpoint {
    name: &'static str,
    url: String,
    api_key: Option<SecretString>,
    client: Client,
}

impl JsonEndpoint {
    /// Builds the client and resolves the API key once.
    pub(crate) fn from_config(
        name: &'static str,
        config: &ProviderConfig,
    ) -> Result<Self, ProviderError> {
        let api_key = secrets::resolve_secret_optional(
            config.api_key.as_deref(),
            config.api_key_file.as_deref(),
            config.api_key_env_var.as_deref(),
        )?;

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured {
                provider: name,
                reason: e.to_string(),
            })?;

        Ok(Self {
            name,
            url: config.url.clone(),
            api_key,
            client,
        })
    }

    pub(crate) fn name(&self) -> &'static str {
        self.name
    }

    /// POSTs `body` and returns the raw response text of a 2xx reply.
    pub(crate) fn post(&self, body: &serde_json::Value) -> Result<String, ProviderError> {
        let mut request = self.client.post(&self.url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .map_err(|e| ProviderError::from_reqwest(self.name, e))?;
        let status = response.status();
        let text = response
            .text()
            .map_err(|e| ProviderError::from_reqwest(self.name, e))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                provider: self.name,
                status: status.as_u16(),
                body: sanitize::truncate_body(&text, MAX_ERROR_BODY),
            });
        }

        Ok(text)
    }
}
