use thiserror::Error;

use crate::secrets::SecretError;

/// Errors from the preprocessing and inference providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider} request timed out")]
    Timeout { provider: &'static str },

    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} returned a malformed response: {reason}")]
    Malformed {
        provider: &'static str,
        reason: String,
    },

    #[error("{provider} client could not be built: {reason}")]
    NotConfigured {
        provider: &'static str,
        reason: String,
    },

    #[error("API key could not be resolved: {0}")]
    Secret(#[from] SecretError),
}

impl ProviderError {
    pub(crate) fn from_reqwest(provider: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout { provider }
        } else {
            ProviderError::Transport {
                provider,
                source: err,
            }
        }
    }

    pub(crate) fn malformed(provider: &'static str, reason: impl Into<String>) -> Self {
        ProviderError::Malformed {
            provider,
            reason: reason.into(),
        }
    }

    /// True for failures where the provider never produced an answer.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout { .. } | ProviderError::Transport { .. }
        )
    }
}
