//! Provider credential resolution.
//!
//! API keys for the preprocessing and inference providers can come from
//! three places, checked in this order:
//!
//! 1. **Direct value** in the config file (`api_key`)
//! 2. **File reference** for mounted secrets (`api_key_file`)
//! 3. **Env var reference** (`api_key_env_var`)
//!
//! Resolution happens once when a provider client is built. Nothing here is
//! consulted again at request time.

use secrecy::SecretString;
use std::fs;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No API key configured (set api_key, api_key_file or api_key_env_var)")]
    NoSourceProvided,

    #[error("Cannot read API key file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("API key variable '{name}' is not set")]
    EnvVarNotSet { name: String },

    #[error("API key variable '{name}' is not valid UTF-8")]
    EnvVarNotUnicode { name: String },

    /// A blank key would be sent as a bare `Bearer` header.
    #[error("API key from {origin} is blank")]
    Blank { origin: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves a secret from the first non-empty source.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        let content = fs::read_to_string(&expanded).map_err(|e| SecretError::FileReadError {
            path: expanded.clone(),
            source: e,
        })?;
        return non_blank(content.trim(), || format!("file '{}'", expanded));
    }

    if let Some(var_name) = env_var.filter(|n| !n.is_empty()) {
        return match std::env::var(var_name) {
            // Env vars set from files often carry a trailing newline
            Ok(value) => non_blank(value.trim(), || format!("${}", var_name)),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: var_name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: var_name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

fn non_blank(value: &str, origin: impl FnOnce() -> String) -> Result<SecretString> {
    if value.is_empty() {
        return Err(SecretError::Blank { origin: origin() });
    }
    Ok(SecretString::from(value))
}

/// Like [`resolve_secret`], but a missing source is `Ok(None)`.
///
/// Providers without authentication are valid, so the API key is optional.
pub fn resolve_secret_optional(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<SecretString>> {
    match resolve_secret(direct, file_path, env_var) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Expands a leading `~` to the current user's home directory.
///
/// `~user/path` is not supported.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy();
            if path == "~" {
                return home.into_owned();
            }
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
