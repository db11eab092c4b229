//! Process configuration.
//!
//! Loaded once at start-up (after `.env` is applied) and passed by value into
//! the clients and the pipeline. Nothing else in the crate reads the
//! environment.

use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Credential prefix OpenRouter issues.
pub const API_KEY_PREFIX: &str = "sk-or-";

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_PRIMARY_MODEL: &str = "meta-llama/llama-3.3-70b-instruct:free";
pub const DEFAULT_FALLBACK_MODEL: &str = "meta-llama/llama-3.3-70b-instruct";
pub const DEFAULT_TEMPERATURE: f64 = 0.2;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("OPENROUTER_API_KEY is not set. Add it to your environment or .env file.")]
    MissingApiKey,

    #[error("OPENROUTER_API_KEY is invalid: expected a key starting with \"sk-or-\"")]
    InvalidApiKey,

    #[error("Invalid OPENROUTER_BASE_URL {0:?}: {1}")]
    InvalidBaseUrl(String, String),

    #[error("Invalid CARDSMITH_TIMEOUT_SECS {0:?}: expected a positive number of seconds")]
    InvalidTimeout(String),
}

/// Application configuration.
#[derive(Clone)]
pub struct Config {
    /// OpenRouter API key.
    pub api_key: String,

    /// API root, without trailing slash.
    pub base_url: String,

    /// Model tried first for generation.
    pub primary_model: String,

    /// Model used after a rate limit and for repair passes.
    pub fallback_model: String,

    pub temperature: f64,

    /// Per-request timeout applied by the HTTP transport.
    pub request_timeout: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("primary_model", &self.primary_model)
            .field("fallback_model", &self.fallback_model)
            .field("temperature", &self.temperature)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Config {
    /// Load configuration from process environment variables.
    ///
    /// # Variables
    /// - `OPENROUTER_API_KEY` (required, must start with `sk-or-`)
    /// - `OPENROUTER_BASE_URL` (default `https://openrouter.ai/api/v1`)
    /// - `CARDSMITH_PRIMARY_MODEL`, `CARDSMITH_FALLBACK_MODEL`
    /// - `CARDSMITH_TIMEOUT_SECS` (default 120)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get("OPENROUTER_API_KEY").ok_or(ConfigError::MissingApiKey)?;
        if !api_key.starts_with(API_KEY_PREFIX) {
            return Err(ConfigError::InvalidApiKey);
        }

        let base_url = match get("OPENROUTER_BASE_URL") {
            Some(raw) => normalize_base_url(&raw)?,
            None => DEFAULT_BASE_URL.to_string(),
        };

        let request_timeout = match get("CARDSMITH_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidTimeout(raw)),
            },
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Ok(Self {
            api_key,
            base_url,
            primary_model: get("CARDSMITH_PRIMARY_MODEL")
                .unwrap_or_else(|| DEFAULT_PRIMARY_MODEL.to_string()),
            fallback_model: get("CARDSMITH_FALLBACK_MODEL")
                .unwrap_or_else(|| DEFAULT_FALLBACK_MODEL.to_string()),
            temperature: DEFAULT_TEMPERATURE,
            request_timeout,
        })
    }
}

/// Validate an API root and strip any trailing slash.
pub fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidBaseUrl(raw.to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBaseUrl(
            raw.to_string(),
            format!("unsupported scheme {}", url.scheme()),
        ));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}
