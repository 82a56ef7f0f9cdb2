//! Runtime configuration read from the environment

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::api::alpha_vantage::DEFAULT_BASE_URL;
use crate::indicators::IndicatorMode;

pub const API_KEY_VAR: &str = "PROVIDER_API_KEY";
pub const TIMEOUT_VAR: &str = "REQUEST_TIMEOUT_MS";
pub const BASE_URL_VAR: &str = "PROVIDER_BASE_URL";
pub const NEWS_BASE_URL_VAR: &str = "NEWS_BASE_URL";
pub const INDICATOR_MODE_VAR: &str = "INDICATOR_MODE";

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("HTTP client setup failed: {0}")]
    HttpClient(String),
}

#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub provider_base_url: String,
    /// Mirror for the news pages; `None` hits each source's own host
    pub news_base_url: Option<String>,
    pub request_timeout: Duration,
    pub indicator_mode: IndicatorMode,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("provider_base_url", &self.provider_base_url)
            .field("news_base_url", &self.news_base_url)
            .field("request_timeout", &self.request_timeout)
            .field("indicator_mode", &self.indicator_mode)
            .finish()
    }
}

impl Config {
    /// Read configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing(API_KEY_VAR))?;

        let timeout_ms = match lookup(TIMEOUT_VAR) {
            None => DEFAULT_TIMEOUT_MS,
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    var: TIMEOUT_VAR,
                    value: raw.clone(),
                    reason: "expected a positive number of milliseconds".into(),
                })?,
        };

        let provider_base_url = lookup(BASE_URL_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let news_base_url = lookup(NEWS_BASE_URL_VAR)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let indicator_mode = match lookup(INDICATOR_MODE_VAR) {
            None => IndicatorMode::default(),
            Some(raw) => raw
                .parse::<IndicatorMode>()
                .map_err(|e| ConfigError::Invalid {
                    var: INDICATOR_MODE_VAR,
                    value: raw.clone(),
                    reason: e.to_string(),
                })?,
        };

        Ok(Self {
            api_key,
            provider_base_url,
            news_base_url,
            request_timeout: Duration::from_millis(timeout_ms),
            indicator_mode,
        })
    }
}
