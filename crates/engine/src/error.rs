//! Error taxonomy shared by every stage of the prediction pipeline

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("Unsupported market: {0}")]
    UnsupportedMarket(String),

    #[error("Invalid timeframe: {0} (expected one of 1min, 5min, 15min, 30min, 60min)")]
    InvalidTimeframe(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream response malformed: {0}")]
    UpstreamMalformed(String),

    #[error("Insufficient data for {indicator}: need {required} bars, got {available}")]
    InsufficientData {
        indicator: String,
        required: usize,
        available: usize,
    },

    #[error("Request timed out after {0} ms")]
    Timeout(u64),
}

pub type SignalResult<T> = Result<T, SignalError>;

impl SignalError {
    /// True for errors caused by the caller's arguments rather than upstream state
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SignalError::UnsupportedMarket(_)
                | SignalError::InvalidTimeframe(_)
                | SignalError::InvalidArgument(_)
        )
    }

    pub(crate) fn insufficient(indicator: impl Into<String>, required: usize, available: usize) -> Self {
        SignalError::InsufficientData {
            indicator: indicator.into(),
            required,
            available,
        }
    }
}

impl From<reqwest::Error> for SignalError {
    fn from(err: reqwest::Error) -> Self {
        // Strip the URL: it carries the provider API key as a query parameter
        let err = err.without_url();
        if err.is_decode() {
            SignalError::UpstreamMalformed(err.to_string())
        } else {
            SignalError::UpstreamUnavailable(err.to_string())
        }
    }
}
