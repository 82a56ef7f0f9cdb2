//! Market data provider seam
//!
//! The orchestrator only talks to [`MarketDataProvider`]; the HTTP binding
//! lives in [`super::alpha_vantage`].

use async_trait::async_trait;
use std::fmt;

use crate::error::{SignalError, SignalResult};
use crate::types::{CandleSeries, Symbol, Timeframe};

/// Minimum intraday depth requested from the provider (enough for EMA(100))
pub const MIN_INTRADAY_BARS: usize = 120;

/// Which indicator to look up, with its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorRequest {
    Rsi { period: usize },
    Macd { fast: usize, slow: usize, signal: usize },
    Ema { period: usize },
}

impl fmt::Display for IndicatorRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorRequest::Rsi { period } => write!(f, "RSI({})", period),
            IndicatorRequest::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorRequest::Ema { period } => write!(f, "EMA({})", period),
        }
    }
}

/// Latest indicator reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Scalar(f64),
    /// MACD line and its signal line
    Pair { line: f64, signal: f64 },
}

impl IndicatorValue {
    pub fn scalar(self, request: IndicatorRequest) -> SignalResult<f64> {
        match self {
            IndicatorValue::Scalar(v) => Ok(v),
            IndicatorValue::Pair { .. } => Err(SignalError::UpstreamMalformed(format!(
                "{} returned a pair, expected a scalar",
                request
            ))),
        }
    }

    pub fn pair(self, request: IndicatorRequest) -> SignalResult<(f64, f64)> {
        match self {
            IndicatorValue::Pair { line, signal } => Ok((line, signal)),
            IndicatorValue::Scalar(_) => Err(SignalError::UpstreamMalformed(format!(
                "{} returned a scalar, expected a pair",
                request
            ))),
        }
    }
}

/// Macro-economic series the provider publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroSeries {
    Cpi,
    NonfarmPayroll,
}

/// Read-only facade over a quote/indicator provider
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Last traded price
    async fn quote(&self, symbol: &Symbol) -> SignalResult<f64>;

    /// Recent intraday candles; fewer than [`MIN_INTRADAY_BARS`] is `InsufficientData`
    async fn intraday(&self, symbol: &Symbol, timeframe: Timeframe) -> SignalResult<CandleSeries>;

    /// Daily OHLC candles
    async fn daily(&self, symbol: &Symbol) -> SignalResult<CandleSeries>;

    /// Latest value of a provider-computed indicator
    async fn indicator(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        request: IndicatorRequest,
    ) -> SignalResult<IndicatorValue>;

    /// Most recent reading of a macro series
    async fn macro_series(&self, series: MacroSeries) -> SignalResult<f64>;
}

/// Reject NaN and infinities coming from upstream
pub fn ensure_finite(value: f64, what: &str) -> SignalResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SignalError::UpstreamMalformed(format!(
            "{} is not a finite number",
            what
        )))
    }
}

/// Parse a provider numeric string
pub fn parse_number(raw: &str, what: &str) -> SignalResult<f64> {
    let value: f64 = raw.trim().parse().map_err(|_| {
        SignalError::UpstreamMalformed(format!("{} is not a number: {:?}", what, raw))
    })?;
    ensure_finite(value, what)
}
