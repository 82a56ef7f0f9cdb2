//! Domain types for the prediction pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{SignalError, SignalResult};

// ============================================================================
// Request-scoped identifiers
// ============================================================================

/// Ticker symbol, canonicalized to upper case
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn parse(raw: &str) -> SignalResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SignalError::InvalidArgument(
                "symbol must be a non-empty string".into(),
            ));
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Market the symbol trades on; drives news source selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Forex,
    Crypto,
    Metals,
    Nasdaq,
    Nyse,
}

impl Market {
    pub const ALL: [Market; 5] = [
        Market::Forex,
        Market::Crypto,
        Market::Metals,
        Market::Nasdaq,
        Market::Nyse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Forex => "forex",
            Market::Crypto => "crypto",
            Market::Metals => "metals",
            Market::Nasdaq => "nasdaq",
            Market::Nyse => "nyse",
        }
    }
}

impl FromStr for Market {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Market::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| SignalError::UnsupportedMarket(s.to_string()))
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intraday bar interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1min")]
    OneMinute,
    #[serde(rename = "5min")]
    FiveMinutes,
    #[default]
    #[serde(rename = "15min")]
    FifteenMinutes,
    #[serde(rename = "30min")]
    ThirtyMinutes,
    #[serde(rename = "60min")]
    SixtyMinutes,
}

impl Timeframe {
    pub const ALL: [Timeframe; 5] = [
        Timeframe::OneMinute,
        Timeframe::FiveMinutes,
        Timeframe::FifteenMinutes,
        Timeframe::ThirtyMinutes,
        Timeframe::SixtyMinutes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1min",
            Timeframe::FiveMinutes => "5min",
            Timeframe::FifteenMinutes => "15min",
            Timeframe::ThirtyMinutes => "30min",
            Timeframe::SixtyMinutes => "60min",
        }
    }
}

impl FromStr for Timeframe {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Timeframe::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| SignalError::InvalidTimeframe(s.to_string()))
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Candles
// ============================================================================

/// A single OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl ta::Open for Candle {
    fn open(&self) -> f64 {
        self.open
    }
}

impl ta::High for Candle {
    fn high(&self) -> f64 {
        self.high
    }
}

impl ta::Low for Candle {
    fn low(&self) -> f64 {
        self.low
    }
}

impl ta::Close for Candle {
    fn close(&self) -> f64 {
        self.close
    }
}

impl ta::Volume for Candle {
    fn volume(&self) -> f64 {
        self.volume
    }
}

/// Candles sorted ascending by timestamp, no duplicate timestamps, all values finite
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Sort and validate raw candles. Duplicates and non-finite or negative
    /// values are treated as a malformed upstream payload.
    pub fn new(mut candles: Vec<Candle>) -> SignalResult<Self> {
        for c in &candles {
            let values = [c.open, c.high, c.low, c.close, c.volume];
            if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
                return Err(SignalError::UpstreamMalformed(format!(
                    "candle at {} has a non-finite or negative value",
                    c.timestamp
                )));
            }
        }

        candles.sort_by_key(|c| c.timestamp);

        if let Some(pair) = candles
            .windows(2)
            .find(|w| w[0].timestamp == w[1].timestamp)
        {
            return Err(SignalError::UpstreamMalformed(format!(
                "duplicate candle timestamp {}",
                pair[0].timestamp
            )));
        }

        Ok(Self { candles })
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }
}

// ============================================================================
// Derived values
// ============================================================================

/// Indicator snapshot consumed by the strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Indicators {
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub ema_short: f64,
    pub ema_long: f64,
}

impl Indicators {
    /// Mid-point of the two trend EMAs
    pub fn consolidation_price(&self) -> f64 {
        (self.ema_short + self.ema_long) / 2.0
    }
}

/// Support/resistance band, `support <= resistance`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub support: f64,
    pub resistance: f64,
}

impl Bounds {
    /// Build from two levels in either order
    pub fn new(a: f64, b: f64) -> Self {
        Self {
            support: a.min(b),
            resistance: a.max(b),
        }
    }

    pub fn midpoint(&self) -> f64 {
        (self.support + self.resistance) / 2.0
    }
}

/// A scraped headline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub timestamp: DateTime<Utc>,
}
