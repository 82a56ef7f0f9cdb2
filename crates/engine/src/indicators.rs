//! Indicator engine
//!
//! Produces the RSI(14), MACD(12,26,9), EMA(50), EMA(100) snapshot the
//! strategy consumes, either computed from intraday candles or read from the
//! provider's indicator endpoints, plus 20-day support/resistance from daily
//! candles. Values are reported at the last bar; interpretation lives in the
//! strategy.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use ta::indicators::{Maximum, Minimum};
use ta::Next;
use tracing::debug;

use crate::api::{IndicatorRequest, MarketDataProvider};
use crate::error::{SignalError, SignalResult};
use crate::types::{Bounds, CandleSeries, Indicators, Symbol, Timeframe};

pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;
pub const EMA_SHORT_PERIOD: usize = 50;
pub const EMA_LONG_PERIOD: usize = 100;
pub const SUPPORT_RESISTANCE_WINDOW: usize = 20;

const RSI_REQUEST: IndicatorRequest = IndicatorRequest::Rsi { period: RSI_PERIOD };
const MACD_REQUEST: IndicatorRequest = IndicatorRequest::Macd {
    fast: MACD_FAST,
    slow: MACD_SLOW,
    signal: MACD_SIGNAL,
};
const EMA_SHORT_REQUEST: IndicatorRequest = IndicatorRequest::Ema { period: EMA_SHORT_PERIOD };
const EMA_LONG_REQUEST: IndicatorRequest = IndicatorRequest::Ema { period: EMA_LONG_PERIOD };

// ============================================================================
// Moving averages
// ============================================================================

/// EMA with smoothing `2/(period+1)`, seeded from the SMA of the first
/// `period` values. Element `i` of the result is the EMA at `values[period-1+i]`.
pub fn ema_series(values: &[f64], period: usize) -> SignalResult<Vec<f64>> {
    if period == 0 || values.len() < period {
        return Err(SignalError::insufficient(
            format!("EMA({})", period),
            period.max(1),
            values.len(),
        ));
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut prev = seed;
    for &v in &values[period..] {
        prev = (v - prev) * k + prev;
        out.push(prev);
    }
    Ok(out)
}

/// EMA at the last value
pub fn ema(values: &[f64], period: usize) -> SignalResult<f64> {
    let series = ema_series(values, period)?;
    Ok(series[series.len() - 1])
}

// ============================================================================
// RSI
// ============================================================================

/// Wilder RSI at the last close. A perfectly flat window reads 50.
pub fn rsi(closes: &[f64], period: usize) -> SignalResult<f64> {
    if period == 0 || closes.len() <= period {
        return Err(SignalError::insufficient(
            format!("RSI({})", period),
            period + 1,
            closes.len(),
        ));
    }

    let (mut avg_gain, mut avg_loss) = (0.0, 0.0);
    for w in closes[..=period].windows(2) {
        let change = w[1] - w[0];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    let n = period as f64;
    for w in closes[period..].windows(2) {
        let change = w[1] - w[0];
        avg_gain = (avg_gain * (n - 1.0) + change.max(0.0)) / n;
        avg_loss = (avg_loss * (n - 1.0) + (-change).max(0.0)) / n;
    }

    let total = avg_gain + avg_loss;
    if total == 0.0 {
        return Ok(50.0);
    }
    Ok(100.0 * avg_gain / total)
}

// ============================================================================
// MACD
// ============================================================================

/// MACD line, its signal line, and the derived histogram at the last close
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdOutput {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> SignalResult<MacdOutput> {
    let label = format!("MACD({},{},{})", fast, slow, signal);
    if fast == 0 || signal == 0 || fast >= slow {
        return Err(SignalError::InvalidArgument(format!(
            "{} needs 0 < fast < slow and signal > 0",
            label
        )));
    }
    let required = slow + signal - 1;
    if closes.len() < required {
        return Err(SignalError::insufficient(label, required, closes.len()));
    }

    let fast_ema = ema_series(closes, fast)?;
    let slow_ema = ema_series(closes, slow)?;
    // fast_ema starts `slow - fast` bars earlier than slow_ema
    let offset = slow - fast;
    let line: Vec<f64> = slow_ema
        .iter()
        .enumerate()
        .map(|(i, s)| fast_ema[i + offset] - s)
        .collect();
    let signal_series = ema_series(&line, signal)?;

    let macd = line[line.len() - 1];
    let signal = signal_series[signal_series.len() - 1];
    Ok(MacdOutput {
        macd,
        signal,
        histogram: macd - signal,
    })
}

// ============================================================================
// Support / resistance
// ============================================================================

/// Rolling minimum of lows and maximum of highs over the last `window` daily
/// bars, read at the last bar. A shorter series uses every bar it has.
pub fn support_resistance(daily: &CandleSeries, window: usize) -> SignalResult<Bounds> {
    if daily.is_empty() {
        return Err(SignalError::insufficient(
            format!("support/resistance({})", window),
            1,
            0,
        ));
    }

    let mut highest = Maximum::new(window)
        .map_err(|e| SignalError::InvalidArgument(format!("rolling max window: {:?}", e)))?;
    let mut lowest = Minimum::new(window)
        .map_err(|e| SignalError::InvalidArgument(format!("rolling min window: {:?}", e)))?;

    let (mut support, mut resistance) = (f64::NAN, f64::NAN);
    for candle in daily.candles() {
        resistance = highest.next(candle);
        support = lowest.next(candle);
    }
    Ok(Bounds::new(support, resistance))
}

// ============================================================================
// Indicator snapshot
// ============================================================================

/// Where the indicator snapshot comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorMode {
    /// Compute from intraday candles
    #[default]
    Local,
    /// Ask the provider's indicator endpoints
    Delegated,
}

impl FromStr for IndicatorMode {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(IndicatorMode::Local),
            "delegated" => Ok(IndicatorMode::Delegated),
            other => Err(SignalError::InvalidArgument(format!(
                "indicator mode must be local or delegated, got {:?}",
                other
            ))),
        }
    }
}

/// Compute the full snapshot from an intraday series
pub fn compute_local(intraday: &CandleSeries) -> SignalResult<Indicators> {
    let closes = intraday.closes();
    let macd = macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL)?;
    Ok(Indicators {
        rsi: rsi(&closes, RSI_PERIOD)?,
        macd: macd.macd,
        macd_signal: macd.signal,
        ema_short: ema(&closes, EMA_SHORT_PERIOD)?,
        ema_long: ema(&closes, EMA_LONG_PERIOD)?,
    })
}

/// Fetch the indicator snapshot in the configured mode
pub async fn collect_indicators(
    provider: &dyn MarketDataProvider,
    symbol: &Symbol,
    timeframe: Timeframe,
    mode: IndicatorMode,
) -> SignalResult<Indicators> {
    let indicators = match mode {
        IndicatorMode::Local => {
            let intraday = provider.intraday(symbol, timeframe).await?;
            compute_local(&intraday)?
        }
        IndicatorMode::Delegated => {
            let (rsi, macd, ema_short, ema_long) = tokio::try_join!(
                provider.indicator(symbol, timeframe, RSI_REQUEST),
                provider.indicator(symbol, timeframe, MACD_REQUEST),
                provider.indicator(symbol, timeframe, EMA_SHORT_REQUEST),
                provider.indicator(symbol, timeframe, EMA_LONG_REQUEST),
            )?;
            let (macd, macd_signal) = macd.pair(MACD_REQUEST)?;
            Indicators {
                rsi: rsi.scalar(RSI_REQUEST)?,
                macd,
                macd_signal,
                ema_short: ema_short.scalar(EMA_SHORT_REQUEST)?,
                ema_long: ema_long.scalar(EMA_LONG_REQUEST)?,
            }
        }
    };

    debug!(%symbol, ?mode, ?indicators, "Indicators ready");
    Ok(indicators)
}
