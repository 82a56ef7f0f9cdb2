//! Signal Desk Engine: market signals with take-profit / stop-loss levels
//!
//! Provides:
//! - Alpha Vantage gateway for quotes, candles, indicators and macro series
//! - Headline scraping per market
//! - Local RSI / MACD / EMA and support/resistance computation
//! - Regime classification, chart-pattern detection and the rule-based strategy
//! - The [`Predictor`] orchestrator tying it together under one deadline

pub mod api;
pub mod config;
pub mod error;
pub mod indicators;
pub mod macro_context;
pub mod news;
pub mod patterns;
pub mod predictor;
pub mod regime;
pub mod strategy;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use api::{AlphaVantageClient, MarketDataProvider};
pub use config::{Config, ConfigError};
pub use error::{SignalError, SignalResult};
pub use indicators::IndicatorMode;
pub use macro_context::{Impact, MacroImpact};
pub use news::{NewsFeed, ScraperNewsClient};
pub use patterns::{ChartPattern, PatternDetector, Patterns, SwingPatternDetector};
pub use predictor::{PredictionRequest, PredictionResponse, Predictor, PredictorSettings};
pub use regime::Regime;
pub use strategy::{Signal, StrategyParams};
pub use types::*;
