//! Outbound HTTP: the market data provider and its Alpha Vantage binding

pub mod alpha_vantage;
pub mod provider;

pub use alpha_vantage::AlphaVantageClient;
pub use provider::{
    IndicatorRequest, IndicatorValue, MacroSeries, MarketDataProvider, MIN_INTRADAY_BARS,
};

use reqwest::Client;
use std::time::Duration;

/// Build the shared HTTP client used by every gateway
pub fn build_http_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .build()
}
