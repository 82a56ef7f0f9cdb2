//! Prediction orchestrator
//!
//! Fans out the gateway calls for one request, waits for all of them, then
//! runs regime classification, pattern detection and the strategy on that
//! snapshot. Quote, indicators and daily candles are mandatory; news and macro
//! data only degrade the response when they fail.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::api::{build_http_client, AlphaVantageClient, MarketDataProvider};
use crate::config::{Config, ConfigError};
use crate::error::{SignalError, SignalResult};
use crate::indicators::{self, IndicatorMode, SUPPORT_RESISTANCE_WINDOW};
use crate::macro_context::{self, MacroImpact};
use crate::news::{NewsFeed, ScraperNewsClient};
use crate::patterns::{self, PatternDetector, Patterns, SwingPatternDetector};
use crate::regime::{self, Regime};
use crate::strategy::{self, Signal, StrategyInput, StrategyParams};
use crate::types::{Market, NewsItem, Symbol, Timeframe};

/// Validated request arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionRequest {
    pub symbol: Symbol,
    pub market: Market,
    pub timeframe: Timeframe,
}

impl PredictionRequest {
    /// Validate raw query arguments; a missing or empty timeframe means 15min
    pub fn parse(
        symbol: Option<&str>,
        market: Option<&str>,
        timeframe: Option<&str>,
    ) -> SignalResult<Self> {
        let symbol = Symbol::parse(symbol.unwrap_or_default())?;
        let market = match market.map(str::trim) {
            None | Some("") => {
                return Err(SignalError::InvalidArgument("market is required".into()))
            }
            Some(m) => m.parse()?,
        };
        let timeframe = match timeframe.map(str::trim) {
            None | Some("") => Timeframe::default(),
            Some(t) => t.parse()?,
        };
        Ok(Self {
            symbol,
            market,
            timeframe,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub symbol: Symbol,
    pub market: Market,
    pub timeframe: Timeframe,
    pub regime: Regime,
    pub current_price: f64,
    pub consolidation_price: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub signal: Signal,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
    pub support: Option<f64>,
    pub resistance: Option<f64>,
    pub cpi: Option<f64>,
    pub nfp: Option<f64>,
    pub cpi_nfp_impact: Option<MacroImpact>,
    pub patterns: Option<Patterns>,
    pub last_news: Option<NewsItem>,
}

impl PredictionResponse {
    fn ensure_finite(&self) -> SignalResult<()> {
        let values = [
            Some(self.current_price),
            Some(self.consolidation_price),
            Some(self.rsi),
            Some(self.macd),
            Some(self.macd_signal),
            self.take_profit,
            self.stop_loss,
            self.support,
            self.resistance,
            self.cpi,
            self.nfp,
        ];
        if values.iter().flatten().all(|v| v.is_finite()) {
            Ok(())
        } else {
            Err(SignalError::UpstreamMalformed(
                "prediction contains a non-finite value".into(),
            ))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictorSettings {
    pub indicator_mode: IndicatorMode,
    pub request_timeout: Duration,
    /// Budget for news and macro; must stay below `request_timeout`
    pub optional_timeout: Duration,
    pub strategy: StrategyParams,
}

impl Default for PredictorSettings {
    fn default() -> Self {
        Self {
            indicator_mode: IndicatorMode::default(),
            request_timeout: Duration::from_millis(crate::config::DEFAULT_TIMEOUT_MS),
            optional_timeout: Duration::from_millis(crate::config::DEFAULT_TIMEOUT_MS / 2),
            strategy: StrategyParams::default(),
        }
    }
}

/// Runs the full pipeline for one request. Cheap to share behind an `Arc`.
#[derive(Clone)]
pub struct Predictor {
    provider: Arc<dyn MarketDataProvider>,
    news: Arc<dyn NewsFeed>,
    detector: Arc<dyn PatternDetector>,
    settings: PredictorSettings,
}

impl Predictor {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        news: Arc<dyn NewsFeed>,
        detector: Arc<dyn PatternDetector>,
        settings: PredictorSettings,
    ) -> Self {
        Self {
            provider,
            news,
            detector,
            settings,
        }
    }

    /// Wire the production gateways from configuration
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let client = build_http_client(config.request_timeout)
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let provider = AlphaVantageClient::new(
            client.clone(),
            config.provider_base_url.clone(),
            config.api_key.clone(),
        );

        let news = match &config.news_base_url {
            Some(origin) => ScraperNewsClient::with_origin(client, origin.clone()),
            None => ScraperNewsClient::new(client),
        };

        Ok(Self::new(
            Arc::new(provider),
            Arc::new(news),
            Arc::new(SwingPatternDetector::default()),
            PredictorSettings {
                indicator_mode: config.indicator_mode,
                request_timeout: config.request_timeout,
                optional_timeout: config.request_timeout / 2,
                strategy: StrategyParams::default(),
            },
        ))
    }

    /// Produce a recommendation within the configured deadline
    pub async fn predict(&self, request: &PredictionRequest) -> SignalResult<PredictionResponse> {
        let timeout = self.settings.request_timeout;
        info!(
            symbol = %request.symbol,
            market = %request.market,
            timeframe = %request.timeframe,
            "Prediction requested"
        );

        // Dropping the inner future on timeout cancels every in-flight call
        let result = match tokio::time::timeout(timeout, self.run(request)).await {
            Ok(result) => result,
            Err(_) => Err(SignalError::Timeout(timeout.as_millis() as u64)),
        };

        match &result {
            Ok(response) => info!(
                symbol = %response.symbol,
                regime = ?response.regime,
                signal = ?response.signal,
                price = response.current_price,
                "Prediction ready"
            ),
            Err(e) if e.is_client_error() => warn!(symbol = %request.symbol, "Prediction rejected: {}", e),
            Err(e) => error!(symbol = %request.symbol, "Prediction failed: {}", e),
        }
        result
    }

    async fn run(&self, request: &PredictionRequest) -> SignalResult<PredictionResponse> {
        let provider = self.provider.as_ref();
        let symbol = &request.symbol;
        let optional_timeout = self.settings.optional_timeout;

        let (quote, indicators, daily, news, macro_reading) = tokio::join!(
            provider.quote(symbol),
            indicators::collect_indicators(
                provider,
                symbol,
                request.timeframe,
                self.settings.indicator_mode
            ),
            provider.daily(symbol),
            within(optional_timeout, self.news.headlines(symbol, request.market)),
            within(optional_timeout, macro_context::latest_cpi_nfp(provider)),
        );

        let current_price = quote?;
        let indicators = indicators?;
        let daily = daily?;
        let bounds = indicators::support_resistance(&daily, SUPPORT_RESISTANCE_WINDOW)?;

        let last_news = match news {
            Ok(items) => items.into_iter().next(),
            Err(e) if e.is_client_error() => return Err(e),
            Err(e) => {
                warn!(%symbol, "News unavailable, continuing without: {}", e);
                None
            }
        };

        let macro_reading = match macro_reading {
            Ok(reading) => Some(reading),
            Err(e) => {
                warn!("Macro data unavailable, continuing without: {}", e);
                None
            }
        };

        let regime = regime::classify(current_price, indicators.ema_long, &bounds);
        let detected = patterns::detect_patterns(self.detector.as_ref(), &daily);
        let decision = strategy::decide(
            &StrategyInput {
                regime,
                current_price,
                rsi: indicators.rsi,
                macd: indicators.macd,
                macd_signal: indicators.macd_signal,
                bounds,
                consolidation_price: indicators.consolidation_price(),
                patterns: &detected,
            },
            &self.settings.strategy,
        );

        let response = PredictionResponse {
            symbol: symbol.clone(),
            market: request.market,
            timeframe: request.timeframe,
            regime,
            current_price,
            consolidation_price: decision.consolidation_price,
            rsi: indicators.rsi,
            macd: indicators.macd,
            macd_signal: indicators.macd_signal,
            signal: decision.signal,
            take_profit: decision.take_profit,
            stop_loss: decision.stop_loss,
            support: Some(bounds.support),
            resistance: Some(bounds.resistance),
            cpi: macro_reading.map(|m| m.cpi),
            nfp: macro_reading.map(|m| m.nfp),
            cpi_nfp_impact: macro_reading.map(|m| macro_context::impact(m.cpi, m.nfp)),
            patterns: Some(detected),
            last_news,
        };
        response.ensure_finite()?;
        Ok(response)
    }
}

/// Bound an optional source by its own deadline so it cannot stall the request
async fn within<T>(
    limit: Duration,
    fut: impl std::future::Future<Output = SignalResult<T>>,
) -> SignalResult<T> {
    tokio::time::timeout(limit, fut)
        .await
        .unwrap_or_else(|_| Err(SignalError::Timeout(limit.as_millis() as u64)))
}
