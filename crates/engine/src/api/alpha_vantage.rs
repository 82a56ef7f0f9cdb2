//! Alpha Vantage client for quotes, candles, indicators and macro series
//!
//! Every endpoint is `GET {base}/query?function=...&apikey=...`. Numbers arrive
//! as strings and are parsed and checked for finiteness before leaving this
//! module.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

use super::provider::{
    parse_number, IndicatorRequest, IndicatorValue, MacroSeries, MarketDataProvider,
    MIN_INTRADAY_BARS,
};
use crate::error::{SignalError, SignalResult};
use crate::types::{Candle, CandleSeries, Symbol, Timeframe};

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";

/// Keys Alpha Vantage uses for throttling, auth and lookup failures
const ERROR_KEYS: [&str; 3] = ["Error Message", "Note", "Information"];

/// Alpha Vantage market data client
#[derive(Clone)]
pub struct AlphaVantageClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl fmt::Debug for AlphaVantageClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlphaVantageClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl AlphaVantageClient {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Run one `/query` call and screen the payload for provider-side errors
    async fn query(&self, function: &str, params: &[(&str, String)]) -> SignalResult<Value> {
        let url = format!("{}/query", self.base_url);
        debug!(function, ?params, "Querying Alpha Vantage");

        let response = self
            .client
            .get(&url)
            .query(&[("function", function)])
            .query(params)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let reason = match status {
                StatusCode::TOO_MANY_REQUESTS => "rate limited",
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => "authentication rejected",
                _ => "request failed",
            };
            return Err(SignalError::UpstreamUnavailable(format!(
                "Alpha Vantage {} ({}): {}",
                function, status, reason
            )));
        }

        let body: Value = response.json().await?;
        check_error_payload(&body)?;
        Ok(body)
    }
}

#[async_trait]
impl MarketDataProvider for AlphaVantageClient {
    async fn quote(&self, symbol: &Symbol) -> SignalResult<f64> {
        let body = self
            .query("GLOBAL_QUOTE", &[("symbol", symbol.to_string())])
            .await?;
        let price = parse_quote(&body)?;
        debug!(%symbol, price, "Fetched quote");
        Ok(price)
    }

    async fn intraday(&self, symbol: &Symbol, timeframe: Timeframe) -> SignalResult<CandleSeries> {
        let body = self
            .query(
                "TIME_SERIES_INTRADAY",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", timeframe.to_string()),
                    // compact is capped at 100 bars, below what EMA(100) needs
                    ("outputsize", "full".to_string()),
                ],
            )
            .await?;
        let series = parse_candles(&body, &format!("Time Series ({})", timeframe))?;
        debug!(%symbol, %timeframe, count = series.len(), "Fetched intraday candles");
        if series.len() < MIN_INTRADAY_BARS {
            return Err(SignalError::insufficient(
                format!("intraday {}", timeframe),
                MIN_INTRADAY_BARS,
                series.len(),
            ));
        }
        Ok(series)
    }

    async fn daily(&self, symbol: &Symbol) -> SignalResult<CandleSeries> {
        let body = self
            .query(
                "TIME_SERIES_DAILY",
                &[
                    ("symbol", symbol.to_string()),
                    ("outputsize", "compact".to_string()),
                ],
            )
            .await?;
        let series = parse_candles(&body, "Time Series (Daily)")?;
        debug!(%symbol, count = series.len(), "Fetched daily candles");
        Ok(series)
    }

    async fn indicator(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        request: IndicatorRequest,
    ) -> SignalResult<IndicatorValue> {
        let mut params = vec![
            ("symbol", symbol.to_string()),
            ("interval", timeframe.to_string()),
            ("series_type", "close".to_string()),
        ];

        let value = match request {
            IndicatorRequest::Rsi { period } => {
                params.push(("time_period", period.to_string()));
                let body = self.query("RSI", &params).await?;
                let v = parse_latest_indicator(&body, "Technical Analysis: RSI", &["RSI"])?;
                IndicatorValue::Scalar(v[0])
            }
            IndicatorRequest::Ema { period } => {
                params.push(("time_period", period.to_string()));
                let body = self.query("EMA", &params).await?;
                let v = parse_latest_indicator(&body, "Technical Analysis: EMA", &["EMA"])?;
                IndicatorValue::Scalar(v[0])
            }
            IndicatorRequest::Macd { fast, slow, signal } => {
                params.push(("fastperiod", fast.to_string()));
                params.push(("slowperiod", slow.to_string()));
                params.push(("signalperiod", signal.to_string()));
                let body = self.query("MACD", &params).await?;
                // MACD_Hist is derived and deliberately not read
                let v = parse_latest_indicator(
                    &body,
                    "Technical Analysis: MACD",
                    &["MACD", "MACD_Signal"],
                )?;
                IndicatorValue::Pair {
                    line: v[0],
                    signal: v[1],
                }
            }
        };

        debug!(%symbol, %request, ?value, "Fetched provider indicator");
        Ok(value)
    }

    async fn macro_series(&self, series: MacroSeries) -> SignalResult<f64> {
        let body = match series {
            MacroSeries::Cpi => {
                self.query("CPI", &[("interval", "monthly".to_string())])
                    .await?
            }
            MacroSeries::NonfarmPayroll => self.query("NONFARM_PAYROLL", &[]).await?,
        };
        let value = parse_macro_latest(&body)?;
        debug!(?series, value, "Fetched macro reading");
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Payload parsing
// ---------------------------------------------------------------------------

fn check_error_payload(body: &Value) -> SignalResult<()> {
    for key in ERROR_KEYS {
        if let Some(message) = body.get(key) {
            let message = message.as_str().unwrap_or("no message");
            return Err(SignalError::UpstreamUnavailable(format!(
                "Alpha Vantage {}: {}",
                key, message
            )));
        }
    }
    Ok(())
}

fn top_level<'a>(body: &'a Value, key: &str) -> SignalResult<&'a Map<String, Value>> {
    body.get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| SignalError::UpstreamUnavailable(format!("response has no {:?} section", key)))
}

fn number_field(obj: &Map<String, Value>, key: &str) -> SignalResult<f64> {
    match obj.get(key) {
        Some(Value::String(raw)) => parse_number(raw, key),
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| SignalError::UpstreamMalformed(format!("{} is not finite", key))),
        _ => Err(SignalError::UpstreamMalformed(format!(
            "missing field {:?}",
            key
        ))),
    }
}

fn parse_timestamp(raw: &str) -> SignalResult<DateTime<Utc>> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| SignalError::UpstreamMalformed(format!("bad timestamp {:?}", raw)))
}

fn parse_quote(body: &Value) -> SignalResult<f64> {
    let quote = top_level(body, "Global Quote")?;
    // Unknown symbols come back as an empty quote object
    if quote.is_empty() {
        return Err(SignalError::UpstreamUnavailable(
            "provider returned an empty quote".into(),
        ));
    }
    let price = number_field(quote, "05. price")?;
    if price <= 0.0 {
        return Err(SignalError::UpstreamMalformed(format!(
            "non-positive price {}",
            price
        )));
    }
    Ok(price)
}

fn parse_candles(body: &Value, key: &str) -> SignalResult<CandleSeries> {
    let rows = top_level(body, key)?;
    let candles = rows
        .iter()
        .map(|(ts, row)| {
            let row = row.as_object().ok_or_else(|| {
                SignalError::UpstreamMalformed(format!("candle {} is not an object", ts))
            })?;
            Ok(Candle {
                timestamp: parse_timestamp(ts)?,
                open: number_field(row, "1. open")?,
                high: number_field(row, "2. high")?,
                low: number_field(row, "3. low")?,
                close: number_field(row, "4. close")?,
                volume: number_field(row, "5. volume")?,
            })
        })
        .collect::<SignalResult<Vec<_>>>()?;
    CandleSeries::new(candles)
}

/// Read `fields` from the newest entry of a `Technical Analysis: *` map
fn parse_latest_indicator(body: &Value, key: &str, fields: &[&str]) -> SignalResult<Vec<f64>> {
    let rows = top_level(body, key)?;
    // Keys share one ISO-like format per series, so lexical max is the newest
    let (ts, latest) = rows
        .iter()
        .max_by(|a, b| a.0.cmp(b.0))
        .ok_or_else(|| SignalError::UpstreamMalformed(format!("{} is empty", key)))?;
    let latest = latest.as_object().ok_or_else(|| {
        SignalError::UpstreamMalformed(format!("{} entry {} is not an object", key, ts))
    })?;
    fields.iter().map(|f| number_field(latest, f)).collect()
}

/// Newest valid point of a `{ "data": [{date, value}] }` macro payload
fn parse_macro_latest(body: &Value) -> SignalResult<f64> {
    let points = body
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| SignalError::UpstreamUnavailable("response has no \"data\" section".into()))?;

    let newest = points
        .iter()
        .filter_map(|p| {
            let date = p.get("date")?.as_str()?;
            let value = p.get("value")?.as_str()?;
            // "." marks a not-yet-published month
            (value.trim() != ".").then_some((date, value))
        })
        .max_by(|a, b| a.0.cmp(b.0))
        .ok_or_else(|| SignalError::UpstreamMalformed("macro series has no readings".into()))?;

    parse_number(newest.1, "macro value")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rate_limit_note_is_unavailable() {
        let body = json!({ "Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute" });
        let err = check_error_payload(&body).unwrap_err();
        assert!(matches!(err, SignalError::UpstreamUnavailable(_)));
    }

    async fn client_for(status: &str, content_type: &str, body: &str) -> AlphaVantageClient {
        let (origin, _request) = crate::test_support::serve_once(status, content_type, body).await;
        AlphaVantageClient::new(Client::new(), origin, "demo")
    }

    fn ibm() -> Symbol {
        Symbol::parse("IBM").unwrap()
    }

    #[tokio::test]
    async fn test_http_rejections_are_unavailable() {
        for (status, reason) in [
            ("429 Too Many Requests", "rate limited"),
            ("401 Unauthorized", "authentication rejected"),
            ("403 Forbidden", "authentication rejected"),
            ("503 Service Unavailable", "request failed"),
        ] {
            let client = client_for(status, "text/plain", "nope").await;
            match client.quote(&ibm()).await {
                Err(SignalError::UpstreamUnavailable(msg)) => {
                    assert!(msg.contains(reason), "{}: {}", status, msg);
                    assert!(!msg.contains("demo"), "api key leaked: {}", msg);
                }
                other => panic!("{}: unexpected {:?}", status, other),
            }
        }
    }

    #[tokio::test]
    async fn test_html_body_is_malformed() {
        let client = client_for("200 OK", "text/html", "<html><body>maintenance</body></html>").await;
        assert!(matches!(
            client.quote(&ibm()).await,
            Err(SignalError::UpstreamMalformed(_))
        ));
    }

    #[tokio::test]
    async fn test_quote_over_http() {
        let body = json!({ "Global Quote": { "05. price": "182.5200" } }).to_string();
        let (origin, request) = crate::test_support::serve_once("200 OK", "application/json", &body).await;
        let client = AlphaVantageClient::new(Client::new(), origin, "demo");

        assert_eq!(client.quote(&ibm()).await.unwrap(), 182.52);
        let head = request.await.unwrap();
        assert!(head.starts_with("GET /query?function=GLOBAL_QUOTE&symbol=IBM&apikey=demo"));
    }

    #[tokio::test]
    async fn test_shallow_intraday_is_insufficient() {
        let body = json!({
            "Time Series (15min)": {
                "2024-03-01 10:15:00": { "1. open": "2", "2. high": "3", "3. low": "1", "4. close": "2.5", "5. volume": "10" },
                "2024-03-01 10:00:00": { "1. open": "1", "2. high": "2", "3. low": "0.5", "4. close": "1.5", "5. volume": "12" }
            }
        })
        .to_string();
        let client = client_for("200 OK", "application/json", &body).await;
        let err = client.intraday(&ibm(), Timeframe::FifteenMinutes).await.unwrap_err();
        assert_eq!(
            err,
            SignalError::InsufficientData {
                indicator: "intraday 15min".into(),
                required: MIN_INTRADAY_BARS,
                available: 2,
            }
        );
    }

    #[test]
    fn test_quote_parsing() {
        let body = json!({
            "Global Quote": {
                "01. symbol": "IBM",
                "05. price": "182.5200",
                "07. latest trading day": "2024-03-01"
            }
        });
        assert_eq!(parse_quote(&body).unwrap(), 182.52);
    }

    #[test]
    fn test_empty_quote_is_unavailable() {
        let body = json!({ "Global Quote": {} });
        assert!(matches!(
            parse_quote(&body),
            Err(SignalError::UpstreamUnavailable(_))
        ));
    }

    #[test]
    fn test_missing_top_level_key_is_unavailable() {
        let body = json!({ "Meta Data": {} });
        assert!(matches!(
            parse_candles(&body, "Time Series (Daily)"),
            Err(SignalError::UpstreamUnavailable(_))
        ));
    }

    #[test]
    fn test_candles_are_sorted_oldest_first() {
        let body = json!({
            "Time Series (15min)": {
                "2024-03-01 10:15:00": { "1. open": "2", "2. high": "3", "3. low": "1", "4. close": "2.5", "5. volume": "10" },
                "2024-03-01 10:00:00": { "1. open": "1", "2. high": "2", "3. low": "0.5", "4. close": "1.5", "5. volume": "12" }
            }
        });
        let series = parse_candles(&body, "Time Series (15min)").unwrap();
        assert_eq!(series.closes(), vec![1.5, 2.5]);
    }

    #[test]
    fn test_daily_timestamps_parse() {
        let body = json!({
            "Time Series (Daily)": {
                "2024-02-29": { "1. open": "1", "2. high": "2", "3. low": "0.5", "4. close": "1.5", "5. volume": "12" }
            }
        });
        let series = parse_candles(&body, "Time Series (Daily)").unwrap();
        assert_eq!(series.last().unwrap().timestamp.to_rfc3339(), "2024-02-29T00:00:00+00:00");
    }

    #[test]
    fn test_candle_with_bad_number_is_malformed() {
        let body = json!({
            "Time Series (Daily)": {
                "2024-02-29": { "1. open": "1", "2. high": "NaN", "3. low": "0.5", "4. close": "1.5", "5. volume": "12" }
            }
        });
        assert!(matches!(
            parse_candles(&body, "Time Series (Daily)"),
            Err(SignalError::UpstreamMalformed(_))
        ));
    }

    #[test]
    fn test_macd_reads_line_and_signal_not_histogram() {
        let body = json!({
            "Technical Analysis: MACD": {
                "2024-03-01 10:00": { "MACD": "0.1000", "MACD_Hist": "0.0500", "MACD_Signal": "0.0500" },
                "2024-03-01 10:15": { "MACD": "0.3000", "MACD_Hist": "0.1000", "MACD_Signal": "0.2000" }
            }
        });
        let v = parse_latest_indicator(&body, "Technical Analysis: MACD", &["MACD", "MACD_Signal"])
            .unwrap();
        assert_eq!(v, vec![0.3, 0.2]);
    }

    #[test]
    fn test_macro_latest_skips_placeholders() {
        let body = json!({
            "name": "Consumer Price Index for all Urban Consumers",
            "data": [
                { "date": "2024-03-01", "value": "." },
                { "date": "2024-02-01", "value": "310.326" },
                { "date": "2024-01-01", "value": "308.417" }
            ]
        });
        assert_eq!(parse_macro_latest(&body).unwrap(), 310.326);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let client = AlphaVantageClient::new(Client::new(), DEFAULT_BASE_URL, "SECRET123");
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("SECRET123"));
    }
}
