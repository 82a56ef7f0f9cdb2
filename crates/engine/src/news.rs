//! Headline scraping, one table row per market
//!
//! Each [`NewsSource`] names a page template, a CSS selector for the headline
//! links and one for their timestamps. A single extractor pairs the two lists
//! by position. Adding a market means adding a row to [`NEWS_SOURCES`].

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{header, Client, Url};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::error::{SignalError, SignalResult};
use crate::types::{Market, NewsItem, Symbol};

/// Sites serve stripped or blocked pages to non-browser agents
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// How a timestamp element encodes its time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// Element text in a `chrono` format, read as UTC
    Text(&'static str),
    /// ISO-8601 in the element's `datetime` attribute
    DatetimeAttr,
}

/// Scraping recipe for one market
#[derive(Debug, Clone, Copy)]
pub struct NewsSource {
    pub market: Market,
    /// Page URL with a `{symbol}` placeholder (lower-case symbol)
    pub url_template: &'static str,
    pub item_selector: &'static str,
    pub timestamp_selector: &'static str,
    pub timestamp_format: TimestampFormat,
}

pub const NEWS_SOURCES: [NewsSource; 5] = [
    NewsSource {
        market: Market::Nasdaq,
        url_template: "https://www.nasdaq.com/market-activity/stocks/{symbol}/news-headlines",
        item_selector: "a.quote-news-headlines__link",
        timestamp_selector: "span.quote-news-headlines__date",
        timestamp_format: TimestampFormat::Text("%m/%d/%Y %I:%M%p"),
    },
    NewsSource {
        market: Market::Nyse,
        url_template: "https://www.nyse.com/quote/{symbol}/news",
        item_selector: "a.news-link",
        timestamp_selector: "time",
        timestamp_format: TimestampFormat::DatetimeAttr,
    },
    NewsSource {
        market: Market::Forex,
        url_template: "https://www.dailyfx.com/{symbol}-news",
        item_selector: "a.post-card-title",
        timestamp_selector: "time",
        timestamp_format: TimestampFormat::DatetimeAttr,
    },
    NewsSource {
        market: Market::Crypto,
        url_template: "https://cointelegraph.com/tags/{symbol}-news",
        item_selector: "a.post-card-title",
        timestamp_selector: "time",
        timestamp_format: TimestampFormat::DatetimeAttr,
    },
    NewsSource {
        market: Market::Metals,
        url_template: "https://www.kitco.com/news/{symbol}-news.html",
        item_selector: "a.post-card-title",
        timestamp_selector: "time",
        timestamp_format: TimestampFormat::DatetimeAttr,
    },
];

/// Look up the scraping recipe for a market
pub fn source_for(market: Market) -> SignalResult<&'static NewsSource> {
    NEWS_SOURCES
        .iter()
        .find(|s| s.market == market)
        .ok_or_else(|| SignalError::UnsupportedMarket(market.to_string()))
}

impl NewsSource {
    pub fn url_for(&self, symbol: &Symbol) -> String {
        self.url_template
            .replace("{symbol}", &symbol.as_str().to_lowercase())
    }
}

// ============================================================================
// Extraction
// ============================================================================

/// Extract headlines from a page, newest first.
///
/// Never fails: an unparsable selector, no matches, or a different number of
/// items and timestamps all give an empty list. Items whose timestamp or link
/// cannot be parsed are dropped individually.
pub fn extract_headlines(html: &str, source: &NewsSource, page_url: &str) -> Vec<NewsItem> {
    let (Ok(item_sel), Ok(ts_sel)) = (
        Selector::parse(source.item_selector),
        Selector::parse(source.timestamp_selector),
    ) else {
        warn!(market = %source.market, "Invalid news selector");
        return Vec::new();
    };
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let items: Vec<ElementRef> = document.select(&item_sel).collect();
    let stamps: Vec<ElementRef> = document.select(&ts_sel).collect();

    if items.is_empty() || items.len() != stamps.len() {
        debug!(
            market = %source.market,
            items = items.len(),
            timestamps = stamps.len(),
            "No usable headline list on page"
        );
        return Vec::new();
    }

    let mut headlines: Vec<NewsItem> = items
        .iter()
        .zip(stamps.iter())
        .filter_map(|(item, stamp)| {
            let title = collapse_whitespace(&item.text().collect::<String>());
            if title.is_empty() {
                return None;
            }
            let url = base.join(item.value().attr("href")?).ok()?;
            let timestamp = parse_stamp(stamp, source.timestamp_format)?;
            Some(NewsItem {
                title,
                url: url.to_string(),
                timestamp,
            })
        })
        .collect();

    headlines.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    headlines
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_stamp(element: &ElementRef, format: TimestampFormat) -> Option<DateTime<Utc>> {
    match format {
        TimestampFormat::Text(fmt) => {
            let text = collapse_whitespace(&element.text().collect::<String>());
            NaiveDateTime::parse_from_str(&text, fmt)
                .ok()
                .map(|dt| dt.and_utc())
        }
        TimestampFormat::DatetimeAttr => parse_iso8601(element.value().attr("datetime")?),
    }
}

/// ISO-8601 with `Z`, `+hh:mm` or `+hhmm` offsets, or naive (read as UTC)
pub fn parse_iso8601(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc())
}

// ============================================================================
// Gateway
// ============================================================================

/// Source of recent headlines for a symbol
#[async_trait]
pub trait NewsFeed: Send + Sync {
    /// Headlines newest first; empty when the page has none
    async fn headlines(&self, symbol: &Symbol, market: Market) -> SignalResult<Vec<NewsItem>>;
}

/// Fetches market news pages over HTTP and runs [`extract_headlines`]
#[derive(Debug, Clone)]
pub struct ScraperNewsClient {
    client: Client,
    /// Replaces each source's scheme and host, keeping path and query
    origin: Option<String>,
}

impl ScraperNewsClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            origin: None,
        }
    }

    /// Route every news page through `origin` (a mirror or caching proxy)
    pub fn with_origin(client: Client, origin: impl Into<String>) -> Self {
        Self {
            client,
            origin: Some(origin.into().trim_end_matches('/').to_string()),
        }
    }

    fn page_url(&self, source: &NewsSource, symbol: &Symbol) -> String {
        let url = source.url_for(symbol);
        let Some(origin) = &self.origin else {
            return url;
        };
        match Url::parse(&url) {
            Ok(parsed) => {
                let mut rewritten = format!("{}{}", origin, parsed.path());
                if let Some(query) = parsed.query() {
                    rewritten.push('?');
                    rewritten.push_str(query);
                }
                rewritten
            }
            Err(_) => url,
        }
    }
}

#[async_trait]
impl NewsFeed for ScraperNewsClient {
    async fn headlines(&self, symbol: &Symbol, market: Market) -> SignalResult<Vec<NewsItem>> {
        let source = source_for(market)?;
        let url = self.page_url(source, symbol);
        debug!(%symbol, %market, url, "Fetching news page");

        let response = self
            .client
            .get(&url)
            .header(header::USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?;

        if !response.status().is_success() {
            debug!(status = %response.status(), url, "News page missing");
            return Ok(Vec::new());
        }

        let html = response.text().await?;
        let headlines = extract_headlines(&html, source, &url);
        debug!(%symbol, count = headlines.len(), "Extracted headlines");
        Ok(headlines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nasdaq() -> &'static NewsSource {
        source_for(Market::Nasdaq).unwrap()
    }

    fn crypto() -> &'static NewsSource {
        source_for(Market::Crypto).unwrap()
    }

    #[test]
    fn test_every_market_has_a_source() {
        for market in Market::ALL {
            assert!(source_for(market).is_ok(), "no news source for {}", market);
        }
    }

    #[test]
    fn test_url_uses_lowercase_symbol() {
        let symbol = Symbol::parse("aapl").unwrap();
        assert_eq!(
            nasdaq().url_for(&symbol),
            "https://www.nasdaq.com/market-activity/stocks/aapl/news-headlines"
        );
    }

    #[test]
    fn test_nasdaq_headlines_newest_first() {
        let html = r#"
            <ul>
              <li><a class="quote-news-headlines__link" href="/articles/older">  Older   story </a>
                  <span class="quote-news-headlines__date">3/4/2024 9:05am</span></li>
              <li><a class="quote-news-headlines__link" href="https://example.com/newer">Newer story</a>
                  <span class="quote-news-headlines__date">3/5/2024 1:30pm</span></li>
            </ul>"#;
        let items = extract_headlines(html, nasdaq(), "https://www.nasdaq.com/market-activity/stocks/aapl/news-headlines");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Newer story");
        assert_eq!(items[0].timestamp.to_rfc3339(), "2024-03-05T13:30:00+00:00");
        assert_eq!(items[1].title, "Older story");
        assert_eq!(items[1].url, "https://www.nasdaq.com/articles/older");
    }

    #[test]
    fn test_datetime_attr_with_offset() {
        let html = r#"
            <article><a class="post-card-title" href="/news/btc">BTC rallies</a>
                <time datetime="2024-03-05T10:00:00+0200">2 hours ago</time></article>"#;
        let items = extract_headlines(html, crypto(), "https://cointelegraph.com/tags/btc-news");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].timestamp.to_rfc3339(), "2024-03-05T08:00:00+00:00");
    }

    #[test]
    fn test_count_mismatch_gives_empty_list() {
        let html = r#"
            <a class="post-card-title" href="/a">A</a>
            <a class="post-card-title" href="/b">B</a>
            <time datetime="2024-03-05T10:00:00Z"></time>"#;
        assert!(extract_headlines(html, crypto(), "https://cointelegraph.com/").is_empty());
    }

    #[test]
    fn test_bad_timestamp_drops_only_that_item() {
        let html = r#"
            <a class="post-card-title" href="/a">A</a><time datetime="yesterday"></time>
            <a class="post-card-title" href="/b">B</a><time datetime="2024-03-05T10:00:00Z"></time>"#;
        let items = extract_headlines(html, crypto(), "https://cointelegraph.com/");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "B");
    }

    #[test]
    fn test_empty_page() {
        assert!(extract_headlines("", nasdaq(), "https://www.nasdaq.com/").is_empty());
        assert!(extract_headlines("<html><body></body></html>", crypto(), "https://cointelegraph.com/").is_empty());
    }

    fn aapl() -> Symbol {
        Symbol::parse("AAPL").unwrap()
    }

    #[test]
    fn test_origin_override_keeps_path() {
        let client = ScraperNewsClient::with_origin(Client::new(), "http://127.0.0.1:9000/");
        assert_eq!(
            client.page_url(nasdaq(), &aapl()),
            "http://127.0.0.1:9000/market-activity/stocks/aapl/news-headlines"
        );
        assert_eq!(
            ScraperNewsClient::new(Client::new()).page_url(nasdaq(), &aapl()),
            nasdaq().url_for(&aapl())
        );
    }

    #[tokio::test]
    async fn test_missing_page_gives_empty_list() {
        let (origin, _request) =
            crate::test_support::serve_once("404 Not Found", "text/html", "<h1>gone</h1>").await;
        let client = ScraperNewsClient::with_origin(Client::new(), origin);
        assert_eq!(client.headlines(&aapl(), Market::Nasdaq).await.unwrap(), vec![]);
    }

    #[tokio::test]
    async fn test_sends_browser_user_agent() {
        let html = r#"<a class="quote-news-headlines__link" href="/articles/a">Apple earnings</a>
            <span class="quote-news-headlines__date">3/5/2024 1:30pm</span>"#;
        let (origin, request) = crate::test_support::serve_once("200 OK", "text/html", html).await;
        let client = ScraperNewsClient::with_origin(Client::new(), origin.clone());

        let items = client.headlines(&aapl(), Market::Nasdaq).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Apple earnings");
        assert_eq!(items[0].url, format!("{}/articles/a", origin));

        let head = request.await.unwrap();
        assert!(head.starts_with("GET /market-activity/stocks/aapl/news-headlines "));
        let expected = format!("user-agent: {}", BROWSER_USER_AGENT).to_lowercase();
        assert!(head.to_lowercase().contains(&expected), "{}", head);
    }

    #[test]
    fn test_parse_iso8601_variants() {
        assert!(parse_iso8601("2024-03-05T10:00:00Z").is_some());
        assert!(parse_iso8601("2024-03-05T10:00:00+02:00").is_some());
        assert!(parse_iso8601("2024-03-05T10:00:00-0500").is_some());
        assert!(parse_iso8601("2024-03-05T10:00:00").is_some());
        assert!(parse_iso8601("5 March").is_none());
    }
}
