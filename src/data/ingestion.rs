use super::models::{Coin, MarketQuote, RawGlobalEnvelope, RawMetadata, RawTrendingEnvelope};
use crate::error::{AggregatorError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Header CoinGecko expects the demo API key in.
pub const API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// Coins requested per markets page.
pub const PAGE_SIZE: u32 = 250;

/// Pages fetched per coins refresh (top 1000 by market cap).
pub const MARKET_PAGES: u32 = 4;

const MARKETS_QUERY: &str = "vs_currency=usd&order=market_cap_desc&sparkline=true\
&price_change_percentage=7d%2C14d%2C30d%2C1y&locale=en&precision=full";

const METADATA_QUERY: &str = "localization=false&tickers=false&market_data=false\
&community_data=true&developer_data=false&sparkline=false";

/// Read-only access to the upstream pricing API.
///
/// Each call returns the parsed payload or an error; callers decide what a
/// failure means for their category.
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// One page of the market-cap ordered coin list (1-indexed).
    async fn fetch_market_page(&self, page: u32) -> Result<Vec<MarketQuote>>;

    async fn fetch_global(&self) -> Result<RawGlobalEnvelope>;

    async fn fetch_trending(&self) -> Result<RawTrendingEnvelope>;

    /// Descriptive detail for a single coin.
    async fn fetch_metadata(&self, coin_id: &str) -> Result<RawMetadata>;
}

/// HTTP client for the CoinGecko v3 REST API.
///
/// Holds a pooled `reqwest::Client` and the API key sent with every request.
pub struct CoinGeckoClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl CoinGeckoClient {
    /// Creates a client for `base_url` with a per-request timeout.
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Issues a GET for `endpoint` and decodes the JSON body.
    ///
    /// Any non-success status is reported as `AggregatorError::Upstream`, so a
    /// rate-limited or failing call never reaches the parser.
    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AggregatorError::Upstream {
                status: status.as_u16(),
                endpoint: endpoint.to_string(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl MarketSource for CoinGeckoClient {
    async fn fetch_market_page(&self, page: u32) -> Result<Vec<MarketQuote>> {
        self.get_json(&markets_endpoint(page)).await
    }

    async fn fetch_global(&self) -> Result<RawGlobalEnvelope> {
        self.get_json("/global").await
    }

    async fn fetch_trending(&self) -> Result<RawTrendingEnvelope> {
        self.get_json("/search/trending").await
    }

    async fn fetch_metadata(&self, coin_id: &str) -> Result<RawMetadata> {
        self.get_json(&format!("/coins/{}?{}", coin_id, METADATA_QUERY)).await
    }
}

pub fn markets_endpoint(page: u32) -> String {
    format!("/coins/markets?{}&per_page={}&page={}", MARKETS_QUERY, PAGE_SIZE, page)
}

/// Whether upstream has marked the coin as superseded (`[OLD]` / `(OLD)`).
pub fn is_delisted(name: &str) -> bool {
    name.contains("[OLD]") || name.contains("(OLD)")
}

/// Fetches `pages` market pages in order and assembles the coin list.
///
/// The run is all-or-nothing: the first failing page aborts it and every page
/// already fetched is dropped with it. Delisted coins are filtered out.
///
/// # Errors
/// Returns the error of the first page that failed.
pub async fn fetch_top_coins(source: &dyn MarketSource, pages: u32) -> Result<Vec<Coin>> {
    let mut coins = Vec::with_capacity((pages * PAGE_SIZE) as usize);

    for page in 1..=pages {
        let quotes = source.fetch_market_page(page).await?;
        debug!("Fetched market page {} ({} coins)", page, quotes.len());

        coins.extend(
            quotes
                .into_iter()
                .filter(|quote| !is_delisted(&quote.name))
                .map(Coin::from),
        );
    }

    Ok(coins)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};

    /// In-memory `MarketSource` with scripted failures.
    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub pages: HashMap<u32, Vec<MarketQuote>>,
        pub failing_pages: HashSet<u32>,
        pub global: Option<serde_json::Value>,
        pub trending: Option<serde_json::Value>,
        pub metadata: HashMap<String, RawMetadata>,
        pub calls: Mutex<Vec<(String, tokio::time::Instant)>>,
    }

    impl FakeSource {
        fn record(&self, call: String) {
            self.calls.lock().push((call, tokio::time::Instant::now()));
        }

        pub(crate) fn call_log(&self) -> Vec<(String, tokio::time::Instant)> {
            self.calls.lock().clone()
        }
    }

    fn unavailable(endpoint: &str) -> AggregatorError {
        AggregatorError::Upstream {
            status: 503,
            endpoint: endpoint.to_string(),
        }
    }

    #[async_trait]
    impl MarketSource for FakeSource {
        async fn fetch_market_page(&self, page: u32) -> Result<Vec<MarketQuote>> {
            self.record(format!("page:{}", page));
            if self.failing_pages.contains(&page) {
                return Err(unavailable("/coins/markets"));
            }
            Ok(self.pages.get(&page).cloned().unwrap_or_default())
        }

        async fn fetch_global(&self) -> Result<RawGlobalEnvelope> {
            self.record("global".into());
            match &self.global {
                Some(value) => Ok(serde_json::from_value(value.clone())?),
                None => Err(unavailable("/global")),
            }
        }

        async fn fetch_trending(&self) -> Result<RawTrendingEnvelope> {
            self.record("trending".into());
            match &self.trending {
                Some(value) => Ok(serde_json::from_value(value.clone())?),
                None => Err(unavailable("/search/trending")),
            }
        }

        async fn fetch_metadata(&self, coin_id: &str) -> Result<RawMetadata> {
            self.record(format!("metadata:{}", coin_id));
            match self.metadata.get(coin_id) {
                Some(raw) => Ok(raw.clone()),
                None => Err(unavailable("/coins/{id}")),
            }
        }
    }

    pub(crate) fn quote(id: &str, name: &str) -> MarketQuote {
        MarketQuote {
            id: id.to_string(),
            symbol: id.chars().take(3).collect(),
            name: name.to_string(),
            current_price: Some(1.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_delisting_marker() {
        assert!(is_delisted("Foo [OLD]"));
        assert!(is_delisted("Foo (OLD)"));
        assert!(!is_delisted("Foo"));
        assert!(!is_delisted("Old Foo"));
    }

    #[test]
    fn test_markets_endpoint_query() {
        let endpoint = markets_endpoint(3);
        assert!(endpoint.starts_with("/coins/markets?vs_currency=usd"));
        assert!(endpoint.contains("per_page=250"));
        assert!(endpoint.ends_with("&page=3"));
        assert!(endpoint.contains("precision=full"));
    }

    #[tokio::test]
    async fn test_fetch_top_coins_filters_delisted() {
        let mut source = FakeSource::default();
        source.pages.insert(
            1,
            vec![quote("foo", "Foo"), quote("foo-old", "Foo [OLD]"), quote("foo-legacy", "Foo (OLD)")],
        );
        source.pages.insert(2, vec![quote("bar", "Bar")]);

        let coins = fetch_top_coins(&source, 2).await.unwrap();
        let ids: Vec<&str> = coins.iter().map(|c| c.market.id.as_str()).collect();
        assert_eq!(ids, vec!["foo", "bar"]);
    }

    #[tokio::test]
    async fn test_fetch_top_coins_aborts_on_failed_page() {
        let mut source = FakeSource::default();
        for page in 1..=4 {
            source.pages.insert(page, vec![quote(&format!("coin-{}", page), "Coin")]);
        }
        source.failing_pages.insert(3);

        let result = fetch_top_coins(&source, MARKET_PAGES).await;
        assert!(matches!(result, Err(AggregatorError::Upstream { status: 503, .. })));

        // Page 4 is never requested once page 3 has failed.
        let calls: Vec<String> = source.call_log().into_iter().map(|(c, _)| c).collect();
        assert_eq!(calls, vec!["page:1", "page:2", "page:3"]);
    }
}
