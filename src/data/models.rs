use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Coin identifier → metadata, ordered so the persisted file is stable.
pub type MetadataMap = BTreeMap<String, Metadata>;

/// Coin identifier → recommended coin identifiers.
pub type RecommendationMap = BTreeMap<String, Vec<String>>;

/// Market fields of one coin as delivered by the `/coins/markets` endpoint.
///
/// Deserialized from the upstream snake_case names and served back in
/// camelCase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "snake_case"))]
pub struct MarketQuote {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub image: Option<String>,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub market_cap_rank: Option<u32>,
    pub fully_diluted_valuation: Option<f64>,
    pub total_volume: Option<f64>,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    pub price_change_24h: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
    pub market_cap_change_24h: Option<f64>,
    pub market_cap_change_percentage_24h: Option<f64>,
    pub circulating_supply: Option<f64>,
    pub total_supply: Option<f64>,
    pub max_supply: Option<f64>,
    pub ath: Option<f64>,
    pub ath_change_percentage: Option<f64>,
    pub ath_date: Option<String>,
    pub atl: Option<f64>,
    pub atl_change_percentage: Option<f64>,
    pub atl_date: Option<String>,
    pub sparkline_in_7d: Option<Sparkline>,
    pub price_change_percentage_7d_in_currency: Option<f64>,
    pub price_change_percentage_14d_in_currency: Option<f64>,
    pub price_change_percentage_30d_in_currency: Option<f64>,
    pub price_change_percentage_1y_in_currency: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sparkline {
    #[serde(default)]
    pub price: Vec<f64>,
}

/// Long-lived descriptive data for a coin, refreshed monthly.
///
/// Serialized in camelCase both on disk and towards readers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub block_time: Option<i64>,
    pub hashing_algorithm: Option<String>,
    pub description: Option<String>,
    pub homepage_url: Option<String>,
    pub subreddit_url: Option<String>,
    pub genesis_date: Option<String>,
    pub positive_sentiment_percentage: Option<f64>,
}

/// A coin as held in the cache: upstream market data plus enrichment.
///
/// # Fields
/// * `market`: the upstream quote, flattened into the served record
/// * `sparkline_last_updated`: advisory freshness stamp shared by the whole fetch batch
/// * `details`: metadata joined in from the `MetadataMap`, empty when unknown
/// * `recommended_coins`: identifiers joined in from the `RecommendationMap`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coin {
    #[serde(flatten)]
    pub market: MarketQuote,
    #[serde(default)]
    pub sparkline_last_updated: Option<String>,
    #[serde(flatten)]
    pub details: Metadata,
    #[serde(default)]
    pub recommended_coins: Option<Vec<String>>,
}

impl From<MarketQuote> for Coin {
    fn from(market: MarketQuote) -> Self {
        Self {
            market,
            ..Default::default()
        }
    }
}

/// Aggregate market figures from the `/global` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalData {
    pub active_cryptocurrencies: Option<u32>,
    pub total_market_cap: Option<f64>,
    pub total_volume: Option<f64>,
    pub btc_market_cap_percentage: Option<f64>,
    pub eth_market_cap_percentage: Option<f64>,
    pub market_cap_change_percentage_24h: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingItem {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub market_cap_rank: Option<u32>,
    pub large_image: Option<String>,
    pub trending_score: u32,
    pub price: f64,
    pub price_change_percentage_24h: Option<f64>,
    pub market_cap: f64,
    pub volume: f64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub title: String,
    pub published_date: Option<String>,
    pub url: Option<String>,
    pub publisher_name: Option<String>,
    pub image_url: Option<String>,
}

// Upstream payload shapes, decoded as-is and cleaned up in `processing`.

#[derive(Debug, Deserialize)]
pub struct RawGlobalEnvelope {
    pub data: Option<RawGlobalData>,
}

#[derive(Debug, Deserialize)]
pub struct RawGlobalData {
    pub active_cryptocurrencies: Option<u32>,
    #[serde(default)]
    pub total_market_cap: BTreeMap<String, f64>,
    #[serde(default)]
    pub total_volume: BTreeMap<String, f64>,
    #[serde(default)]
    pub market_cap_percentage: BTreeMap<String, f64>,
    pub market_cap_change_percentage_24h_usd: Option<f64>,
}

/// The `/search/trending` response.
///
/// Entries stay untyped so a single malformed entry can be dropped on its own
/// instead of failing the whole payload.
#[derive(Debug, Deserialize)]
pub struct RawTrendingEnvelope {
    #[serde(default)]
    pub coins: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct RawTrendingCoin {
    pub item: Option<RawTrendingItem>,
}

#[derive(Debug, Deserialize)]
pub struct RawTrendingItem {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub market_cap_rank: Option<u32>,
    pub large: Option<String>,
    pub score: Option<u32>,
    pub data: Option<RawTrendingData>,
}

/// Price figures arrive as currency strings such as `"$1,234.56"`.
#[derive(Debug, Deserialize)]
pub struct RawTrendingData {
    pub price: Option<serde_json::Value>,
    pub price_change_percentage_24h: Option<BTreeMap<String, Option<f64>>>,
    pub market_cap: Option<serde_json::Value>,
    pub total_volume: Option<serde_json::Value>,
    pub content: Option<RawTrendingContent>,
}

#[derive(Debug, Deserialize)]
pub struct RawTrendingContent {
    pub description: Option<String>,
}

/// Subset of the `/coins/{id}` detail response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMetadata {
    pub block_time_in_minutes: Option<i64>,
    pub hashing_algorithm: Option<String>,
    pub description: Option<RawDescription>,
    pub links: Option<RawLinks>,
    pub genesis_date: Option<String>,
    pub sentiment_votes_up_percentage: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDescription {
    pub en: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLinks {
    #[serde(default)]
    pub homepage: Vec<String>,
    pub subreddit_url: Option<String>,
}

/// A record written by the news generator.
#[derive(Debug, Clone, Deserialize)]
pub struct RawNewsItem {
    pub title: String,
    #[serde(rename = "published date")]
    pub published_date: Option<String>,
    pub url: Option<String>,
    pub publisher: Option<RawPublisher>,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPublisher {
    pub href: Option<String>,
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_quote_reads_upstream_names() {
        let json = r#"{
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "current_price": 65000.5,
            "market_cap_rank": 1,
            "high_24h": 66000.0,
            "sparkline_in_7d": {"price": [1.0, 2.0]},
            "price_change_percentage_7d_in_currency": 3.5
        }"#;

        let quote: MarketQuote = serde_json::from_str(json).unwrap();
        assert_eq!(quote.id, "bitcoin");
        assert_eq!(quote.current_price, Some(65000.5));
        assert_eq!(quote.high_24h, Some(66000.0));
        assert_eq!(quote.sparkline_in_7d.unwrap().price, vec![1.0, 2.0]);
    }

    #[test]
    fn test_coin_serializes_flat_camel_case() {
        let mut coin = Coin::from(MarketQuote {
            id: "bitcoin".into(),
            symbol: "btc".into(),
            name: "Bitcoin".into(),
            current_price: Some(1.0),
            ..Default::default()
        });
        coin.details.hashing_algorithm = Some("SHA-256".into());
        coin.recommended_coins = Some(vec!["litecoin".into()]);

        let value = serde_json::to_value(&coin).unwrap();
        assert_eq!(value["id"], "bitcoin");
        assert_eq!(value["currentPrice"], 1.0);
        assert_eq!(value["hashingAlgorithm"], "SHA-256");
        assert_eq!(value["recommendedCoins"][0], "litecoin");
    }

    #[test]
    fn test_raw_news_item_field_names() {
        let json = r#"{
            "title": "Bitcoin hits new high - CoinDesk",
            "published date": "Mon, 01 Jan 2024 10:00:00 GMT",
            "url": "https://example.com/a",
            "publisher": {"href": "https://coindesk.com", "title": "CoinDesk"},
            "imageUrl": "https://example.com/a.png"
        }"#;

        let item: RawNewsItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.publisher.unwrap().title.as_deref(), Some("CoinDesk"));
        assert_eq!(item.image_url.as_deref(), Some("https://example.com/a.png"));
        assert!(item.published_date.is_some());
    }
}
