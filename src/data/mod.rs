pub mod ingestion;
pub mod models;
pub mod processing;

pub use ingestion::{fetch_top_coins, CoinGeckoClient, MarketSource, MARKET_PAGES};
pub use models::{Coin, GlobalData, Metadata, MetadataMap, NewsItem, RawNewsItem, RecommendationMap, TrendingItem};
