//! One refresh operation per cache category.
//!
//! Every operation builds its new value completely before touching the cache
//! and returns a `Result`; `Aggregator::execute` is the single place where a
//! failed run is logged and otherwise ignored, leaving the previous snapshot in
//! place.

pub mod metadata;

use crate::bridge::Generator;
use crate::cache::CacheStore;
use crate::data::processing::{enrich_coins, normalize_global, normalize_news, normalize_trending, stamp_sparkline};
use crate::data::{fetch_top_coins, MarketSource, RawNewsItem, RecommendationMap, MARKET_PAGES};
use crate::error::{AggregatorError, Result};
use crate::sparkline::sparkline_boundary;
use crate::storage::SnapshotStore;
use crate::time_util::now_in_zone;
use chrono::Utc;
use chrono_tz::Tz;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

pub use metadata::MetadataTimings;

/// The independently scheduled units of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Coins and global data, which share a cadence.
    Markets,
    Trending,
    Metadata,
    News,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Task::Markets => "markets",
            Task::Trending => "trending",
            Task::Metadata => "metadata",
            Task::News => "news",
        };
        f.write_str(name)
    }
}

/// Owns the collaborators every refresh needs and writes into the shared cache.
pub struct Aggregator {
    cache: Arc<CacheStore>,
    source: Arc<dyn MarketSource>,
    snapshots: SnapshotStore,
    news: Arc<dyn Generator<Vec<RawNewsItem>>>,
    recommender: Arc<dyn Generator<RecommendationMap>>,
    timezone: Tz,
    timings: MetadataTimings,
}

impl Aggregator {
    pub fn new(
        cache: Arc<CacheStore>,
        source: Arc<dyn MarketSource>,
        snapshots: SnapshotStore,
        news: Arc<dyn Generator<Vec<RawNewsItem>>>,
        recommender: Arc<dyn Generator<RecommendationMap>>,
        timezone: Tz,
    ) -> Self {
        Self {
            cache,
            source,
            snapshots,
            news,
            recommender,
            timezone,
            timings: MetadataTimings::default(),
        }
    }

    pub fn with_timings(mut self, timings: MetadataTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Runs `task` and logs its outcome; failures never propagate further.
    pub async fn execute(&self, task: Task) {
        match task {
            Task::Markets => {
                log_outcome("coins", self.refresh_coins().await);
                log_outcome("global", self.refresh_global().await);
            }
            Task::Trending => log_outcome("trending", self.refresh_trending().await),
            Task::Metadata => log_outcome("metadata", self.refresh_metadata().await),
            Task::News => log_outcome("news", self.refresh_news().await),
        }
    }

    /// Loads the durable side data at startup: metadata from disk, then one
    /// recommendation run.
    pub async fn bootstrap(&self) {
        match self.snapshots.load_metadata() {
            Ok(map) if !map.is_empty() => {
                info!("Loaded metadata for {} coins from {}", map.len(), self.snapshots.metadata_path().display());
                self.cache.metadata.store(map);
            }
            Ok(_) => info!("No persisted metadata found"),
            Err(e) => warn!("Ignoring persisted metadata: {}", e),
        }

        log_outcome("recommendations", self.refresh_recommendations().await);
    }

    /// Fetches the top coins, enriches them and commits the batch.
    ///
    /// Returns the number of coins committed.
    ///
    /// # Errors
    /// The first failing page aborts the run; `EmptyResult` if nothing is left
    /// after the delisting filter.
    pub async fn refresh_coins(&self) -> Result<usize> {
        let started = now_in_zone(self.timezone);
        let sparkline_stamp = sparkline_boundary(Utc::now(), self.timezone);

        let coins = fetch_top_coins(self.source.as_ref(), MARKET_PAGES).await?;
        if coins.is_empty() {
            return Err(AggregatorError::EmptyResult { category: "coins" });
        }

        let metadata = self.cache.metadata.load();
        let recommendations = self.cache.recommendations.load();
        let mut coins = enrich_coins(coins, &metadata, &recommendations);
        stamp_sparkline(&mut coins, &sparkline_stamp);

        let count = coins.len();
        self.cache.coins.commit(coins, started);
        Ok(count)
    }

    /// Fetches the global market figures and commits them.
    ///
    /// # Errors
    /// Returns the fetch error, or `EmptyResult` when the payload has no data block.
    pub async fn refresh_global(&self) -> Result<usize> {
        let raw = self.source.fetch_global().await?;
        let global = normalize_global(raw).ok_or(AggregatorError::EmptyResult { category: "global" })?;

        self.cache.global.commit(global, now_in_zone(self.timezone));
        Ok(1)
    }

    /// Fetches the trending list and commits the items that normalize cleanly.
    ///
    /// # Errors
    /// Returns the fetch error, or `EmptyResult` when every item was dropped.
    pub async fn refresh_trending(&self) -> Result<usize> {
        let raw = self.source.fetch_trending().await?;
        let items = normalize_trending(raw);
        if items.is_empty() {
            return Err(AggregatorError::EmptyResult { category: "trending" });
        }

        let count = items.len();
        self.cache.trending.commit(items, now_in_zone(self.timezone));
        Ok(count)
    }

    /// Runs the news generator and commits its cleaned items.
    ///
    /// # Errors
    /// Any generator failure; the previous news snapshot stays in place.
    pub async fn refresh_news(&self) -> Result<usize> {
        let raw = self.news.generate().await?;
        let items = normalize_news(raw);

        let count = items.len();
        self.cache.news.commit(items, now_in_zone(self.timezone));
        Ok(count)
    }

    /// Regenerates recommendations from the current description export.
    ///
    /// # Errors
    /// Any generator failure; the previous map stays in place.
    pub async fn refresh_recommendations(&self) -> Result<usize> {
        let map = self.recommender.generate().await?;

        let count = map.len();
        self.cache.recommendations.store(map);
        Ok(count)
    }
}

fn log_outcome(category: &str, outcome: Result<usize>) {
    match outcome {
        Ok(count) => info!("Refreshed {} ({} records)", category, count),
        Err(e) => warn!("Keeping previous {} snapshot: {}", category, e),
    }
}
