//! Latest-known-good snapshots for every category.
//!
//! Each slot holds an `Arc` behind a `parking_lot::RwLock`. Readers clone the
//! `Arc` and release the lock immediately; writers build the new value off to
//! the side and swap the reference in one step, so a reader sees either the
//! old snapshot or the new one and never a half-built value.

use crate::data::{Coin, GlobalData, MetadataMap, NewsItem, RecommendationMap, TrendingItem};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

/// A payload plus the time it was produced; both unset until the first commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    pub data: Option<T>,
    pub last_updated: Option<String>,
}

impl<T> Snapshot<T> {
    /// The state of a category that has never been refreshed.
    pub fn empty() -> Self {
        Self {
            data: None,
            last_updated: None,
        }
    }

    pub fn is_populated(&self) -> bool {
        self.data.is_some()
    }
}

/// The `{lastUpdated, data}` shape handed to the serving layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub last_updated: Option<String>,
    pub data: Option<T>,
}

impl<T: Clone> From<&Snapshot<T>> for Envelope<T> {
    fn from(snapshot: &Snapshot<T>) -> Self {
        Self {
            last_updated: snapshot.last_updated.clone(),
            data: snapshot.data.clone(),
        }
    }
}

/// One atomically replaceable slot.
#[derive(Debug)]
pub struct Slot<T> {
    inner: RwLock<Arc<T>>,
}

impl<T> Slot<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(Arc::new(value)),
        }
    }

    /// Current value; never blocks on a writer for longer than a pointer swap.
    pub fn load(&self) -> Arc<T> {
        Arc::clone(&self.inner.read())
    }

    /// Replaces the value in one swap; readers holding the old `Arc` keep it.
    pub fn store(&self, value: T) {
        *self.inner.write() = Arc::new(value);
    }
}

impl<T> Slot<Snapshot<T>> {
    /// Commits a payload together with its timestamp.
    pub fn commit(&self, data: T, last_updated: String) {
        self.store(Snapshot {
            data: Some(data),
            last_updated: Some(last_updated),
        });
    }
}

/// Shared state of the aggregator, handed to refresh tasks and readers by `Arc`.
#[derive(Debug)]
pub struct CacheStore {
    pub coins: Slot<Snapshot<Vec<Coin>>>,
    pub global: Slot<Snapshot<GlobalData>>,
    pub trending: Slot<Snapshot<Vec<TrendingItem>>>,
    pub news: Slot<Snapshot<Vec<NewsItem>>>,
    pub metadata: Slot<MetadataMap>,
    pub recommendations: Slot<RecommendationMap>,
}

impl CacheStore {
    /// An empty store: every snapshot unset, both side-data maps empty.
    pub fn new() -> Self {
        Self {
            coins: Slot::new(Snapshot::empty()),
            global: Slot::new(Snapshot::empty()),
            trending: Slot::new(Snapshot::empty()),
            news: Slot::new(Snapshot::empty()),
            metadata: Slot::new(MetadataMap::new()),
            recommendations: Slot::new(RecommendationMap::new()),
        }
    }

    /// Serving view of the coins snapshot. The other `*_envelope` readers
    /// behave the same for their category.
    pub fn coins_envelope(&self) -> Envelope<Vec<Coin>> {
        Envelope::from(self.coins.load().as_ref())
    }

    pub fn global_envelope(&self) -> Envelope<GlobalData> {
        Envelope::from(self.global.load().as_ref())
    }

    pub fn trending_envelope(&self) -> Envelope<Vec<TrendingItem>> {
        Envelope::from(self.trending.load().as_ref())
    }

    pub fn news_envelope(&self) -> Envelope<Vec<NewsItem>> {
        Envelope::from(self.news.load().as_ref())
    }

    /// Identifiers of the cached coin list, empty before the first commit.
    pub fn coin_ids(&self) -> Vec<String> {
        self.coins
            .load()
            .data
            .as_ref()
            .map(|coins| coins.iter().map(|c| c.market.id.clone()).collect())
            .unwrap_or_default()
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::MarketQuote;

    fn coin(id: &str) -> Coin {
        Coin::from(MarketQuote {
            id: id.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_empty_store_serves_null_envelopes() {
        let store = CacheStore::new();
        let envelope = serde_json::to_value(store.coins_envelope()).unwrap();
        assert_eq!(envelope, serde_json::json!({"lastUpdated": null, "data": null}));
        assert!(store.coin_ids().is_empty());
    }

    #[test]
    fn test_commit_replaces_payload_and_timestamp_together() {
        let store = CacheStore::new();
        store.coins.commit(vec![coin("bitcoin")], "2024-01-01T00:00:00.000000".into());

        let before = store.coins.load();
        store.coins.commit(vec![coin("ethereum")], "2024-01-01T00:23:00.000000".into());
        let after = store.coins.load();

        // A reader holding the old snapshot keeps a consistent pair.
        assert_eq!(before.data.as_ref().unwrap()[0].market.id, "bitcoin");
        assert_eq!(before.last_updated.as_deref(), Some("2024-01-01T00:00:00.000000"));
        assert_eq!(after.data.as_ref().unwrap()[0].market.id, "ethereum");
        assert_eq!(after.last_updated.as_deref(), Some("2024-01-01T00:23:00.000000"));
        assert_eq!(store.coin_ids(), vec!["ethereum".to_string()]);
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let store = Arc::new(CacheStore::new());
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..500 {
                    store.news.commit(
                        vec![NewsItem {
                            title: format!("{}", i),
                            published_date: None,
                            url: None,
                            publisher_name: None,
                            image_url: None,
                        }],
                        format!("{}", i),
                    );
                }
            })
        };

        for _ in 0..500 {
            let snapshot = store.news.load();
            if let (Some(data), Some(stamp)) = (&snapshot.data, &snapshot.last_updated) {
                assert_eq!(&data[0].title, stamp);
            } else {
                assert!(snapshot.data.is_none() && snapshot.last_updated.is_none());
            }
        }
        writer.join().unwrap();
    }
}
