//! Monthly metadata refresh, paced to the upstream rate limit.
//!
//! Coin identifiers are processed in batches of ten with a pause between
//! batches. Individual failures leave holes in the new map instead of
//! aborting the run; market data, by contrast, is all-or-nothing.

use super::{log_outcome, Aggregator};
use crate::data::processing::normalize_metadata;
use crate::data::MetadataMap;
use crate::error::{AggregatorError, Result};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pacing of a metadata run.
///
/// # Fields
/// * `batch_size`: metadata calls issued back to back
/// * `batch_interval`: pause between two batches
/// * `precondition_wait`: how long to wait once for a coin list on an early boot;
///   covers the longest coins cadence plus processing time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetadataTimings {
    pub batch_size: usize,
    pub batch_interval: Duration,
    pub precondition_wait: Duration,
}

impl Default for MetadataTimings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_interval: Duration::from_secs(60),
            precondition_wait: Duration::from_secs(30 * 60 + 30),
        }
    }
}

impl Aggregator {
    /// Rebuilds the metadata map for every cached coin.
    ///
    /// On success the live map is swapped, persisted, exported as CSV and the
    /// recommendation generator is re-run. Returns the number of entries.
    ///
    /// # Errors
    /// * `Precondition` if no coin list exists even after waiting once
    /// * `EmptyResult` if every metadata call failed; nothing is changed then
    pub async fn refresh_metadata(&self) -> Result<usize> {
        let coin_ids = self.wait_for_coin_ids().await?;
        let batch_count = coin_ids.chunks(self.timings.batch_size).len();
        info!("Refreshing metadata for {} coins in {} batches", coin_ids.len(), batch_count);

        let mut result = MetadataMap::new();

        for (index, batch) in coin_ids.chunks(self.timings.batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.timings.batch_interval).await;
            }

            for coin_id in batch {
                match self.source.fetch_metadata(coin_id).await {
                    Ok(raw) => {
                        result.insert(coin_id.clone(), normalize_metadata(raw));
                    }
                    Err(e) => debug!("Skipping metadata for {}: {}", coin_id, e),
                }
            }
        }

        if result.is_empty() {
            return Err(AggregatorError::EmptyResult { category: "metadata" });
        }

        let count = result.len();
        self.cache.metadata.store(result);

        let metadata = self.cache.metadata.load();
        if let Err(e) = self.snapshots.save_metadata(&metadata) {
            warn!("Failed to persist metadata to {}: {}", self.snapshots.metadata_path().display(), e);
        }
        if let Err(e) = self.snapshots.export_descriptions(&metadata) {
            warn!("Failed to export descriptions to {}: {}", self.snapshots.descriptions_path().display(), e);
        }

        log_outcome("recommendations", self.refresh_recommendations().await);
        Ok(count)
    }

    async fn wait_for_coin_ids(&self) -> Result<Vec<String>> {
        let ids = self.cache.coin_ids();
        if !ids.is_empty() {
            return Ok(ids);
        }

        info!(
            "No coin list yet, retrying metadata refresh in {}s",
            self.timings.precondition_wait.as_secs()
        );
        tokio::time::sleep(self.timings.precondition_wait).await;

        let ids = self.cache.coin_ids();
        if ids.is_empty() {
            return Err(AggregatorError::Precondition("coin list still empty".into()));
        }
        Ok(ids)
    }
}
