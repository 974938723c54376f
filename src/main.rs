use coin_cache::bridge::ProcessBridge;
use coin_cache::cache::CacheStore;
use coin_cache::config::Config;
use coin_cache::data::CoinGeckoClient;
use coin_cache::refresh::Aggregator;
use coin_cache::scheduler::{cadence_table, Scheduler};
use coin_cache::storage::SnapshotStore;
use dotenv::dotenv;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Logs when each category was last committed.
fn report_status(cache: &CacheStore) {
    let coins = cache.coins_envelope();
    let global = cache.global_envelope();
    let trending = cache.trending_envelope();
    let news = cache.news_envelope();

    info!(
        "Cache status: coins={} ({:?}), global={:?}, trending={:?}, news={:?}, metadata={}, recommendations={}",
        coins.data.as_ref().map_or(0, Vec::len),
        coins.last_updated,
        global.last_updated,
        trending.last_updated,
        news.last_updated,
        cache.metadata.load().len(),
        cache.recommendations.load().len(),
    );
}

/// Wires the aggregator together and runs the schedules until Ctrl-C.
///
/// Startup order:
/// 1. Load `.env` and set up logging (`RUST_LOG`, default `info`)
/// 2. Read the configuration
/// 3. Restore persisted metadata and run the recommender once
/// 4. Register the cadence table and start the schedules
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    info!(
        "Starting coin cache (data dir {}, zone {})",
        config.data_dir.display(),
        config.timezone
    );

    let cache = Arc::new(CacheStore::new());
    let source = CoinGeckoClient::new(&config.api_key, &config.base_url, config.http_timeout)?;
    let news = ProcessBridge::new(config.news.clone());
    let recommender = ProcessBridge::new(config.recommender.clone());

    let aggregator = Arc::new(Aggregator::new(
        Arc::clone(&cache),
        Arc::new(source),
        SnapshotStore::new(&config.data_dir),
        Arc::new(news),
        Arc::new(recommender),
        config.timezone,
    ));

    aggregator.bootstrap().await;

    let mut scheduler = Scheduler::new(Arc::clone(&aggregator)).await?;
    scheduler.spawn_all(cadence_table(config.timezone, config.warm_start)).await?;
    scheduler.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    scheduler.shutdown().await;
    report_status(&cache);

    Ok(())
}
