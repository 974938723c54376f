use super::models::{
    Coin, GlobalData, Metadata, MetadataMap, NewsItem, RawGlobalEnvelope, RawMetadata, RawNewsItem,
    RawTrendingCoin, RawTrendingEnvelope, RawTrendingItem, RecommendationMap, TrendingItem,
};
use serde_json::Value;
use tracing::debug;

/// Joins metadata and recommendations into a freshly fetched coin list.
///
/// Every coin's enrichment fields are overwritten from the maps: a coin with no
/// entry ends up with empty details rather than keeping stale ones, which makes
/// the merge idempotent.
pub fn enrich_coins(
    mut coins: Vec<Coin>,
    metadata: &MetadataMap,
    recommendations: &RecommendationMap,
) -> Vec<Coin> {
    for coin in &mut coins {
        coin.details = metadata.get(&coin.market.id).cloned().unwrap_or_default();
        coin.recommended_coins = recommendations.get(&coin.market.id).cloned();
    }
    coins
}

/// Applies one sparkline freshness stamp to the whole batch.
pub fn stamp_sparkline(coins: &mut [Coin], stamp: &str) {
    for coin in coins {
        coin.sparkline_last_updated = Some(stamp.to_string());
    }
}

/// Maps the `/global` payload onto `GlobalData`, reading USD figures.
///
/// Returns `None` when the response carries no `data` block.
pub fn normalize_global(raw: RawGlobalEnvelope) -> Option<GlobalData> {
    let data = raw.data?;

    Some(GlobalData {
        active_cryptocurrencies: data.active_cryptocurrencies,
        total_market_cap: data.total_market_cap.get("usd").copied(),
        total_volume: data.total_volume.get("usd").copied(),
        btc_market_cap_percentage: data.market_cap_percentage.get("btc").copied(),
        eth_market_cap_percentage: data.market_cap_percentage.get("eth").copied(),
        market_cap_change_percentage_24h: data.market_cap_change_percentage_24h_usd,
    })
}

/// Parses a currency figure such as `"$1,234.56"`.
///
/// Plain JSON numbers are accepted as well; anything else yields `None`.
pub fn parse_currency(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s.chars().filter(|c| *c != '$' && *c != ',').collect();
            cleaned.trim().parse().ok()
        }
        _ => None,
    }
}

/// Converts the trending payload one entry at a time.
///
/// Entries that do not decode, or whose price figures are unusable, are
/// dropped; the rest are kept in upstream order.
pub fn normalize_trending(raw: RawTrendingEnvelope) -> Vec<TrendingItem> {
    raw.coins
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<RawTrendingCoin>(entry) {
            Ok(coin) => coin.item,
            Err(e) => {
                debug!("Dropping malformed trending entry: {}", e);
                None
            }
        })
        .filter_map(normalize_trending_item)
        .collect()
}

fn normalize_trending_item(item: RawTrendingItem) -> Option<TrendingItem> {
    let data = item.data?;

    let price = data.price.as_ref().and_then(parse_currency)?;
    let market_cap = data.market_cap.as_ref().and_then(parse_currency)?;
    let volume = data.total_volume.as_ref().and_then(parse_currency)?;

    Some(TrendingItem {
        id: item.id,
        name: item.name,
        symbol: item.symbol.to_uppercase(),
        market_cap_rank: item.market_cap_rank,
        large_image: item.large,
        // Upstream scores are 0-indexed.
        trending_score: item.score.unwrap_or(0) + 1,
        price,
        price_change_percentage_24h: data
            .price_change_percentage_24h
            .and_then(|changes| changes.get("usd").copied().flatten()),
        market_cap,
        volume,
        description: data.content.and_then(|content| content.description),
    })
}

/// Removes the trailing `" - {publisher}"` that news titles carry.
///
/// The rightmost occurrence is cut so a publisher name appearing earlier in the
/// headline is left alone. Titles without the suffix come back unchanged.
pub fn strip_publisher_suffix(title: &str, publisher: &str) -> String {
    let suffix = format!(" - {}", publisher);
    match title.rfind(&suffix) {
        Some(idx) => title[..idx].to_string(),
        None => title.to_string(),
    }
}

pub fn normalize_news(raw: Vec<RawNewsItem>) -> Vec<NewsItem> {
    raw.into_iter()
        .map(|item| {
            let publisher_name = item.publisher.and_then(|p| p.title);
            let title = match &publisher_name {
                Some(name) => strip_publisher_suffix(&item.title, name),
                None => item.title,
            };

            NewsItem {
                title,
                published_date: item.published_date,
                url: item.url,
                publisher_name,
                image_url: item.image_url,
            }
        })
        .collect()
}

/// Cleans a `/coins/{id}` response into `Metadata`.
pub fn normalize_metadata(raw: RawMetadata) -> Metadata {
    let (homepage_url, subreddit_url) = match raw.links {
        Some(links) => (
            links.homepage.into_iter().find(|url| !url.trim().is_empty()),
            links.subreddit_url.filter(|url| !url.trim().is_empty()),
        ),
        None => (None, None),
    };

    Metadata {
        block_time: raw.block_time_in_minutes,
        hashing_algorithm: raw.hashing_algorithm,
        description: raw.description.and_then(|d| d.en).map(|text| strip_html_tags(&text)),
        homepage_url,
        subreddit_url,
        genesis_date: raw.genesis_date,
        positive_sentiment_percentage: raw.sentiment_votes_up_percentage,
    }
}

/// Removes complete `<...>` tags, keeping the text content.
///
/// A `<` with no later `>` is plain text and is kept along with everything
/// after it.
pub fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        match rest[open..].find('>') {
            Some(close) => {
                out.push_str(&rest[..open]);
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }

    out.push_str(rest);
    out
}

/// Renders the description export consumed by the recommendation generator.
///
/// One `coinId,"description"` row per coin with a non-empty description. Line
/// breaks collapse to a single space and double quotes become single quotes so
/// every row stays a valid single-line CSV record.
pub fn descriptions_csv(metadata: &MetadataMap) -> String {
    let mut csv = String::from("coinId,description\n");

    for (coin_id, entry) in metadata {
        let description = match entry.description.as_deref() {
            Some(d) if !d.is_empty() => d,
            _ => continue,
        };

        csv.push_str(coin_id);
        csv.push_str(",\"");
        csv.push_str(&escape_description(description));
        csv.push_str("\"\n");
    }

    csv
}

fn escape_description(description: &str) -> String {
    let mut out = String::with_capacity(description.len());
    let mut in_break = false;

    for c in description.chars() {
        if c == '\r' || c == '\n' {
            if !in_break {
                out.push(' ');
                in_break = true;
            }
            continue;
        }
        in_break = false;
        out.push(if c == '"' { '\'' } else { c });
    }

    out
}
