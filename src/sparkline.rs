//! Estimates when the upstream 7-day sparkline was last refreshed.
//!
//! CoinGecko rebuilds sparklines at roughly 00:00, 06:00, 12:00 and 18:00 UTC,
//! each time with data through the previous hour. The estimate is attached to
//! coin records for display and drives no control flow.

use crate::time_util::format_in_zone;
use chrono::{DateTime, Duration, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;

/// Daily refresh hours in UTC, latest first.
const BOUNDARY_HOURS: [u32; 4] = [18, 12, 6, 0];

/// Upstream publishes each refresh with data up to one hour before it.
const PUBLISH_LAG_HOURS: i64 = 1;

/// Latest boundary at or before `now`, minus the publish lag, as a UTC instant.
pub fn boundary_instant(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    let hour = BOUNDARY_HOURS
        .iter()
        .copied()
        .find(|h| now.hour() >= *h)
        .unwrap_or(0);

    let boundary = today.and_time(NaiveTime::MIN).and_utc() + Duration::hours(i64::from(hour));
    boundary - Duration::hours(PUBLISH_LAG_HOURS)
}

/// The sparkline freshness stamp for `now`, rendered in the display zone.
pub fn sparkline_boundary(now: DateTime<Utc>, display_zone: Tz) -> String {
    format_in_zone(boundary_instant(now), display_zone)
}
