use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Layout of every timestamp the cache hands out, e.g. `2024-03-01T07:23:00.000000`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Renders `instant` as wall-clock time in `zone`.
pub fn format_in_zone(instant: DateTime<Utc>, zone: Tz) -> String {
    instant.with_timezone(&zone).format(TIMESTAMP_FORMAT).to_string()
}

pub fn now_in_zone(zone: Tz) -> String {
    format_in_zone(Utc::now(), zone)
}
