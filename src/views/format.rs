use time::OffsetDateTime;

use crate::video::Timestamp;

const NANOS_PER_MILLI: i128 = 1_000_000;
const MINUTE_MS: i128 = 60_000;
const HOUR_MS: i128 = 60 * MINUTE_MS;
const DAY_MS: i128 = 24 * HOUR_MS;
const WEEK_MS: i128 = 7 * DAY_MS;

/// Formats a duration in seconds as `m:ss`.
pub fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Formats a count for display, abbreviating thousands and millions
/// (`1.2K`, `3.4M`).
pub fn format_count(count: u64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

/// Describes how long before `now` something happened. Anything older
/// than a week is shown as its date.
pub fn format_timestamp(timestamp: Timestamp, now: Timestamp) -> String {
    let elapsed = (now - timestamp) / NANOS_PER_MILLI;

    match elapsed {
        e if e < MINUTE_MS => String::from("just now"),
        e if e < HOUR_MS => format!("{}m ago", e / MINUTE_MS),
        e if e < DAY_MS => format!("{}h ago", e / HOUR_MS),
        e if e < WEEK_MS => format!("{}d ago", e / DAY_MS),
        _ => OffsetDateTime::from_unix_timestamp_nanos(timestamp)
            .map(|moment| moment.date().to_string())
            .unwrap_or_default(),
    }
}
