//! Formatting helpers shared across CLIs.

use chrono::{DateTime, Local, Utc};

/// Format a duration in minutes (e.g., "2h 05m", "45m").
pub fn format_minutes(minutes: u64) -> String {
    if minutes < 60 {
        format!("{}m", minutes)
    } else {
        format!("{}h {:02}m", minutes / 60, minutes % 60)
    }
}

/// Format a session window in local time (e.g., "Nov 23 14:00 → 16:30").
///
/// The end date is repeated only when the window crosses midnight.
pub fn format_window(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let start = start.with_timezone(&Local);
    let end = end.with_timezone(&Local);

    if start.date_naive() == end.date_naive() {
        format!("{} → {}", start.format("%b %d %H:%M"), end.format("%H:%M"))
    } else {
        format!(
            "{} → {}",
            start.format("%b %d %H:%M"),
            end.format("%b %d %H:%M")
        )
    }
}
