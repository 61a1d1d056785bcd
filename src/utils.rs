//! Timestamp helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Convert a `(seconds, nanoseconds)` stamp to whole milliseconds.
///
/// Sub-millisecond precision is truncated.
#[inline]
pub fn stamp_to_ms(sec: i64, nsec: u32) -> i64 {
    sec * 1000 + i64::from(nsec / 1_000_000)
}

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Clocks set before the epoch read as zero.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
