//! Millisecond timestamps, used instead of [`std::time::Instant`] anywhere a
//! value must survive a persistence round-trip (queue items, cache entries).

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub type TimestampMs = u64;

/// Returns the current time as milliseconds since the Unix epoch.
///
/// Falls back to `0` if the system clock is set before the epoch, which
/// should never happen in practice but must not panic.
pub fn now_ms() -> TimestampMs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
