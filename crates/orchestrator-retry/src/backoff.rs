//! Exponential backoff with jitter (spec.md §4.3).

use rand::RngExt;
use std::time::Duration;

/// `base * 2^attempt`, capped at `max`, then multiplied by
/// `(1 + U(-jitter, +jitter))`.
pub fn delay_for_attempt(attempt: u32, base: Duration, max: Duration, jitter: f64) -> Duration {
    let exp = 2f64.powi(attempt.min(32) as i32);
    let raw_ms = (base.as_millis() as f64 * exp).min(max.as_millis() as f64);

    let jitter_factor = if jitter > 0.0 {
        1.0 + rand::rng().random_range(-jitter..=jitter)
    } else {
        1.0
    };

    let jittered_ms = (raw_ms * jitter_factor).max(0.0);
    Duration::from_millis(jittered_ms as u64)
}
