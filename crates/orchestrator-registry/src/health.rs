//! The `health_score` formula (spec.md §4.4).

use orchestrator_core::model::ProviderHealth;

const CONSECUTIVE_SUCCESS_BOOST_THRESHOLD: u32 = 5;
const SLOW_RESPONSE_THRESHOLD_MS: f64 = 10_000.0;

/// Recomputes `health_score` from the tracked counters and the breaker's
/// current open/closed state. Pure function of its inputs, as required by
/// the invariant in spec.md §3.
pub(crate) fn compute_health_score(health: &ProviderHealth, breaker_is_open: bool) -> f64 {
    if breaker_is_open {
        return 0.0;
    }

    let total = health.total_calls();
    if total == 0 {
        return 1.0;
    }

    let mut score = health.success_count as f64 / total as f64;
    score *= (1.0 - 0.1 * health.consecutive_failures as f64).max(0.0);

    if health.consecutive_successes > CONSECUTIVE_SUCCESS_BOOST_THRESHOLD {
        score = (score * 1.1).min(1.0);
    }

    if health.mean_response_time_ms() > SLOW_RESPONSE_THRESHOLD_MS {
        score *= 0.8;
    }

    score.clamp(0.0, 1.0)
}
