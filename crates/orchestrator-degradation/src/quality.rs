//! Quality score formula (spec.md §4.7).

use orchestrator_core::model::ProviderResponse;

const SLOW_MS: u64 = 30_000;
const SOMEWHAT_SLOW_MS: u64 = 10_000;
const VERY_SHORT_CHARS: usize = 50;
const SHORT_CHARS: usize = 200;
const HOUR_MS: u64 = 3_600_000;
const DAY_MS: u64 = 24 * HOUR_MS;

/// Quality of a response as it comes back from a live dispatch, before any
/// cache aging is applied.
pub fn live_quality(response: &ProviderResponse, response_time_ms: u64) -> f64 {
    let mut score: f64 = 1.0;

    if response.content.is_none() {
        score *= 0.5; // incomplete: no content at all
    }

    if response_time_ms > SLOW_MS {
        score *= 0.7;
    } else if response_time_ms > SOMEWHAT_SLOW_MS {
        score *= 0.9;
    }

    let len = response.content.as_deref().map(str::len).unwrap_or(0);
    if len < VERY_SHORT_CHARS {
        score *= 0.6;
    } else if len < SHORT_CHARS {
        score *= 0.8;
    }

    if response.error {
        score *= 0.3;
    }

    if response.partial {
        score *= 0.5;
    }

    score.clamp(0.0, 1.0)
}

/// Discount applied to a stored quality for how long it has sat in the
/// cache (spec.md §4.7's "age in the cache" factor).
pub fn age_factor(age_ms: u64) -> f64 {
    if age_ms > DAY_MS {
        0.6
    } else if age_ms > HOUR_MS {
        0.8
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_response_scores_one() {
        let response = ProviderResponse::ok("x".repeat(300));
        assert_eq!(live_quality(&response, 100), 1.0);
    }

    #[test]
    fn missing_content_and_short_and_slow_compound() {
        let mut response = ProviderResponse::ok("hi");
        response.content = None;
        let score = live_quality(&response, 40_000);
        assert!((score - 0.5 * 0.7 * 0.6).abs() < 1e-9);
    }

    #[test]
    fn error_marker_dominates() {
        let mut response = ProviderResponse::ok("x".repeat(300));
        response.error = true;
        let score = live_quality(&response, 0);
        assert!((score - 0.3).abs() < 1e-9);
    }

    #[test]
    fn age_factor_tiers() {
        assert_eq!(age_factor(0), 1.0);
        assert_eq!(age_factor(HOUR_MS + 1), 0.8);
        assert_eq!(age_factor(DAY_MS + 1), 0.6);
    }
}
