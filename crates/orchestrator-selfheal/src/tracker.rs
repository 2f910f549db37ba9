//! Per-provider consecutive-failure tracker (spec.md §4.9).

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailureLevel {
    Normal,
    Degraded,
    Failing,
    Critical,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Thresholds {
    pub degraded: u32,
    pub failing: u32,
    pub critical: u32,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FailureTracker {
    consecutive_failures: u32,
    consecutive_successes: u32,
}

impl FailureTracker {
    pub(crate) fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
    }

    /// Returns the number of consecutive successes now observed, so the
    /// caller can detect the exact moment the "three in a row" recovery
    /// threshold is crossed.
    pub(crate) fn record_success(&mut self) -> u32 {
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
        self.consecutive_successes
    }

    pub(crate) fn level(&self, thresholds: Thresholds) -> FailureLevel {
        if self.consecutive_failures >= thresholds.critical {
            FailureLevel::Critical
        } else if self.consecutive_failures >= thresholds.failing {
            FailureLevel::Failing
        } else if self.consecutive_failures >= thresholds.degraded {
            FailureLevel::Degraded
        } else {
            FailureLevel::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> Thresholds {
        Thresholds { degraded: 3, failing: 5, critical: 10 }
    }

    #[test]
    fn levels_escalate_with_consecutive_failures() {
        let mut tracker = FailureTracker::default();
        for _ in 0..2 {
            tracker.record_failure();
        }
        assert_eq!(tracker.level(thresholds()), FailureLevel::Normal);

        tracker.record_failure();
        assert_eq!(tracker.level(thresholds()), FailureLevel::Degraded);

        for _ in 0..2 {
            tracker.record_failure();
        }
        assert_eq!(tracker.level(thresholds()), FailureLevel::Failing);

        for _ in 0..5 {
            tracker.record_failure();
        }
        assert_eq!(tracker.level(thresholds()), FailureLevel::Critical);
    }

    #[test]
    fn a_single_success_resets_the_failure_streak() {
        let mut tracker = FailureTracker::default();
        for _ in 0..6 {
            tracker.record_failure();
        }
        assert_eq!(tracker.level(thresholds()), FailureLevel::Failing);

        tracker.record_success();
        assert_eq!(tracker.level(thresholds()), FailureLevel::Normal);
    }
}
