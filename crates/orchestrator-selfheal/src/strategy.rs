//! Table-driven mapping from (error category, failure-tracker level, raw
//! signal) to an ordered recovery strategy (spec.md §4.9).

use crate::action::RecoveryAction as A;
use crate::tracker::FailureLevel;
use orchestrator_classifier::ErrorCategory;

/// Caller-observed signals that aren't a full [`ErrorCategory`] on their
/// own but still pin a strategy, per spec.md §4.9's "selector-not-found
/// signal" / "captcha signal" rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct Signals {
    pub selector_not_found: bool,
    pub captcha: bool,
}

/// Picks a recovery strategy. Signal rows take priority over category,
/// category over tracker level, matching the table's listed order; the
/// level rows only fire once neither a signal nor a specific category
/// matched.
pub fn strategy_for(category: ErrorCategory, level: FailureLevel, signals: Signals) -> Vec<A> {
    if signals.selector_not_found {
        return vec![A::RediscoverSelectors, A::RestartBrowser];
    }
    if signals.captcha {
        return vec![A::ClearCookies, A::ChangeUserAgent];
    }

    match category {
        ErrorCategory::Browser => return vec![A::RestartBrowser],
        ErrorCategory::Timeout => return vec![A::WaitAndRetry, A::RestartBrowser],
        ErrorCategory::RateLimit => return vec![A::WaitAndRetry],
        ErrorCategory::Auth => return vec![A::ResetSession, A::UpdateConfig],
        _ => {}
    }

    match level {
        FailureLevel::Critical => vec![A::ClearCache, A::ClearCookies, A::RestartBrowser, A::UpdateConfig],
        FailureLevel::Failing => vec![A::RestartBrowser, A::RediscoverSelectors],
        FailureLevel::Degraded => vec![A::WaitAndRetry, A::RestartBrowser],
        FailureLevel::Normal => vec![A::RestartBrowser],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_category_always_restarts() {
        let strategy = strategy_for(ErrorCategory::Browser, FailureLevel::Critical, Signals::default());
        assert_eq!(strategy, vec![A::RestartBrowser]);
    }

    #[test]
    fn selector_signal_wins_over_category() {
        let strategy = strategy_for(
            ErrorCategory::Timeout,
            FailureLevel::Normal,
            Signals { selector_not_found: true, captcha: false },
        );
        assert_eq!(strategy, vec![A::RediscoverSelectors, A::RestartBrowser]);
    }

    #[test]
    fn level_based_fallback_when_category_is_unmapped() {
        let strategy = strategy_for(ErrorCategory::Network, FailureLevel::Critical, Signals::default());
        assert_eq!(
            strategy,
            vec![A::ClearCache, A::ClearCookies, A::RestartBrowser, A::UpdateConfig]
        );
    }

    #[test]
    fn default_strategy_is_restart_browser() {
        let strategy = strategy_for(ErrorCategory::Parsing, FailureLevel::Normal, Signals::default());
        assert_eq!(strategy, vec![A::RestartBrowser]);
    }
}
