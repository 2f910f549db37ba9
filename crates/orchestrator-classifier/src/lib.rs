//! Error classification for the resilient request orchestration core (C1,
//! spec.md §4.1).
//!
//! [`Classifier::classify`] maps a raw failure to `{category, retryable,
//! confidence, recovery_hint}`. It consults a concurrency-safe learned
//! table first (seeded by [`Classifier::record_feedback`] from the
//! self-healing controller) and falls back to ordered pattern rules.
//! Classification is pure modulo that table: no other side effects.

use orchestrator_core::model::RawFailure;
use parking_lot::RwLock;
use std::collections::HashMap;

/// The category a failure is bucketed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Network,
    Timeout,
    RateLimit,
    Auth,
    Browser,
    Parsing,
    Validation,
    ServerError,
    Resource,
    Transient,
    Unknown,
}

impl ErrorCategory {
    /// Default retryability per spec.md §4.1. `Unknown` has no fixed
    /// default here; callers consult [`Classification::retryable`], which
    /// already folded in the caller-set hint for `Unknown`.
    fn default_retryable(self) -> bool {
        matches!(
            self,
            ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::RateLimit
                | ErrorCategory::Browser
                | ErrorCategory::ServerError
                | ErrorCategory::Transient
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Browser => "browser",
            ErrorCategory::Parsing => "parsing",
            ErrorCategory::Validation => "validation",
            ErrorCategory::ServerError => "server_error",
            ErrorCategory::Resource => "resource",
            ErrorCategory::Transient => "transient",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// A coarse pointer for the self-healing controller (C9); C9 makes the
    /// final strategy decision from its own trigger table (spec.md §4.9),
    /// this is advisory only.
    fn recovery_hint(self) -> Option<&'static str> {
        match self {
            ErrorCategory::Browser => Some("restart_browser"),
            ErrorCategory::Timeout => Some("wait_and_retry"),
            ErrorCategory::RateLimit => Some("wait_and_retry"),
            ErrorCategory::Auth => Some("reset_session"),
            _ => None,
        }
    }
}

/// The result of classifying a single failure.
#[derive(Debug, Clone)]
pub struct Classification {
    pub category: ErrorCategory,
    pub retryable: bool,
    pub confidence: f64,
    pub recovery_hint: Option<&'static str>,
}

#[derive(Debug, Clone)]
struct LearnedEntry {
    category: ErrorCategory,
    weight: u32,
}

/// Ordered pattern rules; first match wins. Status-code matches are exact
/// (confidence 1.0); message-substring matches are heuristic (confidence
/// 0.7). Falls through to `Unknown` at confidence 0.3.
fn classify_by_pattern(failure: &RawFailure) -> (ErrorCategory, f64) {
    if let Some(status) = failure.status {
        match status {
            401 | 403 => return (ErrorCategory::Auth, 1.0),
            408 => return (ErrorCategory::Timeout, 1.0),
            429 => return (ErrorCategory::RateLimit, 1.0),
            500..=599 => return (ErrorCategory::ServerError, 1.0),
            _ => {}
        }
    }

    let haystack = format!(
        "{} {}",
        failure.tag.as_deref().unwrap_or(""),
        failure.message
    )
    .to_lowercase();

    const RULES: &[(&[&str], ErrorCategory)] = &[
        (&["timeout", "timed out", "deadline exceeded"], ErrorCategory::Timeout),
        (&["rate limit", "too many requests", "429"], ErrorCategory::RateLimit),
        (
            &["unauthorized", "forbidden", "auth", "invalid credentials"],
            ErrorCategory::Auth,
        ),
        (
            &["captcha", "selector", "browser", "navigation", "page crashed"],
            ErrorCategory::Browser,
        ),
        (
            &["parse", "json", "unexpected token", "malformed"],
            ErrorCategory::Parsing,
        ),
        (&["invalid", "validation", "bad request"], ErrorCategory::Validation),
        (
            &["network", "connection", "dns", "econnrefused", "socket"],
            ErrorCategory::Network,
        ),
        (&["out of memory", "resource exhausted", "quota"], ErrorCategory::Resource),
        (&["transient", "temporary", "retry later"], ErrorCategory::Transient),
    ];

    for (needles, category) in RULES {
        if needles.iter().any(|needle| haystack.contains(needle)) {
            return (*category, 0.7);
        }
    }

    (ErrorCategory::Unknown, 0.3)
}

/// Confidence derived from a learned-table sample count: asymptotically
/// approaches (but never reaches) 0.95, so pattern rules remain a credible
/// fallback until a category has been reinforced repeatedly.
fn confidence_from_weight(weight: u32) -> f64 {
    let weight = weight as f64;
    (weight / (weight + 3.0)).min(0.95)
}

/// Maps raw failures to categories, learning from explicit feedback.
#[derive(Default)]
pub struct Classifier {
    learned: RwLock<HashMap<(String, String), LearnedEntry>>,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn learned_key(provider: &str, message: &str) -> (String, String) {
        (provider.to_string(), orchestrator_core::fingerprint::fingerprint(message))
    }

    /// Classifies a raw failure. Consults the learned table first; falls
    /// through to pattern rules.
    pub fn classify(&self, failure: &RawFailure) -> Classification {
        let provider = failure.provider.as_deref().unwrap_or("");
        let key = Self::learned_key(provider, &failure.message);

        let (category, confidence) = {
            let learned = self.learned.read();
            match learned.get(&key) {
                Some(entry) if entry.weight > 0 => {
                    (entry.category, confidence_from_weight(entry.weight))
                }
                _ => classify_by_pattern(failure),
            }
        };

        let retryable = if category == ErrorCategory::Unknown {
            failure.retryable_hint.unwrap_or(false)
        } else {
            category.default_retryable()
        };

        Classification {
            category,
            retryable,
            confidence,
            recovery_hint: category.recovery_hint(),
        }
    }

    /// Explicit feedback from the self-healing controller (C9): a recovery
    /// action's outcome teaches the classifier that this provider/message
    /// pair really does (or doesn't) belong to `category`.
    pub fn record_feedback(
        &self,
        provider: &str,
        message: &str,
        category: ErrorCategory,
        success: bool,
    ) {
        let key = Self::learned_key(provider, message);
        let mut learned = self.learned.write();
        let entry = learned.entry(key.clone()).or_insert(LearnedEntry {
            category,
            weight: 0,
        });

        if success {
            entry.category = category;
            entry.weight = entry.weight.saturating_add(1);
        } else if entry.category == category {
            entry.weight = entry.weight.saturating_sub(1);
        }

        if entry.weight == 0 {
            learned.remove(&key);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(provider, category = category.as_str(), success, "classifier feedback");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_match_has_full_confidence() {
        let c = Classifier::new();
        let failure = RawFailure::new("boom").with_status(429);
        let classification = c.classify(&failure);
        assert_eq!(classification.category, ErrorCategory::RateLimit);
        assert_eq!(classification.confidence, 1.0);
        assert!(classification.retryable);
    }

    #[test]
    fn substring_match_has_partial_confidence() {
        let c = Classifier::new();
        let failure = RawFailure::new("connection timed out while reading");
        let classification = c.classify(&failure);
        assert_eq!(classification.category, ErrorCategory::Timeout);
        assert_eq!(classification.confidence, 0.7);
    }

    #[test]
    fn auth_and_validation_are_not_retryable() {
        let c = Classifier::new();
        assert!(!c.classify(&RawFailure::new("unauthorized access")).retryable);
        assert!(!c.classify(&RawFailure::new("validation failed: missing field")).retryable);
    }

    #[test]
    fn unknown_follows_caller_hint() {
        let c = Classifier::new();
        let failure = RawFailure::new("something bizarre happened");
        assert!(!c.classify(&failure).retryable);

        let failure_retryable = RawFailure {
            retryable_hint: Some(true),
            ..RawFailure::new("something bizarre happened")
        };
        assert!(c.classify(&failure_retryable).retryable);
    }

    #[test]
    fn positive_feedback_is_learned_and_increases_confidence() {
        let c = Classifier::new();
        let provider = "acme";
        let message = "weird proprietary error code 17";

        let before = c.classify(&RawFailure::new(message).with_provider(provider));
        assert_eq!(before.category, ErrorCategory::Unknown);

        for _ in 0..5 {
            c.record_feedback(provider, message, ErrorCategory::Browser, true);
        }

        let after = c.classify(&RawFailure::new(message).with_provider(provider));
        assert_eq!(after.category, ErrorCategory::Browser);
        assert!(after.confidence > before.confidence);
    }

    #[test]
    fn negative_feedback_eventually_forgets() {
        let c = Classifier::new();
        c.record_feedback("acme", "msg", ErrorCategory::Browser, true);
        c.record_feedback("acme", "msg", ErrorCategory::Browser, false);

        let classification = c.classify(&RawFailure::new("msg").with_provider("acme"));
        // weight dropped back to 0 and the learned entry was evicted.
        assert_eq!(classification.category, ErrorCategory::Unknown);
    }
}
