//! Tunables for [`crate::RetryExecutor`] (spec.md §4.3).

use orchestrator_core::events::EventBus;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct RetryConfig {
    pub(crate) base_delay: Duration,
    pub(crate) max_delay: Duration,
    pub(crate) max_retries: u32,
    pub(crate) jitter: f64,
    pub(crate) dedup_ttl: Duration,
    pub(crate) events: Arc<EventBus>,
}

impl RetryConfig {
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }
}

pub struct RetryConfigBuilder {
    base_delay: Duration,
    max_delay: Duration,
    max_retries: u32,
    jitter: f64,
    dedup_ttl: Duration,
    events: Option<Arc<EventBus>>,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        use orchestrator_core::config::retry::*;
        Self {
            base_delay: Duration::from_millis(BASE_DELAY_MS),
            max_delay: Duration::from_millis(MAX_DELAY_MS),
            max_retries: MAX_RETRIES,
            jitter: JITTER,
            dedup_ttl: Duration::from_millis(DEDUP_TTL_MS),
            events: None,
        }
    }

    /// Default: 1000ms.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Default: 30s.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Default: 5. Overridden per-request by `Request::max_retries`.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Default: 0.3 (±30%).
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Default: 60s.
    pub fn dedup_ttl(mut self, ttl: Duration) -> Self {
        self.dedup_ttl = ttl;
        self
    }

    pub fn events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> RetryConfig {
        RetryConfig {
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            max_retries: self.max_retries,
            jitter: self.jitter,
            dedup_ttl: self.dedup_ttl,
            events: self.events.unwrap_or_default(),
        }
    }
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
