//! Configuration for the per-provider circuit breaker (spec.md §4.2).

use orchestrator_core::events::EventBus;
use std::sync::Arc;
use std::time::Duration;

/// Tunables for one circuit breaker instance. Defaults match spec.md §6's
/// `breaker.*` keys.
#[derive(Clone)]
pub struct CircuitBreakerConfig {
    pub(crate) name: String,
    pub(crate) failure_threshold: u32,
    pub(crate) window: Duration,
    pub(crate) open_timeout: Duration,
    pub(crate) half_open_trials: u32,
    pub(crate) events: Arc<EventBus>,
}

impl CircuitBreakerConfig {
    pub fn builder(name: impl Into<String>) -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new(name)
    }
}

/// Builder for [`CircuitBreakerConfig`].
pub struct CircuitBreakerConfigBuilder {
    name: String,
    failure_threshold: u32,
    window: Duration,
    open_timeout: Duration,
    half_open_trials: u32,
    events: Option<Arc<EventBus>>,
}

impl CircuitBreakerConfigBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_threshold: orchestrator_core::config::breaker::FAILURE_THRESHOLD,
            window: Duration::from_millis(orchestrator_core::config::breaker::WINDOW_MS),
            open_timeout: Duration::from_millis(orchestrator_core::config::breaker::OPEN_TIMEOUT_MS),
            half_open_trials: orchestrator_core::config::breaker::HALF_OPEN_TRIALS,
            events: None,
        }
    }

    /// Default: 5.
    pub fn failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n;
        self
    }

    /// Default: 10s.
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Default: 60s.
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Default: 3.
    pub fn half_open_trials(mut self, n: u32) -> Self {
        self.half_open_trials = n;
        self
    }

    pub fn events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            name: self.name,
            failure_threshold: self.failure_threshold,
            window: self.window,
            open_timeout: self.open_timeout,
            half_open_trials: self.half_open_trials,
            events: self.events.unwrap_or_default(),
        }
    }
}
