//! Per-provider circuit breaker (C2, spec.md §4.2).
//!
//! Three states — `Closed`, `Open`, `HalfOpen` — gate calls to a single
//! provider. `orchestrator-registry` owns one [`CircuitBreaker`] per
//! provider; `orchestrator-retry` calls [`CircuitBreaker::try_acquire`]
//! before each attempt and reports the outcome back.

mod circuit;
mod config;

pub use circuit::{Admission, CircuitMetrics, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};

use circuit::Circuit;
use std::sync::Arc;

/// Handle to one provider's circuit breaker. Cheap to clone.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Circuit>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            inner: Arc::new(Circuit::new(config)),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.state()
    }

    pub fn metrics(&self) -> CircuitMetrics {
        self.inner.metrics()
    }

    pub fn try_acquire(&self) -> Admission {
        self.inner.try_acquire()
    }

    pub fn record_success(&self) {
        self.inner.record_success();
    }

    pub fn record_failure(&self) {
        self.inner.record_failure();
    }

    pub fn reset(&self) {
        self.inner.reset();
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state(), CircuitState::Open)
    }
}
