use crate::config::CircuitBreakerConfig;
use orchestrator_core::events::OrchestratorEvent;
use orchestrator_core::time::{now_ms, TimestampMs};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

#[cfg(feature = "metrics")]
use metrics::counter;

/// The three-state gate (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Outcome of [`Circuit::try_acquire`].
#[derive(Debug, Clone, Copy)]
pub enum Admission {
    Admitted,
    /// Rejected without debiting health counters; carries the epoch-ms
    /// timestamp the circuit will next allow a probe.
    Rejected { open_until: TimestampMs },
}

/// Point-in-time view of the breaker, for `orchestrator::health()`.
#[derive(Debug, Clone, Copy)]
pub struct CircuitMetrics {
    pub state: CircuitState,
    pub failures_in_window: usize,
    pub half_open_in_flight: u32,
}

struct Inner {
    state: CircuitState,
    failure_timestamps: VecDeque<Instant>,
    open_until: Option<Instant>,
    open_until_ms: TimestampMs,
    half_open_in_flight: u32,
    last_state_change: Instant,
}

/// Per-provider circuit breaker. Cheaply cloneable (`Arc` inside); the fast
/// read path (`state()`) uses an atomic so callers who only need a coarse
/// health read don't contend on the mutex guarding the window.
pub struct Circuit {
    config: CircuitBreakerConfig,
    state_atomic: AtomicU8,
    inner: Mutex<Inner>,
}

impl Circuit {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state_atomic: AtomicU8::new(CircuitState::Closed as u8),
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_timestamps: VecDeque::new(),
                open_until: None,
                open_until_ms: 0,
                half_open_in_flight: 0,
                last_state_change: Instant::now(),
            }),
        }
    }

    /// Lock-free coarse state read.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    pub fn metrics(&self) -> CircuitMetrics {
        let inner = self.inner.lock();
        CircuitMetrics {
            state: inner.state,
            failures_in_window: inner.failure_timestamps.len(),
            half_open_in_flight: inner.half_open_in_flight,
        }
    }

    /// Attempts to admit one gated call. Rejections do not count as
    /// failures for health scoring (spec.md §4.2, §7).
    pub fn try_acquire(&self) -> Admission {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Admission::Admitted,
            CircuitState::Open => {
                let open_until = inner.open_until.expect("Open state always has open_until");
                if Instant::now() >= open_until {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.half_open_in_flight += 1;
                    Admission::Admitted
                } else {
                    Admission::Rejected {
                        open_until: inner.open_until_ms,
                    }
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_in_flight < self.config.half_open_trials {
                    inner.half_open_in_flight += 1;
                    Admission::Admitted
                } else {
                    // Attempt K+1 while still HalfOpen: back to Open with a
                    // freshly re-armed open_until (spec.md §4.2).
                    self.transition(&mut inner, CircuitState::Open);
                    Admission::Rejected {
                        open_until: inner.open_until_ms,
                    }
                }
            }
        }
    }

    /// Records the outcome of a gated attempt actually executed (never
    /// call this for a rejected admission).
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                self.transition(&mut inner, CircuitState::Closed);
            }
            CircuitState::Closed => {
                // Successes don't reset the failure window by themselves;
                // only a fresh window (time-pruned) or a state transition
                // does, matching spec.md §4.2's Closed-state rule.
            }
            CircuitState::Open => {
                // A success can't execute while Open (try_acquire rejects);
                // defensive no-op if called anyway.
            }
        }

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "provider" => self.config.name.clone(), "outcome" => "success")
            .increment(1);
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Closed => {
                let now = Instant::now();
                inner.failure_timestamps.push_back(now);
                self.prune(&mut inner, now);
                if inner.failure_timestamps.len() as u32 >= self.config.failure_threshold {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::Open => {}
        }

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "provider" => self.config.name.clone(), "outcome" => "failure")
            .increment(1);
    }

    /// Forces the breaker back to `Closed`, used by the self-healing
    /// controller after `platform_recovered` (spec.md §4.9).
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, CircuitState::Closed);
    }

    fn prune(&self, inner: &mut Inner, now: Instant) {
        while let Some(front) = inner.failure_timestamps.front() {
            if now.duration_since(*front) > self.config.window {
                inner.failure_timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        if inner.state == to {
            return;
        }
        let from = inner.state;
        inner.state = to;
        inner.last_state_change = Instant::now();
        inner.failure_timestamps.clear();
        inner.half_open_in_flight = 0;
        self.state_atomic.store(to as u8, Ordering::Release);

        if to == CircuitState::Open {
            let open_until = Instant::now() + self.config.open_timeout;
            inner.open_until = Some(open_until);
            inner.open_until_ms = now_ms() + self.config.open_timeout.as_millis() as u64;
            self.config.events.emit(OrchestratorEvent::CircuitOpened {
                provider: self.config.name.clone(),
                open_until: inner.open_until_ms,
            });
        } else if to == CircuitState::Closed {
            inner.open_until = None;
            self.config.events.emit(OrchestratorEvent::CircuitReset {
                provider: self.config.name.clone(),
            });
        }

        #[cfg(feature = "tracing")]
        tracing::info!(provider = %self.config.name, from = ?from, to = ?to, "circuit state transition");
        #[cfg(not(feature = "tracing"))]
        let _ = from;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitBreakerConfig;
    use std::time::Duration;

    fn circuit(threshold: u32, window: Duration, open_timeout: Duration, half_open: u32) -> Circuit {
        let config = CircuitBreakerConfig::builder("test")
            .failure_threshold(threshold)
            .window(window)
            .open_timeout(open_timeout)
            .half_open_trials(half_open)
            .build();
        Circuit::new(config)
    }

    #[test]
    fn opens_after_threshold_failures() {
        let c = circuit(3, Duration::from_secs(10), Duration::from_secs(60), 1);
        for _ in 0..2 {
            assert!(matches!(c.try_acquire(), Admission::Admitted));
            c.record_failure();
        }
        assert_eq!(c.state(), CircuitState::Closed);

        assert!(matches!(c.try_acquire(), Admission::Admitted));
        c.record_failure();
        assert_eq!(c.state(), CircuitState::Open);
    }

    #[test]
    fn open_rejects_without_debiting_on_reject() {
        let c = circuit(1, Duration::from_secs(10), Duration::from_secs(60), 1);
        c.try_acquire();
        c.record_failure();
        assert_eq!(c.state(), CircuitState::Open);

        match c.try_acquire() {
            Admission::Rejected { .. } => {}
            Admission::Admitted => panic!("should reject while open"),
        }
    }

    #[test]
    fn half_open_success_closes() {
        let c = circuit(1, Duration::from_secs(10), Duration::from_millis(1), 2);
        c.try_acquire();
        c.record_failure();
        assert_eq!(c.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(5));
        assert!(matches!(c.try_acquire(), Admission::Admitted));
        assert_eq!(c.state(), CircuitState::HalfOpen);
        c.record_success();
        assert_eq!(c.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let c = circuit(1, Duration::from_secs(10), Duration::from_millis(1), 2);
        c.try_acquire();
        c.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        c.try_acquire();
        assert_eq!(c.state(), CircuitState::HalfOpen);
        c.record_failure();
        assert_eq!(c.state(), CircuitState::Open);
    }

    #[test]
    fn half_open_admits_at_most_k_concurrent_trials() {
        let c = circuit(1, Duration::from_secs(10), Duration::from_millis(1), 2);
        c.try_acquire();
        c.record_failure();
        std::thread::sleep(Duration::from_millis(5));

        assert!(matches!(c.try_acquire(), Admission::Admitted)); // trial 1
        assert!(matches!(c.try_acquire(), Admission::Admitted)); // trial 2
        // Both still in-flight: a third (K+1) is rejected, not queued.
        assert!(matches!(c.try_acquire(), Admission::Rejected { .. }));
    }

    #[test]
    fn reset_forces_closed() {
        let c = circuit(1, Duration::from_secs(10), Duration::from_secs(60), 1);
        c.try_acquire();
        c.record_failure();
        assert_eq!(c.state(), CircuitState::Open);
        c.reset();
        assert_eq!(c.state(), CircuitState::Closed);
    }
}
