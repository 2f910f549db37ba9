//! The typed event stream every component emits onto (spec.md §6).
//!
//! Mirrors the teacher workspace's `EventListeners`/`ResilienceEvent`
//! pattern (panic-isolated synchronous listeners), plus a
//! [`tokio::sync::broadcast`] channel for async subscribers — the one
//! ambient-stack addition beyond the teacher's purely-synchronous listener
//! list, since a long-running service needs a `Stream`-friendly surface too.

use crate::model::{Priority, RequestId};
use crate::time::TimestampMs;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

#[cfg(feature = "metrics")]
use metrics::counter;

/// One of the named events from spec.md §6's minimum event set.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    RequestSucceeded {
        request_id: RequestId,
        provider: String,
        response_time_ms: u64,
    },
    RequestFailed {
        request_id: RequestId,
        provider: String,
        category: String,
        error: String,
    },
    Retry {
        request_id: RequestId,
        provider: String,
        attempt: u32,
        delay_ms: u64,
    },
    Fallback {
        request_id: RequestId,
        provider: String,
        error: String,
    },
    CircuitOpened {
        provider: String,
        open_until: TimestampMs,
    },
    CircuitReset {
        provider: String,
    },
    PlatformDegraded {
        provider: String,
    },
    PlatformRecovering {
        provider: String,
    },
    PlatformRecovered {
        provider: String,
    },
    RecoveryActionStarted {
        provider: String,
        action: String,
    },
    RecoveryActionCompleted {
        provider: String,
        action: String,
    },
    RecoveryActionFailed {
        provider: String,
        action: String,
        error: String,
    },
    QueueEnqueued {
        id: u64,
        priority: Priority,
    },
    QueueDeadLettered {
        id: u64,
        error: String,
    },
    CacheHit {
        fingerprint: String,
    },
    CacheStale {
        fingerprint: String,
    },
    CacheMiss {
        fingerprint: String,
    },
}

impl OrchestratorEvent {
    /// The event name used for metrics labels and log lines, matching the
    /// literal names in spec.md §6.
    pub fn name(&self) -> &'static str {
        match self {
            OrchestratorEvent::RequestSucceeded { .. } => "request_success",
            OrchestratorEvent::RequestFailed { .. } => "request_failed",
            OrchestratorEvent::Retry { .. } => "retry",
            OrchestratorEvent::Fallback { .. } => "fallback",
            OrchestratorEvent::CircuitOpened { .. } => "circuit_opened",
            OrchestratorEvent::CircuitReset { .. } => "circuit_reset",
            OrchestratorEvent::PlatformDegraded { .. } => "platform_degraded",
            OrchestratorEvent::PlatformRecovering { .. } => "platform_recovering",
            OrchestratorEvent::PlatformRecovered { .. } => "platform_recovered",
            OrchestratorEvent::RecoveryActionStarted { .. } => "recovery_action_started",
            OrchestratorEvent::RecoveryActionCompleted { .. } => "recovery_action_completed",
            OrchestratorEvent::RecoveryActionFailed { .. } => "recovery_action_failed",
            OrchestratorEvent::QueueEnqueued { .. } => "queue_enqueued",
            OrchestratorEvent::QueueDeadLettered { .. } => "queue_dead_lettered",
            OrchestratorEvent::CacheHit { .. } => "cache_hit",
            OrchestratorEvent::CacheStale { .. } => "cache_stale",
            OrchestratorEvent::CacheMiss { .. } => "cache_miss",
        }
    }
}

/// A synchronous event listener, called inline by [`EventBus::emit`].
pub type EventListener = Arc<dyn Fn(&OrchestratorEvent) + Send + Sync>;

/// Fan-out point for [`OrchestratorEvent`]s: synchronous listeners plus an
/// async broadcast channel, shared by `Arc` across every component.
pub struct EventBus {
    listeners: std::sync::Mutex<Vec<EventListener>>,
    broadcast: broadcast::Sender<OrchestratorEvent>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    /// Creates a bus whose broadcast channel has room for `capacity`
    /// un-consumed events before lagging subscribers start dropping them.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            listeners: std::sync::Mutex::new(Vec::new()),
            broadcast: tx,
        }
    }

    /// Registers a synchronous listener, called inline for every event.
    pub fn add_listener<F>(&self, f: F)
    where
        F: Fn(&OrchestratorEvent) + Send + Sync + 'static,
    {
        self.listeners.lock().unwrap().push(Arc::new(f));
    }

    /// Subscribes to the async event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.broadcast.subscribe()
    }

    /// Emits an event to every listener and into the broadcast channel.
    ///
    /// A panicking listener is caught so it cannot take down the caller or
    /// prevent other listeners from running.
    pub fn emit(&self, event: OrchestratorEvent) {
        #[cfg(feature = "tracing")]
        tracing::debug!(event = event.name(), "orchestrator event");

        #[cfg(feature = "metrics")]
        counter!("orchestrator_events_total", "event" => event.name()).increment(1);

        let listeners = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener(&event);
            }));
            if result.is_err() {
                #[cfg(feature = "tracing")]
                tracing::warn!(event = event.name(), "event listener panicked");
            }
        }

        // No receivers is the common case (no subscriber); ignore the error.
        let _ = self.broadcast.send(event);
    }
}
