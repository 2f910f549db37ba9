//! The unified, user-visible error type (spec.md §7).
//!
//! Built the way the teacher's `ResilienceError<E>` unifies layer errors:
//! one variant per user-visible failure class, plus an `Provider` escape
//! hatch for whatever the provider action returned. Everything that is
//! *not* user-visible per spec.md §7 (internal invariant violations,
//! corrupt persisted blobs) is logged and isolated at the source instead of
//! being represented here.

use thiserror::Error;

/// Failures the orchestrator facade can return from `execute`/`enqueue`.
///
/// Per spec.md §7, user-visible failures are limited to: all
/// providers-and-cache exhausted, queue full, deadline exceeded, and caller
/// cancellation. Everything else is internal and observable only via
/// events/metrics.
#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    /// Every provider and every degradation strategy (cache, partial,
    /// generic) failed to produce a response.
    #[error("all providers and cache strategies exhausted: {last_error}")]
    AllExhausted { last_error: String },

    /// The persistent queue is at `queue.max_size` capacity.
    #[error("queue is full (max_size={max_size})")]
    QueueFull { max_size: usize },

    /// The request's deadline elapsed before a response was produced.
    #[error("deadline exceeded after {elapsed_ms}ms")]
    DeadlineExceeded { elapsed_ms: u64 },

    /// The caller cancelled the request before it completed.
    #[error("request cancelled")]
    Cancelled,

    /// A provider action failed and fallback/degradation was disabled or
    /// inapplicable; carries the provider name and its raw message.
    #[error("provider {provider} failed: {message}")]
    Provider { provider: String, message: String },
}

impl OrchestratorError {
    pub fn is_all_exhausted(&self) -> bool {
        matches!(self, OrchestratorError::AllExhausted { .. })
    }

    pub fn is_queue_full(&self) -> bool {
        matches!(self, OrchestratorError::QueueFull { .. })
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, OrchestratorError::DeadlineExceeded { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, OrchestratorError::Cancelled)
    }
}
