//! Retry executor with in-flight request deduplication (C3, spec.md §4.3).
//!
//! [`RetryExecutor::execute`] wraps a single provider invocation: it gates
//! each attempt through that provider's [`CircuitBreaker`], classifies
//! failures via [`orchestrator_classifier::Classifier`], retries retryable
//! ones with jittered exponential backoff, and folds concurrent identical
//! requests (by fingerprint) onto one in-flight attempt chain.

mod backoff;
mod config;
mod dedup;
mod executor;

pub use backoff::delay_for_attempt;
pub use config::{RetryConfig, RetryConfigBuilder};
pub use executor::{AttemptFailure, RetryExecutor};
