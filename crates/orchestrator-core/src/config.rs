//! Literal configuration defaults enumerated in spec.md §6, as constants.
//!
//! Each `orchestrator-*` crate defines its own typed `XConfig` +
//! `XConfigBuilder` (mirroring `RetryConfigBuilder` /
//! `CircuitBreakerConfigBuilder` in the teacher workspace) whose `Default`
//! impls read from here, so the literal numbers exist in exactly one place.

/// Retry (C3) defaults.
pub mod retry {
    pub const BASE_DELAY_MS: u64 = 1_000;
    pub const MAX_DELAY_MS: u64 = 30_000;
    pub const MAX_RETRIES: u32 = 5;
    pub const JITTER: f64 = 0.3;
    pub const DEDUP_TTL_MS: u64 = 60_000;
}

/// Circuit breaker (C2) defaults.
pub mod breaker {
    pub const FAILURE_THRESHOLD: u32 = 5;
    pub const WINDOW_MS: u64 = 10_000;
    pub const OPEN_TIMEOUT_MS: u64 = 60_000;
    pub const HALF_OPEN_TRIALS: u32 = 3;
}

/// Provider health (C4) defaults.
pub mod health {
    pub const DEGRADED: f64 = 0.5;
    pub const HEALTHY: f64 = 0.8;
    pub const CHECK_INTERVAL_MS: u64 = 30_000;
}

/// Fallback dispatcher (C5) defaults.
pub mod dispatch {
    pub const PER_ATTEMPT_TIMEOUT_MS: u64 = 30_000;
}

/// Response cache (C6) defaults.
pub mod cache {
    pub const CAPACITY: usize = 1_000;
    pub const DEFAULT_TTL_MS: u64 = 3_600_000;
    pub const STALE_TTL_MS: u64 = 300_000;
    pub const PERSIST_ENABLED: bool = true;
}

/// Degradation layer (C7) defaults.
pub mod degradation {
    pub const MIN_QUALITY: f64 = 0.3;
    pub const SIMILARITY_THRESHOLD: f64 = 0.5;
}

/// Priority queue (C8) defaults.
pub mod queue {
    pub const CONCURRENCY: usize = 3;
    pub const POLL_INTERVAL_MS: u64 = 100;
    pub const PERSIST_INTERVAL_MS: u64 = 5_000;
    pub const MAX_SIZE: usize = 10_000;
}

/// Self-healing controller (C9) defaults.
pub mod self_heal {
    pub const ENABLED: bool = true;
    pub const AUTO_RECOVER: bool = true;
    pub const HISTORY_CAP: usize = 1_000;
    pub const DEGRADED_THRESHOLD: u32 = 3;
    pub const FAILING_THRESHOLD: u32 = 5;
    pub const CRITICAL_THRESHOLD: u32 = 10;
}

/// Persisted-state blob keys (spec.md §6).
pub mod blob_keys {
    pub const QUEUE_MAIN: &str = "queue/main.json";
    pub const QUEUE_DEAD_LETTER: &str = "queue/dead-letter.json";
    pub const CACHE: &str = "cache/cache.json";
}
