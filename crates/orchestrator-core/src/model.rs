//! The request/provider/response data model shared across every component.

use crate::time::{now_ms, TimestampMs};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique request identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

impl RequestId {
    /// Allocates the next process-unique request id.
    pub fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Request priority. Ordered so that `HIGH > NORMAL > LOW`, matching the
/// queue's dequeue order (spec.md §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl Priority {
    fn rank(self) -> u8 {
        match self {
            Priority::Low => 0,
            Priority::Normal => 1,
            Priority::High => 2,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// The unit of work submitted to the orchestrator (spec.md §3, `Request`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    /// Opaque to the core except for the fields `orchestrator-degradation`
    /// pulls out of the *response*; the payload itself is never inspected
    /// beyond computing its fingerprint.
    pub payload: serde_json::Value,
    /// Deterministic fingerprint of the normalised semantic query, used as
    /// the dedup and cache key.
    pub fingerprint: String,
    pub priority: Priority,
    pub created_at: TimestampMs,
    /// Absolute deadline in epoch milliseconds, if any.
    pub deadline: Option<TimestampMs>,
    pub max_retries: u32,
    pub preferred_provider: Option<String>,
    pub excluded_providers: HashSet<String>,
    pub allow_stale: bool,
    pub options: RequestOptions,
    /// Retry attempts consumed so far within the *current* `execute` call.
    /// Reset to zero each time the request is (re-)dispatched from the
    /// queue; distinct from `QueueItem::retry_count`, which tracks
    /// requeues across full dispatch failures.
    #[serde(default)]
    pub attempt_count: u32,
}

/// Free-form option bag, e.g. `{"cache_pre_check": true}`.
pub type RequestOptions = serde_json::Map<String, serde_json::Value>;

impl Request {
    /// Builds a request from a free-text query, computing its fingerprint
    /// via [`crate::fingerprint::fingerprint`].
    pub fn new(query: impl Into<String>) -> Self {
        let query = query.into();
        let fingerprint = crate::fingerprint::fingerprint(&query);
        Self {
            id: RequestId::next(),
            payload: serde_json::Value::String(query),
            fingerprint,
            priority: Priority::default(),
            created_at: now_ms(),
            deadline: None,
            max_retries: 5,
            preferred_provider: None,
            excluded_providers: HashSet::new(),
            allow_stale: false,
            options: RequestOptions::new(),
            attempt_count: 0,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_deadline_ms(mut self, deadline: TimestampMs) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_preferred_provider(mut self, provider: impl Into<String>) -> Self {
        self.preferred_provider = Some(provider.into());
        self
    }

    pub fn allowing_stale(mut self) -> Self {
        self.allow_stale = true;
        self
    }

    /// The original text this request was built from, when the payload is a
    /// plain string (used for similarity lookup and quality scoring).
    pub fn query_text(&self) -> Option<&str> {
        self.payload.as_str()
    }
}

/// A named destination the orchestrator can route work to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub name: String,
    /// Lower is preferred.
    pub priority: u32,
    /// Positive weight used for weighted random tie-break.
    pub weight: f64,
    pub enabled: bool,
}

impl ProviderSpec {
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            priority,
            weight: 1.0,
            enabled: true,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

/// Health classification derived from `ProviderHealth::health_score`
/// (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Unhealthy,
    Down,
}

impl HealthLevel {
    /// Thresholds from spec.md §3: Healthy >= 0.8, Degraded >= 0.5,
    /// Unhealthy > 0, Down == 0.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            HealthLevel::Healthy
        } else if score >= 0.5 {
            HealthLevel::Degraded
        } else if score > 0.0 {
            HealthLevel::Unhealthy
        } else {
            HealthLevel::Down
        }
    }
}

const RESPONSE_TIME_WINDOW: usize = 100;

/// Mutable per-provider health state owned by the provider registry (C4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub success_count: u64,
    pub failure_count: u64,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub last_success_at: Option<TimestampMs>,
    pub last_failure_at: Option<TimestampMs>,
    pub response_times_ms: VecDeque<u64>,
    pub health_score: f64,
    pub health_level: HealthLevel,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            success_count: 0,
            failure_count: 0,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_success_at: None,
            last_failure_at: None,
            response_times_ms: VecDeque::with_capacity(RESPONSE_TIME_WINDOW),
            health_score: 1.0,
            health_level: HealthLevel::Healthy,
        }
    }
}

impl ProviderHealth {
    pub fn push_response_time(&mut self, rt_ms: u64) {
        if self.response_times_ms.len() == RESPONSE_TIME_WINDOW {
            self.response_times_ms.pop_front();
        }
        self.response_times_ms.push_back(rt_ms);
    }

    pub fn mean_response_time_ms(&self) -> f64 {
        if self.response_times_ms.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.response_times_ms.iter().sum();
        sum as f64 / self.response_times_ms.len() as f64
    }

    pub fn total_calls(&self) -> u64 {
        self.success_count + self.failure_count
    }
}

/// The response a provider action yields. Opaque to the core except for
/// the fields used by cache quality scoring (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub content: Option<String>,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub partial: bool,
    #[serde(default)]
    pub body: serde_json::Value,
}

impl ProviderResponse {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            error: false,
            partial: false,
            body: serde_json::Value::Null,
        }
    }
}

/// Classifier input: a raw failure plus whatever context the caller has.
#[derive(Debug, Clone, Default)]
pub struct RawFailure {
    pub message: String,
    pub status: Option<u16>,
    pub provider: Option<String>,
    /// Caller-supplied exception/tag, e.g. `"TimeoutError"`.
    pub tag: Option<String>,
    /// Caller's own opinion on retryability, consulted only for the
    /// `Unknown` category (spec.md §4.1).
    pub retryable_hint: Option<bool>,
}

impl RawFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}
