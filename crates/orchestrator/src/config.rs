//! Aggregate, serde-deserializable configuration (spec.md §6's enumerated
//! keys), assembled into the per-component builder configs at construction
//! time. Lets an embedding app load this from TOML/JSON/env without this
//! crate depending on a config-file format.

use orchestrator_cache::CacheConfig;
use orchestrator_circuitbreaker::CircuitBreakerConfig;
use orchestrator_degradation::DegradationConfig;
use orchestrator_queue::QueueConfig;
use orchestrator_registry::RegistryConfig;
use orchestrator_retry::RetryConfig;
use orchestrator_core::events::EventBus;
use orchestrator_core::ports::SharedPersistence;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_retries: u32,
    pub jitter: f64,
    pub dedup_ttl_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        use orchestrator_core::config::retry::*;
        Self {
            base_delay_ms: BASE_DELAY_MS,
            max_delay_ms: MAX_DELAY_MS,
            max_retries: MAX_RETRIES,
            jitter: JITTER,
            dedup_ttl_ms: DEDUP_TTL_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub window_ms: u64,
    pub open_timeout_ms: u64,
    pub half_open_trials: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        use orchestrator_core::config::breaker::*;
        Self {
            failure_threshold: FAILURE_THRESHOLD,
            window_ms: WINDOW_MS,
            open_timeout_ms: OPEN_TIMEOUT_MS,
            half_open_trials: HALF_OPEN_TRIALS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    pub check_interval_ms: u64,
    pub weighted_routing: bool,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            check_interval_ms: orchestrator_core::config::health::CHECK_INTERVAL_MS,
            weighted_routing: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub capacity: usize,
    pub default_ttl_ms: u64,
    pub stale_ttl_ms: u64,
    pub similarity_threshold: f64,
    pub persist_enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        use orchestrator_core::config::{cache, degradation};
        Self {
            capacity: cache::CAPACITY,
            default_ttl_ms: cache::DEFAULT_TTL_MS,
            stale_ttl_ms: cache::STALE_TTL_MS,
            similarity_threshold: degradation::SIMILARITY_THRESHOLD,
            persist_enabled: cache::PERSIST_ENABLED,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DegradationSettings {
    pub min_quality: f64,
    pub cache_pre_check: bool,
    pub disable_generic_fallback: bool,
}

impl Default for DegradationSettings {
    fn default() -> Self {
        Self {
            min_quality: orchestrator_core::config::degradation::MIN_QUALITY,
            cache_pre_check: false,
            disable_generic_fallback: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub concurrency: usize,
    pub poll_interval_ms: u64,
    pub persist_interval_ms: u64,
    pub max_size: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        use orchestrator_core::config::queue::*;
        Self {
            concurrency: CONCURRENCY,
            poll_interval_ms: POLL_INTERVAL_MS,
            persist_interval_ms: PERSIST_INTERVAL_MS,
            max_size: MAX_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfHealSettings {
    pub enabled: bool,
    pub auto_recover: bool,
    pub history_cap: usize,
}

impl Default for SelfHealSettings {
    fn default() -> Self {
        use orchestrator_core::config::self_heal::*;
        Self {
            enabled: ENABLED,
            auto_recover: AUTO_RECOVER,
            history_cap: HISTORY_CAP,
        }
    }
}

/// Loadable aggregate of every component's tunables (spec.md §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub retry: RetrySettings,
    pub breaker: BreakerSettings,
    pub health: HealthSettings,
    pub cache: CacheSettings,
    pub degradation: DegradationSettings,
    pub queue: QueueSettings,
    pub self_heal: SelfHealSettings,
}

impl OrchestratorConfig {
    pub(crate) fn retry_config(&self, events: Arc<EventBus>) -> RetryConfig {
        RetryConfig::builder()
            .base_delay(Duration::from_millis(self.retry.base_delay_ms))
            .max_delay(Duration::from_millis(self.retry.max_delay_ms))
            .max_retries(self.retry.max_retries)
            .jitter(self.retry.jitter)
            .dedup_ttl(Duration::from_millis(self.retry.dedup_ttl_ms))
            .events(events)
            .build()
    }

    pub(crate) fn breaker_config(&self, name: &str, events: Arc<EventBus>) -> CircuitBreakerConfig {
        CircuitBreakerConfig::builder(name)
            .failure_threshold(self.breaker.failure_threshold)
            .window(Duration::from_millis(self.breaker.window_ms))
            .open_timeout(Duration::from_millis(self.breaker.open_timeout_ms))
            .half_open_trials(self.breaker.half_open_trials)
            .events(events)
            .build()
    }

    pub(crate) fn registry_config(&self, events: Arc<EventBus>) -> RegistryConfig {
        RegistryConfig::builder()
            .check_interval(Duration::from_millis(self.health.check_interval_ms))
            .weighted_routing(self.health.weighted_routing)
            .events(events)
            .build()
    }

    pub(crate) fn cache_config(&self) -> CacheConfig {
        CacheConfig::builder()
            .capacity(self.cache.capacity)
            .default_ttl(Duration::from_millis(self.cache.default_ttl_ms))
            .stale_window(Duration::from_millis(self.cache.stale_ttl_ms))
            .similarity_threshold(self.cache.similarity_threshold)
            .build()
    }

    pub(crate) fn degradation_config(&self) -> DegradationConfig {
        DegradationConfig::builder()
            .min_quality(self.degradation.min_quality)
            .cache_pre_check(self.degradation.cache_pre_check)
            .disable_generic_fallback(self.degradation.disable_generic_fallback)
            .build()
    }

    pub(crate) fn queue_config(&self, events: Arc<EventBus>, persistence: Option<SharedPersistence>) -> QueueConfig {
        let mut builder = QueueConfig::builder()
            .concurrency(self.queue.concurrency)
            .poll_interval(Duration::from_millis(self.queue.poll_interval_ms))
            .persist_interval(Duration::from_millis(self.queue.persist_interval_ms))
            .max_size(self.queue.max_size)
            .events(events);
        if let Some(persistence) = persistence {
            builder = builder.persistence(persistence);
        }
        builder.build()
    }

    pub(crate) fn self_heal_config(&self, events: Arc<EventBus>) -> orchestrator_selfheal::SelfHealConfig {
        orchestrator_selfheal::SelfHealConfig::builder()
            .enabled(self.self_heal.enabled)
            .auto_recover(self.self_heal.auto_recover)
            .history_cap(self.self_heal.history_cap)
            .events(events)
            .build()
    }
}
