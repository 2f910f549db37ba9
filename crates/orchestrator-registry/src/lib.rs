//! Provider registry and health tracking (C4, spec.md §4.4).
//!
//! Owns one [`CircuitBreaker`] per registered provider and the mutable
//! [`ProviderHealth`] the breaker's state feeds into. `orchestrator-dispatcher`
//! asks [`Registry::candidate_order`] for a dispatch plan and reports
//! outcomes back via [`Registry::record_success`]/[`Registry::record_failure`].

mod config;
mod entry;
mod health;

pub use config::{RegistryConfig, RegistryConfigBuilder};

use entry::ProviderEntry;
use orchestrator_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use orchestrator_core::events::OrchestratorEvent;
use orchestrator_core::model::{HealthLevel, ProviderHealth, ProviderSpec};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Set of providers, their health, and their circuit breakers.
pub struct Registry {
    entries: RwLock<HashMap<String, ProviderEntry>>,
    config: RegistryConfig,
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Registers a provider, creating its circuit breaker. Re-registering an
    /// existing name replaces its spec but keeps accumulated health/breaker
    /// state.
    pub fn register(&self, spec: ProviderSpec, breaker_config: CircuitBreakerConfig) {
        let mut entries = self.entries.write();
        match entries.get_mut(&spec.name) {
            Some(existing) => existing.spec = spec,
            None => {
                let breaker = CircuitBreaker::new(breaker_config);
                entries.insert(spec.name.clone(), ProviderEntry::new(spec, breaker));
            }
        }
    }

    pub fn breaker(&self, provider: &str) -> Option<CircuitBreaker> {
        self.entries.read().get(provider).map(|e| e.breaker.clone())
    }

    pub fn health_of(&self, provider: &str) -> Option<ProviderHealth> {
        self.entries.read().get(provider).map(|e| e.health.clone())
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Ordering rule from spec.md §4.4: drop disabled/Down, drop excluded,
    /// preferred-first, then priority ascending / health_score descending,
    /// with an optional weighted-random reorder of the first equal-priority
    /// tier.
    pub fn candidate_order(&self, excluded: &HashSet<String>, preferred: Option<&str>) -> Vec<String> {
        let entries = self.entries.read();

        let mut usable: Vec<&ProviderEntry> = entries
            .values()
            .filter(|e| e.is_usable())
            .filter(|e| !excluded.contains(&e.spec.name))
            .collect();

        usable.sort_by(|a, b| {
            a.spec
                .priority
                .cmp(&b.spec.priority)
                .then(b.health.health_score.partial_cmp(&a.health.health_score).unwrap())
        });

        if self.config.weighted_routing {
            reorder_top_tier_by_weight(&mut usable);
        }

        let mut ordered: Vec<String> = usable.into_iter().map(|e| e.spec.name.clone()).collect();

        if let Some(preferred) = preferred {
            if let Some(pos) = ordered.iter().position(|name| name == preferred) {
                let name = ordered.remove(pos);
                ordered.insert(0, name);
            }
        }

        ordered
    }

    /// Records a successful dispatch and recomputes `health_score`.
    pub fn record_success(&self, provider: &str, response_time_ms: u64) {
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(provider) else { return };

        entry.health.success_count += 1;
        entry.health.consecutive_successes += 1;
        entry.health.consecutive_failures = 0;
        entry.health.last_success_at = Some(orchestrator_core::time::now_ms());
        entry.health.push_response_time(response_time_ms);

        let breaker_open = entry.breaker.state() == CircuitState::Open;
        entry.health.health_score = health::compute_health_score(&entry.health, breaker_open);
        entry.health.health_level = HealthLevel::from_score(entry.health.health_score);
    }

    /// Records a failed dispatch and recomputes `health_score`.
    pub fn record_failure(&self, provider: &str) {
        let mut entries = self.entries.write();
        let Some(entry) = entries.get_mut(provider) else { return };

        entry.health.failure_count += 1;
        entry.health.consecutive_failures += 1;
        entry.health.consecutive_successes = 0;
        entry.health.last_failure_at = Some(orchestrator_core::time::now_ms());

        let breaker_open = entry.breaker.state() == CircuitState::Open;
        entry.health.health_score = health::compute_health_score(&entry.health, breaker_open);
        entry.health.health_level = HealthLevel::from_score(entry.health.health_score);
    }

    /// One pass of the background health tick: recomputes score against the
    /// breaker's live state (a breaker can transition to `Open` without a
    /// `record_failure` call crossing the threshold in between ticks) and
    /// emits degrade/recover transition events.
    pub fn tick(&self) {
        let mut entries = self.entries.write();
        for entry in entries.values_mut() {
            let breaker_open = entry.breaker.state() == CircuitState::Open;
            entry.health.health_score = health::compute_health_score(&entry.health, breaker_open);
            let new_level = HealthLevel::from_score(entry.health.health_score);
            entry.health.health_level = new_level;

            let previous = entry.last_ticked_level;
            entry.last_ticked_level = new_level;
            if previous == new_level {
                continue;
            }

            let provider = entry.spec.name.clone();
            match (previous, new_level) {
                (HealthLevel::Healthy, _) => {
                    self.config.events.emit(OrchestratorEvent::PlatformDegraded { provider });
                }
                (_, HealthLevel::Healthy) => {
                    self.config.events.emit(OrchestratorEvent::PlatformRecovered { provider });
                }
                _ if rank(new_level) > rank(previous) => {
                    self.config.events.emit(OrchestratorEvent::PlatformRecovering { provider });
                }
                _ => {
                    self.config.events.emit(OrchestratorEvent::PlatformDegraded { provider });
                }
            }
        }
    }

    /// Spawns the background health tick loop. The returned handle is
    /// aborted on drop by the orchestrator facade's lifecycle management.
    pub fn spawn_health_tick(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        let interval = registry.config.check_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.tick();
            }
        })
    }
}

/// Higher means "healthier direction" for comparing level transitions.
fn rank(level: HealthLevel) -> u8 {
    match level {
        HealthLevel::Down => 0,
        HealthLevel::Unhealthy => 1,
        HealthLevel::Degraded => 2,
        HealthLevel::Healthy => 3,
    }
}

fn reorder_top_tier_by_weight(usable: &mut [&ProviderEntry]) {
    use rand::RngExt;

    let Some(top_priority) = usable.first().map(|e| e.spec.priority) else { return };
    let tier_len = usable.iter().take_while(|e| e.spec.priority == top_priority).count();
    if tier_len <= 1 {
        return;
    }

    let tier = &mut usable[..tier_len];
    let weights: Vec<f64> = tier.iter().map(|e| e.spec.weight * e.health.health_score).collect();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return;
    }

    let mut draw = rand::rng().random_range(0.0..total);
    let mut chosen = 0;
    for (i, w) in weights.iter().enumerate() {
        if draw < *w {
            chosen = i;
            break;
        }
        draw -= w;
    }
    tier.swap(0, chosen);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        Registry::new(RegistryConfig::builder().build())
    }

    fn register(registry: &Registry, name: &str, priority: u32) {
        registry.register(
            ProviderSpec::new(name, priority),
            CircuitBreakerConfig::builder(name).build(),
        );
    }

    #[test]
    fn candidate_order_drops_disabled_and_excluded() {
        let r = registry();
        register(&r, "a", 0);
        register(&r, "b", 1);
        r.register(
            ProviderSpec::new("c", 0),
            CircuitBreakerConfig::builder("c").build(),
        );
        r.register(
            {
                let mut spec = ProviderSpec::new("c", 0);
                spec.enabled = false;
                spec
            },
            CircuitBreakerConfig::builder("c").build(),
        );

        let excluded: HashSet<String> = ["b".to_string()].into_iter().collect();
        let order = r.candidate_order(&excluded, None);
        assert_eq!(order, vec!["a".to_string()]);
    }

    #[test]
    fn candidate_order_puts_preferred_first_even_if_lower_priority() {
        let r = registry();
        register(&r, "fast", 0);
        register(&r, "preferred", 5);

        let order = r.candidate_order(&HashSet::new(), Some("preferred"));
        assert_eq!(order, vec!["preferred".to_string(), "fast".to_string()]);
    }

    #[test]
    fn candidate_order_sorts_by_priority_then_health() {
        let r = registry();
        register(&r, "a", 1);
        register(&r, "b", 1);
        register(&r, "c", 0);

        for _ in 0..10 {
            r.record_success("a", 50);
            r.record_success("b", 50);
        }
        r.record_failure("a"); // "a" now has one dent in an otherwise perfect record

        let order = r.candidate_order(&HashSet::new(), None);
        assert_eq!(order[0], "c");
        assert_eq!(order[1], "b"); // healthier than "a" at equal priority
        assert_eq!(order[2], "a");
    }

    #[test]
    fn record_success_resets_consecutive_failures() {
        let r = registry();
        register(&r, "a", 0);
        r.record_failure("a");
        r.record_failure("a");
        r.record_success("a", 100);

        let health = r.health_of("a").unwrap();
        assert_eq!(health.consecutive_failures, 0);
        assert_eq!(health.consecutive_successes, 1);
    }

    #[test]
    fn health_drops_to_down_when_all_calls_fail() {
        let r = registry();
        register(&r, "a", 0);
        for _ in 0..12 {
            r.record_failure("a");
        }
        let health = r.health_of("a").unwrap();
        assert_eq!(health.health_level, HealthLevel::Down);
    }
}
