use orchestrator_circuitbreaker::CircuitBreaker;
use orchestrator_core::model::{HealthLevel, ProviderHealth, ProviderSpec};

/// One provider's full registry state: its static spec, mutable health, the
/// circuit breaker C4 owns 1:1 for it, and the health level last observed
/// by the background tick (used to detect degrade/recover transitions).
pub(crate) struct ProviderEntry {
    pub(crate) spec: ProviderSpec,
    pub(crate) health: ProviderHealth,
    pub(crate) breaker: CircuitBreaker,
    pub(crate) last_ticked_level: HealthLevel,
}

impl ProviderEntry {
    pub(crate) fn new(spec: ProviderSpec, breaker: CircuitBreaker) -> Self {
        Self {
            spec,
            health: ProviderHealth::default(),
            breaker,
            last_ticked_level: HealthLevel::Healthy,
        }
    }

    /// Usable as a dispatch candidate: enabled and not `Down`.
    pub(crate) fn is_usable(&self) -> bool {
        self.spec.enabled && self.health.health_level != HealthLevel::Down
    }
}
