use orchestrator_core::events::EventBus;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct RegistryConfig {
    pub(crate) check_interval: Duration,
    pub(crate) weighted_routing: bool,
    pub(crate) events: Arc<EventBus>,
}

impl RegistryConfig {
    pub fn builder() -> RegistryConfigBuilder {
        RegistryConfigBuilder::new()
    }
}

pub struct RegistryConfigBuilder {
    check_interval: Duration,
    weighted_routing: bool,
    events: Option<Arc<EventBus>>,
}

impl RegistryConfigBuilder {
    pub fn new() -> Self {
        Self {
            check_interval: Duration::from_millis(orchestrator_core::config::health::CHECK_INTERVAL_MS),
            weighted_routing: false,
            events: None,
        }
    }

    /// Default: 30s.
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Default: disabled — equal-priority ties break by `health_score`
    /// alone (spec.md §4.4 step 4). Enabling step 5 reorders the top tier
    /// by a weighted random draw.
    pub fn weighted_routing(mut self, enabled: bool) -> Self {
        self.weighted_routing = enabled;
        self
    }

    pub fn events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> RegistryConfig {
        RegistryConfig {
            check_interval: self.check_interval,
            weighted_routing: self.weighted_routing,
            events: self.events.unwrap_or_default(),
        }
    }
}

impl Default for RegistryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
