use orchestrator_core::events::EventBus;
use std::sync::Arc;

#[derive(Clone)]
pub struct SelfHealConfig {
    pub(crate) enabled: bool,
    pub(crate) auto_recover: bool,
    pub(crate) history_cap: usize,
    pub(crate) degraded_threshold: u32,
    pub(crate) failing_threshold: u32,
    pub(crate) critical_threshold: u32,
    /// Consecutive post-recovery successes required to declare a provider
    /// recovered and reset its circuit breaker (spec.md §4.9: "three
    /// consecutive per-provider successes").
    pub(crate) recovery_success_streak: u32,
    pub(crate) events: Arc<EventBus>,
}

impl SelfHealConfig {
    pub fn builder() -> SelfHealConfigBuilder {
        SelfHealConfigBuilder::new()
    }
}

pub struct SelfHealConfigBuilder {
    enabled: bool,
    auto_recover: bool,
    history_cap: usize,
    degraded_threshold: u32,
    failing_threshold: u32,
    critical_threshold: u32,
    recovery_success_streak: u32,
    events: Option<Arc<EventBus>>,
}

impl SelfHealConfigBuilder {
    pub fn new() -> Self {
        use orchestrator_core::config::self_heal::*;
        Self {
            enabled: ENABLED,
            auto_recover: AUTO_RECOVER,
            history_cap: HISTORY_CAP,
            degraded_threshold: DEGRADED_THRESHOLD,
            failing_threshold: FAILING_THRESHOLD,
            critical_threshold: CRITICAL_THRESHOLD,
            recovery_success_streak: 3,
            events: None,
        }
    }

    /// Default: true.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Default: true. When false, failures still update the tracker and
    /// the audit log is still written on feedback, but no recovery action
    /// is actually dispatched to the collaborators.
    pub fn auto_recover(mut self, auto_recover: bool) -> Self {
        self.auto_recover = auto_recover;
        self
    }

    /// Default: 1000.
    pub fn history_cap(mut self, cap: usize) -> Self {
        self.history_cap = cap;
        self
    }

    pub fn degraded_threshold(mut self, n: u32) -> Self {
        self.degraded_threshold = n;
        self
    }

    pub fn failing_threshold(mut self, n: u32) -> Self {
        self.failing_threshold = n;
        self
    }

    pub fn critical_threshold(mut self, n: u32) -> Self {
        self.critical_threshold = n;
        self
    }

    pub fn recovery_success_streak(mut self, n: u32) -> Self {
        self.recovery_success_streak = n;
        self
    }

    pub fn events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> SelfHealConfig {
        SelfHealConfig {
            enabled: self.enabled,
            auto_recover: self.auto_recover,
            history_cap: self.history_cap,
            degraded_threshold: self.degraded_threshold,
            failing_threshold: self.failing_threshold,
            critical_threshold: self.critical_threshold,
            recovery_success_streak: self.recovery_success_streak,
            events: self.events.unwrap_or_default(),
        }
    }
}

impl Default for SelfHealConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
