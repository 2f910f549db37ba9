use orchestrator_core::events::EventBus;
use orchestrator_core::ports::SharedPersistence;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct QueueConfig {
    pub(crate) concurrency: usize,
    pub(crate) poll_interval: Duration,
    pub(crate) persist_interval: Duration,
    pub(crate) max_size: usize,
    pub(crate) base_retry_delay: Duration,
    pub(crate) events: Arc<EventBus>,
    pub(crate) persistence: Option<SharedPersistence>,
}

impl QueueConfig {
    pub fn builder() -> QueueConfigBuilder {
        QueueConfigBuilder::new()
    }
}

pub struct QueueConfigBuilder {
    concurrency: usize,
    poll_interval: Duration,
    persist_interval: Duration,
    max_size: usize,
    base_retry_delay: Duration,
    events: Option<Arc<EventBus>>,
    persistence: Option<SharedPersistence>,
}

impl QueueConfigBuilder {
    pub fn new() -> Self {
        use orchestrator_core::config::queue::*;
        Self {
            concurrency: CONCURRENCY,
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
            persist_interval: Duration::from_millis(PERSIST_INTERVAL_MS),
            max_size: MAX_SIZE,
            base_retry_delay: Duration::from_millis(orchestrator_core::config::retry::BASE_DELAY_MS),
            events: None,
            persistence: None,
        }
    }

    /// Default: 3.
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Default: 100ms.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Default: 5s.
    pub fn persist_interval(mut self, interval: Duration) -> Self {
        self.persist_interval = interval;
        self
    }

    /// Default: 10000.
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn base_retry_delay(mut self, delay: Duration) -> Self {
        self.base_retry_delay = delay;
        self
    }

    pub fn events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn persistence(mut self, persistence: SharedPersistence) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn build(self) -> QueueConfig {
        QueueConfig {
            concurrency: self.concurrency,
            poll_interval: self.poll_interval,
            persist_interval: self.persist_interval,
            max_size: self.max_size,
            base_retry_delay: self.base_retry_delay,
            events: self.events.unwrap_or_default(),
            persistence: self.persistence,
        }
    }
}

impl Default for QueueConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
