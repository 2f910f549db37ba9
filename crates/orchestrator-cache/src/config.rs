use std::time::Duration;

#[derive(Clone)]
pub struct CacheConfig {
    pub(crate) capacity: usize,
    pub(crate) default_ttl: Duration,
    pub(crate) stale_window: Duration,
    pub(crate) similarity_threshold: f64,
}

impl CacheConfig {
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::new()
    }
}

pub struct CacheConfigBuilder {
    capacity: usize,
    default_ttl: Duration,
    stale_window: Duration,
    similarity_threshold: f64,
}

impl CacheConfigBuilder {
    pub fn new() -> Self {
        use orchestrator_core::config::{cache, degradation};
        Self {
            capacity: cache::CAPACITY,
            default_ttl: Duration::from_millis(cache::DEFAULT_TTL_MS),
            stale_window: Duration::from_millis(cache::STALE_TTL_MS),
            similarity_threshold: degradation::SIMILARITY_THRESHOLD,
        }
    }

    /// Default: 1000 entries.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Default: 1 hour.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Default: 5 minutes.
    pub fn stale_window(mut self, window: Duration) -> Self {
        self.stale_window = window;
        self
    }

    /// Default: 0.5.
    pub fn similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn build(self) -> CacheConfig {
        CacheConfig {
            capacity: self.capacity.max(1),
            default_ttl: self.default_ttl,
            stale_window: self.stale_window,
            similarity_threshold: self.similarity_threshold,
        }
    }
}

impl Default for CacheConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
