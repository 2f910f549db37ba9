#[derive(Clone)]
pub struct DegradationConfig {
    pub(crate) min_quality: f64,
    pub(crate) cache_pre_check: bool,
    pub(crate) disable_generic_fallback: bool,
}

impl DegradationConfig {
    pub fn builder() -> DegradationConfigBuilder {
        DegradationConfigBuilder::new()
    }
}

pub struct DegradationConfigBuilder {
    min_quality: f64,
    cache_pre_check: bool,
    disable_generic_fallback: bool,
}

impl DegradationConfigBuilder {
    pub fn new() -> Self {
        Self {
            min_quality: orchestrator_core::config::degradation::MIN_QUALITY,
            cache_pre_check: false,
            disable_generic_fallback: false,
        }
    }

    /// Default: 0.3.
    pub fn min_quality(mut self, min_quality: f64) -> Self {
        self.min_quality = min_quality;
        self
    }

    /// Default: false — pre-check is post-failure only unless the caller
    /// opts in (spec.md §4.7 step 1).
    pub fn cache_pre_check(mut self, enabled: bool) -> Self {
        self.cache_pre_check = enabled;
        self
    }

    /// When set, exhausting the cache/partial fallbacks propagates the live
    /// failure instead of returning the generic sentinel (spec.md §4.7 step
    /// 4's "if every strategy yields nothing" branch; the generic strategy
    /// normally always yields something, so this is how a caller opts into
    /// that branch actually being reachable).
    pub fn disable_generic_fallback(mut self, disabled: bool) -> Self {
        self.disable_generic_fallback = disabled;
        self
    }

    pub fn build(self) -> DegradationConfig {
        DegradationConfig {
            min_quality: self.min_quality,
            cache_pre_check: self.cache_pre_check,
            disable_generic_fallback: self.disable_generic_fallback,
        }
    }
}

impl Default for DegradationConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
