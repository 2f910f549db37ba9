//! Degradation layer (C7, spec.md §4.7): cache-first/cache-fallback
//! semantics wrapped around the fallback dispatcher.

mod config;
mod quality;

pub use config::{DegradationConfig, DegradationConfigBuilder};
pub use quality::{age_factor, live_quality};

use orchestrator_cache::Cache;
use orchestrator_core::events::OrchestratorEvent;
use orchestrator_core::model::{ProviderResponse, Request};
use orchestrator_core::ports::ProviderAction;
use orchestrator_core::time::now_ms;
use orchestrator_core::EventBus;
use orchestrator_dispatcher::{DispatchFailure, Dispatcher};
use std::sync::Arc;

/// Where a [`DegradedResponse`] ultimately came from (spec.md §4.7's
/// `source` tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Live,
    Cache,
    CacheStale,
    Partial,
    Generic,
}

#[derive(Debug, Clone)]
pub struct DegradedResponse {
    pub value: ProviderResponse,
    pub quality: f64,
    pub source: ResponseSource,
    pub response_time_ms: u64,
}

pub struct Degradation {
    dispatcher: Arc<Dispatcher>,
    cache: Arc<Cache>,
    config: DegradationConfig,
    events: Arc<EventBus>,
}

impl Degradation {
    pub fn new(dispatcher: Arc<Dispatcher>, cache: Arc<Cache>, config: DegradationConfig, events: Arc<EventBus>) -> Self {
        Self {
            dispatcher,
            cache,
            config,
            events,
        }
    }

    pub async fn execute(
        &self,
        action: &dyn ProviderAction,
        request: &mut Request,
    ) -> Result<DegradedResponse, DispatchFailure> {
        let pre_check = self.config.cache_pre_check
            || request
                .options
                .get("cache_pre_check")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);

        if pre_check {
            if let Some(resp) = self.try_cache_pre_check(request) {
                return Ok(resp);
            }
        }

        match self.dispatcher.dispatch(action, request).await {
            Ok((response, response_time_ms)) => {
                let quality = quality::live_quality(&response, response_time_ms);
                if quality >= self.config.min_quality {
                    self.cache.set(
                        &request.fingerprint,
                        response.clone(),
                        quality,
                        request.query_text().unwrap_or_default(),
                    );
                }
                Ok(DegradedResponse {
                    value: response,
                    quality,
                    source: ResponseSource::Live,
                    response_time_ms,
                })
            }
            Err(failure) => self.fallback(request, failure),
        }
    }

    fn try_cache_pre_check(&self, request: &Request) -> Option<DegradedResponse> {
        let hit = self.cache.get(&request.fingerprint, false)?;
        if hit.stale {
            return None;
        }
        let quality = effective_quality(hit.quality, hit.created_at);
        if quality < self.config.min_quality {
            return None;
        }
        self.events.emit(OrchestratorEvent::CacheHit {
            fingerprint: request.fingerprint.clone(),
        });
        Some(DegradedResponse {
            value: hit.value,
            quality,
            source: ResponseSource::Cache,
            response_time_ms: 0,
        })
    }

    fn fallback(&self, request: &Request, failure: DispatchFailure) -> Result<DegradedResponse, DispatchFailure> {
        // (a) cache: any non-expired, or (if allow_stale) stale entry.
        if let Some(hit) = self.cache.get(&request.fingerprint, request.allow_stale) {
            let source = if hit.stale {
                self.events.emit(OrchestratorEvent::CacheStale {
                    fingerprint: request.fingerprint.clone(),
                });
                ResponseSource::CacheStale
            } else {
                self.events.emit(OrchestratorEvent::CacheHit {
                    fingerprint: request.fingerprint.clone(),
                });
                ResponseSource::Cache
            };
            let quality = effective_quality(hit.quality, hit.created_at);
            return Ok(DegradedResponse {
                value: hit.value,
                quality,
                source,
                response_time_ms: 0,
            });
        }
        self.events.emit(OrchestratorEvent::CacheMiss {
            fingerprint: request.fingerprint.clone(),
        });

        // (b) partial: highest-quality similar cached entry.
        if let Some(prompt) = request.query_text() {
            let best = self
                .cache
                .similar(prompt)
                .into_iter()
                .max_by(|a, b| a.1.quality.partial_cmp(&b.1.quality).unwrap());

            if let Some((_, hit)) = best {
                let mut value = hit.value;
                value.partial = true;
                let quality = (effective_quality(hit.quality, hit.created_at) * 0.7).clamp(0.0, 1.0);
                return Ok(DegradedResponse {
                    value,
                    quality,
                    source: ResponseSource::Partial,
                    response_time_ms: 0,
                });
            }
        }

        // (c) generic sentinel, unless the caller opted to see the raw
        // failure instead (spec.md §4.7 step 4).
        if self.config.disable_generic_fallback {
            return Err(failure);
        }

        Ok(DegradedResponse {
            value: ProviderResponse {
                content: Some("service unavailable".to_string()),
                error: true,
                partial: false,
                body: serde_json::Value::Null,
            },
            quality: 0.1,
            source: ResponseSource::Generic,
            response_time_ms: 0,
        })
    }
}

fn effective_quality(stored_quality: f64, created_at: orchestrator_core::time::TimestampMs) -> f64 {
    let age_ms = now_ms().saturating_sub(created_at);
    (stored_quality * quality::age_factor(age_ms)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_cache::CacheConfig;
    use orchestrator_circuitbreaker::CircuitBreakerConfig;
    use orchestrator_classifier::Classifier;
    use orchestrator_core::model::{ProviderSpec, Request};
    use orchestrator_core::ports::ProviderError;
    use orchestrator_registry::{Registry, RegistryConfig};
    use orchestrator_retry::RetryConfig;
    use std::time::Duration;

    fn degradation(events: Arc<EventBus>) -> (Degradation, Arc<Registry>) {
        let registry = Arc::new(Registry::new(RegistryConfig::builder().events(events.clone()).build()));
        registry.register(ProviderSpec::new("a", 0), CircuitBreakerConfig::builder("a").events(events.clone()).build());

        let retry = Arc::new(RetryExecutorFactory::make(events.clone()));
        let dispatcher = Arc::new(Dispatcher::default_with(Arc::clone(&registry), retry, events.clone()));
        let cache = Arc::new(Cache::new(CacheConfig::builder().build()));

        (
            Degradation::new(dispatcher, cache, DegradationConfig::builder().build(), events),
            registry,
        )
    }

    struct RetryExecutorFactory;
    impl RetryExecutorFactory {
        fn make(events: Arc<EventBus>) -> orchestrator_retry::RetryExecutor {
            orchestrator_retry::RetryExecutor::new(
                RetryConfig::builder().base_delay(Duration::from_millis(1)).events(events).build(),
                Arc::new(Classifier::new()),
            )
        }
    }

    struct AlwaysFails;
    #[async_trait::async_trait]
    impl ProviderAction for AlwaysFails {
        async fn call(&self, provider: &str, _r: &Request) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::new(provider, "down").with_tag("network"))
        }
    }

    struct AlwaysOk;
    #[async_trait::async_trait]
    impl ProviderAction for AlwaysOk {
        async fn call(&self, _provider: &str, _r: &Request) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse::ok("a fine, reasonably long response body"))
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn live_success_is_tagged_and_meets_quality_bar() {
        let events = Arc::new(EventBus::default());
        let (degradation, _registry) = degradation(events);

        let mut request = Request::new("hello there").with_max_retries(0);
        let result = degradation.execute(&AlwaysOk, &mut request).await.unwrap();
        assert_eq!(result.source, ResponseSource::Live);
        assert!(result.quality >= 0.3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn falls_back_to_generic_sentinel_when_nothing_cached() {
        let events = Arc::new(EventBus::default());
        let (degradation, _registry) = degradation(events);

        let mut request = Request::new("never seen before").with_max_retries(0);
        let result = degradation.execute(&AlwaysFails, &mut request).await.unwrap();
        assert_eq!(result.source, ResponseSource::Generic);
        assert_eq!(result.quality, 0.1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn falls_back_to_cache_after_a_prior_success() {
        let events = Arc::new(EventBus::default());
        let (degradation, registry) = degradation(events);

        let mut request = Request::new("remember me").with_max_retries(0).allowing_stale();
        degradation.execute(&AlwaysOk, &mut request).await.unwrap();

        registry.register(
            {
                let mut spec = ProviderSpec::new("a", 0);
                spec.enabled = false;
                spec
            },
            CircuitBreakerConfig::builder("a").build(),
        );

        let mut request2 = request.clone();
        let result = degradation.execute(&AlwaysFails, &mut request2).await.unwrap();
        assert!(matches!(result.source, ResponseSource::Cache | ResponseSource::CacheStale));
    }
}
