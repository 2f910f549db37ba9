//! Fallback dispatcher (C5, spec.md §4.5).
//!
//! [`Dispatcher::dispatch`] builds a candidate list from the provider
//! registry, runs each candidate through the retry executor, and advances
//! to the next candidate on failure. Every attempt is wrapped in a
//! per-attempt timeout derived from the request's deadline.

use orchestrator_core::events::OrchestratorEvent;
use orchestrator_core::model::{ProviderResponse, Request};
use orchestrator_core::ports::{ProviderAction, ProviderError};
use orchestrator_core::time::now_ms;
use orchestrator_core::EventBus;
use orchestrator_registry::Registry;
use orchestrator_retry::RetryExecutor;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "metrics")]
use metrics::counter;

/// All candidates were tried and none succeeded (spec.md §4.5 /
/// user-visible failure (a)).
#[derive(Debug, Clone)]
pub struct DispatchFailure {
    pub last_error: ProviderError,
    pub all_providers_exhausted: bool,
}

/// Wraps a [`ProviderAction`] so every call is bounded by `timeout`. A
/// timed-out call is reported as a Timeout failure to the retry executor's
/// classifier, exactly as if the provider itself had timed out.
struct TimeBoundedAction<'a> {
    inner: &'a dyn ProviderAction,
    timeout: Duration,
}

#[async_trait::async_trait]
impl<'a> ProviderAction for TimeBoundedAction<'a> {
    async fn call(&self, provider: &str, request: &Request) -> Result<ProviderResponse, ProviderError> {
        match tokio::time::timeout(self.timeout, self.inner.call(provider, request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::new(provider, "per-attempt timeout exceeded").with_tag("timeout")),
        }
    }
}

pub struct Dispatcher {
    registry: Arc<Registry>,
    retry: Arc<RetryExecutor>,
    events: Arc<EventBus>,
    default_per_attempt_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<Registry>,
        retry: Arc<RetryExecutor>,
        events: Arc<EventBus>,
        default_per_attempt_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            retry,
            events,
            default_per_attempt_timeout,
        }
    }

    pub fn default_with(registry: Arc<Registry>, retry: Arc<RetryExecutor>, events: Arc<EventBus>) -> Self {
        Self::new(
            registry,
            retry,
            events,
            Duration::from_millis(orchestrator_core::config::dispatch::PER_ATTEMPT_TIMEOUT_MS),
        )
    }

    pub async fn dispatch(
        &self,
        action: &dyn ProviderAction,
        request: &mut Request,
    ) -> Result<(ProviderResponse, u64), DispatchFailure> {
        let candidates = self
            .registry
            .candidate_order(&request.excluded_providers, request.preferred_provider.as_deref());

        let mut last_error: Option<ProviderError> = None;

        for (i, provider) in candidates.iter().enumerate() {
            if let Some(deadline) = request.deadline {
                if now_ms() >= deadline {
                    break;
                }
            }

            let Some(breaker) = self.registry.breaker(provider) else {
                continue;
            };

            let per_attempt_timeout = self.per_attempt_timeout(request);
            let bounded_action = TimeBoundedAction {
                inner: action,
                timeout: per_attempt_timeout,
            };

            request.attempt_count = 0;
            match self
                .retry
                .execute(provider, &breaker, &bounded_action, request)
                .await
            {
                Ok((response, response_time_ms)) => {
                    self.registry.record_success(provider, response_time_ms);
                    #[cfg(feature = "metrics")]
                    counter!("dispatch_total", "outcome" => "success").increment(1);
                    return Ok((response, response_time_ms));
                }
                Err(failure) => {
                    self.registry.record_failure(provider);
                    let is_last = i + 1 == candidates.len();
                    if !is_last {
                        self.events.emit(OrchestratorEvent::Fallback {
                            request_id: request.id,
                            provider: provider.clone(),
                            error: failure.error.message.clone(),
                        });
                    }
                    last_error = Some(failure.error);
                }
            }
        }

        #[cfg(feature = "metrics")]
        counter!("dispatch_total", "outcome" => "exhausted").increment(1);

        Err(DispatchFailure {
            last_error: last_error
                .unwrap_or_else(|| ProviderError::new("none", "no usable providers")),
            all_providers_exhausted: true,
        })
    }

    fn per_attempt_timeout(&self, request: &Request) -> Duration {
        match request.deadline {
            Some(deadline) => {
                let remaining_ms = deadline.saturating_sub(now_ms());
                Duration::from_millis(remaining_ms).min(self.default_per_attempt_timeout)
            }
            None => self.default_per_attempt_timeout,
        }
    }
}
