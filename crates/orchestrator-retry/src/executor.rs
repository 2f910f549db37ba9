//! Retry loop: classify, back off, and gate every attempt through a
//! per-provider circuit breaker (spec.md §4.3, C3).

use crate::backoff::delay_for_attempt;
use crate::config::RetryConfig;
use crate::dedup::{DedupTable, Lease};
use orchestrator_circuitbreaker::{Admission, CircuitBreaker};
use orchestrator_classifier::Classifier;
use orchestrator_core::events::OrchestratorEvent;
use orchestrator_core::model::{ProviderResponse, Request};
use orchestrator_core::ports::{ProviderAction, ProviderError};
use orchestrator_core::time::now_ms;
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "metrics")]
use metrics::counter;

/// Terminal outcome of a dispatch through one provider, after retries are
/// exhausted or short-circuited.
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    pub error: ProviderError,
    pub retryable: bool,
    /// `true` when the circuit was open and no action was ever invoked.
    pub circuit_rejected: bool,
}

type AttemptOutcome = Result<(ProviderResponse, u64), ProviderError>;

/// Shared retry engine. One instance serves every provider; the caller
/// supplies the provider-specific [`CircuitBreaker`] per call.
pub struct RetryExecutor {
    config: RetryConfig,
    classifier: Arc<Classifier>,
    dedup: DedupTable,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig, classifier: Arc<Classifier>) -> Self {
        let dedup = DedupTable::new(config.dedup_ttl);
        Self {
            config,
            classifier,
            dedup,
        }
    }

    /// Runs `action` against `provider`, retrying on classified-retryable
    /// failures up to `request.max_retries`, gated by `breaker`. Concurrent
    /// calls sharing both `request.fingerprint` and `provider` dedupe onto a
    /// single attempt chain (spec.md §4.3's "in-flight de-duplication");
    /// distinct providers in the same fallback walk never share a lease, so
    /// a fingerprint-preserving fallback from provider A to B still
    /// actually calls B.
    pub async fn execute(
        &self,
        provider: &str,
        breaker: &CircuitBreaker,
        action: &dyn ProviderAction,
        request: &mut Request,
    ) -> Result<(ProviderResponse, u64), AttemptFailure> {
        match self.dedup.join_or_lead(&request.fingerprint, provider) {
            Lease::Cached(outcome) => return self.finish(provider, outcome),
            Lease::Follower(mut rx) => {
                let outcome = rx
                    .recv()
                    .await
                    .unwrap_or_else(|_| Err(ProviderError::new(provider, "dedup leader dropped")));
                return self.finish(provider, outcome);
            }
            Lease::Leader => {}
        }

        let outcome = self.run_attempts(provider, breaker, action, request).await;
        self.dedup.complete(&request.fingerprint, provider, outcome.clone());
        self.finish(provider, outcome)
    }

    fn finish(
        &self,
        _provider: &str,
        outcome: AttemptOutcome,
    ) -> Result<(ProviderResponse, u64), AttemptFailure> {
        outcome.map_err(|error| {
            let circuit_rejected = error.tag.as_deref() == Some("circuit_open");
            let retryable = !circuit_rejected && self.classifier.classify(&error.as_raw_failure()).retryable;
            AttemptFailure {
                error,
                retryable,
                circuit_rejected,
            }
        })
    }

    async fn run_attempts(
        &self,
        provider: &str,
        breaker: &CircuitBreaker,
        action: &dyn ProviderAction,
        request: &mut Request,
    ) -> AttemptOutcome {
        // `Request::max_retries` always wins over the executor's default
        // (spec.md §4.3: per-request overrides apply).
        let cap = request.max_retries;

        loop {
            match breaker.try_acquire() {
                Admission::Rejected { .. } => {
                    return Err(ProviderError::new(provider, "circuit open").with_tag("circuit_open"));
                }
                Admission::Admitted => {}
            }

            let started = Instant::now();
            let result = action.call(provider, request).await;
            let response_time_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(response) if !response.error => {
                    breaker.record_success();
                    #[cfg(feature = "metrics")]
                    counter!("retry_attempts_total", "outcome" => "success").increment(1);
                    self.config.events.emit(OrchestratorEvent::RequestSucceeded {
                        request_id: request.id,
                        provider: provider.to_string(),
                        response_time_ms,
                    });
                    return Ok((response, response_time_ms));
                }
                Ok(response) => {
                    // `ProviderResponse.error == true`: the action itself
                    // reports failure without raising `ProviderError`.
                    breaker.record_failure();
                    let failure = ProviderError::new(provider, "provider reported error")
                        .with_tag("provider_error");
                    if !self
                        .maybe_retry(provider, request, &failure, cap, started)
                        .await
                    {
                        let _ = response;
                        return Err(failure);
                    }
                }
                Err(error) => {
                    breaker.record_failure();
                    if !self
                        .maybe_retry(provider, request, &error, cap, started)
                        .await
                    {
                        return Err(error);
                    }
                }
            }
        }
    }

    /// Classifies `error`, decides whether to retry, and if so sleeps the
    /// backoff delay and bumps `request.attempt_count`. Returns `false` when
    /// the caller should give up.
    async fn maybe_retry(
        &self,
        provider: &str,
        request: &mut Request,
        error: &ProviderError,
        max_retries: u32,
        attempt_started: Instant,
    ) -> bool {
        let classification = self.classifier.classify(&error.as_raw_failure());

        self.config.events.emit(OrchestratorEvent::RequestFailed {
            request_id: request.id,
            provider: provider.to_string(),
            category: classification.category.as_str().to_string(),
            error: error.message.clone(),
        });

        if !classification.retryable || request.attempt_count >= max_retries {
            #[cfg(feature = "metrics")]
            counter!("retry_attempts_total", "outcome" => "exhausted").increment(1);
            let _ = attempt_started;
            return false;
        }

        let delay = delay_for_attempt(
            request.attempt_count,
            self.config.base_delay,
            self.config.max_delay,
            self.config.jitter,
        );

        self.config.events.emit(OrchestratorEvent::Retry {
            request_id: request.id,
            provider: provider.to_string(),
            attempt: request.attempt_count + 1,
            delay_ms: delay.as_millis() as u64,
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(
            provider,
            attempt = request.attempt_count + 1,
            delay_ms = delay.as_millis() as u64,
            category = classification.category.as_str(),
            "retrying"
        );

        tokio::time::sleep(delay).await;
        request.attempt_count += 1;
        let _ = now_ms();
        true
    }
}
