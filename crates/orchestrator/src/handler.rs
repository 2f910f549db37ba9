//! Bridges the queue's decoupled [`QueueHandler`] callback to the
//! degradation pipeline (spec.md §9's note that "the queue's process
//! callback becomes a handler function passed at construction time").

use orchestrator_core::model::Request;
use orchestrator_core::ports::ProviderAction;
use orchestrator_degradation::Degradation;
use orchestrator_queue::{HandlerOutcome, QueueHandler};
use std::sync::Arc;

pub struct DegradationHandler {
    degradation: Arc<Degradation>,
    action: Arc<dyn ProviderAction>,
}

impl DegradationHandler {
    pub fn new(degradation: Arc<Degradation>, action: Arc<dyn ProviderAction>) -> Self {
        Self { degradation, action }
    }
}

#[async_trait::async_trait]
impl QueueHandler for DegradationHandler {
    async fn handle(&self, request: &mut Request) -> HandlerOutcome {
        match self.degradation.execute(self.action.as_ref(), request).await {
            Ok(_response) => HandlerOutcome::Success,
            // The queue's own `retry_count`/`max_retries` cap decides
            // eventual dead-lettering; degradation already exhausted live
            // dispatch, cache, and partial strategies by the time this
            // returns an error.
            Err(failure) => HandlerOutcome::RetryableFailure {
                error: failure.last_error.message,
            },
        }
    }
}
