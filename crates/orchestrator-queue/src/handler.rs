//! The queue's "process" callback (spec.md §9: "the queue's 'process'
//! callback pattern becomes a handler function passed at construction
//! time"), keeping this crate decoupled from the orchestrator facade.

use async_trait::async_trait;
use orchestrator_core::model::Request;

#[derive(Debug, Clone)]
pub enum HandlerOutcome {
    Success,
    RetryableFailure { error: String },
    TerminalFailure { error: String },
}

/// Invoked by a worker for each dequeued item. Implementations run the full
/// `execute` pipeline (degradation → dispatcher → retry) and classify the
/// result into one of [`HandlerOutcome`]'s three buckets.
#[async_trait]
pub trait QueueHandler: Send + Sync {
    async fn handle(&self, request: &mut Request) -> HandlerOutcome;
}

#[async_trait]
impl<F, Fut> QueueHandler for F
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = (Request, HandlerOutcome)> + Send,
{
    async fn handle(&self, request: &mut Request) -> HandlerOutcome {
        let (updated, outcome) = (self)(request.clone()).await;
        *request = updated;
        outcome
    }
}
