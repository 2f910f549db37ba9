//! Persistent priority queue with a worker pool (C8, spec.md §4.8).
//!
//! The queue itself never dispatches a request; it hands ready items to a
//! [`QueueHandler`] supplied at construction time, keeping this crate
//! decoupled from the degradation/dispatch layers above it (spec.md §9).

mod config;
mod handler;
mod item;

pub use config::{QueueConfig, QueueConfigBuilder};
pub use handler::{HandlerOutcome, QueueHandler};
pub use item::{QueueItem, QueueItemState};

use orchestrator_core::config::blob_keys;
use orchestrator_core::events::OrchestratorEvent;
use orchestrator_core::model::Request;
use orchestrator_core::time::{now_ms, TimestampMs};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

struct QueueState {
    items: std::collections::HashMap<u64, QueueItem>,
    pending_ids: Vec<u64>,
    dead_letter: Vec<QueueItem>,
    next_id: u64,
}

impl QueueState {
    fn new() -> Self {
        Self {
            items: std::collections::HashMap::new(),
            pending_ids: Vec::new(),
            dead_letter: Vec::new(),
            next_id: 1,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct MainSnapshot {
    items: Vec<QueueItem>,
    next_id: u64,
}

pub struct Queue {
    state: RwLock<QueueState>,
    config: QueueConfig,
    handler: Arc<dyn QueueHandler>,
    workers_spawned: AtomicBool,
}

impl Queue {
    pub fn new(config: QueueConfig, handler: Arc<dyn QueueHandler>) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(QueueState::new()),
            config,
            handler,
            workers_spawned: AtomicBool::new(false),
        })
    }

    /// Adds a request to the queue, assigning it a monotonically
    /// increasing id. Rejects the item once `max_size` pending+processing
    /// items are already held (spec.md §4.8 edge case: "queue full").
    pub fn enqueue(&self, request: Request) -> Result<u64, orchestrator_core::OrchestratorError> {
        let mut state = self.state.write();
        if state.items.len() >= self.config.max_size {
            return Err(orchestrator_core::OrchestratorError::QueueFull {
                max_size: self.config.max_size,
            });
        }

        let id = state.next_id;
        state.next_id += 1;
        let priority = request.priority;
        let item = QueueItem::new(id, request, now_ms());
        state.items.insert(id, item);
        state.pending_ids.push(id);
        drop(state);

        self.config.events.emit(OrchestratorEvent::QueueEnqueued { id, priority });

        // High-priority items are flushed immediately rather than waiting
        // for the periodic persist timer, so a crash right after an urgent
        // enqueue does not lose it.
        if priority == orchestrator_core::model::Priority::High {
            if let Some(backend) = self.config.persistence.clone() {
                let snapshot = self.snapshot_main();
                tokio::spawn(async move {
                    if let Ok(bytes) = serde_json::to_vec(&snapshot) {
                        let _ = backend.write(blob_keys::QUEUE_MAIN, bytes).await;
                    }
                });
            }
        }

        Ok(id)
    }

    /// Picks the next ready item (highest priority, then oldest), marking
    /// it `Processing`.
    fn dequeue_ready(&self) -> Option<QueueItem> {
        let mut state = self.state.write();
        let now = now_ms();

        let best_id = state
            .pending_ids
            .iter()
            .filter(|id| state.items.get(id).map_or(false, |item| item.is_ready(now)))
            .copied()
            .max_by(|a, b| {
                let ia = &state.items[a];
                let ib = &state.items[b];
                ia.request
                    .priority
                    .cmp(&ib.request.priority)
                    .then(ib.created_at.cmp(&ia.created_at))
            })?;

        state.pending_ids.retain(|id| *id != best_id);
        let item = state.items.get_mut(&best_id).unwrap();
        item.state = QueueItemState::Processing;
        item.updated_at = now;
        Some(item.clone())
    }

    fn complete_success(&self, id: u64) {
        let mut state = self.state.write();
        state.items.remove(&id);
    }

    fn complete_retry(&self, id: u64, error: String) {
        let mut state = self.state.write();
        let max_retries = state.items.get(&id).map(|i| i.request.max_retries).unwrap_or(0);

        let dead_lettered = {
            let item = match state.items.get_mut(&id) {
                Some(item) => item,
                None => return,
            };
            item.retry_count += 1;
            item.last_error = Some(error.clone());
            item.updated_at = now_ms();

            if item.retry_count > max_retries {
                item.state = QueueItemState::DeadLetter;
                true
            } else {
                let delay = self.config.base_retry_delay.as_millis() as u64 * 2u64.saturating_pow(item.retry_count);
                item.scheduled_for = Some(now_ms() + delay);
                item.state = QueueItemState::Pending;
                false
            }
        };

        if dead_lettered {
            let item = state.items.remove(&id).unwrap();
            state.dead_letter.push(item);
            drop(state);
            self.config
                .events
                .emit(OrchestratorEvent::QueueDeadLettered { id, error });
        } else {
            state.pending_ids.push(id);
        }
    }

    /// Spawns `concurrency` worker tasks polling for ready items every
    /// `poll_interval`.
    pub fn spawn_workers(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        if self.workers_spawned.swap(true, Ordering::SeqCst) {
            return Vec::new();
        }

        (0..self.config.concurrency)
            .map(|_| {
                let queue = Arc::clone(self);
                tokio::spawn(async move { queue.worker_loop().await })
            })
            .collect()
    }

    async fn worker_loop(self: Arc<Self>) {
        loop {
            match self.dequeue_ready() {
                Some(mut item) => {
                    let outcome = self.handler.handle(&mut item.request).await;
                    match outcome {
                        HandlerOutcome::Success => self.complete_success(item.id),
                        HandlerOutcome::RetryableFailure { error } => self.complete_retry(item.id, error),
                        HandlerOutcome::TerminalFailure { error } => {
                            let mut state = self.state.write();
                            if let Some(mut dead) = state.items.remove(&item.id) {
                                dead.state = QueueItemState::Failed;
                                dead.last_error = Some(error.clone());
                                state.dead_letter.push(dead);
                            }
                            drop(state);
                            self.config
                                .events
                                .emit(OrchestratorEvent::QueueDeadLettered { id: item.id, error });
                        }
                    }
                }
                None => tokio::time::sleep(self.config.poll_interval).await,
            }
        }
    }

    /// Spawns the periodic persistence flush; a no-op task if no backend
    /// was configured.
    pub fn spawn_persist_timer(self: &Arc<Self>) -> JoinHandle<()> {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(queue.config.persist_interval).await;
                queue.persist_main().await;
                queue.persist_dead_letter().await;
            }
        })
    }

    fn snapshot_main(&self) -> MainSnapshot {
        let state = self.state.read();
        MainSnapshot {
            items: state.items.values().cloned().collect(),
            next_id: state.next_id,
        }
    }

    pub async fn persist_main(&self) {
        let Some(backend) = self.config.persistence.clone() else { return };
        let snapshot = self.snapshot_main();
        if let Ok(bytes) = serde_json::to_vec(&snapshot) {
            let _ = backend.write(blob_keys::QUEUE_MAIN, bytes).await;
        }
    }

    pub async fn persist_dead_letter(&self) {
        let Some(backend) = self.config.persistence.clone() else { return };
        let dead_letter: Vec<QueueItem> = self.state.read().dead_letter.clone();
        if let Ok(bytes) = serde_json::to_vec(&dead_letter) {
            let _ = backend.write(blob_keys::QUEUE_DEAD_LETTER, bytes).await;
        }
    }

    /// Restores a persisted snapshot, resetting any item left `Processing`
    /// (a worker that never finished before the crash) back to `Pending`
    /// (spec.md §4.8: crash recovery).
    pub async fn restore(&self) {
        let Some(backend) = self.config.persistence.clone() else { return };

        if let Ok(Some(bytes)) = backend.read(blob_keys::QUEUE_MAIN).await {
            if let Ok(snapshot) = serde_json::from_slice::<MainSnapshot>(&bytes) {
                let mut state = self.state.write();
                state.next_id = snapshot.next_id;
                for mut item in snapshot.items {
                    if item.state == QueueItemState::Processing {
                        item.state = QueueItemState::Pending;
                        item.scheduled_for = None;
                    }
                    if item.state == QueueItemState::Pending {
                        state.pending_ids.push(item.id);
                    }
                    state.items.insert(item.id, item);
                }
            }
        }

        if let Ok(Some(bytes)) = backend.read(blob_keys::QUEUE_DEAD_LETTER).await {
            if let Ok(dead_letter) = serde_json::from_slice::<Vec<QueueItem>>(&bytes) {
                self.state.write().dead_letter = dead_letter;
            }
        }
    }

    pub fn dead_letters(&self) -> Vec<QueueItem> {
        self.state.read().dead_letter.clone()
    }

    /// Re-queues a dead-lettered item for another attempt, resetting its
    /// retry count.
    pub fn retry_dead_letter(&self, id: u64) -> bool {
        let mut state = self.state.write();
        let Some(pos) = state.dead_letter.iter().position(|i| i.id == id) else {
            return false;
        };
        let mut item = state.dead_letter.remove(pos);
        item.retry_count = 0;
        item.last_error = None;
        item.scheduled_for = None;
        item.state = QueueItemState::Pending;
        item.updated_at = now_ms();
        state.items.insert(id, item);
        state.pending_ids.push(id);
        true
    }

    pub fn purge_dead_letter(&self, id: u64) -> bool {
        let mut state = self.state.write();
        let before = state.dead_letter.len();
        state.dead_letter.retain(|i| i.id != id);
        state.dead_letter.len() != before
    }

    pub fn purge_all_dead_letters(&self) {
        self.state.write().dead_letter.clear();
    }

    pub fn pending_len(&self) -> usize {
        self.state.read().pending_ids.len()
    }

    pub fn scheduled_for(&self, id: u64) -> Option<TimestampMs> {
        self.state.read().items.get(&id).and_then(|i| i.scheduled_for)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_core::model::Priority;
    use orchestrator_core::EventBus;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct RecordingHandler {
        order: Arc<parking_lot::Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl QueueHandler for RecordingHandler {
        async fn handle(&self, request: &mut Request) -> HandlerOutcome {
            self.order.lock().push(request.query_text().unwrap_or_default().to_string());
            HandlerOutcome::Success
        }
    }

    fn queue(handler: Arc<dyn QueueHandler>) -> Arc<Queue> {
        let config = QueueConfig::builder()
            .concurrency(1)
            .poll_interval(Duration::from_millis(5))
            .events(Arc::new(EventBus::default()))
            .build();
        Queue::new(config, handler)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn high_priority_jumps_ahead_of_normal_and_low() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let q = queue(Arc::new(RecordingHandler { order: Arc::clone(&order) }));

        q.enqueue(Request::new("low").with_priority(Priority::Low)).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        q.enqueue(Request::new("high").with_priority(Priority::High)).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        q.enqueue(Request::new("normal").with_priority(Priority::Normal)).unwrap();

        q.spawn_workers();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(*order.lock(), vec!["high".to_string(), "normal".to_string(), "low".to_string()]);
    }

    #[tokio::test]
    async fn enqueue_rejects_past_max_size() {
        let config = QueueConfig::builder().max_size(1).events(Arc::new(EventBus::default())).build();
        let q = Queue::new(config, Arc::new(RecordingHandler { order: Arc::new(parking_lot::Mutex::new(Vec::new())) }));

        q.enqueue(Request::new("first")).unwrap();
        let err = q.enqueue(Request::new("second"));
        assert!(err.is_err());
    }

    struct FailNTimesHandler {
        calls: AtomicUsize,
        fail_until: usize,
    }

    #[async_trait::async_trait]
    impl QueueHandler for FailNTimesHandler {
        async fn handle(&self, _request: &mut Request) -> HandlerOutcome {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_until {
                HandlerOutcome::RetryableFailure { error: "not yet".into() }
            } else {
                HandlerOutcome::Success
            }
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn retryable_failures_are_requeued_until_they_exceed_max_retries() {
        let config = QueueConfig::builder()
            .concurrency(1)
            .poll_interval(Duration::from_millis(5))
            .base_retry_delay(Duration::from_millis(1))
            .events(Arc::new(EventBus::default()))
            .build();
        let handler = Arc::new(FailNTimesHandler { calls: AtomicUsize::new(0), fail_until: 100 });
        let q = Queue::new(config, handler);

        q.enqueue(Request::new("doomed").with_max_retries(2)).unwrap();
        q.spawn_workers();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(q.dead_letters().len(), 1);
        assert_eq!(q.dead_letters()[0].retry_count, 3);
    }

    #[tokio::test]
    async fn restore_resets_processing_items_to_pending() {
        let dir = tempfile::tempdir().unwrap();
        let backend: orchestrator_core::ports::SharedPersistence =
            Arc::new(orchestrator_core::ports::FilePersistence::new(dir.path()));

        let mut item = QueueItem::new(1, Request::new("stuck"), now_ms());
        item.state = QueueItemState::Processing;
        let snapshot = MainSnapshot { items: vec![item], next_id: 2 };
        backend
            .write(blob_keys::QUEUE_MAIN, serde_json::to_vec(&snapshot).unwrap())
            .await
            .unwrap();

        let config = QueueConfig::builder().persistence(backend).events(Arc::new(EventBus::default())).build();
        let q = Queue::new(config, Arc::new(RecordingHandler { order: Arc::new(parking_lot::Mutex::new(Vec::new())) }));
        q.restore().await;

        assert_eq!(q.pending_len(), 1);
    }
}
