//! `QueueItem` and its state machine (spec.md §3, §4.8).

use orchestrator_core::model::Request;
use orchestrator_core::time::TimestampMs;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueItemState {
    Pending,
    Processing,
    Completed,
    Failed,
    DeadLetter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: u64,
    pub request: Request,
    pub state: QueueItemState,
    pub retry_count: u32,
    pub scheduled_for: Option<TimestampMs>,
    pub last_error: Option<String>,
    pub created_at: TimestampMs,
    pub updated_at: TimestampMs,
}

impl QueueItem {
    pub(crate) fn new(id: u64, request: Request, now: TimestampMs) -> Self {
        Self {
            id,
            request,
            state: QueueItemState::Pending,
            retry_count: 0,
            scheduled_for: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn is_ready(&self, now: TimestampMs) -> bool {
        self.state == QueueItemState::Pending && self.scheduled_for.map_or(true, |t| t <= now)
    }
}
