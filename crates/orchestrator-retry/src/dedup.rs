//! Request deduplication: concurrent callers with the same fingerprint
//! attach to one in-flight attempt instead of dispatching in parallel
//! (spec.md §4.3), grounded on the teacher workspace's request-coalescing
//! service (`tower-resilience-coalesce::service::InFlight`).

use hashbrown::HashMap;
use orchestrator_core::ports::ProviderError;
use orchestrator_core::ProviderResponse;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

type AttemptResult = Result<(ProviderResponse, u64), ProviderError>;

struct Entry {
    sender: broadcast::Sender<AttemptResult>,
    /// Set once the leader finishes, so joiners arriving after completion
    /// (but inside the grace period) get the cached outcome instead of a
    /// `RecvError` from a sender with no buffered messages left.
    completed: Option<(AttemptResult, Instant)>,
}

struct Shared {
    entries: Mutex<HashMap<String, Entry>>,
    grace_period: Duration,
}

/// Either you are the leader (run the attempt yourself and call
/// [`DedupTable::complete`]), or you are a follower waiting on the
/// leader's result.
pub enum Lease {
    Leader,
    Follower(broadcast::Receiver<AttemptResult>),
    /// The leader already finished within the grace period.
    Cached(AttemptResult),
}

/// TTL-cleaned table of in-flight/recently-completed attempts, keyed by
/// request fingerprint.
pub struct DedupTable {
    shared: Arc<Shared>,
    _sweeper: JoinHandle<()>,
}

impl DedupTable {
    pub fn new(grace_period: Duration) -> Self {
        let shared = Arc::new(Shared {
            entries: Mutex::new(HashMap::new()),
            grace_period,
        });

        let sweep_target = Arc::clone(&shared);
        let sweeper = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                sweep_target.sweep();
            }
        });

        Self {
            shared,
            _sweeper: sweeper,
        }
    }

    /// Tries to join an in-flight attempt for `(fingerprint, provider)`, or
    /// becomes the leader for it. Keyed per provider because one
    /// `RetryExecutor` serves every candidate in a fallback walk
    /// (spec.md §4.3 dedupes separate top-level calls sharing a
    /// fingerprint, not sequential per-provider attempts within the same
    /// walk — each provider gets its own lease).
    pub fn join_or_lead(&self, fingerprint: &str, provider: &str) -> Lease {
        let key = Self::key(fingerprint, provider);
        let mut entries = self.shared.entries.lock();

        if let Some(entry) = entries.get(&key) {
            if let Some((result, completed_at)) = &entry.completed {
                if completed_at.elapsed() < self.shared.grace_period {
                    return Lease::Cached(result.clone());
                }
                // Expired: fall through and replace with a fresh leader.
            } else {
                return Lease::Follower(entry.sender.subscribe());
            }
        }

        let (tx, _rx) = broadcast::channel(1);
        entries.insert(
            key,
            Entry {
                sender: tx,
                completed: None,
            },
        );
        Lease::Leader
    }

    /// Called by the leader once its attempt terminates (success or
    /// failure). The entry is kept for `grace_period` so immediate retries
    /// on the same fingerprint dedupe too, then swept.
    pub fn complete(&self, fingerprint: &str, provider: &str, result: AttemptResult) {
        let key = Self::key(fingerprint, provider);
        let mut entries = self.shared.entries.lock();
        if let Some(entry) = entries.get_mut(&key) {
            let _ = entry.sender.send(result.clone());
            entry.completed = Some((result, Instant::now()));
        }
    }

    fn key(fingerprint: &str, provider: &str) -> String {
        format!("{fingerprint}\u{0}{provider}")
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.shared.entries.lock().len()
    }
}

impl Shared {
    fn sweep(&self) {
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| match &entry.completed {
            Some((_, completed_at)) => completed_at.elapsed() < self.grace_period,
            None => true,
        });
    }
}

impl Drop for DedupTable {
    fn drop(&mut self) {
        self._sweeper.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_caller_follows_the_leader() {
        let table = DedupTable::new(Duration::from_millis(200));

        let lease_a = table.join_or_lead("fp", "p");
        assert!(matches!(lease_a, Lease::Leader));

        let lease_b = table.join_or_lead("fp", "p");
        let mut rx = match lease_b {
            Lease::Follower(rx) => rx,
            _ => panic!("expected follower"),
        };

        table.complete("fp", "p", Ok((ProviderResponse::ok("hi"), 5)));

        let (response, rt) = rx.recv().await.unwrap().unwrap();
        assert_eq!(response.content.as_deref(), Some("hi"));
        assert_eq!(rt, 5);
    }

    #[tokio::test]
    async fn late_joiner_within_grace_gets_cached_result() {
        let table = DedupTable::new(Duration::from_millis(500));
        table.join_or_lead("fp", "p");
        table.complete("fp", "p", Ok((ProviderResponse::ok("hi"), 5)));

        match table.join_or_lead("fp", "p") {
            Lease::Cached(Ok((response, _))) => {
                assert_eq!(response.content.as_deref(), Some("hi"));
            }
            _ => panic!("expected cached result"),
        }
    }

    #[tokio::test]
    async fn joiner_after_grace_period_becomes_new_leader() {
        let table = DedupTable::new(Duration::from_millis(10));
        table.join_or_lead("fp", "p");
        table.complete("fp", "p", Ok((ProviderResponse::ok("hi"), 5)));

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(matches!(table.join_or_lead("fp", "p"), Lease::Leader));
    }

    #[tokio::test]
    async fn distinct_providers_for_the_same_fingerprint_do_not_share_a_lease() {
        let table = DedupTable::new(Duration::from_millis(200));

        assert!(matches!(table.join_or_lead("fp", "a"), Lease::Leader));
        assert!(matches!(table.join_or_lead("fp", "b"), Lease::Leader));
    }
}
