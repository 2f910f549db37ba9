//! `CacheEntry` and its freshness state machine (spec.md §3).

use orchestrator_core::model::ProviderResponse;
use orchestrator_core::time::TimestampMs;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    StaleButServeable,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: ProviderResponse,
    pub created_at: TimestampMs,
    pub expires_at: TimestampMs,
    pub quality: f64,
    #[serde(default)]
    pub access_count: u64,
    pub last_access_at: TimestampMs,
    pub origin_prompt: String,
}

impl CacheEntry {
    pub fn new(
        value: ProviderResponse,
        created_at: TimestampMs,
        ttl_ms: u64,
        quality: f64,
        origin_prompt: impl Into<String>,
    ) -> Self {
        Self {
            value,
            created_at,
            expires_at: created_at + ttl_ms,
            quality,
            access_count: 0,
            last_access_at: created_at,
            origin_prompt: origin_prompt.into(),
        }
    }

    /// *Fresh* iff `now < expires_at - stale_window`; *stale-but-serveable*
    /// iff `expires_at - stale_window <= now < expires_at`; *expired* iff
    /// `now >= expires_at` (spec.md §3).
    pub fn freshness(&self, now: TimestampMs, stale_window_ms: u64) -> Freshness {
        let stale_from = self.expires_at.saturating_sub(stale_window_ms);
        if now >= self.expires_at {
            Freshness::Expired
        } else if now >= stale_from {
            Freshness::StaleButServeable
        } else {
            Freshness::Fresh
        }
    }

    pub(crate) fn touch(&mut self, now: TimestampMs) {
        self.last_access_at = now;
        self.access_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_expiring_at(expires_at: TimestampMs) -> CacheEntry {
        CacheEntry {
            value: ProviderResponse::ok("x"),
            created_at: 0,
            expires_at,
            quality: 1.0,
            access_count: 0,
            last_access_at: 0,
            origin_prompt: "hello world".to_string(),
        }
    }

    #[test]
    fn fresh_before_stale_window() {
        let entry = entry_expiring_at(10_000);
        assert_eq!(entry.freshness(1_000, 1_000), Freshness::Fresh);
    }

    #[test]
    fn stale_but_serveable_within_window() {
        let entry = entry_expiring_at(10_000);
        assert_eq!(entry.freshness(9_500, 1_000), Freshness::StaleButServeable);
    }

    #[test]
    fn expired_at_or_after_expiry() {
        let entry = entry_expiring_at(10_000);
        assert_eq!(entry.freshness(10_000, 1_000), Freshness::Expired);
    }
}
