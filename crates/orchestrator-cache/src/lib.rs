//! Bounded LRU response cache with similarity lookup (C6, spec.md §4.6).

mod config;
mod entry;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use entry::{CacheEntry, Freshness};

use orchestrator_core::fingerprint::jaccard_similarity;
use orchestrator_core::model::ProviderResponse;
use orchestrator_core::ports::{PersistenceError, SharedPersistence};
use orchestrator_core::time::now_ms;
use parking_lot::RwLock;
use std::collections::HashMap;

/// What a [`Cache::get`] lookup found.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub value: ProviderResponse,
    pub quality: f64,
    pub stale: bool,
    pub created_at: orchestrator_core::time::TimestampMs,
}

pub struct Cache {
    config: CacheConfig,
    entries: RwLock<HashMap<String, CacheEntry>>,
    persistence: Option<SharedPersistence>,
}

const PERSIST_KEY: &str = orchestrator_core::config::blob_keys::CACHE;

impl Cache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            persistence: None,
        }
    }

    pub fn with_persistence(mut self, persistence: SharedPersistence) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Loads the persisted blob, if any, dropping entries already expired
    /// (spec.md §4.6: "on startup, expired entries are dropped").
    pub async fn restore(&self) -> Result<usize, PersistenceError> {
        let Some(persistence) = &self.persistence else { return Ok(0) };
        let Some(bytes) = persistence.read(PERSIST_KEY).await? else { return Ok(0) };
        let loaded: Vec<CacheEntry> = serde_json::from_slice(&bytes).unwrap_or_default();

        let now = now_ms();
        let mut entries = self.entries.write();
        let mut restored = 0;
        for entry in loaded {
            if entry.freshness(now, self.config.stale_window.as_millis() as u64) == Freshness::Expired {
                continue;
            }
            entries.insert(fingerprint_key(&entry.origin_prompt), entry);
            restored += 1;
        }
        Ok(restored)
    }

    /// Serialises every entry to the persistence backend, if configured.
    pub async fn persist(&self) -> Result<(), PersistenceError> {
        let Some(persistence) = &self.persistence else { return Ok(()) };
        let snapshot: Vec<CacheEntry> = self.entries.read().values().cloned().collect();
        let bytes = serde_json::to_vec(&snapshot).map_err(|e| PersistenceError::Io(e.to_string()))?;
        persistence.write(PERSIST_KEY, bytes).await
    }

    /// Inserts/overwrites the entry for `fingerprint` with the configured
    /// default TTL, evicting the LRU entry if at capacity.
    pub fn set(&self, fingerprint: &str, value: ProviderResponse, quality: f64, origin_prompt: &str) {
        let now = now_ms();
        let mut entries = self.entries.write();

        if !entries.contains_key(fingerprint) && entries.len() >= self.config.capacity {
            if let Some(lru_key) = entries
                .iter()
                .min_by_key(|(_, e)| e.last_access_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&lru_key);
            }
        }

        entries.insert(
            fingerprint.to_string(),
            CacheEntry::new(value, now, self.config.default_ttl.as_millis() as u64, quality, origin_prompt),
        );
    }

    /// `get(fp, allow_stale)` per spec.md §4.6's four-way branch.
    pub fn get(&self, fingerprint: &str, allow_stale: bool) -> Option<CacheHit> {
        let now = now_ms();
        let mut entries = self.entries.write();
        let stale_window_ms = self.config.stale_window.as_millis() as u64;

        let freshness = entries.get(fingerprint)?.freshness(now, stale_window_ms);

        match freshness {
            Freshness::Expired if !allow_stale => {
                entries.remove(fingerprint);
                None
            }
            Freshness::Expired => {
                let entry = entries.get_mut(fingerprint).unwrap();
                entry.touch(now);
                Some(CacheHit {
                    value: entry.value.clone(),
                    quality: entry.quality,
                    stale: true,
                    created_at: entry.created_at,
                })
            }
            Freshness::StaleButServeable => {
                let entry = entries.get_mut(fingerprint).unwrap();
                entry.touch(now);
                Some(CacheHit {
                    value: entry.value.clone(),
                    quality: entry.quality,
                    stale: true,
                    created_at: entry.created_at,
                })
            }
            Freshness::Fresh => {
                let entry = entries.get_mut(fingerprint).unwrap();
                entry.touch(now);
                Some(CacheHit {
                    value: entry.value.clone(),
                    quality: entry.quality,
                    stale: false,
                    created_at: entry.created_at,
                })
            }
        }
    }

    /// Returns cached entries whose `origin_prompt` is similar to `prompt`
    /// (Jaccard ≥ the configured threshold), most similar first. Used only
    /// by the partial-response fallback (spec.md §4.7).
    pub fn similar(&self, prompt: &str) -> Vec<(f64, CacheHit)> {
        let entries = self.entries.read();
        let mut scored: Vec<(f64, CacheHit)> = entries
            .values()
            .filter_map(|entry| {
                let score = jaccard_similarity(prompt, &entry.origin_prompt);
                (score >= self.config.similarity_threshold).then(|| {
                    (
                        score,
                        CacheHit {
                            value: entry.value.clone(),
                            quality: entry.quality,
                            stale: false,
                            created_at: entry.created_at,
                        },
                    )
                })
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
        scored
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn fingerprint_key(origin_prompt: &str) -> String {
    orchestrator_core::fingerprint::fingerprint(origin_prompt)
}
