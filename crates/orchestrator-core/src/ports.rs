//! External-collaborator contracts (spec.md §6).
//!
//! Everything in this module is consumed by the core but implemented
//! outside it: provider adapters, the browser/selector/config managers the
//! self-healing controller drives, and the persistence backend the cache
//! and queue snapshot themselves to. The core ships one reference
//! persistence implementation (`FilePersistence`) and one no-op
//! (`NullPersistence`) for callers who disable persistence.

use crate::model::{ProviderResponse, Request};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A provider-supplied failure. Opaque beyond what the classifier needs.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub provider: String,
    pub message: String,
    pub status: Option<u16>,
    pub tag: Option<String>,
    pub retryable_hint: Option<bool>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider, self.message)
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    pub fn new(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            message: message.into(),
            status: None,
            tag: None,
            retryable_hint: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn as_raw_failure(&self) -> crate::model::RawFailure {
        crate::model::RawFailure {
            message: self.message.clone(),
            status: self.status,
            provider: Some(self.provider.clone()),
            tag: self.tag.clone(),
            retryable_hint: self.retryable_hint,
        }
    }
}

/// The provider action contract consumed by `orchestrator-retry` and
/// `orchestrator-dispatcher`: "a function `action(provider_name) ->
/// response`, arbitrary failure on error" (spec.md §6).
#[async_trait]
pub trait ProviderAction: Send + Sync {
    async fn call(
        &self,
        provider: &str,
        request: &Request,
    ) -> Result<ProviderResponse, ProviderError>;
}

#[async_trait]
impl<F, Fut> ProviderAction for F
where
    F: Fn(String, Request) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<ProviderResponse, ProviderError>> + Send,
{
    async fn call(
        &self,
        provider: &str,
        request: &Request,
    ) -> Result<ProviderResponse, ProviderError> {
        (self)(provider.to_string(), request.clone()).await
    }
}

/// Browser manager collaborator consumed by the self-healing controller
/// (C9). Every operation is best-effort: failures are swallowed by the
/// caller, never raised.
#[async_trait]
pub trait BrowserManager: Send + Sync {
    async fn restart(&self, provider: &str) -> Result<(), String>;
    async fn clear_cache(&self, provider: &str) -> Result<(), String>;
    async fn clear_cookies(&self, provider: &str) -> Result<(), String>;
    async fn set_user_agent(&self, provider: &str, agent: &str) -> Result<(), String>;
}

/// Selector discovery collaborator consumed by C9. An empty map is treated
/// as recovery failure.
#[async_trait]
pub trait SelectorDiscovery: Send + Sync {
    async fn discover(&self, provider: &str) -> HashMap<String, String>;
}

/// Config manager collaborator consumed by C9.
#[async_trait]
pub trait ConfigManager: Send + Sync {
    async fn reload(&self, provider: &str) -> Result<(), String>;
    async fn update_selectors(
        &self,
        provider: &str,
        selectors: HashMap<String, String>,
    ) -> Result<(), String>;
}

/// Blob persistence backend consumed by the cache (C6) and the queue (C8).
/// The reference implementation is file-based; the interface accommodates
/// a networked key-value store equally well.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError>;
    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), PersistenceError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PersistenceError {
    #[error("persistence io error: {0}")]
    Io(String),
}

/// No-op backend for callers who disable persistence (spec.md §4.6/§4.8:
/// "the core tolerates persistence being disabled").
#[derive(Debug, Default)]
pub struct NullPersistence;

#[async_trait]
impl PersistenceBackend for NullPersistence {
    async fn read(&self, _key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        Ok(None)
    }

    async fn write(&self, _key: &str, _bytes: Vec<u8>) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// File-backed reference implementation. Keys map to files under `root`,
/// with `/` in the key creating subdirectories (matching spec.md §6's
/// `queue/main.json` / `cache/cache.json` layout).
pub struct FilePersistence {
    root: PathBuf,
    // Serializes writes so two concurrent snapshot flushes of the same key
    // cannot interleave; reads do not need the lock.
    write_lock: Mutex<()>,
}

impl FilePersistence {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl PersistenceBackend for FilePersistence {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::Io(e.to_string())),
        }
    }

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PersistenceError::Io(e.to_string()))?;
        }
        // Write to a temp file then rename, so a crash mid-write never
        // leaves a half-written blob for the next startup to quarantine.
        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| PersistenceError::Io(e.to_string()))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| PersistenceError::Io(e.to_string()))?;
        Ok(())
    }
}

/// Shared handle type used by callers wiring up a persistence backend.
pub type SharedPersistence = Arc<dyn PersistenceBackend>;
