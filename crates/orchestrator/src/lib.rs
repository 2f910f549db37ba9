//! Facade composing every component into the orchestrator described in
//! spec.md §4.10 (C10): one `execute`/`enqueue` surface backed by retry,
//! circuit breaking, fallback, caching, degradation, a persistent queue,
//! and a self-healing controller.

mod config;
mod handler;
mod health;

pub use config::{
    BreakerSettings, CacheSettings, DegradationSettings, HealthSettings, OrchestratorConfig,
    QueueSettings, RetrySettings, SelfHealSettings,
};
pub use handler::DegradationHandler;
pub use health::{HealthReport, MetricsSnapshot, ProviderSnapshot, SystemStatus};

use async_trait::async_trait;
use orchestrator_cache::Cache;
use orchestrator_classifier::Classifier;
use orchestrator_core::events::EventBus;
use orchestrator_core::model::{ProviderSpec, Request};
use orchestrator_core::ports::{BrowserManager, ConfigManager, ProviderAction, SelectorDiscovery, SharedPersistence};
use orchestrator_core::OrchestratorError;
use orchestrator_degradation::{Degradation, DegradedResponse};
use orchestrator_dispatcher::Dispatcher;
use orchestrator_queue::Queue;
use orchestrator_registry::Registry;
use orchestrator_retry::RetryExecutor;
use orchestrator_selfheal::SelfHealController;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

/// Collaborator that never does anything; fills in for a browser/selector/
/// config manager the embedding app hasn't wired up, so self-healing still
/// tracks failures (it just can't act on them beyond `WaitAndRetry`).
struct NoopCollaborator;

#[async_trait]
impl BrowserManager for NoopCollaborator {
    async fn restart(&self, _provider: &str) -> Result<(), String> {
        Err("no browser manager configured".into())
    }
    async fn clear_cache(&self, _provider: &str) -> Result<(), String> {
        Err("no browser manager configured".into())
    }
    async fn clear_cookies(&self, _provider: &str) -> Result<(), String> {
        Err("no browser manager configured".into())
    }
    async fn set_user_agent(&self, _provider: &str, _agent: &str) -> Result<(), String> {
        Err("no browser manager configured".into())
    }
}

#[async_trait]
impl SelectorDiscovery for NoopCollaborator {
    async fn discover(&self, _provider: &str) -> HashMap<String, String> {
        HashMap::new()
    }
}

#[async_trait]
impl ConfigManager for NoopCollaborator {
    async fn reload(&self, _provider: &str) -> Result<(), String> {
        Err("no config manager configured".into())
    }
    async fn update_selectors(&self, _provider: &str, _selectors: HashMap<String, String>) -> Result<(), String> {
        Err("no config manager configured".into())
    }
}

/// Assembles an [`Orchestrator`] from an [`OrchestratorConfig`], the
/// provider action, the providers to register, and optional collaborators.
pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    action: Option<Arc<dyn ProviderAction>>,
    providers: Vec<ProviderSpec>,
    persistence: Option<SharedPersistence>,
    browser: Option<Arc<dyn BrowserManager>>,
    selectors: Option<Arc<dyn SelectorDiscovery>>,
    config_manager: Option<Arc<dyn ConfigManager>>,
}

impl OrchestratorBuilder {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            action: None,
            providers: Vec::new(),
            persistence: None,
            browser: None,
            selectors: None,
            config_manager: None,
        }
    }

    pub fn action(mut self, action: Arc<dyn ProviderAction>) -> Self {
        self.action = Some(action);
        self
    }

    pub fn provider(mut self, spec: ProviderSpec) -> Self {
        self.providers.push(spec);
        self
    }

    pub fn persistence(mut self, persistence: SharedPersistence) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn browser(mut self, browser: Arc<dyn BrowserManager>) -> Self {
        self.browser = Some(browser);
        self
    }

    pub fn selectors(mut self, selectors: Arc<dyn SelectorDiscovery>) -> Self {
        self.selectors = Some(selectors);
        self
    }

    pub fn config_manager(mut self, config_manager: Arc<dyn ConfigManager>) -> Self {
        self.config_manager = Some(config_manager);
        self
    }

    /// Panics if no action was supplied — an orchestrator with nothing to
    /// call is a construction error, not a runtime one.
    pub fn build(self) -> Arc<Orchestrator> {
        let action = self.action.expect("OrchestratorBuilder::build requires .action(...)");
        let events = Arc::new(EventBus::default());

        let registry = Arc::new(Registry::new(self.config.registry_config(events.clone())));
        for spec in &self.providers {
            let breaker_config = self.config.breaker_config(&spec.name, events.clone());
            registry.register(spec.clone(), breaker_config);
        }

        let classifier = Arc::new(Classifier::new());
        let retry = Arc::new(RetryExecutor::new(self.config.retry_config(events.clone()), classifier.clone()));
        let dispatcher = Arc::new(Dispatcher::default_with(registry.clone(), retry, events.clone()));

        let mut cache = Cache::new(self.config.cache_config());
        if let Some(persistence) = self.persistence.clone() {
            cache = cache.with_persistence(persistence);
        }
        let cache = Arc::new(cache);

        let degradation = Arc::new(Degradation::new(
            dispatcher,
            cache.clone(),
            self.config.degradation_config(),
            events.clone(),
        ));

        let handler = Arc::new(DegradationHandler::new(degradation.clone(), action.clone()));
        let queue_config = self.config.queue_config(events.clone(), self.persistence.clone());
        let queue = Queue::new(queue_config, handler);

        let browser = self.browser.unwrap_or_else(|| Arc::new(NoopCollaborator));
        let selectors = self.selectors.unwrap_or_else(|| Arc::new(NoopCollaborator));
        let config_manager = self.config_manager.unwrap_or_else(|| Arc::new(NoopCollaborator));

        let selfheal = SelfHealController::new(
            self.config.self_heal_config(events.clone()),
            registry.clone(),
            classifier,
            browser,
            selectors,
            config_manager,
            events.clone(),
        );

        Arc::new(Orchestrator {
            action,
            registry,
            degradation,
            cache,
            queue,
            selfheal,
            events,
            workers: AsyncMutex::new(Vec::new()),
        })
    }
}

/// The composed request orchestration core. Build one with
/// [`OrchestratorBuilder`], call [`Orchestrator::start`] to spin up its
/// background tasks, then drive work through [`Orchestrator::execute`] or
/// [`Orchestrator::enqueue`].
pub struct Orchestrator {
    action: Arc<dyn ProviderAction>,
    registry: Arc<Registry>,
    degradation: Arc<Degradation>,
    cache: Arc<Cache>,
    queue: Arc<Queue>,
    selfheal: Arc<SelfHealController>,
    events: Arc<EventBus>,
    workers: AsyncMutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn builder(config: OrchestratorConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    /// Synchronous path (spec.md §4.10): dispatch → retry → fallback →
    /// cache/partial/generic degradation, returning the eventual response
    /// or the unified error.
    pub async fn execute(&self, mut request: Request) -> Result<DegradedResponse, OrchestratorError> {
        self.degradation
            .execute(self.action.as_ref(), &mut request)
            .await
            .map_err(|failure| OrchestratorError::AllExhausted {
                last_error: failure.last_error.message,
            })
    }

    /// Asynchronous path: enqueues `request` for a worker to eventually run
    /// through the same pipeline as [`Orchestrator::execute`], returning
    /// the assigned queue id.
    pub fn enqueue(&self, request: Request) -> Result<u64, OrchestratorError> {
        self.queue.enqueue(request)
    }

    pub fn dead_letters(&self) -> Vec<orchestrator_queue::QueueItem> {
        self.queue.dead_letters()
    }

    pub fn retry_dead_letter(&self, id: u64) -> bool {
        self.queue.retry_dead_letter(id)
    }

    pub fn recovery_history(&self) -> Vec<orchestrator_selfheal::RecoveryRecord> {
        self.selfheal.history()
    }

    fn provider_snapshots(&self) -> Vec<ProviderSnapshot> {
        self.registry
            .provider_names()
            .into_iter()
            .filter_map(|name| {
                let health = self.registry.health_of(&name)?;
                Some(ProviderSnapshot::from_health(name, &health))
            })
            .collect()
    }

    pub fn health(&self) -> HealthReport {
        let providers = self.provider_snapshots();
        let queue_pending = self.queue.pending_len();
        let status = health::aggregate_status(&providers, queue_pending);
        HealthReport {
            status,
            providers,
            queue_pending,
            queue_dead_letter: self.queue.dead_letters().len(),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            providers: self.provider_snapshots(),
            queue_pending: self.queue.pending_len(),
            queue_dead_letter: self.queue.dead_letters().len(),
            cache_len: self.cache.len(),
            recovery_history_len: self.selfheal.history().len(),
        }
    }

    /// Restores persisted cache/queue state, then spawns every background
    /// task (health tick, queue workers, queue persistence timer,
    /// self-heal event listener). Idempotent only in the sense that
    /// calling it twice spawns a second set of workers — callers should
    /// call it once.
    pub async fn start(self: &Arc<Self>) {
        let _ = self.cache.restore().await;
        self.queue.restore().await;

        let mut workers = self.workers.lock().await;
        workers.push(self.registry.spawn_health_tick());
        workers.extend(self.queue.spawn_workers());
        workers.push(self.queue.spawn_persist_timer());
        workers.push(self.selfheal.spawn_listener());
    }

    /// Aborts every background task started by [`Orchestrator::start`].
    pub async fn stop(&self) {
        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            handle.abort();
        }
    }
}
