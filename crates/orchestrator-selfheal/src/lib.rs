//! Self-healing controller (C9, spec.md §4.9).
//!
//! Subscribes to the orchestrator's event bus asynchronously, off the
//! synchronous request path: a per-provider failure tracker decides a
//! recovery strategy, best-effort actions run against the browser/selector/
//! config collaborators, and three consecutive post-recovery successes
//! reset the provider's circuit breaker and feed the classifier back.

mod action;
mod config;
mod record;
mod strategy;
mod tracker;

pub use action::RecoveryAction;
pub use config::{SelfHealConfig, SelfHealConfigBuilder};
pub use record::RecoveryRecord;
pub use strategy::Signals;
pub use tracker::FailureLevel;

use orchestrator_classifier::{Classifier, ErrorCategory};
use orchestrator_core::events::OrchestratorEvent;
use orchestrator_core::model::RequestId;
use orchestrator_core::ports::{BrowserManager, ConfigManager, SelectorDiscovery};
use orchestrator_core::time::now_ms;
use orchestrator_core::EventBus;
use orchestrator_registry::Registry;
use parking_lot::{Mutex, RwLock};
use record::History;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracker::{FailureTracker, Thresholds};

#[derive(Default)]
struct ProviderState {
    tracker: FailureTracker,
}

pub struct SelfHealController {
    config: SelfHealConfig,
    registry: Arc<Registry>,
    classifier: Arc<Classifier>,
    browser: Arc<dyn BrowserManager>,
    selectors: Arc<dyn SelectorDiscovery>,
    config_manager: Arc<dyn ConfigManager>,
    providers: RwLock<HashMap<String, ProviderState>>,
    history: Mutex<History>,
    events: Arc<EventBus>,
}

impl SelfHealController {
    pub fn new(
        config: SelfHealConfig,
        registry: Arc<Registry>,
        classifier: Arc<Classifier>,
        browser: Arc<dyn BrowserManager>,
        selectors: Arc<dyn SelectorDiscovery>,
        config_manager: Arc<dyn ConfigManager>,
        events: Arc<EventBus>,
    ) -> Arc<Self> {
        let history_cap = config.history_cap;
        Arc::new(Self {
            config,
            registry,
            classifier,
            browser,
            selectors,
            config_manager,
            providers: RwLock::new(HashMap::new()),
            history: Mutex::new(History::new(history_cap)),
            events,
        })
    }

    fn thresholds(&self) -> Thresholds {
        Thresholds {
            degraded: self.config.degraded_threshold,
            failing: self.config.failing_threshold,
            critical: self.config.critical_threshold,
        }
    }

    pub fn history(&self) -> Vec<RecoveryRecord> {
        self.history.lock().snapshot()
    }

    /// Subscribes to the event bus and processes failure/success events
    /// one at a time, provider order notwithstanding — a single consumer
    /// task gives the single-writer-per-provider discipline spec.md §7
    /// asks for without an extra lock.
    pub fn spawn_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        let mut rx = controller.events.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => controller.on_event(event).await,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    async fn on_event(&self, event: OrchestratorEvent) {
        if !self.config.enabled {
            return;
        }
        match event {
            OrchestratorEvent::RequestFailed { provider, category, error, .. } => {
                self.handle_failure(&provider, &category, &error, RequestId(0)).await;
            }
            OrchestratorEvent::RequestSucceeded { provider, .. } => {
                self.handle_success(&provider).await;
            }
            _ => {}
        }
    }

    async fn handle_failure(&self, provider: &str, category_str: &str, error: &str, _request_id: RequestId) {
        let level = {
            let mut providers = self.providers.write();
            let state = providers.entry(provider.to_string()).or_default();
            state.tracker.record_failure();
            state.tracker.level(self.thresholds())
        };

        let category = category_from_str(category_str);
        let signals = Signals {
            selector_not_found: error.to_lowercase().contains("selector"),
            captcha: error.to_lowercase().contains("captcha"),
        };

        if !self.config.auto_recover {
            return;
        }

        let plan = strategy::strategy_for(category, level, signals);
        self.run_strategy(provider, category, &error.to_string(), plan).await;
    }

    async fn handle_success(&self, provider: &str) {
        let streak = {
            let mut providers = self.providers.write();
            let state = providers.entry(provider.to_string()).or_default();
            state.tracker.record_success()
        };

        if streak >= self.config.recovery_success_streak {
            if let Some(breaker) = self.registry.breaker(provider) {
                breaker.reset();
            }
            self.events.emit(OrchestratorEvent::PlatformRecovered {
                provider: provider.to_string(),
            });
        }
    }

    /// Runs each action in order; the first to complete without error
    /// terminates the strategy (spec.md §4.9).
    async fn run_strategy(&self, provider: &str, category: ErrorCategory, error: &str, plan: Vec<RecoveryAction>) {
        for action in plan {
            let started_at = now_ms();
            self.events.emit(OrchestratorEvent::RecoveryActionStarted {
                provider: provider.to_string(),
                action: action.as_str().to_string(),
            });

            let outcome = self.dispatch_action(provider, action).await;
            let duration_ms = now_ms().saturating_sub(started_at);

            self.history.lock().push(RecoveryRecord {
                id: 0,
                provider: provider.to_string(),
                action,
                context: error.to_string(),
                started_at,
                duration_ms,
                success: outcome.is_ok(),
                error: outcome.as_ref().err().cloned(),
            });

            self.classifier.record_feedback(provider, error, category, outcome.is_ok());

            match outcome {
                Ok(()) => {
                    self.events.emit(OrchestratorEvent::RecoveryActionCompleted {
                        provider: provider.to_string(),
                        action: action.as_str().to_string(),
                    });
                    break;
                }
                Err(message) => {
                    self.events.emit(OrchestratorEvent::RecoveryActionFailed {
                        provider: provider.to_string(),
                        action: action.as_str().to_string(),
                        error: message,
                    });
                }
            }
        }
    }

    async fn dispatch_action(&self, provider: &str, action: RecoveryAction) -> Result<(), String> {
        match action {
            RecoveryAction::RestartBrowser => self.browser.restart(provider).await,
            RecoveryAction::ClearCache => self.browser.clear_cache(provider).await,
            RecoveryAction::ClearCookies => self.browser.clear_cookies(provider).await,
            RecoveryAction::ChangeUserAgent => {
                self.browser.set_user_agent(provider, "orchestrator-bot/1.0").await
            }
            RecoveryAction::RediscoverSelectors => {
                let selectors = self.selectors.discover(provider).await;
                if selectors.is_empty() {
                    Err("selector discovery returned no selectors".to_string())
                } else {
                    self.config_manager.update_selectors(provider, selectors).await
                }
            }
            RecoveryAction::WaitAndRetry => {
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                Ok(())
            }
            RecoveryAction::ResetSession => self.config_manager.reload(provider).await,
            RecoveryAction::UpdateConfig => self.config_manager.reload(provider).await,
        }
    }
}

fn category_from_str(s: &str) -> ErrorCategory {
    match s {
        "network" => ErrorCategory::Network,
        "timeout" => ErrorCategory::Timeout,
        "rate_limit" => ErrorCategory::RateLimit,
        "auth" => ErrorCategory::Auth,
        "browser" => ErrorCategory::Browser,
        "parsing" => ErrorCategory::Parsing,
        "validation" => ErrorCategory::Validation,
        "server_error" => ErrorCategory::ServerError,
        "resource" => ErrorCategory::Resource,
        "transient" => ErrorCategory::Transient,
        _ => ErrorCategory::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use orchestrator_circuitbreaker::CircuitBreakerConfig;
    use orchestrator_core::model::ProviderSpec;
    use orchestrator_registry::RegistryConfig;
    use std::collections::HashMap as Map;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeBrowser {
        restarts: AtomicUsize,
    }
    #[async_trait]
    impl BrowserManager for FakeBrowser {
        async fn restart(&self, _p: &str) -> Result<(), String> {
            self.restarts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn clear_cache(&self, _p: &str) -> Result<(), String> {
            Ok(())
        }
        async fn clear_cookies(&self, _p: &str) -> Result<(), String> {
            Ok(())
        }
        async fn set_user_agent(&self, _p: &str, _a: &str) -> Result<(), String> {
            Ok(())
        }
    }

    struct FakeSelectors;
    #[async_trait]
    impl SelectorDiscovery for FakeSelectors {
        async fn discover(&self, _p: &str) -> Map<String, String> {
            Map::new()
        }
    }

    struct FakeConfigManager;
    #[async_trait]
    impl ConfigManager for FakeConfigManager {
        async fn reload(&self, _p: &str) -> Result<(), String> {
            Ok(())
        }
        async fn update_selectors(&self, _p: &str, _s: Map<String, String>) -> Result<(), String> {
            Ok(())
        }
    }

    fn controller(events: Arc<EventBus>) -> (Arc<SelfHealController>, Arc<Registry>, Arc<FakeBrowser>) {
        let registry = Arc::new(Registry::new(RegistryConfig::builder().events(events.clone()).build()));
        registry.register(ProviderSpec::new("a", 0), CircuitBreakerConfig::builder("a").failure_threshold(1).events(events.clone()).build());

        let browser = Arc::new(FakeBrowser { restarts: AtomicUsize::new(0) });
        let controller = SelfHealController::new(
            SelfHealConfig::builder().build(),
            Arc::clone(&registry),
            Arc::new(Classifier::new()),
            browser.clone(),
            Arc::new(FakeSelectors),
            Arc::new(FakeConfigManager),
            events,
        );
        (controller, registry, browser)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn browser_category_failure_triggers_restart_and_is_logged() {
        let events = Arc::new(EventBus::default());
        let (controller, _registry, browser) = controller(events.clone());
        controller.spawn_listener();

        events.emit(OrchestratorEvent::RequestFailed {
            request_id: RequestId::next(),
            provider: "a".into(),
            category: "browser".into(),
            error: "page crashed".into(),
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(browser.restarts.load(Ordering::SeqCst), 1);
        assert_eq!(controller.history().len(), 1);
        assert!(controller.history()[0].success);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn three_consecutive_successes_reset_the_breaker() {
        let events = Arc::new(EventBus::default());
        let (controller, registry, _browser) = controller(events.clone());
        controller.spawn_listener();

        let breaker = registry.breaker("a").unwrap();
        breaker.try_acquire();
        breaker.record_failure();
        assert!(breaker.is_open());

        for _ in 0..3 {
            events.emit(OrchestratorEvent::RequestSucceeded {
                request_id: RequestId::next(),
                provider: "a".into(),
                response_time_ms: 10,
            });
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!breaker.is_open());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn disabling_auto_recover_still_tracks_but_never_dispatches() {
        let events = Arc::new(EventBus::default());
        let registry = Arc::new(Registry::new(RegistryConfig::builder().events(events.clone()).build()));
        registry.register(ProviderSpec::new("a", 0), CircuitBreakerConfig::builder("a").events(events.clone()).build());
        let browser = Arc::new(FakeBrowser { restarts: AtomicUsize::new(0) });
        let controller = SelfHealController::new(
            SelfHealConfig::builder().auto_recover(false).build(),
            registry,
            Arc::new(Classifier::new()),
            browser.clone(),
            Arc::new(FakeSelectors),
            Arc::new(FakeConfigManager),
            events.clone(),
        );
        controller.spawn_listener();

        events.emit(OrchestratorEvent::RequestFailed {
            request_id: RequestId::next(),
            provider: "a".into(),
            category: "browser".into(),
            error: "page crashed".into(),
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(browser.restarts.load(Ordering::SeqCst), 0);
        assert!(controller.history().is_empty());
    }
}
