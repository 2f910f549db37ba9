//! End-to-end scenarios driven entirely through the `Orchestrator` facade.

use async_trait::async_trait;
use orchestrator::{Orchestrator, OrchestratorConfig};
use orchestrator_core::model::{Priority, ProviderResponse, ProviderSpec, Request};
use orchestrator_core::ports::{ProviderAction, ProviderError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn fast_config() -> OrchestratorConfig {
    let mut config = OrchestratorConfig::default();
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 5;
    config.breaker.window_ms = 10_000;
    config.breaker.failure_threshold = 5;
    config
}

struct ScriptedAction {
    /// Per-provider queue of canned outcomes, consumed in order; once
    /// exhausted a provider always succeeds with "ok".
    scripts: Mutex<HashMap<String, Vec<Result<&'static str, &'static str>>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedAction {
    fn new(scripts: HashMap<String, Vec<Result<&'static str, &'static str>>>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self, provider: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|p| *p == provider).count()
    }
}

#[async_trait]
impl ProviderAction for ScriptedAction {
    async fn call(&self, provider: &str, _request: &Request) -> Result<ProviderResponse, ProviderError> {
        self.calls.lock().unwrap().push(provider.to_string());
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(provider)
            .and_then(|queue| (!queue.is_empty()).then(|| queue.remove(0)));

        match next {
            Some(Ok(content)) => Ok(ProviderResponse::ok(content)),
            Some(Err(tag)) => Err(ProviderError::new(provider, tag).with_tag(tag)),
            None => Ok(ProviderResponse::ok("ok")),
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_1_happy_path_single_provider() {
    let action = Arc::new(ScriptedAction::new(HashMap::new()));
    let orchestrator = Orchestrator::builder(fast_config())
        .action(action.clone())
        .provider(ProviderSpec::new("A", 1))
        .build();

    let result = orchestrator
        .execute(Request::new("q1").with_max_retries(0))
        .await
        .unwrap();

    assert_eq!(result.value.content.as_deref(), Some("ok"));
    assert_eq!(action.call_count("A"), 1);

    let hit = orchestrator.metrics();
    assert_eq!(hit.cache_len, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_2_retries_then_succeeds() {
    let mut scripts = HashMap::new();
    scripts.insert("A".to_string(), vec![Err("timeout"), Err("timeout")]);
    let action = Arc::new(ScriptedAction::new(scripts));

    let orchestrator = Orchestrator::builder(fast_config())
        .action(action.clone())
        .provider(ProviderSpec::new("A", 1))
        .build();

    let result = orchestrator
        .execute(Request::new("q2").with_max_retries(3))
        .await
        .unwrap();

    assert_eq!(result.value.content.as_deref(), Some("ok"));
    assert_eq!(action.call_count("A"), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_3_fallback_chain_a_b_c() {
    let mut scripts = HashMap::new();
    scripts.insert("A".to_string(), vec![Err("network")]);
    scripts.insert("B".to_string(), vec![Err("timeout")]);
    scripts.insert("C".to_string(), vec![Ok("ok")]);
    let action = Arc::new(ScriptedAction::new(scripts));

    let orchestrator = Orchestrator::builder(fast_config())
        .action(action.clone())
        .provider(ProviderSpec::new("A", 1))
        .provider(ProviderSpec::new("B", 2))
        .provider(ProviderSpec::new("C", 3))
        .build();

    let result = orchestrator
        .execute(Request::new("q3").with_max_retries(0))
        .await
        .unwrap();

    assert_eq!(result.value.content.as_deref(), Some("ok"));
    assert_eq!(action.call_count("A"), 1);
    assert_eq!(action.call_count("B"), 1);
    assert_eq!(action.call_count("C"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_4_circuit_breaker_opens_after_five_failures() {
    struct AlwaysFails(AtomicU32);
    #[async_trait]
    impl ProviderAction for AlwaysFails {
        async fn call(&self, provider: &str, _r: &Request) -> Result<ProviderResponse, ProviderError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::new(provider, "server error").with_tag("server_error"))
        }
    }

    let action = Arc::new(AlwaysFails(AtomicU32::new(0)));
    let mut config = fast_config();
    config.breaker.failure_threshold = 5;
    config.breaker.window_ms = 10_000;
    config.degradation.disable_generic_fallback = true;

    let orchestrator = Orchestrator::builder(config)
        .action(action.clone())
        .provider(ProviderSpec::new("A", 1))
        .build();

    for _ in 0..6 {
        let _ = orchestrator.execute(Request::new("q4").with_max_retries(0)).await;
    }

    // 5 calls actually invoke the action; the 6th is short-circuited.
    assert_eq!(action.0.load(Ordering::SeqCst), 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_5_all_providers_down_serves_from_cache() {
    struct ToggledAction {
        down: std::sync::atomic::AtomicBool,
        calls_while_down: AtomicUsize,
    }
    #[async_trait]
    impl ProviderAction for ToggledAction {
        async fn call(&self, provider: &str, _r: &Request) -> Result<ProviderResponse, ProviderError> {
            if self.down.load(Ordering::SeqCst) {
                self.calls_while_down.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::new(provider, "unreachable").with_tag("network"))
            } else {
                Ok(ProviderResponse::ok("hello"))
            }
        }
    }

    let action = Arc::new(ToggledAction {
        down: std::sync::atomic::AtomicBool::new(false),
        calls_while_down: AtomicUsize::new(0),
    });

    let orchestrator = Orchestrator::builder(fast_config())
        .action(action.clone())
        .provider(ProviderSpec::new("A", 1))
        .build();

    let first = orchestrator
        .execute(Request::new("q5").with_max_retries(0).allowing_stale())
        .await
        .unwrap();
    assert_eq!(first.value.content.as_deref(), Some("hello"));

    action.down.store(true, Ordering::SeqCst);

    // Drive enough failures to trip the breaker (threshold=5), then reset
    // the counter so the assertion below isolates the fallback call.
    for _ in 0..5 {
        let _ = orchestrator.execute(Request::new("q5-prime").with_max_retries(0)).await;
    }
    action.calls_while_down.store(0, Ordering::SeqCst);

    let second = orchestrator
        .execute(Request::new("q5").with_max_retries(0).allowing_stale())
        .await
        .unwrap();

    assert_eq!(second.value.content.as_deref(), Some("hello"));
    assert!(matches!(
        second.source,
        orchestrator_degradation::ResponseSource::Cache | orchestrator_degradation::ResponseSource::CacheStale
    ));
    assert_eq!(action.calls_while_down.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn scenario_6_queue_priority_ordering() {
    let order = Arc::new(Mutex::new(Vec::new()));

    struct OrderRecordingAction {
        order: Arc<Mutex<Vec<String>>>,
    }
    #[async_trait]
    impl ProviderAction for OrderRecordingAction {
        async fn call(&self, _provider: &str, request: &Request) -> Result<ProviderResponse, ProviderError> {
            self.order.lock().unwrap().push(request.query_text().unwrap_or_default().to_string());
            Ok(ProviderResponse::ok("ok"))
        }
    }

    let mut config = fast_config();
    config.queue.concurrency = 1;
    config.queue.poll_interval_ms = 5;

    let orchestrator = Orchestrator::builder(config)
        .action(Arc::new(OrderRecordingAction { order: order.clone() }))
        .provider(ProviderSpec::new("A", 1))
        .build();

    orchestrator.enqueue(Request::new("low").with_priority(Priority::Low)).unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    orchestrator.enqueue(Request::new("high").with_priority(Priority::High)).unwrap();
    tokio::time::sleep(Duration::from_millis(1)).await;
    orchestrator.enqueue(Request::new("normal").with_priority(Priority::Normal)).unwrap();

    orchestrator.start().await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    orchestrator.stop().await;

    assert_eq!(
        *order.lock().unwrap(),
        vec!["high".to_string(), "normal".to_string(), "low".to_string()]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn dedup_collapses_concurrent_identical_requests() {
    let calls = Arc::new(AtomicUsize::new(0));

    struct CountingAction {
        calls: Arc<AtomicUsize>,
    }
    #[async_trait]
    impl ProviderAction for CountingAction {
        async fn call(&self, _provider: &str, _r: &Request) -> Result<ProviderResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(ProviderResponse::ok("ok"))
        }
    }

    let orchestrator = Orchestrator::builder(fast_config())
        .action(Arc::new(CountingAction { calls: calls.clone() }))
        .provider(ProviderSpec::new("A", 1))
        .build();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let orchestrator = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            orchestrator.execute(Request::new("same query").with_max_retries(0)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
