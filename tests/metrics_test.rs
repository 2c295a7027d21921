//! Metrics emitted by selection, health checks, caching, fusion and HTTP
//! providers.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use parlay_gateway::fusion::{DataFusionService, FusionConfig};
use parlay_gateway::manager::{Environment, ProvidersConfig};
use parlay_gateway::providers::{
    CachingDataProvider, EspnDataProvider, FactoryConfig, MockDataProvider, ProviderRegistry,
    RegistryConfig,
};
use parlay_gateway::telemetry;
use parlay_gateway::types::SimulationSettings;
use parlay_gateway::{
    DataProvider, DataResponse, Provider, ProviderConfigUpdate, ProviderHandle, ProviderKind,
    ProviderManager, ProviderSelectionCriteria,
};

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Sum counters for `name` carrying `label = value`.
fn counter_with_label(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Check if any histogram entries exist for a given metric name.
fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

/// Run `fut` with a local recorder and return what it recorded.
///
/// `block_in_place` keeps the sync `with_local_recorder` closure on the
/// current thread while `block_on` drives the async work.
fn recorded<F: Future>(fut: F) -> (F::Output, SnapshotVec) {
    let recorder = DebuggingRecorder::new();
    let snapshotter: Snapshotter = recorder.snapshotter();
    let output = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
    });
    (output, snapshotter.snapshot().into_vec())
}

fn mock_data(name: &str, update: ProviderConfigUpdate) -> Arc<dyn DataProvider> {
    let config = FactoryConfig::default().data_config("mock", name, &update);
    Arc::new(MockDataProvider::new(config))
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn selection_records_counter() {
    let (result, snapshot) = recorded(async {
        let registry = ProviderRegistry::default();
        registry
            .register("a", ProviderHandle::Data(mock_data("a", ProviderConfigUpdate::new())), 1)
            .await;
        registry
            .select_provider(&ProviderSelectionCriteria::new(ProviderKind::Data))
            .await
    });
    assert!(result.is_ok());
    assert_eq!(counter_total(&snapshot, telemetry::SELECTIONS_TOTAL), 1);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::SELECTIONS_TOTAL, "fallback", "false"),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn health_pass_records_checks_and_durations() {
    let (probed, snapshot) = recorded(async {
        let registry = ProviderRegistry::default();
        let down = ProviderConfigUpdate::new().simulation(SimulationSettings {
            healthy: false,
            ..Default::default()
        });
        registry
            .register("up", ProviderHandle::Data(mock_data("up", ProviderConfigUpdate::new())), 1)
            .await;
        registry
            .register("down", ProviderHandle::Data(mock_data("down", down)), 1)
            .await;
        registry.check_all_health().await
    });
    assert_eq!(probed, 2);
    assert_eq!(counter_total(&snapshot, telemetry::HEALTH_CHECKS_TOTAL), 2);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::HEALTH_CHECKS_TOTAL, "status", "unhealthy"),
        1
    );
    assert!(has_histogram(&snapshot, telemetry::HEALTH_CHECK_DURATION_SECONDS));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn cache_records_hits_and_misses() {
    let (cached, snapshot) = recorded(async {
        let provider = CachingDataProvider::new(
            mock_data("mock", ProviderConfigUpdate::new()),
            Duration::from_secs(60),
        );
        provider.team_roster("12").await.unwrap();
        provider.team_roster("12").await.unwrap().cached
    });
    assert!(cached);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn fusion_records_conflicts() {
    let (conflicts, snapshot) = recorded(async {
        let manager = ProviderManager::builder()
            .environment(Environment::Testing)
            .config(ProvidersConfig::default())
            .registry_config(RegistryConfig::default().enable_health_monitoring(false))
            .build()
            .await
            .unwrap();
        for name in ["a", "b"] {
            manager
                .register_data_provider(name, "mock", &ProviderConfigUpdate::new(), None)
                .await
                .unwrap();
        }
        let fusion = DataFusionService::new(Arc::new(manager), FusionConfig::default());
        fusion
            .fuse_data(&["a", "b"], |p| async move {
                let score = if p.name() == "a" { 10 } else { 12 };
                Ok::<_, parlay_gateway::ParlayError>(DataResponse::fresh(
                    json!({ "score": score }),
                    p.name(),
                ))
            })
            .await
            .unwrap()
            .conflicts
            .len()
    });
    assert_eq!(conflicts, 1);
    assert_eq!(counter_total(&snapshot, telemetry::FUSION_CONFLICTS_TOTAL), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn http_provider_records_request_metrics() {
    let (result, snapshot) = recorded(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/teams/12"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "team": {"id": "12"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/teams/99"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such team"))
            .mount(&server)
            .await;

        let config = FactoryConfig::default().data_config(
            "espn",
            "espn",
            &ProviderConfigUpdate::new().base_url(server.uri()).retries(0),
        );
        let espn = EspnDataProvider::new(config).unwrap();
        let ok = espn.team_stats("12").await;
        let missing = espn.team_stats("99").await;
        (ok.is_ok(), missing.is_err())
    });
    assert_eq!(result, (true, true));
    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 2);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::REQUESTS_TOTAL, "status", "error"),
        1
    );
    assert!(has_histogram(&snapshot, telemetry::REQUEST_DURATION_SECONDS));
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    let registry = ProviderRegistry::default();
    registry
        .register("a", ProviderHandle::Data(mock_data("a", ProviderConfigUpdate::new())), 1)
        .await;
    registry
        .select_provider(&ProviderSelectionCriteria::new(ProviderKind::Data))
        .await
        .unwrap();
    registry.check_all_health().await;
}
