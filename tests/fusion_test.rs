use std::future::{Ready, ready};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parlay_gateway::fusion::{ConflictResolution, DataFusionService, FusionConfig};
use parlay_gateway::manager::{Environment, ProvidersConfig};
use parlay_gateway::providers::RegistryConfig;
use parlay_gateway::types::SimulationSettings;
use parlay_gateway::{
    DataProvider, DataQuality, DataResponse, ParlayError, Provider, ProviderConfigUpdate,
    ProviderManager,
};
use serde_json::{Value, json};

async fn manager_with(providers: &[(&str, ProviderConfigUpdate)]) -> Arc<ProviderManager> {
    let manager = ProviderManager::builder()
        .environment(Environment::Testing)
        .config(ProvidersConfig::default())
        .registry_config(RegistryConfig::default().enable_health_monitoring(false))
        .build()
        .await
        .unwrap();
    for (name, update) in providers {
        manager
            .register_data_provider(name, "mock", update, None)
            .await
            .unwrap();
    }
    Arc::new(manager)
}

fn sim(settings: SimulationSettings) -> ProviderConfigUpdate {
    ProviderConfigUpdate::new().simulation(settings)
}

fn plain() -> ProviderConfigUpdate {
    ProviderConfigUpdate::new()
}

fn service(manager: Arc<ProviderManager>, strategy: ConflictResolution) -> DataFusionService {
    DataFusionService::new(manager, FusionConfig::default().strategy(strategy))
}

/// Fixed JSON answer per provider name.
fn scripted(
    answers: &'static [(&'static str, i64)],
) -> impl Fn(Arc<dyn DataProvider>) -> Ready<parlay_gateway::Result<DataResponse<Value>>> {
    move |provider| {
        let name = provider.name().to_string();
        let score = answers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, s)| *s)
            .unwrap_or_default();
        ready(Ok(DataResponse::fresh(json!({ "score": score }), name)))
    }
}

#[tokio::test]
async fn disagreeing_sources_yield_one_conflict() {
    let manager = manager_with(&[("a", plain()), ("b", plain())]).await;
    let fusion = service(manager, ConflictResolution::HighestConfidence);

    let result = fusion
        .fuse_data(&["a", "b"], scripted(&[("a", 10), ("b", 12)]))
        .await
        .unwrap();

    assert_eq!(result.conflicts.len(), 1);
    let conflict = &result.conflicts[0];
    assert_eq!(conflict.field, "score");
    assert_eq!(conflict.values.len(), 2);
    assert_eq!(conflict.resolution, ConflictResolution::HighestConfidence);
    assert!(!result.valid);
    assert!((0.0..=1.0).contains(&result.confidence));
}

#[tokio::test]
async fn agreeing_sources_are_valid() {
    let manager = manager_with(&[("a", plain()), ("b", plain())]).await;
    let fusion = service(manager, ConflictResolution::HighestConfidence);

    let result = fusion.fuse_current_week_games(&["a", "b"]).await.unwrap();
    assert!(result.conflicts.is_empty());
    assert_eq!(result.sources, ["a", "b"]);
    assert!(!result.data.is_empty());
    // healthy 0.3 + fast 0.2 + medium quality 0.1 on top of 0.5
    assert!((result.confidence - 1.0).abs() < 1e-9);
    assert!(result.valid);
}

#[tokio::test]
async fn highest_confidence_prefers_better_quality() {
    let high = SimulationSettings {
        data_quality: DataQuality::High,
        value_offset: 20,
        ..Default::default()
    };
    let low = SimulationSettings {
        healthy: false,
        data_quality: DataQuality::Low,
        ..Default::default()
    };
    let manager = manager_with(&[("low", sim(low)), ("high", sim(high))]).await;
    manager.check_health().await;
    let fusion = service(manager, ConflictResolution::HighestConfidence);

    let result = fusion.fuse_team_stats(&["low", "high"], "12").await.unwrap();
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].field, "points_for");
    assert_eq!(result.data.points_for, 350 + 60 + 20);
}

#[tokio::test]
async fn majority_wins_and_ties_go_to_first_source() {
    let manager = manager_with(&[("a", plain()), ("b", plain()), ("c", plain())]).await;
    let fusion = service(Arc::clone(&manager), ConflictResolution::Majority);

    let result = fusion
        .fuse_data(&["a", "b", "c"], scripted(&[("a", 7), ("b", 9), ("c", 9)]))
        .await
        .unwrap();
    assert_eq!(result.data["score"], 9);
    assert_eq!(result.conflicts[0].resolved_value, json!(9));

    let result = fusion
        .fuse_data(&["a", "b"], scripted(&[("a", 7), ("b", 9)]))
        .await
        .unwrap();
    assert_eq!(result.data["score"], 7);
}

#[tokio::test]
async fn most_recent_uses_response_timestamp() {
    let manager = manager_with(&[("old", plain()), ("new", plain())]).await;
    let fusion = service(manager, ConflictResolution::MostRecent);

    let result = fusion
        .fuse_data(&["old", "new"], |provider| {
            let name = provider.name().to_string();
            async move {
                let (score, age) = if name == "old" { (1, 3600) } else { (2, 0) };
                let mut response = DataResponse::fresh(json!({ "score": score }), name);
                response.timestamp = Utc::now() - chrono::Duration::seconds(age);
                Ok::<_, ParlayError>(response)
            }
        })
        .await
        .unwrap();
    assert_eq!(result.data["score"], 2);
    assert_eq!(result.conflicts[0].resolution, ConflictResolution::MostRecent);
}

#[tokio::test]
async fn failing_and_unknown_sources_are_dropped() {
    let flaky = SimulationSettings {
        fail_every: Some(1),
        ..Default::default()
    };
    let manager = manager_with(&[("ok", plain()), ("flaky", sim(flaky))]).await;
    let fusion = service(manager, ConflictResolution::HighestConfidence);

    let result = fusion
        .fuse_team_roster(&["ok", "flaky", "missing"], "2")
        .await
        .unwrap();
    assert_eq!(result.sources, ["ok"]);
    assert!(result.valid, "a single source needs no agreement");
    assert_eq!(result.data.len(), 6);
}

#[tokio::test]
async fn no_successful_source_is_an_error() {
    let manager = manager_with(&[("a", plain())]).await;
    let fusion = service(manager, ConflictResolution::HighestConfidence);

    let err = match fusion
        .fuse_data(&["a", "missing"], |_provider| async {
            Err::<DataResponse<Value>, ParlayError>(ParlayError::Http("connection reset".into()))
        })
        .await
    {
        Ok(_) => panic!("fusion succeeded without data"),
        Err(e) => e,
    };
    assert!(matches!(err, ParlayError::NoValidData));
}

#[tokio::test]
async fn conflicts_lower_confidence() {
    let manager = manager_with(&[("a", plain()), ("b", plain())]).await;
    let fusion = service(manager, ConflictResolution::HighestConfidence);

    let result = fusion
        .fuse_data(&["a", "b"], |provider| {
            let offset = if provider.name() == "a" { 0 } else { 1 };
            ready(Ok(DataResponse::fresh(
                json!({ "x": offset, "y": [offset, 0], "z": "same" }),
                provider.name(),
            )))
        })
        .await
        .unwrap();
    let mut fields: Vec<&str> = result.conflicts.iter().map(|c| c.field.as_str()).collect();
    fields.sort();
    assert_eq!(fields, ["x", "y.0"]);
    assert!((result.confidence - 0.8).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn slow_unhealthy_sources_score_low_but_stay_bounded() {
    let slow = SimulationSettings {
        healthy: false,
        latency: Duration::from_secs(5),
        data_quality: DataQuality::Low,
        ..Default::default()
    };
    let manager = manager_with(&[("slow", sim(slow))]).await;
    manager.check_health().await;
    let fusion = service(manager, ConflictResolution::HighestConfidence);

    let result = fusion.fuse_current_week_games(&["slow"]).await.unwrap();
    assert!((result.confidence - 0.5).abs() < 1e-9);
    assert!(result.valid);
}
