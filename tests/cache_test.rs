//! TTL cache decorator over data providers.

use std::sync::Arc;
use std::time::Duration;

use parlay_gateway::providers::{
    CachingDataProvider, FactoryConfig, MockDataProvider, ProviderFactory,
};
use parlay_gateway::{DataProvider, Provider, ProviderConfigUpdate};

fn mock() -> Arc<MockDataProvider> {
    let config = FactoryConfig::default().data_config("mock", "mock", &ProviderConfigUpdate::new());
    Arc::new(MockDataProvider::new(config))
}

fn cached(inner: &Arc<MockDataProvider>, ttl: Duration) -> CachingDataProvider {
    CachingDataProvider::new(Arc::clone(inner) as Arc<dyn DataProvider>, ttl)
}

#[tokio::test]
async fn repeat_call_is_served_from_cache() {
    let inner = mock();
    let provider = cached(&inner, Duration::from_secs(60));

    let first = provider.team_roster("12").await.unwrap();
    let second = provider.team_roster("12").await.unwrap();

    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(first.timestamp, second.timestamp);
    assert_eq!(first.data, second.data);
    assert_eq!(inner.call_count(), 1);
}

#[tokio::test]
async fn distinct_arguments_are_distinct_entries() {
    let inner = mock();
    let provider = cached(&inner, Duration::from_secs(60));

    provider.team_roster("12").await.unwrap();
    let other = provider.team_roster("2").await.unwrap();
    provider.team_stats("12").await.unwrap();

    assert!(!other.cached);
    assert_eq!(inner.call_count(), 3);
}

#[tokio::test]
async fn errors_are_not_cached() {
    let config = FactoryConfig::default().data_config(
        "mock",
        "flaky",
        &ProviderConfigUpdate::new().simulation(parlay_gateway::types::SimulationSettings {
            fail_every: Some(1),
            ..Default::default()
        }),
    );
    let inner = Arc::new(MockDataProvider::new(config));
    let provider = cached(&inner, Duration::from_secs(60));

    assert!(provider.current_week_games().await.is_err());
    assert!(provider.current_week_games().await.is_err());
    assert_eq!(inner.call_count(), 2);
}

#[tokio::test]
async fn entries_expire_after_ttl() {
    let inner = mock();
    let provider = cached(&inner, Duration::from_millis(50));

    provider.current_week_games().await.unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    let again = provider.current_week_games().await.unwrap();

    assert!(!again.cached);
    assert_eq!(inner.call_count(), 2);
}

#[tokio::test]
async fn connection_change_invalidates() {
    let inner = mock();
    let provider = cached(&inner, Duration::from_secs(60));

    provider.team_stats("12").await.unwrap();
    provider
        .update_config(&ProviderConfigUpdate::new().priority(3))
        .unwrap();
    assert!(provider.team_stats("12").await.unwrap().cached);

    provider
        .update_config(&ProviderConfigUpdate::new().base_url("http://localhost:9"))
        .unwrap();
    assert!(!provider.team_stats("12").await.unwrap().cached);
}

#[tokio::test]
async fn manual_invalidation_clears_entries() {
    let inner = mock();
    let provider = cached(&inner, Duration::from_secs(60));

    provider.team_stats("12").await.unwrap();
    provider.invalidate_all();
    assert!(!provider.team_stats("12").await.unwrap().cached);
    assert_eq!(inner.call_count(), 2);
}

#[tokio::test]
async fn decorator_is_transparent_for_lifecycle() {
    let inner = mock();
    let provider = cached(&inner, Duration::from_secs(60));

    assert_eq!(provider.name(), "mock");
    assert_eq!(provider.metadata(), inner.metadata());
    assert_eq!(provider.ttl(), Duration::from_secs(60));

    provider.dispose().await.unwrap();
    assert!(provider.team_stats("12").await.is_err());
}

#[tokio::test]
async fn factory_wraps_when_ttl_configured() {
    let factory = ProviderFactory::with_builtin_creators();

    let plain = factory
        .create_data_provider("mock", "plain", &ProviderConfigUpdate::new())
        .unwrap();
    plain.team_roster("12").await.unwrap();
    assert!(!plain.team_roster("12").await.unwrap().cached);

    let wrapped = factory
        .create_data_provider(
            "mock",
            "wrapped",
            &ProviderConfigUpdate::new().cache_ttl(Duration::from_secs(300)),
        )
        .unwrap();
    wrapped.team_roster("12").await.unwrap();
    assert!(wrapped.team_roster("12").await.unwrap().cached);
}
