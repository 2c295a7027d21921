//! TTL response cache for data providers.
//!
//! [`CachingDataProvider`] decorates any [`DataProvider`]. Responses are
//! stored whole (data + provenance) keyed on operation and arguments; a hit
//! is returned with `cached: true` and the original fetch timestamp, which
//! is what lets fusion discount cached answers. Lifecycle calls pass through
//! to the inner provider; disposal and connection changes drop the cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::traits::{DataProvider, Provider};
use crate::Result;
use crate::telemetry;
use crate::types::{
    DataResponse, Game, InjuryReport, Player, PlayerStats, ProviderConfig, ProviderConfigUpdate,
    ProviderHealth, ProviderMetadata, TeamStats, WeatherConditions,
};

/// Default maximum number of cached responses.
pub const DEFAULT_MAX_ENTRIES: u64 = 1_000;

/// Data provider decorator caching successful responses for a TTL.
pub struct CachingDataProvider {
    inner: Arc<dyn DataProvider>,
    cache: Cache<String, serde_json::Value>,
    ttl: Duration,
}

impl CachingDataProvider {
    pub fn new(inner: Arc<dyn DataProvider>, ttl: Duration) -> Self {
        Self::with_capacity(inner, ttl, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(inner: Arc<dyn DataProvider>, ttl: Duration, max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self { inner, cache, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drop every cached response.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    async fn cached<T, F, Fut>(&self, operation: &str, key: String, fetch: F) -> Result<DataResponse<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<DataResponse<T>>>,
    {
        if let Some(value) = self.cache.get(&key).await {
            match serde_json::from_value::<DataResponse<T>>(value) {
                Ok(mut response) => {
                    metrics::counter!(telemetry::CACHE_HITS_TOTAL, "operation" => operation.to_owned())
                        .increment(1);
                    response.cached = true;
                    return Ok(response);
                }
                Err(e) => {
                    debug!(operation, error = %e, "discarding undecodable cache entry");
                    self.cache.invalidate(&key).await;
                }
            }
        }
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "operation" => operation.to_owned())
            .increment(1);
        let response = fetch().await?;
        let value = serde_json::to_value(&response)?;
        self.cache.insert(key, value).await;
        Ok(response)
    }
}

#[async_trait]
impl Provider for CachingDataProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn metadata(&self) -> ProviderMetadata {
        self.inner.metadata()
    }

    fn config(&self) -> ProviderConfig {
        self.inner.config()
    }

    async fn initialize(&self) -> Result<()> {
        self.inner.initialize().await
    }

    async fn validate_connection(&self) -> bool {
        self.inner.validate_connection().await
    }

    fn health(&self) -> ProviderHealth {
        self.inner.health()
    }

    fn update_config(&self, update: &ProviderConfigUpdate) -> Result<()> {
        if update.changes_connection() {
            self.cache.invalidate_all();
        }
        self.inner.update_config(update)
    }

    async fn dispose(&self) -> Result<()> {
        self.cache.invalidate_all();
        self.inner.dispose().await
    }
}

#[async_trait]
impl DataProvider for CachingDataProvider {
    async fn current_week_games(&self) -> Result<DataResponse<Vec<Game>>> {
        self.cached("current_week_games", "current_week_games".into(), || {
            self.inner.current_week_games()
        })
        .await
    }

    async fn games_by_week(&self, season: u16, week: u8) -> Result<DataResponse<Vec<Game>>> {
        self.cached("games_by_week", format!("games_by_week:{season}:{week}"), || {
            self.inner.games_by_week(season, week)
        })
        .await
    }

    async fn team_roster(&self, team_id: &str) -> Result<DataResponse<Vec<Player>>> {
        self.cached("team_roster", format!("team_roster:{team_id}"), || {
            self.inner.team_roster(team_id)
        })
        .await
    }

    async fn player_stats(&self, player_id: &str) -> Result<DataResponse<PlayerStats>> {
        self.cached("player_stats", format!("player_stats:{player_id}"), || {
            self.inner.player_stats(player_id)
        })
        .await
    }

    async fn team_stats(&self, team_id: &str) -> Result<DataResponse<TeamStats>> {
        self.cached("team_stats", format!("team_stats:{team_id}"), || {
            self.inner.team_stats(team_id)
        })
        .await
    }

    async fn injury_reports(&self, team_id: &str) -> Result<DataResponse<Vec<InjuryReport>>> {
        self.cached("injury_reports", format!("injury_reports:{team_id}"), || {
            self.inner.injury_reports(team_id)
        })
        .await
    }

    async fn weather(&self, game_id: &str) -> Result<DataResponse<WeatherConditions>> {
        self.cached("weather", format!("weather:{game_id}"), || {
            self.inner.weather(game_id)
        })
        .await
    }
}
