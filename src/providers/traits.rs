//! Provider traits for capability-specific implementations.
//!
//! Every provider implements the lifecycle/health surface of [`Provider`]
//! plus exactly one capability trait: [`AiProvider`] for parlay generation
//! or [`DataProvider`] for sports data reads. The registry stores them as a
//! [`ProviderHandle`] so both kinds share one name keyspace.
//!
//! # Lifecycle
//!
//! - `initialize` is idempotent and may be called any number of times.
//! - `update_config` changing connection parameters clears the initialized
//!   state; the next domain call re-initializes lazily.
//! - after `dispose` every domain call fails with `Disposed` until
//!   `initialize` runs again.

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;
use crate::types::{
    AiProviderResponse, DataResponse, Game, GameRosters, InjuryReport, ParlayContext, Player,
    PlayerStats, ProviderConfig, ProviderConfigUpdate, ProviderHealth, ProviderKind,
    ProviderMetadata, TeamStats, WeatherConditions,
};

// ============================================================================
// Lifecycle
// ============================================================================

/// Lifecycle, health and configuration surface shared by all providers.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name for logging/debugging.
    fn name(&self) -> &str;

    /// Static description of the provider.
    fn metadata(&self) -> ProviderMetadata;

    /// Snapshot of the current configuration.
    fn config(&self) -> ProviderConfig;

    /// One-time setup. Safe to call repeatedly.
    async fn initialize(&self) -> Result<()>;

    /// Cheap liveness probe. Never errors; any failure is `false`.
    async fn validate_connection(&self) -> bool;

    /// Snapshot of the provider's own view of its health.
    fn health(&self) -> ProviderHealth;

    /// Merge a partial configuration.
    fn update_config(&self, update: &ProviderConfigUpdate) -> Result<()>;

    /// Release resources.
    async fn dispose(&self) -> Result<()>;
}

// ============================================================================
// AI Provider
// ============================================================================

/// Provider that generates parlays.
#[async_trait]
pub trait AiProvider: Provider {
    /// Generate a parlay for `game`.
    ///
    /// Fails fast with `InvalidInput` when either roster is empty or the
    /// context has no strategy.
    async fn generate_parlay(
        &self,
        game: &Game,
        rosters: &GameRosters,
        context: &ParlayContext,
    ) -> Result<AiProviderResponse>;
}

// ============================================================================
// Data Provider
// ============================================================================

/// Provider of NFL data. Every read carries provenance.
#[async_trait]
pub trait DataProvider: Provider {
    /// Games of the current week.
    async fn current_week_games(&self) -> Result<DataResponse<Vec<Game>>>;

    /// Games of a given regular-season week.
    async fn games_by_week(&self, season: u16, week: u8) -> Result<DataResponse<Vec<Game>>>;

    /// Active roster of a team.
    async fn team_roster(&self, team_id: &str) -> Result<DataResponse<Vec<Player>>>;

    /// Season totals for a player.
    async fn player_stats(&self, player_id: &str) -> Result<DataResponse<PlayerStats>>;

    /// Season record for a team.
    async fn team_stats(&self, team_id: &str) -> Result<DataResponse<TeamStats>>;

    /// Current injury report for a team.
    async fn injury_reports(&self, team_id: &str) -> Result<DataResponse<Vec<InjuryReport>>>;

    /// Forecast or observed weather for a game.
    async fn weather(&self, game_id: &str) -> Result<DataResponse<WeatherConditions>>;
}

// ============================================================================
// Handle
// ============================================================================

/// A registered provider of either kind.
#[derive(Clone)]
pub enum ProviderHandle {
    Ai(Arc<dyn AiProvider>),
    Data(Arc<dyn DataProvider>),
}

impl ProviderHandle {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Ai(_) => ProviderKind::Ai,
            Self::Data(_) => ProviderKind::Data,
        }
    }

    /// The lifecycle surface, whichever the kind.
    pub fn provider(&self) -> &dyn Provider {
        match self {
            Self::Ai(p) => p.as_ref(),
            Self::Data(p) => p.as_ref(),
        }
    }

    pub fn as_ai(&self) -> Option<&Arc<dyn AiProvider>> {
        match self {
            Self::Ai(p) => Some(p),
            Self::Data(_) => None,
        }
    }

    pub fn as_data(&self) -> Option<&Arc<dyn DataProvider>> {
        match self {
            Self::Data(p) => Some(p),
            Self::Ai(_) => None,
        }
    }

    pub fn into_ai(self) -> Option<Arc<dyn AiProvider>> {
        match self {
            Self::Ai(p) => Some(p),
            Self::Data(_) => None,
        }
    }

    pub fn into_data(self) -> Option<Arc<dyn DataProvider>> {
        match self {
            Self::Data(p) => Some(p),
            Self::Ai(_) => None,
        }
    }

    /// Whether both handles point at the same provider instance.
    pub fn same_as(&self, other: &ProviderHandle) -> bool {
        match (self, other) {
            (Self::Ai(a), Self::Ai(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (Self::Data(a), Self::Data(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            _ => false,
        }
    }
}

impl std::fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("kind", &self.kind())
            .field("name", &self.provider().name())
            .finish()
    }
}

impl From<Arc<dyn AiProvider>> for ProviderHandle {
    fn from(provider: Arc<dyn AiProvider>) -> Self {
        Self::Ai(provider)
    }
}

impl From<Arc<dyn DataProvider>> for ProviderHandle {
    fn from(provider: Arc<dyn DataProvider>) -> Self {
        Self::Data(provider)
    }
}
