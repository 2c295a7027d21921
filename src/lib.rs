//! Parlay gateway - provider abstraction and selection for NFL parlay
//! generation.
//!
//! Parlays are produced by AI providers fed with NFL data from data
//! providers. This crate gives both kinds a common lifecycle, builds them
//! from configuration, tracks their health and usage, and picks the best
//! one for a request. Answers from several data providers can be fused
//! into one result with conflicts reported.
//!
//! # Example
//!
//! ```rust,no_run
//! use parlay_gateway::{
//!     GameRosters, ParlayContext, ProviderManager, RiskLevel, SelectionPriority,
//! };
//!
//! #[tokio::main]
//! async fn main() -> parlay_gateway::Result<()> {
//!     let manager = ProviderManager::builder().build().await?;
//!
//!     let data = manager.get_data_provider(None, None).await?;
//!     let games = data.current_week_games().await?.data;
//!     let game = games.first().cloned().expect("a scheduled game");
//!     let home = data.team_roster(&game.home_team.id).await?.data;
//!     let away = data.team_roster(&game.away_team.id).await?.data;
//!
//!     let ai = manager.select_ai_provider(SelectionPriority::Performance).await?;
//!     let response = ai
//!         .provider
//!         .generate_parlay(
//!             &game,
//!             &GameRosters { home, away },
//!             &ParlayContext::new("value_hunting").risk_level(RiskLevel::Moderate),
//!         )
//!         .await?;
//!     println!("{} legs via {} ({})", response.parlay.legs.len(), ai.name, ai.reason);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod fusion;
pub mod manager;
pub mod providers;
pub mod telemetry;
pub mod types;
pub mod version;

pub use error::{ParlayError, Result};
pub use fusion::{ConflictResolution, DataFusionService, FusedDataResult, FusionConfig};
pub use manager::{Environment, ProviderManager, ProviderManagerBuilder};
pub use providers::{AiProvider, DataProvider, Provider, ProviderHandle};
pub use version::PKG_VERSION;

pub use types::{
    AiProviderConfig, AiProviderResponse, BetType, DataProviderConfig, DataQuality, DataResponse,
    Game, GameRosters, GameStatus, InjuryReport, InjuryStatus, Parlay, ParlayContext, ParlayLeg,
    Player, PlayerStats, ProviderConfig, ProviderConfigUpdate, ProviderHealth, ProviderKind,
    ProviderMetadata, ProviderSelectionCriteria, ProviderSelectionResult, RiskLevel,
    SelectionPriority, SelectionRequest, TeamRef, TeamStats, TokenUsage, WeatherConditions,
};
