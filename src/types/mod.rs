//! Public types for the parlay gateway API.

mod config;
mod nfl;
mod parlay;
mod provider;
mod selection;

pub use config::{
    AiProviderConfig, CommonSettings, DataProviderConfig, ProviderConfig, ProviderConfigUpdate,
    SimulationSettings,
};
pub use nfl::{
    DataResponse, Game, GameRosters, GameStatus, InjuryReport, InjuryStatus, Player, PlayerStats,
    TeamRef, TeamStats, WeatherConditions,
};
pub use parlay::{
    AiProviderResponse, BetType, PARLAY_LEGS, Parlay, ParlayContext, ParlayLeg, RiskLevel,
    TokenUsage,
};
pub use provider::{DataQuality, ProviderHealth, ProviderKind, ProviderMetadata};
pub use selection::{
    ProviderSelectionCriteria, ProviderSelectionResult, SelectionPriority, SelectionRequest,
};
