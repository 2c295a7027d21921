//! NFL data types returned by data providers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference to a team inside a game or roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRef {
    pub id: String,
    pub name: String,
    pub abbreviation: String,
}

impl TeamRef {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        abbreviation: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            abbreviation: abbreviation.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Scheduled,
    InProgress,
    Final,
}

/// One scheduled or played game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub season: u16,
    pub week: u8,
    pub date: DateTime<Utc>,
    pub home_team: TeamRef,
    pub away_team: TeamRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    pub status: GameStatus,
}

/// One rostered player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    /// Position abbreviation (QB, RB, WR, TE, ...).
    pub position: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jersey: Option<String>,
    pub team_id: String,
}

/// Both rosters of a game, as handed to AI providers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameRosters {
    pub home: Vec<Player>,
    pub away: Vec<Player>,
}

impl GameRosters {
    pub fn new(home: Vec<Player>, away: Vec<Player>) -> Self {
        Self { home, away }
    }

    /// True if either side has no players.
    pub fn is_incomplete(&self) -> bool {
        self.home.is_empty() || self.away.is_empty()
    }

    /// All players, home side first.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.home.iter().chain(self.away.iter())
    }
}

/// Season totals for one player.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub player_id: String,
    pub season: u16,
    pub games_played: u32,
    pub passing_yards: u32,
    pub rushing_yards: u32,
    pub receiving_yards: u32,
    pub receptions: u32,
    pub touchdowns: u32,
}

/// Season record for one team.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamStats {
    pub team_id: String,
    pub season: u16,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub points_for: u32,
    pub points_against: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjuryStatus {
    Questionable,
    Doubtful,
    Out,
    InjuredReserve,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjuryReport {
    pub player_id: String,
    pub player_name: String,
    pub team_id: String,
    pub status: InjuryStatus,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherConditions {
    pub game_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_f: Option<f64>,
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_mph: Option<f64>,
    pub indoor: bool,
}

/// A data provider result with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
    /// Name of the provider that produced the data.
    pub provider: String,
    /// Whether the value was served from a cache.
    pub cached: bool,
    /// When the data was fetched from the backend.
    pub timestamp: DateTime<Utc>,
}

impl<T> DataResponse<T> {
    /// Fresh (uncached) response stamped now.
    pub fn fresh(data: T, provider: impl Into<String>) -> Self {
        Self {
            data,
            provider: provider.into(),
            cached: false,
            timestamp: Utc::now(),
        }
    }
}
