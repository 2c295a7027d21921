//! ESPN public site API data provider.
//!
//! Uses the unauthenticated `site.api.espn.com` NFL endpoints:
//!
//! | Operation            | Route                                         |
//! |----------------------|-----------------------------------------------|
//! | current week games   | `/scoreboard`                                 |
//! | games by week        | `/scoreboard?dates=YYYY&seasontype=2&week=N`  |
//! | team roster          | `/teams/{id}/roster`                          |
//! | team stats           | `/teams/{id}` (season record)                 |
//! | weather              | `/summary?event={id}`                         |
//!
//! Player stats and injury reports are not exposed by these routes.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::http::{build_client, check_status, join};
use super::retry::{RetryConfig, with_retry, with_timeout};
use super::state::ProviderState;
use super::traits::{DataProvider, Provider};
use crate::telemetry;
use crate::types::{
    DataProviderConfig, DataQuality, DataResponse, Game, GameStatus, InjuryReport, Player,
    PlayerStats, ProviderConfig, ProviderConfigUpdate, ProviderHealth, ProviderKind,
    ProviderMetadata, TeamRef, TeamStats, WeatherConditions,
};
use crate::{ParlayError, Result};

/// Regular season.
const SEASON_TYPE_REGULAR: u8 = 2;

pub struct EspnDataProvider {
    state: ProviderState<DataProviderConfig>,
    http: Client,
}

impl EspnDataProvider {
    pub fn new(config: DataProviderConfig) -> Result<Self> {
        Ok(Self {
            state: ProviderState::new(config.common.name.clone(), config),
            http: build_client()?,
        })
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let config = self.state.config();
        let url = join(&config.base_url, path);
        let response = self.http.get(url).query(query).send().await?;
        Ok(check_status(response, "ESPN").await?.json().await?)
    }

    /// One domain call: lifecycle checks, retry, deadline, metrics.
    async fn call<T, R>(
        &self,
        operation: &'static str,
        path: &str,
        query: Vec<(&str, String)>,
        convert: impl FnOnce(T) -> Result<R>,
    ) -> Result<DataResponse<R>>
    where
        T: DeserializeOwned,
    {
        self.state.ensure_not_disposed()?;
        if !self.state.is_initialized() {
            self.initialize().await?;
        }
        let config = self.state.config();
        let retry = RetryConfig::from_retries(config.common.retries);

        let start = Instant::now();
        let result = with_retry(&retry, self.name(), operation, || {
            with_timeout(config.common.timeout, self.fetch::<T>(path, &query))
        })
        .await;
        telemetry::record_request(operation, self.name(), start, result.is_ok());

        let data = convert(result?)?;
        Ok(DataResponse::fresh(data, self.name()))
    }
}

#[async_trait]
impl Provider for EspnDataProvider {
    fn name(&self) -> &str {
        self.state.name()
    }

    fn metadata(&self) -> ProviderMetadata {
        let config = self.state.config();
        ProviderMetadata::new(self.state.name(), "v2", ProviderKind::Data)
            .with_capability("games")
            .with_capability("rosters")
            .with_capability("team_stats")
            .with_capability("weather")
            .with_cost_per_request(0.0)
            .with_data_quality(DataQuality::High)
            .with_endpoint(config.base_url)
    }

    fn config(&self) -> ProviderConfig {
        ProviderConfig::Data(self.state.config())
    }

    async fn initialize(&self) -> Result<()> {
        let config = self.state.config();
        reqwest::Url::parse(&config.base_url).map_err(|e| {
            ParlayError::InvalidConfig(format!("invalid base URL '{}': {e}", config.base_url))
        })?;
        if self.state.mark_initialized() {
            debug!(provider = self.name(), base_url = %config.base_url, "ESPN provider initialized");
        }
        Ok(())
    }

    async fn validate_connection(&self) -> bool {
        let config = self.state.config();
        let start = Instant::now();
        let result = with_timeout(
            config.common.timeout,
            self.fetch::<serde_json::Value>("scoreboard", &[]),
        )
        .await;
        let elapsed = start.elapsed();
        match result {
            Ok(_) => {
                self.state.record_probe(true, Some(elapsed), None);
                true
            }
            Err(e) => {
                self.state.record_probe(false, Some(elapsed), Some(e.to_string()));
                false
            }
        }
    }

    fn health(&self) -> ProviderHealth {
        self.state.health()
    }

    fn update_config(&self, update: &ProviderConfigUpdate) -> Result<()> {
        if let Some(url) = &update.base_url {
            reqwest::Url::parse(url)
                .map_err(|e| ParlayError::InvalidConfig(format!("invalid base URL '{url}': {e}")))?;
        }
        self.state
            .update_config(update.changes_connection(), |c| c.apply(update));
        Ok(())
    }

    async fn dispose(&self) -> Result<()> {
        self.state.mark_disposed();
        Ok(())
    }
}

#[async_trait]
impl DataProvider for EspnDataProvider {
    async fn current_week_games(&self) -> Result<DataResponse<Vec<Game>>> {
        self.call("current_week_games", "scoreboard", Vec::new(), Scoreboard::into_games)
            .await
    }

    async fn games_by_week(&self, season: u16, week: u8) -> Result<DataResponse<Vec<Game>>> {
        if !(1..=18).contains(&week) {
            return Err(ParlayError::InvalidInput(format!(
                "week {week} outside regular season 1-18"
            )));
        }
        let query = vec![
            ("dates", season.to_string()),
            ("seasontype", SEASON_TYPE_REGULAR.to_string()),
            ("week", week.to_string()),
        ];
        self.call("games_by_week", "scoreboard", query, Scoreboard::into_games)
            .await
    }

    async fn team_roster(&self, team_id: &str) -> Result<DataResponse<Vec<Player>>> {
        let path = format!("teams/{team_id}/roster");
        let team_id = team_id.to_string();
        self.call("team_roster", &path, Vec::new(), move |roster: RosterPayload| {
            Ok(roster.into_players(&team_id))
        })
        .await
    }

    async fn player_stats(&self, _player_id: &str) -> Result<DataResponse<PlayerStats>> {
        Err(ParlayError::NotImplemented("ESPN player stats"))
    }

    async fn team_stats(&self, team_id: &str) -> Result<DataResponse<TeamStats>> {
        let path = format!("teams/{team_id}");
        self.call("team_stats", &path, Vec::new(), TeamPayload::into_stats)
            .await
    }

    async fn injury_reports(&self, _team_id: &str) -> Result<DataResponse<Vec<InjuryReport>>> {
        Err(ParlayError::NotImplemented("ESPN injury reports"))
    }

    async fn weather(&self, game_id: &str) -> Result<DataResponse<WeatherConditions>> {
        let game_id_owned = game_id.to_string();
        self.call(
            "weather",
            "summary",
            vec![("event", game_id.to_string())],
            move |summary: SummaryPayload| Ok(summary.into_weather(game_id_owned)),
        )
        .await
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Deserialize)]
struct Scoreboard {
    #[serde(default)]
    season: Option<SeasonRef>,
    #[serde(default)]
    week: Option<WeekRef>,
    #[serde(default)]
    events: Vec<Event>,
}

#[derive(Deserialize)]
struct SeasonRef {
    year: u16,
}

#[derive(Deserialize)]
struct WeekRef {
    number: u8,
}

#[derive(Deserialize)]
struct Event {
    id: String,
    date: String,
    #[serde(default)]
    competitions: Vec<Competition>,
    #[serde(default)]
    status: Option<EventStatus>,
}

#[derive(Deserialize)]
struct Competition {
    #[serde(default)]
    competitors: Vec<Competitor>,
    #[serde(default)]
    venue: Option<Venue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Competitor {
    home_away: String,
    team: EspnTeam,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnTeam {
    id: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    abbreviation: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Venue {
    full_name: String,
    #[serde(default)]
    indoor: Option<bool>,
}

#[derive(Deserialize)]
struct EventStatus {
    #[serde(rename = "type")]
    kind: StatusType,
}

#[derive(Deserialize)]
struct StatusType {
    state: String,
}

/// ESPN dates omit seconds ("2025-09-07T17:00Z").
fn parse_espn_date(raw: &str) -> Result<DateTime<Utc>> {
    let padded;
    let candidate = match raw.strip_suffix('Z') {
        Some(head) if head.len() == "YYYY-MM-DDTHH:MM".len() => {
            padded = format!("{head}:00Z");
            padded.as_str()
        }
        _ => raw,
    };
    DateTime::parse_from_rfc3339(candidate)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| ParlayError::DataError(format!("bad event date '{raw}': {e}")))
}

impl Scoreboard {
    fn into_games(self) -> Result<Vec<Game>> {
        let season = self.season.map(|s| s.year).unwrap_or_default();
        let week = self.week.map(|w| w.number).unwrap_or_default();
        self.events
            .into_iter()
            .map(|event| {
                let competition = event.competitions.into_iter().next().ok_or_else(|| {
                    ParlayError::DataError(format!("event {} has no competition", event.id))
                })?;
                let mut home = None;
                let mut away = None;
                for c in competition.competitors {
                    let team = TeamRef::new(c.team.id, c.team.display_name, c.team.abbreviation);
                    match c.home_away.as_str() {
                        "home" => home = Some(team),
                        "away" => away = Some(team),
                        _ => {}
                    }
                }
                let (Some(home_team), Some(away_team)) = (home, away) else {
                    return Err(ParlayError::DataError(format!(
                        "event {} is missing a home or away team",
                        event.id
                    )));
                };
                let status = match event.status.as_ref().map(|s| s.kind.state.as_str()) {
                    Some("in") => GameStatus::InProgress,
                    Some("post") => GameStatus::Final,
                    _ => GameStatus::Scheduled,
                };
                Ok(Game {
                    date: parse_espn_date(&event.date)?,
                    id: event.id,
                    season,
                    week,
                    home_team,
                    away_team,
                    venue: competition.venue.map(|v| v.full_name),
                    status,
                })
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct RosterPayload {
    #[serde(default)]
    athletes: Vec<AthleteGroup>,
}

#[derive(Deserialize)]
struct AthleteGroup {
    #[serde(default)]
    items: Vec<Athlete>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Athlete {
    id: String,
    full_name: String,
    #[serde(default)]
    position: Option<Position>,
    #[serde(default)]
    jersey: Option<String>,
}

#[derive(Deserialize)]
struct Position {
    abbreviation: String,
}

impl RosterPayload {
    fn into_players(self, team_id: &str) -> Vec<Player> {
        self.athletes
            .into_iter()
            .flat_map(|group| group.items)
            .map(|a| Player {
                id: a.id,
                name: a.full_name,
                position: a.position.map(|p| p.abbreviation).unwrap_or_default(),
                jersey: a.jersey,
                team_id: team_id.to_string(),
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct TeamPayload {
    team: TeamDetail,
}

#[derive(Deserialize)]
struct TeamDetail {
    id: String,
    #[serde(default)]
    record: Option<RecordGroup>,
}

#[derive(Deserialize)]
struct RecordGroup {
    #[serde(default)]
    items: Vec<RecordItem>,
}

#[derive(Deserialize)]
struct RecordItem {
    summary: String,
    #[serde(default)]
    stats: Vec<RecordStat>,
}

#[derive(Deserialize)]
struct RecordStat {
    name: String,
    value: f64,
}

impl TeamPayload {
    fn into_stats(self) -> Result<TeamStats> {
        let mut stats = TeamStats {
            team_id: self.team.id,
            ..TeamStats::default()
        };
        let Some(item) = self.team.record.and_then(|r| r.items.into_iter().next()) else {
            return Ok(stats);
        };

        let mut parts = item.summary.split('-').map(|n| n.trim().parse::<u32>());
        let mut next = || parts.next().transpose();
        let bad = |e: std::num::ParseIntError| ParlayError::DataError(format!("bad record '{}': {e}", item.summary));
        stats.wins = next().map_err(bad)?.unwrap_or_default();
        stats.losses = next().map_err(bad)?.unwrap_or_default();
        stats.ties = next().map_err(bad)?.unwrap_or_default();

        for stat in &item.stats {
            let value = stat.value.max(0.0).round() as u32;
            match stat.name.as_str() {
                "pointsFor" => stats.points_for = value,
                "pointsAgainst" => stats.points_against = value,
                "season" => stats.season = value as u16,
                _ => {}
            }
        }
        Ok(stats)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryPayload {
    #[serde(default)]
    game_info: Option<GameInfo>,
}

#[derive(Deserialize)]
struct GameInfo {
    #[serde(default)]
    venue: Option<Venue>,
    #[serde(default)]
    weather: Option<EspnWeather>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnWeather {
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    display_value: Option<String>,
}

impl SummaryPayload {
    fn into_weather(self, game_id: String) -> WeatherConditions {
        let info = self.game_info;
        let indoor = info
            .as_ref()
            .and_then(|i| i.venue.as_ref())
            .and_then(|v| v.indoor)
            .unwrap_or(false);
        let weather = info.and_then(|i| i.weather);
        match weather {
            Some(w) if !indoor => WeatherConditions {
                game_id,
                temperature_f: w.temperature,
                condition: w.display_value.unwrap_or_else(|| "Unknown".into()),
                wind_mph: None,
                indoor,
            },
            _ => WeatherConditions {
                game_id,
                temperature_f: None,
                condition: if indoor { "Indoor" } else { "Unknown" }.into(),
                wind_mph: None,
                indoor,
            },
        }
    }
}
