//! Simulated AI and data providers.
//!
//! Both mocks answer from deterministic in-memory data and honour
//! [`SimulationSettings`](crate::types::SimulationSettings): `healthy`
//! drives `validate_connection`, `latency` delays every call, `fail_every`
//! injects a transient failure on every n-th domain call, and
//! `value_offset` shifts generated numbers so two mocks can disagree.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tracing::debug;

use super::state::ProviderState;
use super::traits::{AiProvider, DataProvider, Provider};
use crate::types::{
    AiProviderConfig, AiProviderResponse, BetType, DataProviderConfig, DataResponse, Game,
    GameRosters, GameStatus, InjuryReport, InjuryStatus, PARLAY_LEGS, Parlay, ParlayContext,
    ParlayLeg, Player, PlayerStats, ProviderConfig, ProviderConfigUpdate, ProviderHealth,
    ProviderKind, ProviderMetadata, RiskLevel, SimulationSettings, TeamRef, TeamStats,
    WeatherConditions,
};
use crate::{ParlayError, Result};

const MOCK_VERSION: &str = "1.0.0";
const MOCK_SEASON: u16 = 2025;
const MOCK_WEEK: u8 = 1;

/// Teams of the simulated league: (id, name, abbreviation, indoor stadium).
const TEAMS: &[(&str, &str, &str, bool)] = &[
    ("12", "Kansas City Chiefs", "KC", false),
    ("2", "Buffalo Bills", "BUF", false),
    ("21", "Philadelphia Eagles", "PHI", false),
    ("25", "San Francisco 49ers", "SF", false),
    ("8", "Detroit Lions", "DET", true),
    ("6", "Dallas Cowboys", "DAL", true),
];

/// Roster template: (position, name suffix).
const ROSTER: &[(&str, &str)] = &[
    ("QB", "Quarterback"),
    ("RB", "Running Back"),
    ("WR", "Receiver One"),
    ("WR", "Receiver Two"),
    ("TE", "Tight End"),
    ("K", "Kicker"),
];

/// Shared call counter + failure injection.
struct Simulator {
    calls: AtomicU64,
}

impl Simulator {
    fn new() -> Self {
        Self {
            calls: AtomicU64::new(0),
        }
    }

    /// Apply latency and failure injection for one domain call.
    async fn run(&self, provider: &str, operation: &str, sim: &SimulationSettings) -> Result<u64> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if !sim.latency.is_zero() {
            tokio::time::sleep(sim.latency).await;
        }
        if let Some(every) = sim.fail_every.filter(|n| *n > 0)
            && call % u64::from(every) == 0
        {
            debug!(provider, operation, call, "injecting simulated failure");
            return Err(ParlayError::Api {
                status: 503,
                message: format!("simulated failure on call {call}"),
            });
        }
        Ok(call)
    }

    fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

async fn probe(sim: &SimulationSettings) -> (bool, Duration) {
    let start = Instant::now();
    if !sim.latency.is_zero() {
        tokio::time::sleep(sim.latency).await;
    }
    (sim.healthy, start.elapsed())
}

// ============================================================================
// MockAiProvider
// ============================================================================

/// AI provider that assembles parlays from the supplied rosters.
pub struct MockAiProvider {
    state: ProviderState<AiProviderConfig>,
    simulator: Simulator,
}

impl MockAiProvider {
    pub fn new(config: AiProviderConfig) -> Self {
        Self {
            state: ProviderState::new(config.common.name.clone(), config),
            simulator: Simulator::new(),
        }
    }

    /// Number of domain calls made so far.
    pub fn call_count(&self) -> u64 {
        self.simulator.calls()
    }

    fn prop_leg(player: &Player, context: &ParlayContext, offset: i32) -> Option<ParlayLeg> {
        let (stat, line) = match player.position.as_str() {
            "QB" => ("passing yards", 245.5),
            "RB" => ("rushing yards", 68.5),
            "WR" => ("receiving yards", 62.5),
            "TE" => ("receiving yards", 41.5),
            _ => return None,
        };
        let (odds, confidence) = leg_pricing(context.risk_level);
        Some(ParlayLeg {
            bet_type: BetType::PlayerProp,
            selection: format!("Over {:.1} {stat}", line + f64::from(offset)),
            target: player.name.clone(),
            odds,
            confidence,
            reasoning: format!("{} projects above the line", player.name),
        })
    }
}

fn leg_pricing(risk: RiskLevel) -> (i32, f64) {
    match risk {
        RiskLevel::Conservative => (-130, 0.72),
        RiskLevel::Moderate => (-110, 0.62),
        RiskLevel::Aggressive => (140, 0.45),
    }
}

#[async_trait]
impl Provider for MockAiProvider {
    fn name(&self) -> &str {
        self.state.name()
    }

    fn metadata(&self) -> ProviderMetadata {
        let config = self.state.config();
        ProviderMetadata::new(self.state.name(), MOCK_VERSION, ProviderKind::Ai)
            .with_capability("parlay_generation")
            .with_cost_per_request(0.0)
            .with_model(config.model)
    }

    fn config(&self) -> ProviderConfig {
        ProviderConfig::Ai(self.state.config())
    }

    async fn initialize(&self) -> Result<()> {
        if self.state.mark_initialized() {
            debug!(provider = self.state.name(), "mock AI provider initialized");
        }
        Ok(())
    }

    async fn validate_connection(&self) -> bool {
        let sim = self.state.config().simulation;
        let (healthy, elapsed) = probe(&sim).await;
        let error = (!healthy).then(|| "simulated outage".to_string());
        self.state.record_probe(healthy, Some(elapsed), error);
        healthy
    }

    fn health(&self) -> ProviderHealth {
        self.state.health()
    }

    fn update_config(&self, update: &ProviderConfigUpdate) -> Result<()> {
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
impl AiProvider for MockAiProvider {
    async fn generate_parlay(
        &self,
        game: &Game,
        rosters: &GameRosters,
        context: &ParlayContext,
    ) -> Result<AiProviderResponse> {
        self.state.ensure_not_disposed()?;
        if rosters.is_incomplete() {
            return Err(ParlayError::InvalidInput(
                "rosters for both teams are required".into(),
            ));
        }
        context.validate()?;
        if !self.state.is_initialized() {
            self.initialize().await?;
        }

        let start = Instant::now();
        let config = self.state.config();
        let call = self
            .simulator
            .run(self.state.name(), "generate_parlay", &config.simulation)
            .await?;

        let eligible = |p: &&Player| !context.avoid_players.contains(&p.id);
        let rotation = (call as f64 * context.variety_factor * 10.0).round() as usize;
        let pick = |players: &[Player]| -> Option<ParlayLeg> {
            let candidates: Vec<ParlayLeg> = players
                .iter()
                .filter(eligible)
                .filter_map(|p| Self::prop_leg(p, context, config.simulation.value_offset))
                .collect();
            if candidates.is_empty() {
                None
            } else {
                Some(candidates[rotation % candidates.len()].clone())
            }
        };

        let (odds, confidence) = leg_pricing(context.risk_level);
        let mut legs = vec![ParlayLeg {
            bet_type: BetType::Spread,
            selection: format!("{} -3.5", game.home_team.abbreviation),
            target: game.home_team.name.clone(),
            odds,
            confidence,
            reasoning: "home field advantage".into(),
        }];
        legs.extend(pick(&rosters.home));
        legs.extend(pick(&rosters.away));
        if legs.len() < PARLAY_LEGS {
            legs.push(ParlayLeg {
                bet_type: BetType::Total,
                selection: "Over 44.5".into(),
                target: format!("{} @ {}", game.away_team.name, game.home_team.name),
                odds,
                confidence,
                reasoning: "both offenses trending up".into(),
            });
        }
        legs.truncate(PARLAY_LEGS);

        let parlay_confidence: f64 = legs.iter().map(|l| l.confidence).product();
        Ok(AiProviderResponse {
            parlay: Parlay {
                game_id: game.id.clone(),
                legs,
                confidence: parlay_confidence,
                strategy: context.strategy.clone(),
                reasoning: format!("{} strategy for {}", context.strategy, game.id),
                created_at: Utc::now(),
            },
            provider: self.state.name().to_string(),
            model: config.model,
            latency: start.elapsed(),
            usage: None,
        })
    }
}

// ============================================================================
// MockDataProvider
// ============================================================================

/// Data provider serving a small simulated league.
pub struct MockDataProvider {
    state: ProviderState<DataProviderConfig>,
    simulator: Simulator,
}

impl MockDataProvider {
    pub fn new(config: DataProviderConfig) -> Self {
        Self {
            state: ProviderState::new(config.common.name.clone(), config),
            simulator: Simulator::new(),
        }
    }

    /// Number of domain calls made so far.
    pub fn call_count(&self) -> u64 {
        self.simulator.calls()
    }

    async fn begin(&self, operation: &str) -> Result<SimulationSettings> {
        self.state.ensure_not_disposed()?;
        if !self.state.is_initialized() {
            self.initialize().await?;
        }
        let sim = self.state.config().simulation;
        self.simulator.run(self.state.name(), operation, &sim).await?;
        Ok(sim)
    }

    fn respond<T>(&self, data: T) -> DataResponse<T> {
        DataResponse::fresh(data, self.state.name())
    }

    fn team(team_id: &str) -> Result<(TeamRef, bool)> {
        TEAMS
            .iter()
            .find(|(id, ..)| *id == team_id)
            .map(|(id, name, abbr, indoor)| (TeamRef::new(*id, *name, *abbr), *indoor))
            .ok_or_else(|| ParlayError::InvalidInput(format!("unknown team id '{team_id}'")))
    }

    fn schedule(season: u16, week: u8) -> Vec<Game> {
        TEAMS
            .chunks(2)
            .enumerate()
            .map(|(i, pair)| {
                let (home_id, home_name, home_abbr, _) = pair[0];
                let (away_id, away_name, away_abbr, _) = pair[1];
                let kickoff = Utc
                    .with_ymd_and_hms(i32::from(season), 9, 7, 17, 0, 0)
                    .single()
                    .unwrap_or_else(Utc::now)
                    + chrono::Duration::weeks(i64::from(week.saturating_sub(1)))
                    + chrono::Duration::hours(3 * i as i64);
                Game {
                    id: format!("{season}{week:02}{i:02}"),
                    season,
                    week,
                    date: kickoff,
                    home_team: TeamRef::new(home_id, home_name, home_abbr),
                    away_team: TeamRef::new(away_id, away_name, away_abbr),
                    venue: Some(format!("{home_name} Stadium")),
                    status: GameStatus::Scheduled,
                }
            })
            .collect()
    }
}

#[async_trait]
impl Provider for MockDataProvider {
    fn name(&self) -> &str {
        self.state.name()
    }

    fn metadata(&self) -> ProviderMetadata {
        let sim = self.state.config().simulation;
        ProviderMetadata::new(self.state.name(), MOCK_VERSION, ProviderKind::Data)
            .with_capability("games")
            .with_capability("rosters")
            .with_capability("player_stats")
            .with_capability("team_stats")
            .with_capability("injuries")
            .with_capability("weather")
            .with_cost_per_request(0.0)
            .with_data_quality(sim.data_quality)
    }

    fn config(&self) -> ProviderConfig {
        ProviderConfig::Data(self.state.config())
    }

    async fn initialize(&self) -> Result<()> {
        if self.state.mark_initialized() {
            debug!(provider = self.state.name(), "mock data provider initialized");
        }
        Ok(())
    }

    async fn validate_connection(&self) -> bool {
        let sim = self.state.config().simulation;
        let (healthy, elapsed) = probe(&sim).await;
        let error = (!healthy).then(|| "simulated outage".to_string());
        self.state.record_probe(healthy, Some(elapsed), error);
        healthy
    }

    fn health(&self) -> ProviderHealth {
        self.state.health()
    }

    fn update_config(&self, update: &ProviderConfigUpdate) -> Result<()> {
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
impl DataProvider for MockDataProvider {
    async fn current_week_games(&self) -> Result<DataResponse<Vec<Game>>> {
        self.begin("current_week_games").await?;
        Ok(self.respond(Self::schedule(MOCK_SEASON, MOCK_WEEK)))
    }

    async fn games_by_week(&self, season: u16, week: u8) -> Result<DataResponse<Vec<Game>>> {
        if !(1..=18).contains(&week) {
            return Err(ParlayError::InvalidInput(format!(
                "week {week} outside the regular season"
            )));
        }
        self.begin("games_by_week").await?;
        Ok(self.respond(Self::schedule(season, week)))
    }

    async fn team_roster(&self, team_id: &str) -> Result<DataResponse<Vec<Player>>> {
        let (team, _) = Self::team(team_id)?;
        self.begin("team_roster").await?;
        let players = ROSTER
            .iter()
            .enumerate()
            .map(|(i, (position, suffix))| Player {
                id: format!("{}-{}", team.id, i + 1),
                name: format!("{} {}", team.abbreviation, suffix),
                position: (*position).to_string(),
                jersey: Some((i * 7 + 1).to_string()),
                team_id: team.id.clone(),
            })
            .collect();
        Ok(self.respond(players))
    }

    async fn player_stats(&self, player_id: &str) -> Result<DataResponse<PlayerStats>> {
        let sim = self.begin("player_stats").await?;
        let seed = player_id.bytes().map(u32::from).sum::<u32>();
        let offset = sim.value_offset.unsigned_abs();
        Ok(self.respond(PlayerStats {
            player_id: player_id.to_string(),
            season: MOCK_SEASON,
            games_played: 17,
            passing_yards: (seed * 13) % 4500,
            rushing_yards: (seed * 7) % 1400 + offset,
            receiving_yards: (seed * 11) % 1500,
            receptions: (seed * 3) % 110,
            touchdowns: seed % 15 + offset,
        }))
    }

    async fn team_stats(&self, team_id: &str) -> Result<DataResponse<TeamStats>> {
        let (team, _) = Self::team(team_id)?;
        let sim = self.begin("team_stats").await?;
        let seed = team.id.parse::<u32>().unwrap_or(1);
        let wins = (seed % 10 + 4).min(17);
        Ok(self.respond(TeamStats {
            team_id: team.id,
            season: MOCK_SEASON,
            wins,
            losses: 17 - wins,
            ties: 0,
            points_for: (350_i64 + i64::from(seed * 5) + i64::from(sim.value_offset)).max(0)
                as u32,
            points_against: 330 + seed * 3,
        }))
    }

    async fn injury_reports(&self, team_id: &str) -> Result<DataResponse<Vec<InjuryReport>>> {
        let (team, _) = Self::team(team_id)?;
        self.begin("injury_reports").await?;
        Ok(self.respond(vec![InjuryReport {
            player_id: format!("{}-3", team.id),
            player_name: format!("{} Receiver One", team.abbreviation),
            team_id: team.id,
            status: InjuryStatus::Questionable,
            description: "hamstring".into(),
        }]))
    }

    async fn weather(&self, game_id: &str) -> Result<DataResponse<WeatherConditions>> {
        self.begin("weather").await?;
        let index = game_id
            .get(game_id.len().saturating_sub(2)..)
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0);
        let indoor = TEAMS
            .chunks(2)
            .nth(index)
            .map(|pair| pair[0].3)
            .unwrap_or(false);
        Ok(self.respond(WeatherConditions {
            game_id: game_id.to_string(),
            temperature_f: (!indoor).then_some(62.0),
            condition: if indoor { "Indoor".into() } else { "Clear".into() },
            wind_mph: (!indoor).then_some(8.0),
            indoor,
        }))
    }
}
