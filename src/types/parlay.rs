//! Parlay generation request context and results.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ParlayError, Result};

/// Number of legs in a generated parlay.
pub const PARLAY_LEGS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

/// Strategy and variety hints for one generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParlayContext {
    /// Named strategy (e.g. "value_hunting", "stack_offense").
    pub strategy: String,
    /// 0.0 = always the obvious picks, 1.0 = maximum variety.
    pub variety_factor: f64,
    #[serde(default)]
    pub risk_level: RiskLevel,
    /// Player ids to leave out (e.g. used in a recent parlay).
    #[serde(default)]
    pub avoid_players: Vec<String>,
}

impl ParlayContext {
    pub fn new(strategy: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            variety_factor: 0.5,
            risk_level: RiskLevel::default(),
            avoid_players: Vec::new(),
        }
    }

    pub fn variety_factor(mut self, factor: f64) -> Self {
        self.variety_factor = factor;
        self
    }

    pub fn risk_level(mut self, level: RiskLevel) -> Self {
        self.risk_level = level;
        self
    }

    pub fn avoid_player(mut self, player_id: impl Into<String>) -> Self {
        self.avoid_players.push(player_id.into());
        self
    }

    /// Reject a blank strategy or an out-of-range variety factor.
    pub fn validate(&self) -> Result<()> {
        if self.strategy.trim().is_empty() {
            return Err(ParlayError::InvalidInput(
                "strategy context is required for parlay generation".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.variety_factor) {
            return Err(ParlayError::InvalidInput(format!(
                "variety factor {} outside [0, 1]",
                self.variety_factor
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetType {
    Spread,
    Total,
    Moneyline,
    PlayerProp,
}

/// One leg of a parlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParlayLeg {
    pub bet_type: BetType,
    /// Human-readable pick, e.g. "Over 245.5 passing yards".
    pub selection: String,
    /// Team or player the pick is about.
    pub target: String,
    /// American odds.
    pub odds: i32,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// A generated parlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parlay {
    pub game_id: String,
    pub legs: Vec<ParlayLeg>,
    pub confidence: f64,
    pub strategy: String,
    #[serde(default)]
    pub reasoning: String,
    pub created_at: DateTime<Utc>,
}

/// Token usage reported by an LLM backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// What an AI provider hands back from `generate_parlay`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiProviderResponse {
    pub parlay: Parlay,
    pub provider: String,
    pub model: String,
    pub latency: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_strategy_rejected() {
        let err = ParlayContext::new("   ").validate().unwrap_err();
        assert!(matches!(err, ParlayError::InvalidInput(_)));
    }

    #[test]
    fn variety_factor_range() {
        assert!(ParlayContext::new("value").variety_factor(1.5).validate().is_err());
        assert!(ParlayContext::new("value").variety_factor(0.0).validate().is_ok());
    }
}
