//! OpenAI-compatible chat-completions AI provider.
//!
//! Sends the game, both rosters and the strategy context as a JSON user
//! message and asks for a JSON object back:
//!
//! ```json
//! {"legs": [{"bet_type": "player_prop", "selection": "...", "target": "...",
//!            "odds": -110, "confidence": 0.6, "reasoning": "..."}],
//!  "confidence": 0.25, "reasoning": "..."}
//! ```
//!
//! Works against any endpoint that speaks the `/chat/completions` and
//! `/models` routes (OpenAI, OpenRouter, local proxies).

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::factory::default_ai_base_url;
use super::http::{build_client, check_status, join};
use super::retry::{RetryConfig, with_retry, with_timeout};
use super::state::ProviderState;
use super::traits::{AiProvider, Provider};
use crate::telemetry;
use crate::types::{
    AiProviderConfig, AiProviderResponse, Game, GameRosters, PARLAY_LEGS, Parlay, ParlayContext,
    ParlayLeg, ProviderConfig, ProviderConfigUpdate, ProviderHealth, ProviderKind,
    ProviderMetadata, TokenUsage,
};
use crate::{ParlayError, Result};

const SYSTEM_PROMPT: &str = "You are an NFL betting analyst. Build a 3-leg same-game parlay \
from the supplied game, rosters and strategy. Only use players from the rosters. Reply with a \
JSON object with keys `legs`, `confidence` and `reasoning`.";

/// Approximate cost of one generation in USD, for cost-aware selection.
const COST_PER_REQUEST: f64 = 0.002;

/// AI provider backed by an OpenAI-compatible API.
pub struct OpenAiProvider {
    state: ProviderState<AiProviderConfig>,
    http: Client,
}

impl OpenAiProvider {
    pub fn new(config: AiProviderConfig) -> Result<Self> {
        Ok(Self {
            state: ProviderState::new(config.common.name.clone(), config),
            http: build_client()?,
        })
    }

    fn base_url(config: &AiProviderConfig) -> String {
        config
            .base_url
            .clone()
            .or_else(|| default_ai_base_url("openai").map(str::to_string))
            .unwrap_or_default()
    }

    fn api_key(&self, config: &AiProviderConfig) -> Result<String> {
        config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ParlayError::Configuration(format!("{}: no API key configured", self.name()))
            })
    }

    async fn list_models(&self, config: &AiProviderConfig) -> Result<()> {
        let response = self
            .http
            .get(join(&Self::base_url(config), "models"))
            .bearer_auth(self.api_key(config)?)
            .send()
            .await?;
        check_status(response, "OpenAI").await?;
        Ok(())
    }

    async fn complete(
        &self,
        config: &AiProviderConfig,
        request: &ChatRequest<'_>,
    ) -> Result<(ParlayDraft, Option<TokenUsage>)> {
        let response = self
            .http
            .post(join(&Self::base_url(config), "chat/completions"))
            .bearer_auth(self.api_key(config)?)
            .json(request)
            .send()
            .await?;
        let completion: ChatCompletion = check_status(response, "OpenAI").await?.json().await?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ParlayError::DataError("completion had no content".into()))?;
        let draft: ParlayDraft = serde_json::from_str(strip_fences(&content))?;
        let usage = completion.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        });
        Ok((draft, usage))
    }
}

/// Models sometimes wrap JSON in a markdown code fence.
fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        self.state.name()
    }

    fn metadata(&self) -> ProviderMetadata {
        let config = self.state.config();
        let endpoint = Self::base_url(&config);
        ProviderMetadata::new(self.state.name(), "v1", ProviderKind::Ai)
            .with_capability("parlay_generation")
            .with_capability("reasoning")
            .with_cost_per_request(COST_PER_REQUEST)
            .with_model(config.model)
            .with_endpoint(endpoint)
    }

    fn config(&self) -> ProviderConfig {
        ProviderConfig::Ai(self.state.config())
    }

    async fn initialize(&self) -> Result<()> {
        let config = self.state.config();
        self.api_key(&config)?;
        if self.state.mark_initialized() {
            debug!(provider = self.name(), model = %config.model, "OpenAI provider initialized");
        }
        Ok(())
    }

    async fn validate_connection(&self) -> bool {
        let config = self.state.config();
        let start = Instant::now();
        let result = with_timeout(config.common.timeout, self.list_models(&config)).await;
        let elapsed = start.elapsed();
        match result {
            Ok(()) => {
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
        if let Some(t) = update.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(ParlayError::InvalidConfig(format!(
                "temperature {t} outside [0, 2]"
            )));
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
impl AiProvider for OpenAiProvider {
    #[instrument(skip(self, game, rosters, context), fields(provider = %self.name(), game = %game.id))]
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

        let config = self.state.config();
        let user = serde_json::to_string(&PromptPayload {
            game,
            rosters,
            context,
        })?;
        let request = ChatRequest {
            model: &config.model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
        };

        let start = Instant::now();
        let retry = RetryConfig::from_retries(config.common.retries);
        let result = with_retry(&retry, self.name(), "generate_parlay", || {
            with_timeout(config.common.timeout, self.complete(&config, &request))
        })
        .await;
        telemetry::record_request("generate_parlay", self.name(), start, result.is_ok());
        let (draft, usage) = result?;

        if draft.legs.len() != PARLAY_LEGS {
            return Err(ParlayError::DataError(format!(
                "expected {PARLAY_LEGS} legs, model returned {}",
                draft.legs.len()
            )));
        }
        let confidence = draft
            .confidence
            .unwrap_or_else(|| draft.legs.iter().map(|l| l.confidence).product());

        Ok(AiProviderResponse {
            parlay: Parlay {
                game_id: game.id.clone(),
                legs: draft.legs,
                confidence: confidence.clamp(0.0, 1.0),
                strategy: context.strategy.clone(),
                reasoning: draft.reasoning,
                created_at: Utc::now(),
            },
            provider: self.name().to_string(),
            model: config.model,
            latency: start.elapsed(),
            usage,
        })
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
struct PromptPayload<'a> {
    game: &'a Game,
    rosters: &'a GameRosters,
    context: &'a ParlayContext,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct CompletionUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct ParlayDraft {
    legs: Vec<ParlayLeg>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reasoning: String,
}
