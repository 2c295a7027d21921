//! OpenAI-compatible provider against a wiremock backend.

use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use wiremock::matchers::{bearer_token, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use parlay_gateway::providers::{FactoryConfig, OpenAiProvider};
use parlay_gateway::{
    AiProvider, BetType, Game, GameRosters, GameStatus, ParlayContext, ParlayError, Player,
    Provider, ProviderConfigUpdate, RiskLevel, TeamRef,
};

const KEY: &str = "sk-test";

fn openai(server: &MockServer, update: ProviderConfigUpdate) -> OpenAiProvider {
    let defaults = ProviderConfigUpdate::new()
        .base_url(server.uri())
        .api_key(KEY)
        .retries(0);
    let config = FactoryConfig::default().ai_config("openai", "openai", &defaults.merged_with(&update));
    OpenAiProvider::new(config).unwrap()
}

fn game() -> Game {
    Game {
        id: "401772".into(),
        season: 2025,
        week: 3,
        date: Utc.with_ymd_and_hms(2025, 9, 21, 17, 0, 0).unwrap(),
        home_team: TeamRef::new("12", "Kansas City Chiefs", "KC"),
        away_team: TeamRef::new("2", "Buffalo Bills", "BUF"),
        venue: None,
        status: GameStatus::Scheduled,
    }
}

fn player(id: &str, name: &str, position: &str, team_id: &str) -> Player {
    Player {
        id: id.into(),
        name: name.into(),
        position: position.into(),
        jersey: None,
        team_id: team_id.into(),
    }
}

fn rosters() -> GameRosters {
    GameRosters::new(
        vec![player("1", "Patrick Mahomes", "QB", "12")],
        vec![player("2", "Josh Allen", "QB", "2")],
    )
}

fn context() -> ParlayContext {
    ParlayContext::new("value_hunting").risk_level(RiskLevel::Moderate)
}

fn leg(target: &str) -> Value {
    json!({
        "bet_type": "player_prop",
        "selection": "Over 245.5 passing yards",
        "target": target,
        "odds": -110,
        "confidence": 0.6,
        "reasoning": "favourable matchup"
    })
}

fn completion(content: String) -> Value {
    json!({
        "choices": [{"message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 420, "completion_tokens": 180}
    })
}

async fn reply_with(server: &MockServer, body: Value) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn three_leg_parlay_is_parsed() {
    let server = MockServer::start().await;
    let content = json!({
        "legs": [leg("Patrick Mahomes"), leg("Josh Allen"), leg("Travis Kelce")],
        "confidence": 0.22,
        "reasoning": "shootout expected"
    });
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(bearer_token(KEY))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "response_format": {"type": "json_object"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(content.to_string())))
        .expect(1)
        .mount(&server)
        .await;

    let response = openai(&server, ProviderConfigUpdate::new())
        .generate_parlay(&game(), &rosters(), &context())
        .await
        .unwrap();

    assert_eq!(response.provider, "openai");
    assert_eq!(response.model, "gpt-4o-mini");
    let parlay = &response.parlay;
    assert_eq!(parlay.game_id, "401772");
    assert_eq!(parlay.legs.len(), 3);
    assert_eq!(parlay.legs[0].bet_type, BetType::PlayerProp);
    assert_eq!(parlay.legs[1].target, "Josh Allen");
    assert_eq!(parlay.strategy, "value_hunting");
    assert_eq!(parlay.reasoning, "shootout expected");
    assert!((parlay.confidence - 0.22).abs() < 1e-9);

    let usage = response.usage.unwrap();
    assert_eq!((usage.prompt_tokens, usage.completion_tokens), (420, 180));
}

#[tokio::test]
async fn fenced_content_without_confidence_multiplies_legs() {
    let server = MockServer::start().await;
    let content = json!({
        "legs": [leg("a"), leg("b"), leg("c")],
        "reasoning": "fenced"
    });
    reply_with(&server, completion(format!("```json\n{content}\n```"))).await;

    let parlay = openai(&server, ProviderConfigUpdate::new())
        .generate_parlay(&game(), &rosters(), &context())
        .await
        .unwrap()
        .parlay;
    assert!((parlay.confidence - 0.6 * 0.6 * 0.6).abs() < 1e-9);
}

#[tokio::test]
async fn wrong_leg_count_is_a_data_error() {
    let server = MockServer::start().await;
    let content = json!({"legs": [leg("a"), leg("b")], "reasoning": "short"});
    reply_with(&server, completion(content.to_string())).await;

    let err = openai(&server, ProviderConfigUpdate::new())
        .generate_parlay(&game(), &rosters(), &context())
        .await
        .unwrap_err();
    assert!(matches!(err, ParlayError::DataError(ref m) if m.contains("3 legs")));
}

#[tokio::test]
async fn empty_roster_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let rosters = GameRosters::new(rosters().home, Vec::new());
    let err = openai(&server, ProviderConfigUpdate::new())
        .generate_parlay(&game(), &rosters, &context())
        .await
        .unwrap_err();
    assert!(matches!(err, ParlayError::InvalidInput(_)));
}

#[tokio::test]
async fn missing_api_key_fails_initialize() {
    let server = MockServer::start().await;
    let provider = openai(&server, ProviderConfigUpdate::new().api_key(""));
    assert!(matches!(
        provider.initialize().await,
        Err(ParlayError::Configuration(_))
    ));
}

#[tokio::test]
async fn rate_limit_is_surfaced_with_hint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "2"))
        .expect(1)
        .mount(&server)
        .await;

    let err = openai(&server, ProviderConfigUpdate::new())
        .generate_parlay(&game(), &rosters(), &context())
        .await
        .unwrap_err();
    assert!(matches!(err, ParlayError::RateLimited { .. }));
    assert_eq!(err.retry_after(), Some(std::time::Duration::from_secs(2)));
}

#[tokio::test]
async fn validate_connection_lists_models() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .and(bearer_token(KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let provider = openai(&server, ProviderConfigUpdate::new());
    assert!(provider.validate_connection().await);
    assert!(provider.health().healthy);
}

#[tokio::test]
async fn rejected_key_marks_provider_unhealthy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let provider = openai(&server, ProviderConfigUpdate::new());
    assert!(!provider.validate_connection().await);
    assert!(provider.health().last_error.is_some());
}

#[tokio::test]
async fn out_of_range_temperature_update_is_rejected() {
    let server = MockServer::start().await;
    let provider = openai(&server, ProviderConfigUpdate::new());
    assert!(matches!(
        provider.update_config(&ProviderConfigUpdate::new().temperature(3.0)),
        Err(ParlayError::InvalidConfig(_))
    ));
    provider
        .update_config(&ProviderConfigUpdate::new().model("gpt-4o"))
        .unwrap();
    assert_eq!(provider.metadata().supported_models, ["gpt-4o"]);
}
