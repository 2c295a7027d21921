//! parlayctl - inspect and exercise configured parlay providers.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use parlay_gateway::fusion::{ConflictResolution, DataFusionService, FusionConfig};
use parlay_gateway::{
    Environment, ProviderKind, ProviderManager, SelectionPriority, SelectionRequest,
};

/// Parlay provider control
#[derive(Parser)]
#[command(name = "parlayctl")]
#[command(version = parlay_gateway::PKG_VERSION)]
#[command(about = "Inspect and exercise parlay providers")]
struct Args {
    /// Environment (development, production, testing)
    #[arg(short, long, env = "PARLAY_ENV")]
    env: Option<String>,

    /// Provider config file (default: ~/.parlay/providers.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probe every provider and print its health
    Health,

    /// List registered providers with usage statistics
    Providers,

    /// Select a provider and explain the choice
    Select {
        /// Provider kind (ai, data)
        #[arg(short, long, default_value = "data")]
        kind: String,
        /// Selection preset (performance, reliability, cost, balanced)
        #[arg(short, long, default_value = "balanced")]
        preset: String,
    },

    /// List games from the selected data provider
    Games {
        /// Regular-season week; current week when omitted
        #[arg(short, long)]
        week: Option<u8>,
        /// Season year, required with --week
        #[arg(short, long)]
        season: Option<u16>,
    },

    /// Fuse current-week games across data providers
    Fuse {
        /// Providers to query (default: all enabled data providers)
        providers: Vec<String>,
        /// Conflict strategy (highest_confidence, majority, most_recent)
        #[arg(short, long, default_value = "highest_confidence")]
        strategy: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let mut builder = ProviderManager::builder();
    if let Some(env) = &args.env {
        builder = builder.environment(env.parse::<Environment>()?);
    }
    if let Some(path) = args.config {
        builder = builder.config_file(path);
    }
    let manager = builder.build().await?;

    match args.command {
        Command::Health => {
            let probed = manager.check_health().await;
            println!("environment: {}", manager.environment());
            println!("probed: {probed}");
            for (name, health) in manager.all_provider_health().await {
                let status = if health.healthy { "healthy" } else { "unhealthy" };
                let latency = health
                    .response_time
                    .map(|t| format!("{}ms", t.as_millis()))
                    .unwrap_or_else(|| "n/a".to_string());
                print!("{name}: {status} ({latency})");
                match &health.last_error {
                    Some(error) => println!(" - {error}"),
                    None => println!(),
                }
            }
        }

        Command::Providers => {
            for kind in [ProviderKind::Ai, ProviderKind::Data] {
                println!("{kind} types: {}", manager.provider_types(kind).await.join(", "));
            }
            let mut names: Vec<String> = manager.ai_providers().await.into_keys().collect();
            names.extend(manager.data_providers().await.into_keys());
            for name in names {
                if let Some(stats) = manager.provider_stats(&name).await {
                    println!("{}", serde_json::to_string(&stats)?);
                }
            }
        }

        Command::Select { kind, preset } => {
            let kind: ProviderKind = kind.parse()?;
            let request = SelectionRequest::Preset(preset.parse::<SelectionPriority>()?);
            let (name, reason, fallback) = match kind {
                ProviderKind::Ai => {
                    let selected = manager.select_ai_provider(request).await?;
                    (selected.name, selected.reason, selected.fallback)
                }
                ProviderKind::Data => {
                    let selected = manager.select_data_provider(request).await?;
                    (selected.name, selected.reason, selected.fallback)
                }
            };
            println!("selected: {name}");
            println!("reason:   {reason}");
            if fallback {
                println!("warning:  no healthy {kind} provider, using fallback");
            }
        }

        Command::Games { week, season } => {
            let provider = manager.get_data_provider(None, None).await?;
            let response = match (week, season) {
                (Some(week), Some(season)) => provider.games_by_week(season, week).await?,
                (None, None) => provider.current_week_games().await?,
                _ => return Err("--week and --season must be given together".into()),
            };
            println!(
                "{} games from {}{}",
                response.data.len(),
                response.provider,
                if response.cached { " (cached)" } else { "" }
            );
            for game in response.data {
                println!(
                    "{}  {} @ {}  {}",
                    game.date.format("%a %Y-%m-%d %H:%M"),
                    game.away_team.abbreviation,
                    game.home_team.abbreviation,
                    game.id
                );
            }
        }

        Command::Fuse {
            providers,
            strategy,
        } => {
            let strategy: ConflictResolution =
                serde_json::from_value(serde_json::Value::String(strategy))?;
            let names = if providers.is_empty() {
                manager.data_providers().await.into_keys().collect()
            } else {
                providers
            };
            let names: Vec<&str> = names.iter().map(String::as_str).collect();

            let service = DataFusionService::new(
                manager.into(),
                FusionConfig::default().strategy(strategy),
            );
            let fused = service.fuse_current_week_games(&names).await?;
            println!("sources:    {}", fused.sources.join(", "));
            println!("games:      {}", fused.data.len());
            println!("confidence: {:.2}", fused.confidence);
            println!("valid:      {}", fused.valid);
            for conflict in &fused.conflicts {
                println!(
                    "conflict {}: resolved to {}",
                    conflict.field, conflict.resolved_value
                );
            }
        }
    }

    Ok(())
}
