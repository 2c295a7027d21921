//! Provider factory: type tag + partial config → constructed provider.
//!
//! Creators are registered as closures keyed by type tag rather than wired
//! in at compile time, so nothing is constructed until a provider of that
//! type is requested and tests can swap in fakes. Registering a creator for
//! a type that already has one replaces it.
//!
//! ```rust
//! # use std::sync::Arc;
//! # use parlay_gateway::providers::factory::ProviderFactory;
//! # use parlay_gateway::providers::MockAiProvider;
//! # use parlay_gateway::providers::traits::Provider;
//! # use parlay_gateway::types::ProviderConfigUpdate;
//! let mut factory = ProviderFactory::new();
//! factory.register_ai_creator("fake", |config| Ok(Arc::new(MockAiProvider::new(config))));
//! let provider = factory
//!     .create_ai_provider("fake", "fake", &ProviderConfigUpdate::new())
//!     .unwrap();
//! assert_eq!(provider.name(), "fake");
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::cache::CachingDataProvider;
use super::espn::EspnDataProvider;
use super::mock::{MockAiProvider, MockDataProvider};
use super::openai::OpenAiProvider;
use super::traits::{AiProvider, DataProvider};
use crate::types::{
    AiProviderConfig, CommonSettings, DataProviderConfig, ProviderConfig, ProviderConfigUpdate,
    SimulationSettings,
};
use crate::{ParlayError, Result};

/// Constructs an AI provider from a fully-defaulted config.
pub type AiCreator = Arc<dyn Fn(AiProviderConfig) -> Result<Arc<dyn AiProvider>> + Send + Sync>;

/// Constructs a data provider from a fully-defaulted config.
pub type DataCreator =
    Arc<dyn Fn(DataProviderConfig) -> Result<Arc<dyn DataProvider>> + Send + Sync>;

/// Canonical base URLs per data provider type.
const DATA_BASE_URLS: &[(&str, &str)] = &[
    ("mock", "mock://local"),
    (
        "espn",
        "https://site.api.espn.com/apis/site/v2/sports/football/nfl",
    ),
    ("nfl", "https://api.nfl.com/v1"),
    ("sportradar", "https://api.sportradar.us/nfl/official/trial/v7/en"),
];

/// Canonical base URLs per AI provider type.
const AI_BASE_URLS: &[(&str, &str)] = &[("openai", "https://api.openai.com/v1")];

/// Provider type → environment variable holding its API key.
const PROVIDER_ENV_VARS: &[(&str, &str)] = &[
    ("openai", "OPENAI_API_KEY"),
    ("sportradar", "SPORTRADAR_API_KEY"),
];

/// Types that cannot work without an API key.
const KEYED_TYPES: &[&str] = &["openai", "sportradar"];

/// Default base URL for a data provider type.
pub fn default_data_base_url(provider_type: &str) -> Option<&'static str> {
    lookup(DATA_BASE_URLS, provider_type)
}

/// Default base URL for an AI provider type.
pub fn default_ai_base_url(provider_type: &str) -> Option<&'static str> {
    lookup(AI_BASE_URLS, provider_type)
}

fn lookup(table: &[(&str, &'static str)], key: &str) -> Option<&'static str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

fn env_api_key(provider_type: &str) -> Option<String> {
    lookup(PROVIDER_ENV_VARS, provider_type).and_then(|var| std::env::var(var).ok())
}

/// Defaults merged under every caller-supplied partial config.
#[derive(Debug, Clone, PartialEq)]
pub struct FactoryConfig {
    /// Default: 30s.
    pub timeout: Duration,
    /// Default: 3.
    pub retries: u32,
    /// Default: 1.
    pub priority: i32,
    /// Default: `gpt-4o-mini`.
    pub model: String,
    /// Default: 0.7.
    pub temperature: f32,
    /// Default: 2000.
    pub max_tokens: u32,
    /// Default: no cache.
    pub cache_ttl: Option<Duration>,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retries: 3,
            priority: 1,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            cache_ttl: None,
        }
    }
}

impl FactoryConfig {
    fn common(&self, provider_type: &str, name: &str) -> CommonSettings {
        CommonSettings {
            name: name.to_string(),
            provider_type: provider_type.to_string(),
            enabled: true,
            priority: self.priority,
            timeout: self.timeout,
            retries: self.retries,
        }
    }

    /// Full AI config: defaults, then env API key, then `overrides`.
    pub fn ai_config(
        &self,
        provider_type: &str,
        name: &str,
        overrides: &ProviderConfigUpdate,
    ) -> AiProviderConfig {
        let mut config = AiProviderConfig {
            common: self.common(provider_type, name),
            api_key: env_api_key(provider_type),
            base_url: default_ai_base_url(provider_type).map(str::to_string),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            simulation: SimulationSettings::default(),
        };
        config.apply(overrides);
        config
    }

    /// Full data config: defaults, then env API key, then `overrides`.
    pub fn data_config(
        &self,
        provider_type: &str,
        name: &str,
        overrides: &ProviderConfigUpdate,
    ) -> DataProviderConfig {
        let mut config = DataProviderConfig {
            common: self.common(provider_type, name),
            api_key: env_api_key(provider_type),
            base_url: default_data_base_url(provider_type)
                .unwrap_or_default()
                .to_string(),
            cache_ttl: self.cache_ttl,
            simulation: SimulationSettings::default(),
        };
        config.apply(overrides);
        config
    }
}

/// Builds providers from registered creator closures.
pub struct ProviderFactory {
    config: FactoryConfig,
    ai_creators: HashMap<String, AiCreator>,
    data_creators: HashMap<String, DataCreator>,
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderFactory {
    /// Factory with default config and no creators.
    pub fn new() -> Self {
        Self::with_config(FactoryConfig::default())
    }

    pub fn with_config(config: FactoryConfig) -> Self {
        Self {
            config,
            ai_creators: HashMap::new(),
            data_creators: HashMap::new(),
        }
    }

    /// Factory with the built-in creators installed.
    pub fn with_builtin_creators() -> Self {
        let mut factory = Self::new();
        factory.register_builtin_creators();
        factory
    }

    /// Install `mock`/`openai` AI and `mock`/`espn` data creators.
    pub fn register_builtin_creators(&mut self) {
        self.register_ai_creator("mock", |config| Ok(Arc::new(MockAiProvider::new(config))));
        self.register_ai_creator("openai", |config| Ok(Arc::new(OpenAiProvider::new(config)?)));
        self.register_data_creator("mock", |config| {
            Ok(Arc::new(MockDataProvider::new(config)))
        });
        self.register_data_creator("espn", |config| {
            Ok(Arc::new(EspnDataProvider::new(config)?))
        });
    }

    /// Install (or replace) the creator for an AI provider type.
    pub fn register_ai_creator<F>(&mut self, provider_type: impl Into<String>, creator: F)
    where
        F: Fn(AiProviderConfig) -> Result<Arc<dyn AiProvider>> + Send + Sync + 'static,
    {
        let provider_type = provider_type.into();
        if self
            .ai_creators
            .insert(provider_type.clone(), Arc::new(creator))
            .is_some()
        {
            debug!(provider_type, "replaced AI provider creator");
        }
    }

    /// Install (or replace) the creator for a data provider type.
    pub fn register_data_creator<F>(&mut self, provider_type: impl Into<String>, creator: F)
    where
        F: Fn(DataProviderConfig) -> Result<Arc<dyn DataProvider>> + Send + Sync + 'static,
    {
        let provider_type = provider_type.into();
        if self
            .data_creators
            .insert(provider_type.clone(), Arc::new(creator))
            .is_some()
        {
            debug!(provider_type, "replaced data provider creator");
        }
    }

    pub fn has_ai_creator(&self, provider_type: &str) -> bool {
        self.ai_creators.contains_key(provider_type)
    }

    pub fn has_data_creator(&self, provider_type: &str) -> bool {
        self.data_creators.contains_key(provider_type)
    }

    /// Registered AI provider types, sorted.
    pub fn ai_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.ai_creators.keys().cloned().collect();
        types.sort();
        types
    }

    /// Registered data provider types, sorted.
    pub fn data_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.data_creators.keys().cloned().collect();
        types.sort();
        types
    }

    /// Build an AI provider of `provider_type` named `name`.
    ///
    /// Errors:
    /// - `ProviderTypeNotFound` if no creator is registered for the type
    /// - `CreationFailed` wrapping the cause if the config is invalid or
    ///   the creator fails
    pub fn create_ai_provider(
        &self,
        provider_type: &str,
        name: &str,
        overrides: &ProviderConfigUpdate,
    ) -> Result<Arc<dyn AiProvider>> {
        let creator = self
            .ai_creators
            .get(provider_type)
            .ok_or_else(|| ParlayError::ProviderTypeNotFound(provider_type.to_string()))?;
        let config = self.config.ai_config(provider_type, name, overrides);
        let wrap = |source: ParlayError| ParlayError::CreationFailed {
            provider_type: provider_type.to_string(),
            source: Box::new(source),
        };
        check_config(provider_type, &ProviderConfig::Ai(config.clone())).map_err(wrap)?;
        creator(config).map_err(|e| {
            warn!(provider_type, name, error = %e, "AI provider creator failed");
            wrap(e)
        })
    }

    /// Build a data provider of `provider_type` named `name`.
    ///
    /// A non-zero `cache_ttl` wraps the result in a [`CachingDataProvider`].
    pub fn create_data_provider(
        &self,
        provider_type: &str,
        name: &str,
        overrides: &ProviderConfigUpdate,
    ) -> Result<Arc<dyn DataProvider>> {
        let creator = self
            .data_creators
            .get(provider_type)
            .ok_or_else(|| ParlayError::ProviderTypeNotFound(provider_type.to_string()))?;
        let config = self.config.data_config(provider_type, name, overrides);
        let wrap = |source: ParlayError| ParlayError::CreationFailed {
            provider_type: provider_type.to_string(),
            source: Box::new(source),
        };
        check_config(provider_type, &ProviderConfig::Data(config.clone())).map_err(wrap)?;
        let cache_ttl = config.cache_ttl;
        let provider = creator(config).map_err(|e| {
            warn!(provider_type, name, error = %e, "data provider creator failed");
            wrap(e)
        })?;
        Ok(match cache_ttl {
            Some(ttl) if !ttl.is_zero() => Arc::new(CachingDataProvider::new(provider, ttl)),
            _ => provider,
        })
    }

    /// Structural check of a config. No network calls.
    pub fn validate_provider_config(&self, provider_type: &str, config: &ProviderConfig) -> bool {
        check_config(provider_type, config).is_ok()
    }

    /// Current defaults.
    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Replace the defaults wholesale.
    pub fn update_config(&mut self, config: FactoryConfig) {
        self.config = config;
    }
}

fn check_config(provider_type: &str, config: &ProviderConfig) -> Result<()> {
    let invalid = |msg: String| Err(ParlayError::InvalidConfig(msg));
    let common = config.common();
    if common.name.trim().is_empty() {
        return invalid("name must not be empty".into());
    }
    if common.timeout.is_zero() {
        return invalid(format!("{}: timeout must be non-zero", common.name));
    }
    let needs_key = KEYED_TYPES.contains(&provider_type);
    let (api_key, base_url) = match config {
        ProviderConfig::Ai(c) => {
            if !(0.0..=2.0).contains(&c.temperature) {
                return invalid(format!(
                    "{}: temperature {} outside [0, 2]",
                    common.name, c.temperature
                ));
            }
            if c.max_tokens == 0 {
                return invalid(format!("{}: max_tokens must be positive", common.name));
            }
            if c.model.trim().is_empty() {
                return invalid(format!("{}: model must not be empty", common.name));
            }
            (c.api_key.as_deref(), c.base_url.as_deref())
        }
        ProviderConfig::Data(c) => (c.api_key.as_deref(), Some(c.base_url.as_str())),
    };
    if needs_key && api_key.is_none_or(|k| k.trim().is_empty()) {
        return invalid(format!("{}: api key required for {provider_type}", common.name));
    }
    if let Some(url) = base_url
        && !url.is_empty()
        && reqwest::Url::parse(url).is_err()
    {
        return invalid(format!("{}: base url '{url}' does not parse", common.name));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_base_url_resolves_by_type() {
        let config = FactoryConfig::default().data_config("espn", "espn", &Default::default());
        assert!(config.base_url.starts_with("https://site.api.espn.com"));
        let config = FactoryConfig::default().data_config("sportradar", "sr", &Default::default());
        assert!(config.base_url.contains("sportradar"));
        let config = FactoryConfig::default().data_config("custom", "c", &Default::default());
        assert!(config.base_url.is_empty());
    }

    #[test]
    fn overrides_win_over_defaults() {
        let config = FactoryConfig::default().ai_config(
            "mock",
            "m",
            &ProviderConfigUpdate::new().temperature(0.2).retries(0),
        );
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.common.retries, 0);
        assert_eq!(config.common.timeout, Duration::from_secs(30));
        assert_eq!(config.max_tokens, 2000);
    }

    #[test]
    fn keyed_types_need_api_key() {
        let config = FactoryConfig::default().ai_config(
            "openai",
            "openai",
            &ProviderConfigUpdate::new().api_key(""),
        );
        assert!(check_config("openai", &ProviderConfig::Ai(config)).is_err());
    }

    #[test]
    fn bad_temperature_rejected() {
        let config = FactoryConfig::default().ai_config(
            "mock",
            "mock",
            &ProviderConfigUpdate::new().temperature(3.5),
        );
        assert!(!ProviderFactory::new().validate_provider_config("mock", &ProviderConfig::Ai(config)));
    }
}
