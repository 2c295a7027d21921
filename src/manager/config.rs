//! Environment-scoped provider configuration.
//!
//! Configuration is resolved in this order:
//! 1. an explicit path (builder `config_file`, CLI `--config`)
//! 2. `~/.parlay/providers.toml`
//! 3. the built-in default compiled into the crate
//!
//! The file has one table per environment, each with `ai` and `data`
//! sections:
//!
//! ```toml
//! [development.data]
//! primary = "mock"
//! fallback = ["espn"]
//!
//! [development.data.providers.mock]
//! priority = 1
//!
//! [development.data.providers.espn]
//! priority = 2
//! config = { timeout_ms = 5000, cache_ttl_secs = 300 }
//! ```
//!
//! A provider's `type` defaults to its name, so one type can be registered
//! several times under different names.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::providers::RegistryConfig;
use crate::types::{ProviderConfigUpdate, ProviderKind};
use crate::{ParlayError, Result};

/// Environment variable selecting the active environment.
pub const ENV_VAR: &str = "PARLAY_ENV";

const BUILTIN: &str = include_str!("default_providers.toml");

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
    Testing,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Testing => "testing",
        }
    }

    /// Environment named by `PARLAY_ENV`, `Development` when unset or unknown.
    pub fn from_env() -> Self {
        match std::env::var(ENV_VAR) {
            Ok(value) => value.parse().unwrap_or_else(|e| {
                warn!(value, error = %e, "unknown {ENV_VAR}, using development");
                Self::Development
            }),
            Err(_) => Self::Development,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ParlayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "testing" | "test" => Ok(Self::Testing),
            other => Err(ParlayError::InvalidInput(format!(
                "unknown environment '{other}'"
            ))),
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProvidersConfig {
    /// Registry tuning shared by every environment.
    #[serde(default)]
    pub registry: Option<RegistryConfig>,
    #[serde(default)]
    pub development: Option<EnvironmentConfig>,
    #[serde(default)]
    pub production: Option<EnvironmentConfig>,
    #[serde(default)]
    pub testing: Option<EnvironmentConfig>,
}

/// Providers of one environment.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default)]
    pub ai: KindConfig,
    #[serde(default)]
    pub data: KindConfig,
}

impl EnvironmentConfig {
    pub fn kind(&self, kind: ProviderKind) -> &KindConfig {
        match kind {
            ProviderKind::Ai => &self.ai,
            ProviderKind::Data => &self.data,
        }
    }
}

/// Providers of one kind.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct KindConfig {
    #[serde(default)]
    pub primary: Option<String>,
    /// Ordered fallback names.
    #[serde(default)]
    pub fallback: Vec<String>,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderEntry>,
}

/// One named provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderEntry {
    /// Factory type tag. Defaults to the provider name.
    #[serde(default, rename = "type")]
    pub provider_type: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub config: ProviderConfigUpdate,
}

fn default_enabled() -> bool {
    true
}

impl ProviderEntry {
    pub fn provider_type<'a>(&'a self, name: &'a str) -> &'a str {
        self.provider_type.as_deref().unwrap_or(name)
    }

    /// Priority from the entry, then from its `config`.
    pub fn priority(&self) -> Option<i32> {
        self.priority.or(self.config.priority)
    }
}

impl ProvidersConfig {
    /// The configuration compiled into the crate.
    pub fn builtin() -> Result<Self> {
        Self::parse(BUILTIN, Path::new("<builtin>"))
    }

    /// Resolve and load: explicit path, then user file, then built-in.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_path(explicit_path)? {
            Some(path) => Self::from_file(&path),
            None => {
                debug!("no provider config file found, using built-in defaults");
                Self::builtin()
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ParlayError::Configuration(format!("failed to read config file {path:?}: {e}"))
        })?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            ParlayError::Configuration(format!("failed to parse config file {path:?}: {e}"))
        })?;
        if let Some(registry) = &config.registry {
            registry.validate()?;
        }
        Ok(config)
    }

    fn resolve_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(ParlayError::Configuration(format!(
                "config file not found: {path:?}"
            )));
        }
        Ok(user_config_path().filter(|p| p.exists()))
    }

    /// Providers of `env`; empty when the file has no such table.
    pub fn environment(&self, env: Environment) -> EnvironmentConfig {
        match env {
            Environment::Development => self.development.clone(),
            Environment::Production => self.production.clone(),
            Environment::Testing => self.testing.clone(),
        }
        .unwrap_or_default()
    }
}

/// `~/.parlay/providers.toml`, when a home directory exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".parlay").join("providers.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_config_parses() {
        let config = ProvidersConfig::builtin().unwrap();
        let dev = config.environment(Environment::Development);
        assert_eq!(dev.ai.primary.as_deref(), Some("mock-ai"));
        assert_eq!(dev.ai.providers["mock-ai"].provider_type("mock-ai"), "mock");
        assert!(!dev.ai.providers["openai"].enabled);
        assert!(dev.data.providers.contains_key("espn"));

        let testing = config.environment(Environment::Testing);
        assert_eq!(testing.data.providers.len(), 1);
    }

    #[test]
    fn environment_names_parse() {
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("Testing".parse::<Environment>().unwrap(), Environment::Testing);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn entry_type_defaults_to_name() {
        let config: ProvidersConfig = toml::from_str(
            r#"
            [testing.data.providers.backup]
            type = "mock"
            priority = 3

            [testing.data.providers.mock]
            enabled = false
            config = { priority = 7, retries = 0 }
            "#,
        )
        .unwrap();
        let data = config.environment(Environment::Testing).data;
        let backup = &data.providers["backup"];
        assert_eq!(backup.provider_type("backup"), "mock");
        assert_eq!(backup.priority(), Some(3));
        assert!(backup.enabled);

        let mock = &data.providers["mock"];
        assert_eq!(mock.provider_type("mock"), "mock");
        assert_eq!(mock.priority(), Some(7));
        assert!(!mock.enabled);
        assert_eq!(mock.config.retries, Some(0));
    }

    #[test]
    fn missing_environment_is_empty() {
        let config = ProvidersConfig::default();
        let env = config.environment(Environment::Production);
        assert!(env.ai.providers.is_empty());
        assert!(env.data.providers.is_empty());
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let err = ProvidersConfig::load(Some(Path::new("/nonexistent/providers.toml")))
            .unwrap_err();
        assert!(matches!(err, ParlayError::Configuration(_)));
    }
}
