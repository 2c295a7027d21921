//! Builder for [`ProviderManager`].

use std::path::PathBuf;
use std::sync::Arc;

use super::config::{Environment, ProvidersConfig};
use super::{CreatorOverrides, ProviderManager};
use crate::Result;
use crate::providers::{AiProvider, DataProvider, FactoryConfig, RegistryConfig};
use crate::types::{AiProviderConfig, DataProviderConfig};

/// Builder for a [`ProviderManager`].
///
/// ```rust,no_run
/// # use parlay_gateway::{ProviderManager, manager::Environment};
/// # async fn example() -> parlay_gateway::Result<()> {
/// let manager = ProviderManager::builder()
///     .environment(Environment::Testing)
///     .build()
///     .await?;
/// let ai = manager.get_ai_provider(None, None).await?;
/// # Ok(())
/// # }
/// ```
pub struct ProviderManagerBuilder {
    environment: Option<Environment>,
    config: Option<ProvidersConfig>,
    config_file: Option<PathBuf>,
    registry_config: Option<RegistryConfig>,
    factory_config: Option<FactoryConfig>,
    creators: CreatorOverrides,
    auto_initialize: bool,
}

impl Default for ProviderManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderManagerBuilder {
    pub fn new() -> Self {
        Self {
            environment: None,
            config: None,
            config_file: None,
            registry_config: None,
            factory_config: None,
            creators: CreatorOverrides::default(),
            auto_initialize: true,
        }
    }

    /// Active environment. Defaults to `PARLAY_ENV`, then development.
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Use this configuration instead of loading one.
    pub fn config(mut self, config: ProvidersConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load configuration from this file. Ignored when `config` is set.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Registry tuning. Overrides the `[registry]` table of the config.
    pub fn registry_config(mut self, config: RegistryConfig) -> Self {
        self.registry_config = Some(config);
        self
    }

    pub fn factory_config(mut self, config: FactoryConfig) -> Self {
        self.factory_config = Some(config);
        self
    }

    /// Install an AI creator after the built-ins, replacing any of the
    /// same type.
    pub fn ai_creator<F>(mut self, provider_type: impl Into<String>, creator: F) -> Self
    where
        F: Fn(AiProviderConfig) -> Result<Arc<dyn AiProvider>> + Send + Sync + 'static,
    {
        self.creators.ai.push((provider_type.into(), Arc::new(creator)));
        self
    }

    /// Install a data creator after the built-ins, replacing any of the
    /// same type.
    pub fn data_creator<F>(mut self, provider_type: impl Into<String>, creator: F) -> Self
    where
        F: Fn(DataProviderConfig) -> Result<Arc<dyn DataProvider>> + Send + Sync + 'static,
    {
        self.creators
            .data
            .push((provider_type.into(), Arc::new(creator)));
        self
    }

    /// Run `initialize` inside `build`. Default: true.
    pub fn auto_initialize(mut self, enabled: bool) -> Self {
        self.auto_initialize = enabled;
        self
    }

    /// Construct the manager, initializing it unless disabled.
    pub async fn build(self) -> Result<ProviderManager> {
        let config = match self.config {
            Some(config) => config,
            None => ProvidersConfig::load(self.config_file.as_deref())?,
        };
        let environment = self.environment.unwrap_or_else(Environment::from_env);
        let registry_config = self
            .registry_config
            .or_else(|| config.registry.clone())
            .unwrap_or_default();
        registry_config.validate()?;

        let manager = ProviderManager::from_parts(
            environment,
            config,
            registry_config,
            self.factory_config.unwrap_or_default(),
            self.creators,
        );
        if self.auto_initialize {
            manager.initialize().await?;
        }
        Ok(manager)
    }
}
