//! Provider manager: the facade the rest of an application talks to.
//!
//! The manager owns one [`ProviderFactory`] and one [`ProviderRegistry`].
//! `initialize` installs the creators, builds every provider declared for
//! the active [`Environment`], registers them and starts health
//! monitoring. Bring-up is best effort: a provider that fails to build or
//! initialize is logged and skipped.
//!
//! ```rust,no_run
//! use parlay_gateway::{ProviderManager, SelectionPriority};
//!
//! # async fn example() -> parlay_gateway::Result<()> {
//! let manager = ProviderManager::builder().build().await?;
//! let selected = manager
//!     .select_data_provider(SelectionPriority::Reliability)
//!     .await?;
//! let games = selected.provider.current_week_games().await?;
//! println!("{} games from {}", games.data.len(), selected.name);
//! # Ok(())
//! # }
//! ```

mod builder;
pub mod config;

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

pub use builder::ProviderManagerBuilder;
pub use config::{Environment, EnvironmentConfig, KindConfig, ProviderEntry, ProvidersConfig};

use crate::providers::{
    AiCreator, AiProvider, DataCreator, DataProvider, FactoryConfig, ProviderFactory,
    ProviderHandle, ProviderRegistry, ProviderStats, RegistryConfig,
};
use crate::types::{
    ProviderConfigUpdate, ProviderHealth, ProviderKind, ProviderSelectionCriteria,
    ProviderSelectionResult, SelectionPriority, SelectionRequest,
};
use crate::{ParlayError, Result};

/// Creators supplied through the builder, installed after the built-ins.
#[derive(Default)]
pub(crate) struct CreatorOverrides {
    pub(crate) ai: Vec<(String, AiCreator)>,
    pub(crate) data: Vec<(String, DataCreator)>,
}

/// Composes factory and registry behind one API.
pub struct ProviderManager {
    environment: Environment,
    config: ProvidersConfig,
    env_config: EnvironmentConfig,
    factory: RwLock<ProviderFactory>,
    registry: ProviderRegistry,
    creators: CreatorOverrides,
    initialized: Mutex<bool>,
}

impl ProviderManager {
    pub fn builder() -> ProviderManagerBuilder {
        ProviderManagerBuilder::new()
    }

    pub(crate) fn from_parts(
        environment: Environment,
        config: ProvidersConfig,
        registry_config: RegistryConfig,
        factory_config: FactoryConfig,
        creators: CreatorOverrides,
    ) -> Self {
        let env_config = config.environment(environment);
        Self {
            environment,
            config,
            env_config,
            factory: RwLock::new(ProviderFactory::with_config(factory_config)),
            registry: ProviderRegistry::new(registry_config),
            creators,
            initialized: Mutex::new(false),
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn config(&self) -> &ProvidersConfig {
        &self.config
    }

    pub async fn is_initialized(&self) -> bool {
        *self.initialized.lock().await
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Install creators and bring up the configured providers.
    ///
    /// Idempotent: calls after the first successful one are no-ops until
    /// [`dispose`](Self::dispose).
    #[instrument(skip(self), fields(environment = %self.environment))]
    pub async fn initialize(&self) -> Result<()> {
        let mut initialized = self.initialized.lock().await;
        if *initialized {
            debug!("already initialized");
            return Ok(());
        }

        self.install_creators().await;

        for kind in [ProviderKind::Ai, ProviderKind::Data] {
            for (name, entry) in &self.env_config.kind(kind).providers {
                if let Err(e) = self.bring_up(kind, name, entry).await {
                    warn!(provider = %name, %kind, error = %e, "skipping provider that failed to start");
                }
            }
        }

        if self.registry.config().enable_health_monitoring {
            self.registry.start_health_monitoring()?;
        }
        *initialized = true;
        info!(providers = self.registry.len().await, "provider manager initialized");
        Ok(())
    }

    /// Clear the registry (disposing every provider) and allow a later
    /// `initialize` to start over.
    pub async fn dispose(&self) {
        let mut initialized = self.initialized.lock().await;
        self.registry.clear().await;
        *initialized = false;
        debug!("provider manager disposed");
    }

    async fn install_creators(&self) {
        let mut factory = self.factory.write().await;
        factory.register_builtin_creators();
        for (provider_type, creator) in &self.creators.ai {
            let creator = Arc::clone(creator);
            factory.register_ai_creator(provider_type.clone(), move |config| creator(config));
        }
        for (provider_type, creator) in &self.creators.data {
            let creator = Arc::clone(creator);
            factory.register_data_creator(provider_type.clone(), move |config| creator(config));
        }
    }

    async fn bring_up(&self, kind: ProviderKind, name: &str, entry: &ProviderEntry) -> Result<()> {
        let provider_type = entry.provider_type(name);
        let handle = self.create(kind, provider_type, name, &entry.config).await?;
        handle.provider().initialize().await?;

        let priority = self.resolve_priority(entry.priority()).await;
        let enabled = entry.enabled && entry.config.enabled.unwrap_or(true);
        self.registry
            .register_with(name, handle, priority, enabled)
            .await;
        Ok(())
    }

    async fn create(
        &self,
        kind: ProviderKind,
        provider_type: &str,
        name: &str,
        overrides: &ProviderConfigUpdate,
    ) -> Result<ProviderHandle> {
        let factory = self.factory.read().await;
        Ok(match kind {
            ProviderKind::Ai => factory
                .create_ai_provider(provider_type, name, overrides)?
                .into(),
            ProviderKind::Data => factory
                .create_data_provider(provider_type, name, overrides)?
                .into(),
        })
    }

    async fn resolve_priority(&self, priority: Option<i32>) -> i32 {
        match priority {
            Some(p) => p,
            None => self.factory.read().await.config().priority,
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Build, initialize and register an AI provider.
    ///
    /// Unlike configured bring-up, failures propagate to the caller.
    pub async fn register_ai_provider(
        &self,
        name: &str,
        provider_type: &str,
        overrides: &ProviderConfigUpdate,
        priority: Option<i32>,
    ) -> Result<Arc<dyn AiProvider>> {
        let provider = self
            .factory
            .read()
            .await
            .create_ai_provider(provider_type, name, overrides)?;
        provider.initialize().await?;
        let priority = self.resolve_priority(priority.or(overrides.priority)).await;
        self.registry
            .register(name, ProviderHandle::Ai(Arc::clone(&provider)), priority)
            .await;
        Ok(provider)
    }

    /// Build, initialize and register a data provider.
    pub async fn register_data_provider(
        &self,
        name: &str,
        provider_type: &str,
        overrides: &ProviderConfigUpdate,
        priority: Option<i32>,
    ) -> Result<Arc<dyn DataProvider>> {
        let provider = self
            .factory
            .read()
            .await
            .create_data_provider(provider_type, name, overrides)?;
        provider.initialize().await?;
        let priority = self.resolve_priority(priority.or(overrides.priority)).await;
        self.registry
            .register(name, ProviderHandle::Data(Arc::clone(&provider)), priority)
            .await;
        Ok(provider)
    }

    /// Unregister and dispose `name`. Returns whether it was registered.
    pub async fn unregister_provider(&self, name: &str) -> bool {
        self.registry.unregister(name).await
    }

    /// Factory types available for `kind`.
    pub async fn provider_types(&self, kind: ProviderKind) -> Vec<String> {
        let factory = self.factory.read().await;
        match kind {
            ProviderKind::Ai => factory.ai_types(),
            ProviderKind::Data => factory.data_types(),
        }
    }

    // ========================================================================
    // Lookup & selection
    // ========================================================================

    /// The AI provider named `name`, or the best one for `criteria`.
    ///
    /// Without a name, selection defaults to the performance priority;
    /// fields set in `criteria` win.
    pub async fn get_ai_provider(
        &self,
        name: Option<&str>,
        criteria: Option<ProviderSelectionCriteria>,
    ) -> Result<Arc<dyn AiProvider>> {
        if let Some(name) = name {
            return self
                .registry
                .get_ai(name)
                .await
                .ok_or_else(|| ParlayError::ProviderNotFound(name.to_string()));
        }
        let criteria = default_criteria(ProviderKind::Ai, SelectionPriority::Performance, criteria);
        Ok(self.select_ai_provider(criteria).await?.provider)
    }

    /// The data provider named `name`, or the best one for `criteria`.
    ///
    /// Without a name, selection defaults to the reliability priority.
    pub async fn get_data_provider(
        &self,
        name: Option<&str>,
        criteria: Option<ProviderSelectionCriteria>,
    ) -> Result<Arc<dyn DataProvider>> {
        if let Some(name) = name {
            return self
                .registry
                .get_data(name)
                .await
                .ok_or_else(|| ParlayError::ProviderNotFound(name.to_string()));
        }
        let criteria =
            default_criteria(ProviderKind::Data, SelectionPriority::Reliability, criteria);
        Ok(self.select_data_provider(criteria).await?.provider)
    }

    /// Select an AI provider by preset or explicit criteria.
    pub async fn select_ai_provider(
        &self,
        request: impl Into<SelectionRequest>,
    ) -> Result<ProviderSelectionResult<Arc<dyn AiProvider>>> {
        let criteria = request.into().into_criteria(ProviderKind::Ai);
        let selected = self.registry.select_provider(&criteria).await?;
        let provider = selected
            .provider
            .clone()
            .into_ai()
            .ok_or(ParlayError::NoProvidersOfKind(ProviderKind::Ai))?;
        Ok(selected.map(|_| provider))
    }

    /// Select a data provider by preset or explicit criteria.
    pub async fn select_data_provider(
        &self,
        request: impl Into<SelectionRequest>,
    ) -> Result<ProviderSelectionResult<Arc<dyn DataProvider>>> {
        let criteria = request.into().into_criteria(ProviderKind::Data);
        let selected = self.registry.select_provider(&criteria).await?;
        let provider = selected
            .provider
            .clone()
            .into_data()
            .ok_or(ParlayError::NoProvidersOfKind(ProviderKind::Data))?;
        Ok(selected.map(|_| provider))
    }

    /// Enabled AI providers by name.
    pub async fn ai_providers(&self) -> BTreeMap<String, Arc<dyn AiProvider>> {
        self.registry
            .get_by_type(ProviderKind::Ai)
            .await
            .into_iter()
            .filter_map(|(name, handle)| handle.into_ai().map(|p| (name, p)))
            .collect()
    }

    /// Enabled data providers by name.
    pub async fn data_providers(&self) -> BTreeMap<String, Arc<dyn DataProvider>> {
        self.registry
            .get_by_type(ProviderKind::Data)
            .await
            .into_iter()
            .filter_map(|(name, handle)| handle.into_data().map(|p| (name, p)))
            .collect()
    }

    /// Configured primary AI provider name for the active environment.
    pub fn primary_ai(&self) -> Option<&str> {
        self.env_config.ai.primary.as_deref()
    }

    /// Configured primary data provider name for the active environment.
    pub fn primary_data(&self) -> Option<&str> {
        self.env_config.data.primary.as_deref()
    }

    /// Configured fallback names for `kind`, in order.
    pub fn fallbacks(&self, kind: ProviderKind) -> &[String] {
        &self.env_config.kind(kind).fallback
    }

    // ========================================================================
    // Health & settings
    // ========================================================================

    pub async fn provider_health(&self, name: &str) -> Option<ProviderHealth> {
        self.registry.provider_health(name).await
    }

    pub async fn all_provider_health(&self) -> BTreeMap<String, ProviderHealth> {
        self.registry.all_provider_health().await
    }

    pub async fn provider_stats(&self, name: &str) -> Option<ProviderStats> {
        self.registry.provider_stats(name).await
    }

    /// Run one health pass now. Returns the number of providers probed.
    pub async fn check_health(&self) -> usize {
        self.registry.check_all_health().await
    }

    pub async fn set_provider_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        self.registry.set_provider_enabled(name, enabled).await
    }

    /// Apply `update` to the provider and mirror `enabled`/`priority` into
    /// the registry.
    pub async fn update_provider_config(
        &self,
        name: &str,
        update: &ProviderConfigUpdate,
    ) -> Result<()> {
        let registration = self
            .registry
            .registration(name)
            .await
            .ok_or_else(|| ParlayError::NotRegistered(name.to_string()))?;
        registration.provider.provider().update_config(update)?;
        if let Some(enabled) = update.enabled {
            self.registry.set_provider_enabled(name, enabled).await?;
        }
        if let Some(priority) = update.priority {
            self.registry.set_provider_priority(name, priority).await?;
        }
        debug!(provider = %name, "provider config updated");
        Ok(())
    }

    /// Replace registry tuning; restarts a running monitor when needed.
    pub fn update_registry_config(&self, config: RegistryConfig) -> Result<()> {
        self.registry.update_config(config)
    }
}

/// Caller criteria with `kind` forced and `priority` defaulted.
fn default_criteria(
    kind: ProviderKind,
    priority: SelectionPriority,
    criteria: Option<ProviderSelectionCriteria>,
) -> ProviderSelectionCriteria {
    let mut criteria = criteria
        .unwrap_or_else(|| ProviderSelectionCriteria::new(kind))
        .with_kind(kind);
    criteria.priority.get_or_insert(priority);
    criteria
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_criteria_keeps_caller_fields() {
        let caller = ProviderSelectionCriteria::new(ProviderKind::Data)
            .priority(SelectionPriority::Cost)
            .exclude("espn");
        let merged = default_criteria(
            ProviderKind::Ai,
            SelectionPriority::Performance,
            Some(caller),
        );
        assert_eq!(merged.kind, ProviderKind::Ai);
        assert_eq!(merged.priority, Some(SelectionPriority::Cost));
        assert!(merged.exclude.contains("espn"));
    }

    #[test]
    fn default_criteria_fills_priority() {
        let merged = default_criteria(ProviderKind::Data, SelectionPriority::Reliability, None);
        assert_eq!(merged.priority, Some(SelectionPriority::Reliability));
        assert!(!merged.fallback);
    }
}
