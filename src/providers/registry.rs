//! Provider registry: live instances, health and usage bookkeeping, and
//! the selection algorithm.
//!
//! # Selection
//!
//! ```text
//! select_provider(criteria)
//!         │
//!         ▼
//!   registrations of criteria.kind ── none ──► NoProvidersOfKind
//!         │
//!         ▼
//!   exclude / require
//!         │
//!         ▼
//!   capabilities, max_cost,        ── all removed ──► NoMatchingProviders
//!   max_response_time,
//!   min_success_rate
//!         │
//!         ▼
//!   enabled && healthy ── non-empty ──► best (fallback: false)
//!         │ empty
//!         ▼
//!   criteria.fallback? ── no ──► NoHealthyProviders
//!         │ yes
//!         ▼
//!   enabled (any health) ── non-empty ──► best (fallback: true)
//!         │ empty
//!         ▼
//!   NoHealthyProviders
//! ```
//!
//! "Best" ranks by healthy first, then configured priority (higher wins),
//! then usage count (lower wins). The winner's usage count and `last_used`
//! are updated as part of the selection.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock as StdRwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::health::{self, HealthMonitor, RegistryConfig, Registrations};
use super::state::{lock, read, write};
use super::traits::{AiProvider, DataProvider, ProviderHandle};
use crate::telemetry;
use crate::types::{
    ProviderHealth, ProviderKind, ProviderMetadata, ProviderSelectionCriteria,
    ProviderSelectionResult,
};
use crate::{ParlayError, Result};

/// Default priority for [`ProviderRegistry::register`] callers with no preference.
pub const DEFAULT_PRIORITY: i32 = 1;

/// One registered provider and everything the registry tracks about it.
#[derive(Debug, Clone)]
pub struct ProviderRegistration {
    pub provider: ProviderHandle,
    pub name: String,
    pub kind: ProviderKind,
    /// Metadata captured at registration.
    pub metadata: ProviderMetadata,
    pub priority: i32,
    pub enabled: bool,
    pub health: ProviderHealth,
    pub usage_count: u64,
    pub last_used: Option<DateTime<Utc>>,
}

/// Read-only summary of one registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderStats {
    pub name: String,
    pub kind: ProviderKind,
    pub priority: i32,
    pub enabled: bool,
    pub usage_count: u64,
    pub last_used: Option<DateTime<Utc>>,
    pub health: ProviderHealth,
}

impl From<&ProviderRegistration> for ProviderStats {
    fn from(r: &ProviderRegistration) -> Self {
        Self {
            name: r.name.clone(),
            kind: r.kind,
            priority: r.priority,
            enabled: r.enabled,
            usage_count: r.usage_count,
            last_used: r.last_used,
            health: r.health.clone(),
        }
    }
}

/// Registry of AI and data providers sharing one name keyspace.
///
/// Owned by a single [`ProviderManager`](crate::ProviderManager); not meant
/// to be shared across managers.
pub struct ProviderRegistry {
    registrations: Registrations,
    config: StdRwLock<RegistryConfig>,
    monitor: Mutex<Option<HealthMonitor>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl ProviderRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            registrations: Arc::new(RwLock::new(HashMap::new())),
            config: StdRwLock::new(config),
            monitor: Mutex::new(None),
        }
    }

    pub fn config(&self) -> RegistryConfig {
        read(&self.config).clone()
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register `provider` under `name`, enabled.
    ///
    /// An existing entry with the same name is replaced and its provider
    /// disposed.
    pub async fn register(&self, name: impl Into<String>, provider: ProviderHandle, priority: i32) {
        self.register_with(name, provider, priority, true).await;
    }

    /// Register with an explicit visibility, set in the same write as the
    /// insert.
    pub async fn register_with(
        &self,
        name: impl Into<String>,
        provider: ProviderHandle,
        priority: i32,
        enabled: bool,
    ) {
        let name = name.into();
        let registration = ProviderRegistration {
            kind: provider.kind(),
            metadata: provider.provider().metadata(),
            health: ProviderHealth::new(name.clone()),
            provider,
            name: name.clone(),
            priority,
            enabled,
            usage_count: 0,
            last_used: None,
        };
        let kind = registration.kind;
        let incoming = registration.provider.clone();
        let displaced = self
            .registrations
            .write()
            .await
            .insert(name.clone(), registration);
        info!(provider = %name, %kind, priority, enabled, "provider registered");

        if let Some(old) = displaced {
            debug!(provider = %name, "replacing existing registration");
            if !old.provider.same_as(&incoming)
                && let Err(e) = old.provider.provider().dispose().await
            {
                warn!(provider = %name, error = %e, "dispose failed for replaced provider");
            }
        }
    }

    /// Remove `name`, disposing the provider. Returns whether it was present.
    pub async fn unregister(&self, name: &str) -> bool {
        let removed = self.registrations.write().await.remove(name);
        let Some(registration) = removed else {
            return false;
        };
        if let Err(e) = registration.provider.provider().dispose().await {
            warn!(provider = %name, error = %e, "dispose failed during unregister");
        }
        debug!(provider = %name, "provider unregistered");
        true
    }

    /// Stop monitoring, dispose every provider and empty the registry.
    pub async fn clear(&self) {
        self.stop_health_monitoring();
        let drained: Vec<ProviderRegistration> = self
            .registrations
            .write()
            .await
            .drain()
            .map(|(_, r)| r)
            .collect();
        for registration in drained {
            if let Err(e) = registration.provider.provider().dispose().await {
                warn!(provider = %registration.name, error = %e, "dispose failed during clear");
            }
        }
        debug!("registry cleared");
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// The provider registered as `name`, if it is enabled.
    pub async fn get(&self, name: &str) -> Option<ProviderHandle> {
        self.registrations
            .read()
            .await
            .get(name)
            .filter(|r| r.enabled)
            .map(|r| r.provider.clone())
    }

    pub async fn get_ai(&self, name: &str) -> Option<Arc<dyn AiProvider>> {
        self.get(name).await.and_then(ProviderHandle::into_ai)
    }

    pub async fn get_data(&self, name: &str) -> Option<Arc<dyn DataProvider>> {
        self.get(name).await.and_then(ProviderHandle::into_data)
    }

    /// Every enabled provider of `kind`, by name. Health is not considered.
    pub async fn get_by_type(&self, kind: ProviderKind) -> BTreeMap<String, ProviderHandle> {
        self.registrations
            .read()
            .await
            .values()
            .filter(|r| r.kind == kind && r.enabled)
            .map(|r| (r.name.clone(), r.provider.clone()))
            .collect()
    }

    /// Snapshot of one registration, enabled or not.
    pub async fn registration(&self, name: &str) -> Option<ProviderRegistration> {
        self.registrations.read().await.get(name).cloned()
    }

    /// Snapshot of every registration, enabled or not, sorted by name.
    pub async fn all_providers(&self) -> Vec<ProviderRegistration> {
        let mut all: Vec<_> = self.registrations.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub async fn len(&self) -> usize {
        self.registrations.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.registrations.read().await.is_empty()
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Pick the best provider for `criteria`.
    #[instrument(skip(self, criteria), fields(kind = %criteria.kind))]
    pub async fn select_provider(
        &self,
        criteria: &ProviderSelectionCriteria,
    ) -> Result<ProviderSelectionResult<ProviderHandle>> {
        let mut map = self.registrations.write().await;

        let of_kind: Vec<&ProviderRegistration> =
            map.values().filter(|r| r.kind == criteria.kind).collect();
        if of_kind.is_empty() {
            return Err(ParlayError::NoProvidersOfKind(criteria.kind));
        }

        let named: Vec<&ProviderRegistration> = of_kind
            .into_iter()
            .filter(|r| !criteria.exclude.contains(&r.name))
            .filter(|r| criteria.require.is_empty() || criteria.require.contains(&r.name))
            .collect();
        let had_named = !named.is_empty();
        let candidates: Vec<&ProviderRegistration> = named
            .into_iter()
            .filter(|r| meets_constraints(r, criteria))
            .collect();
        if had_named && candidates.is_empty() {
            return Err(ParlayError::NoMatchingProviders(criteria.kind));
        }

        let healthy: Vec<&ProviderRegistration> = candidates
            .iter()
            .copied()
            .filter(|r| r.enabled && r.health.healthy)
            .collect();
        let (winner, fallback) = if let Some(best) = best(&healthy) {
            (best.name.clone(), false)
        } else if criteria.fallback {
            let enabled: Vec<&ProviderRegistration> =
                candidates.iter().copied().filter(|r| r.enabled).collect();
            match best(&enabled) {
                Some(best) => (best.name.clone(), true),
                None => return Err(ParlayError::NoHealthyProviders(criteria.kind)),
            }
        } else {
            return Err(ParlayError::NoHealthyProviders(criteria.kind));
        };

        let registration = map
            .get_mut(&winner)
            .ok_or_else(|| ParlayError::NotRegistered(winner.clone()))?;
        registration.usage_count += 1;
        registration.last_used = Some(Utc::now());

        let reason = if fallback {
            "fallback to unhealthy provider".to_string()
        } else {
            let intent = criteria.priority.map_or("default", |p| p.as_str());
            format!(
                "{intent} selection: healthy, priority {}, {} prior uses",
                registration.priority,
                registration.usage_count - 1
            )
        };

        metrics::counter!(telemetry::SELECTIONS_TOTAL,
            "provider" => winner.clone(),
            "kind" => criteria.kind.as_str(),
            "fallback" => if fallback { "true" } else { "false" },
        )
        .increment(1);
        debug!(provider = %winner, fallback, %reason, "provider selected");

        Ok(ProviderSelectionResult {
            provider: registration.provider.clone(),
            name: winner,
            reason,
            fallback,
        })
    }

    // ========================================================================
    // Health & settings
    // ========================================================================

    /// Replace the health record of `name`. `last_checked` never moves back.
    pub async fn update_provider_health(&self, name: &str, health: ProviderHealth) -> Result<()> {
        let mut map = self.registrations.write().await;
        let registration = map
            .get_mut(name)
            .ok_or_else(|| ParlayError::NotRegistered(name.to_string()))?;
        let last_checked = registration.health.last_checked.max(health.last_checked);
        registration.health = ProviderHealth {
            last_checked,
            ..health
        };
        Ok(())
    }

    pub async fn set_provider_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let mut map = self.registrations.write().await;
        let registration = map
            .get_mut(name)
            .ok_or_else(|| ParlayError::NotRegistered(name.to_string()))?;
        registration.enabled = enabled;
        debug!(provider = %name, enabled, "provider visibility changed");
        Ok(())
    }

    pub async fn set_provider_priority(&self, name: &str, priority: i32) -> Result<()> {
        let mut map = self.registrations.write().await;
        let registration = map
            .get_mut(name)
            .ok_or_else(|| ParlayError::NotRegistered(name.to_string()))?;
        registration.priority = priority;
        Ok(())
    }

    /// Health of `name`, whether or not it is enabled.
    pub async fn provider_health(&self, name: &str) -> Option<ProviderHealth> {
        self.registrations
            .read()
            .await
            .get(name)
            .map(|r| r.health.clone())
    }

    pub async fn all_provider_health(&self) -> BTreeMap<String, ProviderHealth> {
        self.registrations
            .read()
            .await
            .values()
            .map(|r| (r.name.clone(), r.health.clone()))
            .collect()
    }

    pub async fn provider_stats(&self, name: &str) -> Option<ProviderStats> {
        self.registrations
            .read()
            .await
            .get(name)
            .map(ProviderStats::from)
    }

    // ========================================================================
    // Monitoring
    // ========================================================================

    /// Run one health pass now. Returns the number of providers probed.
    pub async fn check_all_health(&self) -> usize {
        let timeout = self.config().health_check_timeout;
        health::check_all(&self.registrations, timeout).await
    }

    /// Start (or restart) the background health task.
    ///
    /// Fails with `InvalidConfig` for a zero interval or timeout. Must be
    /// called from within a tokio runtime.
    pub fn start_health_monitoring(&self) -> Result<()> {
        let config = self.config();
        config.validate()?;
        let monitor = HealthMonitor::spawn(
            Arc::clone(&self.registrations),
            config.health_check_interval,
            config.health_check_timeout,
        );
        // Replacing drops, and so stops, any previous task.
        *lock(&self.monitor) = Some(monitor);
        Ok(())
    }

    pub fn stop_health_monitoring(&self) {
        if lock(&self.monitor).take().is_some() {
            debug!("health monitoring stopped");
        }
    }

    pub fn is_monitoring(&self) -> bool {
        lock(&self.monitor).is_some()
    }

    /// Replace the configuration. A running monitor is restarted when the
    /// interval or timeout changed. Invalid tuning is rejected and leaves
    /// the current configuration in place.
    pub fn update_config(&self, config: RegistryConfig) -> Result<()> {
        config.validate()?;
        let previous = std::mem::replace(&mut *write(&self.config), config.clone());
        let restart = lock(&self.monitor).as_ref().is_some_and(|m| {
            m.interval() != config.health_check_interval
                || previous.health_check_timeout != config.health_check_timeout
        });
        if restart {
            debug!(
                interval_secs = config.health_check_interval.as_secs(),
                "restarting health monitoring"
            );
            self.start_health_monitoring()?;
        }
        Ok(())
    }
}

/// Hard filters over known data; unknown values pass.
fn meets_constraints(r: &ProviderRegistration, criteria: &ProviderSelectionCriteria) -> bool {
    if !r.metadata.has_capabilities(&criteria.capabilities) {
        return false;
    }
    if let (Some(max), Some(cost)) = (criteria.max_cost, r.metadata.cost_per_request)
        && cost > max
    {
        return false;
    }
    if let (Some(max), Some(rt)) = (criteria.max_response_time, r.health.response_time)
        && rt > max
    {
        return false;
    }
    if let (Some(min), Some(rate)) = (criteria.min_success_rate, r.health.success_rate())
        && rate < min
    {
        return false;
    }
    true
}

/// Healthy first, then higher priority, then fewer uses.
fn best<'a>(pool: &[&'a ProviderRegistration]) -> Option<&'a ProviderRegistration> {
    pool.iter().copied().min_by(|a, b| {
        b.health
            .healthy
            .cmp(&a.health.healthy)
            .then(b.priority.cmp(&a.priority))
            .then(a.usage_count.cmp(&b.usage_count))
    })
}
