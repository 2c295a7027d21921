//! Provider identity, metadata and health types.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ParlayError;

/// Capability family a provider belongs to.
///
/// Names share one keyspace across kinds: an AI provider and a data
/// provider can never both be registered as `"mock"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Parlay generation backends.
    Ai,
    /// Sports data backends.
    Data,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::Data => "data",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ParlayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ai" => Ok(Self::Ai),
            "data" => Ok(Self::Data),
            other => Err(ParlayError::InvalidInput(format!(
                "unknown provider kind '{other}' (expected 'ai' or 'data')"
            ))),
        }
    }
}

/// Declared data quality tier of a data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    High,
    #[default]
    Medium,
    Low,
}

/// Static description of what a provider can do.
///
/// Supplied by the provider and never mutated after construction. The
/// registry keeps a copy taken at registration time so selection can run
/// without calling back into the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub name: String,
    pub version: String,
    pub kind: ProviderKind,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// Cost per request in USD, when the backend charges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_per_request: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_quality: Option<DataQuality>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_models: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_endpoints: Vec<String>,
}

impl ProviderMetadata {
    /// Create metadata with no capabilities declared.
    pub fn new(name: impl Into<String>, version: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            kind,
            capabilities: BTreeSet::new(),
            cost_per_request: None,
            data_quality: None,
            supported_models: Vec::new(),
            supported_endpoints: Vec::new(),
        }
    }

    /// Add a capability.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    /// Set the per-request cost.
    pub fn with_cost_per_request(mut self, cost: f64) -> Self {
        self.cost_per_request = Some(cost);
        self
    }

    /// Set the data quality tier.
    pub fn with_data_quality(mut self, quality: DataQuality) -> Self {
        self.data_quality = Some(quality);
        self
    }

    /// Add a supported model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.supported_models.push(model.into());
        self
    }

    /// Add a supported endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.supported_endpoints.push(endpoint.into());
        self
    }

    /// Whether every capability in `required` is declared.
    pub fn has_capabilities(&self, required: &BTreeSet<String>) -> bool {
        required.is_subset(&self.capabilities)
    }
}

/// Last observed connectivity state of a provider.
///
/// `healthy` is the result of the most recent probe; it is never inferred
/// from staleness. `last_checked` never moves backwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub name: String,
    pub healthy: bool,
    pub last_checked: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Number of consecutive-or-not probes that found the provider healthy.
    pub uptime: u64,
    /// Total probes run.
    #[serde(default)]
    pub checks: u64,
    /// Probes that found the provider unhealthy.
    #[serde(default)]
    pub failures: u64,
}

impl ProviderHealth {
    /// Fresh record: assumed healthy until the first probe says otherwise.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            healthy: true,
            last_checked: Utc::now(),
            response_time: None,
            last_error: None,
            uptime: 0,
            checks: 0,
            failures: 0,
        }
    }

    /// Record the outcome of one connectivity probe.
    pub fn record_probe(
        &mut self,
        healthy: bool,
        response_time: Option<Duration>,
        error: Option<String>,
    ) {
        self.healthy = healthy;
        self.response_time = response_time;
        self.last_error = if healthy { None } else { error };
        self.checks += 1;
        if healthy {
            self.uptime += 1;
        } else {
            self.failures += 1;
        }
        self.touch();
    }

    /// Advance `last_checked` to now, never backwards.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.last_checked {
            self.last_checked = now;
        }
    }

    /// Fraction of probes that succeeded, `None` before the first probe.
    pub fn success_rate(&self) -> Option<f64> {
        if self.checks == 0 {
            None
        } else {
            Some((self.checks - self.failures) as f64 / self.checks as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_health_is_optimistic() {
        let health = ProviderHealth::new("mock");
        assert!(health.healthy);
        assert_eq!(health.uptime, 0);
        assert!(health.success_rate().is_none());
    }

    #[test]
    fn probes_update_counters() {
        let mut health = ProviderHealth::new("mock");
        health.record_probe(true, Some(Duration::from_millis(5)), None);
        health.record_probe(false, None, Some("connection refused".into()));
        assert!(!health.healthy);
        assert_eq!(health.uptime, 1);
        assert_eq!(health.checks, 2);
        assert_eq!(health.failures, 1);
        assert_eq!(health.last_error.as_deref(), Some("connection refused"));
        assert_eq!(health.success_rate(), Some(0.5));
    }

    #[test]
    fn last_checked_is_monotonic() {
        let mut health = ProviderHealth::new("mock");
        let future = Utc::now() + chrono::Duration::hours(1);
        health.last_checked = future;
        health.record_probe(true, None, None);
        assert_eq!(health.last_checked, future);
    }

    #[test]
    fn healthy_probe_clears_error() {
        let mut health = ProviderHealth::new("mock");
        health.record_probe(false, None, Some("boom".into()));
        health.record_probe(true, None, Some("ignored".into()));
        assert!(health.last_error.is_none());
    }

    #[test]
    fn kind_parses() {
        assert_eq!("ai".parse::<ProviderKind>().unwrap(), ProviderKind::Ai);
        assert_eq!("data".parse::<ProviderKind>().unwrap(), ProviderKind::Data);
        assert!("video".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn capability_subset() {
        let meta = ProviderMetadata::new("espn", "1", ProviderKind::Data)
            .with_capability("games")
            .with_capability("rosters");
        let mut required = BTreeSet::new();
        required.insert("games".to_string());
        assert!(meta.has_capabilities(&required));
        required.insert("weather".to_string());
        assert!(!meta.has_capabilities(&required));
    }
}
