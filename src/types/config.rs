//! Typed provider configuration.
//!
//! Configuration is a tagged union keyed by provider kind: AI and data
//! providers each get their own strongly-typed field set on top of the
//! shared [`CommonSettings`]. Partial configuration (from callers, TOML
//! files and runtime updates) is expressed as a [`ProviderConfigUpdate`]
//! overlay whose set fields replace the target's fields.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::provider::{DataQuality, ProviderKind};

/// Settings every provider carries regardless of kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommonSettings {
    /// Registered name.
    pub name: String,
    /// Factory type tag (e.g. `"mock"`, `"openai"`, `"espn"`).
    pub provider_type: String,
    pub enabled: bool,
    pub priority: i32,
    pub timeout: Duration,
    pub retries: u32,
}

/// Health/error injection for mock providers.
///
/// `fail_every = Some(n)` makes every n-th domain call fail with a
/// transient error, which lets tests exercise retry and fusion paths
/// without randomness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub healthy: bool,
    #[serde(with = "duration_ms")]
    pub latency: Duration,
    pub fail_every: Option<u32>,
    pub data_quality: DataQuality,
    /// Offset added to generated numbers so two mocks can disagree.
    pub value_offset: i32,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            healthy: true,
            latency: Duration::ZERO,
            fail_every: None,
            data_quality: DataQuality::Medium,
            value_offset: 0,
        }
    }
}

/// Fully-defaulted AI provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiProviderConfig {
    pub common: CommonSettings,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub simulation: SimulationSettings,
}

/// Fully-defaulted data provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataProviderConfig {
    pub common: CommonSettings,
    pub api_key: Option<String>,
    pub base_url: String,
    /// When set, responses are cached for this long.
    pub cache_ttl: Option<Duration>,
    pub simulation: SimulationSettings,
}

/// Configuration of either provider kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    Ai(AiProviderConfig),
    Data(DataProviderConfig),
}

impl ProviderConfig {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Ai(_) => ProviderKind::Ai,
            Self::Data(_) => ProviderKind::Data,
        }
    }

    pub fn common(&self) -> &CommonSettings {
        match self {
            Self::Ai(c) => &c.common,
            Self::Data(c) => &c.common,
        }
    }
}

/// Partial configuration overlay.
///
/// Every field is optional; set fields replace the corresponding field of
/// the target (shallow merge). Fields that do not apply to the target's
/// kind are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_ttl_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulation: Option<SimulationSettings>,
}

impl ProviderConfigUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = Some(ttl.as_secs());
        self
    }

    pub fn simulation(mut self, simulation: SimulationSettings) -> Self {
        self.simulation = Some(simulation);
        self
    }

    /// Whether the update touches connection parameters, which forces a
    /// provider to re-initialize before its next call.
    pub fn changes_connection(&self) -> bool {
        self.api_key.is_some() || self.base_url.is_some() || self.model.is_some()
    }

    /// Layer `other` on top of `self`: fields set in `other` win.
    pub fn merged_with(mut self, other: &ProviderConfigUpdate) -> Self {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field.clone(); })*
            };
        }
        take!(
            enabled,
            priority,
            timeout_ms,
            retries,
            api_key,
            base_url,
            model,
            temperature,
            max_tokens,
            cache_ttl_secs,
            simulation
        );
        self
    }

    fn apply_common(&self, common: &mut CommonSettings) {
        if let Some(enabled) = self.enabled {
            common.enabled = enabled;
        }
        if let Some(priority) = self.priority {
            common.priority = priority;
        }
        if let Some(ms) = self.timeout_ms {
            common.timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = self.retries {
            common.retries = retries;
        }
    }
}

impl AiProviderConfig {
    /// Apply a partial update in place.
    pub fn apply(&mut self, update: &ProviderConfigUpdate) {
        update.apply_common(&mut self.common);
        if let Some(key) = &update.api_key {
            self.api_key = Some(key.clone());
        }
        if let Some(url) = &update.base_url {
            self.base_url = Some(url.clone());
        }
        if let Some(model) = &update.model {
            self.model = model.clone();
        }
        if let Some(temperature) = update.temperature {
            self.temperature = temperature;
        }
        if let Some(max_tokens) = update.max_tokens {
            self.max_tokens = max_tokens;
        }
        if let Some(simulation) = &update.simulation {
            self.simulation = simulation.clone();
        }
    }
}

impl DataProviderConfig {
    /// Apply a partial update in place.
    pub fn apply(&mut self, update: &ProviderConfigUpdate) {
        update.apply_common(&mut self.common);
        if let Some(key) = &update.api_key {
            self.api_key = Some(key.clone());
        }
        if let Some(url) = &update.base_url {
            self.base_url = url.clone();
        }
        if let Some(secs) = update.cache_ttl_secs {
            self.cache_ttl = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(simulation) = &update.simulation {
            self.simulation = simulation.clone();
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_config() -> DataProviderConfig {
        DataProviderConfig {
            common: CommonSettings {
                name: "espn".into(),
                provider_type: "espn".into(),
                enabled: true,
                priority: 1,
                timeout: Duration::from_secs(30),
                retries: 3,
            },
            api_key: None,
            base_url: "https://example.com".into(),
            cache_ttl: None,
            simulation: SimulationSettings::default(),
        }
    }

    #[test]
    fn update_is_shallow_merge() {
        let mut config = data_config();
        config.apply(
            &ProviderConfigUpdate::new()
                .priority(4)
                .timeout(Duration::from_secs(5))
                .model("ignored-for-data"),
        );
        assert_eq!(config.common.priority, 4);
        assert_eq!(config.common.timeout, Duration::from_secs(5));
        assert_eq!(config.common.retries, 3);
        assert_eq!(config.base_url, "https://example.com");
    }

    #[test]
    fn zero_cache_ttl_disables_cache() {
        let mut config = data_config();
        config.apply(&ProviderConfigUpdate::new().cache_ttl(Duration::from_secs(60)));
        assert_eq!(config.cache_ttl, Some(Duration::from_secs(60)));
        config.apply(&ProviderConfigUpdate {
            cache_ttl_secs: Some(0),
            ..Default::default()
        });
        assert!(config.cache_ttl.is_none());
    }

    #[test]
    fn merged_with_prefers_other() {
        let base = ProviderConfigUpdate::new().priority(1).retries(2);
        let merged = base.merged_with(&ProviderConfigUpdate::new().priority(5));
        assert_eq!(merged.priority, Some(5));
        assert_eq!(merged.retries, Some(2));
    }

    #[test]
    fn connection_change_detection() {
        assert!(!ProviderConfigUpdate::new().priority(3).changes_connection());
        assert!(ProviderConfigUpdate::new().base_url("http://x").changes_connection());
    }

    #[test]
    fn update_deserializes_from_toml() {
        let update: ProviderConfigUpdate = toml::from_str(
            r#"
            model = "gpt-4o"
            timeout_ms = 1500
            [simulation]
            healthy = false
            "#,
        )
        .unwrap();
        assert_eq!(update.model.as_deref(), Some("gpt-4o"));
        assert_eq!(update.timeout_ms, Some(1500));
        assert!(!update.simulation.unwrap().healthy);
    }
}
