//! Provider selection criteria, presets and results.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::provider::ProviderKind;
use crate::ParlayError;

/// Selection intent.
///
/// Each value names a preset (see [`ProviderSelectionCriteria::preset`]).
/// Ranking itself is priority + usage based; the intent is carried into the
/// selection rationale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPriority {
    Performance,
    Reliability,
    Cost,
    Balanced,
}

impl SelectionPriority {
    /// All presets, in declaration order.
    pub const ALL: [SelectionPriority; 4] = [
        Self::Performance,
        Self::Reliability,
        Self::Cost,
        Self::Balanced,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Performance => "performance",
            Self::Reliability => "reliability",
            Self::Cost => "cost",
            Self::Balanced => "balanced",
        }
    }
}

impl fmt::Display for SelectionPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionPriority {
    type Err = ParlayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ParlayError::InvalidInput(format!("unknown selection preset '{s}'")))
    }
}

/// Caller constraints for one selection. Never persisted.
///
/// `exclude` and `require` narrow the candidate set before the health
/// filter. `capabilities`, `max_cost`, `max_response_time` and
/// `min_success_rate` are hard filters over what the registry knows:
/// a provider with no declared cost, no measured response time or no
/// health history passes the corresponding filter.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSelectionCriteria {
    pub kind: ProviderKind,
    pub priority: Option<SelectionPriority>,
    pub exclude: HashSet<String>,
    pub require: HashSet<String>,
    pub max_cost: Option<f64>,
    pub min_success_rate: Option<f64>,
    pub max_response_time: Option<Duration>,
    pub capabilities: BTreeSet<String>,
    /// Allow falling back to unhealthy providers when no healthy one exists.
    pub fallback: bool,
}

impl ProviderSelectionCriteria {
    /// Unrestricted criteria for `kind`, without fallback.
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            priority: None,
            exclude: HashSet::new(),
            require: HashSet::new(),
            max_cost: None,
            min_success_rate: None,
            max_response_time: None,
            capabilities: BTreeSet::new(),
            fallback: false,
        }
    }

    /// Canned criteria for a named preset: intent set, fallback allowed,
    /// nothing else restricted.
    pub fn preset(kind: ProviderKind, priority: SelectionPriority) -> Self {
        Self::new(kind).priority(priority).fallback(true)
    }

    pub fn priority(mut self, priority: SelectionPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.exclude.insert(name.into());
        self
    }

    pub fn require(mut self, name: impl Into<String>) -> Self {
        self.require.insert(name.into());
        self
    }

    pub fn max_cost(mut self, cost: f64) -> Self {
        self.max_cost = Some(cost);
        self
    }

    pub fn min_success_rate(mut self, rate: f64) -> Self {
        self.min_success_rate = Some(rate);
        self
    }

    pub fn max_response_time(mut self, limit: Duration) -> Self {
        self.max_response_time = Some(limit);
        self
    }

    pub fn capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    pub fn fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }

    /// Force the kind, leaving every other field as the caller set it.
    pub fn with_kind(mut self, kind: ProviderKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Either a named preset or explicit criteria.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionRequest {
    Preset(SelectionPriority),
    Criteria(ProviderSelectionCriteria),
}

impl SelectionRequest {
    /// Resolve to criteria for `kind`; the kind is always overridden.
    pub fn into_criteria(self, kind: ProviderKind) -> ProviderSelectionCriteria {
        match self {
            Self::Preset(priority) => ProviderSelectionCriteria::preset(kind, priority),
            Self::Criteria(criteria) => criteria.with_kind(kind),
        }
    }
}

impl From<SelectionPriority> for SelectionRequest {
    fn from(priority: SelectionPriority) -> Self {
        Self::Preset(priority)
    }
}

impl From<ProviderSelectionCriteria> for SelectionRequest {
    fn from(criteria: ProviderSelectionCriteria) -> Self {
        Self::Criteria(criteria)
    }
}

/// Outcome of a selection. Never stored.
#[derive(Debug, Clone)]
pub struct ProviderSelectionResult<T> {
    pub provider: T,
    pub name: String,
    pub reason: String,
    /// True when the provider came from the unhealthy fallback pool.
    pub fallback: bool,
}

impl<T> ProviderSelectionResult<T> {
    /// Transform the provider while keeping the rationale.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ProviderSelectionResult<U> {
        ProviderSelectionResult {
            provider: f(self.provider),
            name: self.name,
            reason: self.reason,
            fallback: self.fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_allow_fallback() {
        for priority in SelectionPriority::ALL {
            let criteria = ProviderSelectionCriteria::preset(ProviderKind::Ai, priority);
            assert!(criteria.fallback);
            assert_eq!(criteria.priority, Some(priority));
            assert!(criteria.require.is_empty());
            assert!(criteria.exclude.is_empty());
        }
    }

    #[test]
    fn preset_names_parse() {
        assert_eq!(
            "reliability".parse::<SelectionPriority>().unwrap(),
            SelectionPriority::Reliability
        );
        assert!("fastest".parse::<SelectionPriority>().is_err());
    }

    #[test]
    fn request_forces_kind() {
        let criteria = ProviderSelectionCriteria::new(ProviderKind::Ai).require("espn");
        let resolved = SelectionRequest::from(criteria).into_criteria(ProviderKind::Data);
        assert_eq!(resolved.kind, ProviderKind::Data);
        assert!(resolved.require.contains("espn"));
    }
}
