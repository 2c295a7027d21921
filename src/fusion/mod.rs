//! Multi-provider data fusion.
//!
//! [`DataFusionService`] issues one query to several data providers at
//! once, compares their answers field by field and resolves disagreements
//! with a [`ConflictResolution`] strategy.
//!
//! # Confidence
//!
//! Each successful response is scored in `[0, 1]`:
//!
//! | Factor                     | Adjustment |
//! |----------------------------|------------|
//! | base                       | 0.5        |
//! | provider healthy           | +0.3       |
//! | latency < 1s (< 3s)        | +0.2 (+0.1)|
//! | data quality high (medium) | +0.2 (+0.1)|
//! | served from cache          | −0.1       |
//!
//! The fused confidence is the mean score minus `conflict_penalty` per
//! conflict, floored at zero.
//!
//! # Comparison
//!
//! Responses are serialized to JSON. Every leaf of the first response
//! (objects and arrays are walked, `team.record.0.wins`) is compared with
//! the same path in the other responses; a source lacking the path does not
//! take part for that field.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::manager::ProviderManager;
use crate::providers::DataProvider;
use crate::telemetry;
use crate::types::{DataQuality, DataResponse, Game, Player, TeamStats};
use crate::{ParlayError, Result};

/// How a field disagreement is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Value from the source with the highest confidence score.
    #[default]
    HighestConfidence,
    /// Most frequent value; ties go to the earliest source.
    Majority,
    /// Value from the most recently fetched response.
    MostRecent,
}

impl ConflictResolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HighestConfidence => "highest_confidence",
            Self::Majority => "majority",
            Self::MostRecent => "most_recent",
        }
    }
}

/// Fusion tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct FusionConfig {
    pub strategy: ConflictResolution,
    /// Minimum mean confidence for a multi-source result to be valid.
    pub confidence_threshold: f64,
    /// Confidence subtracted per conflict.
    pub conflict_penalty: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            strategy: ConflictResolution::default(),
            confidence_threshold: 0.7,
            conflict_penalty: 0.1,
        }
    }
}

impl FusionConfig {
    pub fn strategy(mut self, strategy: ConflictResolution) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn conflict_penalty(mut self, penalty: f64) -> Self {
        self.conflict_penalty = penalty;
        self
    }
}

/// One source's value for a disputed field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictingValue {
    pub provider: String,
    pub value: Value,
    pub confidence: f64,
}

/// A field on which sources disagreed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataConflict {
    /// Dotted path of the field.
    pub field: String,
    pub values: Vec<ConflictingValue>,
    pub resolution: ConflictResolution,
    pub resolved_value: Value,
}

/// Result of fusing several providers' answers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedDataResult<T> {
    pub data: T,
    pub confidence: f64,
    /// Providers that answered successfully, in request order.
    pub sources: Vec<String>,
    pub conflicts: Vec<DataConflict>,
    pub valid: bool,
    /// Latest fetch timestamp among the sources.
    pub last_updated: DateTime<Utc>,
}

/// Queries several data providers and fuses their answers.
pub struct DataFusionService {
    manager: Arc<ProviderManager>,
    config: FusionConfig,
}

/// A successful response, scored.
struct Source {
    name: String,
    value: Value,
    timestamp: DateTime<Utc>,
    confidence: f64,
}

impl DataFusionService {
    pub fn new(manager: Arc<ProviderManager>, config: FusionConfig) -> Self {
        Self { manager, config }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Run `op` against every provider in `names` and fuse the answers.
    ///
    /// Providers that are unknown, disabled or fail are left out. Fails with
    /// [`ParlayError::NoValidData`] when none answer.
    #[instrument(skip(self, op), fields(strategy = self.config.strategy.as_str()))]
    pub async fn fuse_data<T, F, Fut>(&self, names: &[&str], op: F) -> Result<FusedDataResult<T>>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(Arc<dyn DataProvider>) -> Fut,
        Fut: Future<Output = Result<DataResponse<T>>>,
    {
        let calls = names.iter().map(|name| self.query(name, &op));
        let sources: Vec<Source> = join_all(calls).await.into_iter().flatten().collect();
        if sources.is_empty() {
            return Err(ParlayError::NoValidData);
        }

        let mut fused = sources[0].value.clone();
        let mut conflicts = Vec::new();
        for path in leaf_paths(&sources[0].value) {
            let pointer = to_pointer(&path);
            let present: Vec<(&Source, &Value)> = sources
                .iter()
                .filter_map(|s| s.value.pointer(&pointer).map(|v| (s, v)))
                .collect();
            let first = present[0].1;
            if present.iter().all(|(_, v)| *v == first) {
                continue;
            }

            let resolved = self.resolve(&present).clone();
            if let Some(slot) = fused.pointer_mut(&pointer) {
                *slot = resolved.clone();
            }
            conflicts.push(DataConflict {
                field: path.join("."),
                values: present
                    .iter()
                    .map(|(s, v)| ConflictingValue {
                        provider: s.name.clone(),
                        value: (*v).clone(),
                        confidence: s.confidence,
                    })
                    .collect(),
                resolution: self.config.strategy,
                resolved_value: resolved,
            });
        }

        let mean = sources.iter().map(|s| s.confidence).sum::<f64>() / sources.len() as f64;
        let confidence =
            (mean - self.config.conflict_penalty * conflicts.len() as f64).clamp(0.0, 1.0);
        let valid = conflicts.is_empty()
            && (sources.len() == 1 || mean >= self.config.confidence_threshold);
        let last_updated = sources
            .iter()
            .map(|s| s.timestamp)
            .max()
            .unwrap_or_else(Utc::now);

        if !conflicts.is_empty() {
            metrics::counter!(telemetry::FUSION_CONFLICTS_TOTAL,
                "strategy" => self.config.strategy.as_str(),
            )
            .increment(conflicts.len() as u64);
        }
        debug!(
            sources = sources.len(),
            conflicts = conflicts.len(),
            confidence,
            valid,
            "fused provider data"
        );

        Ok(FusedDataResult {
            data: serde_json::from_value(fused)?,
            confidence,
            sources: sources.into_iter().map(|s| s.name).collect(),
            conflicts,
            valid,
            last_updated,
        })
    }

    /// One provider's contribution, or `None` if it could not answer.
    async fn query<T, F, Fut>(&self, name: &str, op: &F) -> Option<Source>
    where
        T: Serialize,
        F: Fn(Arc<dyn DataProvider>) -> Fut,
        Fut: Future<Output = Result<DataResponse<T>>>,
    {
        let provider = match self.manager.get_data_provider(Some(name), None).await {
            Ok(p) => p,
            Err(e) => {
                debug!(provider = name, error = %e, "skipping unavailable provider");
                return None;
            }
        };
        let quality = provider.metadata().data_quality;

        let start = Instant::now();
        let response = match op(Arc::clone(&provider)).await {
            Ok(r) => r,
            Err(e) => {
                warn!(provider = name, error = %e, "provider failed during fusion");
                return None;
            }
        };
        let latency = start.elapsed();

        let healthy = match self.manager.provider_health(name).await {
            Some(h) => h.healthy,
            None => provider.health().healthy,
        };
        let value = match serde_json::to_value(&response.data) {
            Ok(v) => v,
            Err(e) => {
                warn!(provider = name, error = %e, "unserializable provider response");
                return None;
            }
        };
        Some(Source {
            name: name.to_string(),
            value,
            timestamp: response.timestamp,
            confidence: score(healthy, latency, quality, response.cached),
        })
    }

    fn resolve<'a>(&self, present: &[(&Source, &'a Value)]) -> &'a Value {
        let winner = match self.config.strategy {
            ConflictResolution::HighestConfidence => {
                first_max_by(present, |a, b| a.0.confidence.total_cmp(&b.0.confidence))
            }
            ConflictResolution::MostRecent => {
                first_max_by(present, |a, b| a.0.timestamp.cmp(&b.0.timestamp))
            }
            ConflictResolution::Majority => {
                let votes = |v: &Value| present.iter().filter(|(_, o)| *o == v).count();
                first_max_by(present, |a, b| votes(a.1).cmp(&votes(b.1)))
            }
        };
        present[winner].1
    }

    // ========================================================================
    // Convenience wrappers
    // ========================================================================

    pub async fn fuse_current_week_games(&self, names: &[&str]) -> Result<FusedDataResult<Vec<Game>>> {
        self.fuse_data(names, |p| async move { p.current_week_games().await })
            .await
    }

    pub async fn fuse_team_roster(
        &self,
        names: &[&str],
        team_id: &str,
    ) -> Result<FusedDataResult<Vec<Player>>> {
        self.fuse_data(names, |p| {
            let team_id = team_id.to_string();
            async move { p.team_roster(&team_id).await }
        })
        .await
    }

    pub async fn fuse_team_stats(
        &self,
        names: &[&str],
        team_id: &str,
    ) -> Result<FusedDataResult<TeamStats>> {
        self.fuse_data(names, |p| {
            let team_id = team_id.to_string();
            async move { p.team_stats(&team_id).await }
        })
        .await
    }
}

/// Per-response confidence score.
pub fn score(healthy: bool, latency: Duration, quality: Option<DataQuality>, cached: bool) -> f64 {
    let mut score = 0.5;
    if healthy {
        score += 0.3;
    }
    if latency < Duration::from_secs(1) {
        score += 0.2;
    } else if latency < Duration::from_secs(3) {
        score += 0.1;
    }
    match quality {
        Some(DataQuality::High) => score += 0.2,
        Some(DataQuality::Medium) => score += 0.1,
        Some(DataQuality::Low) | None => {}
    }
    if cached {
        score -= 0.1;
    }
    f64::clamp(score, 0.0, 1.0)
}

/// Index of the first maximal element.
fn first_max_by<T>(items: &[T], mut cmp: impl FnMut(&T, &T) -> std::cmp::Ordering) -> usize {
    let mut best = 0;
    for (i, item) in items.iter().enumerate().skip(1) {
        if cmp(item, &items[best]).is_gt() {
            best = i;
        }
    }
    best
}

/// Paths to every leaf. Empty objects and arrays count as leaves.
fn leaf_paths(value: &Value) -> Vec<Vec<String>> {
    fn walk(value: &Value, prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
        match value {
            Value::Object(map) if !map.is_empty() => {
                for (key, child) in map {
                    prefix.push(key.clone());
                    walk(child, prefix, out);
                    prefix.pop();
                }
            }
            Value::Array(items) if !items.is_empty() => {
                for (i, child) in items.iter().enumerate() {
                    prefix.push(i.to_string());
                    walk(child, prefix, out);
                    prefix.pop();
                }
            }
            _ => out.push(prefix.clone()),
        }
    }
    let mut out = Vec::new();
    walk(value, &mut Vec::new(), &mut out);
    out
}

/// RFC 6901 pointer for a path.
fn to_pointer(path: &[String]) -> String {
    path.iter()
        .map(|segment| format!("/{}", segment.replace('~', "~0").replace('/', "~1")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn score_components() {
        let fast = Duration::from_millis(10);
        assert!((score(true, fast, Some(DataQuality::High), false) - 1.0).abs() < 1e-9);
        assert!((score(false, fast, Some(DataQuality::Medium), false) - 0.8).abs() < 1e-9);
        assert!(
            (score(false, Duration::from_secs(2), None, true) - 0.5).abs() < 1e-9,
            "0.5 + 0.1 latency - 0.1 cached"
        );
        assert!((score(false, Duration::from_secs(5), Some(DataQuality::Low), false) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn leaves_walk_objects_and_arrays() {
        let value = json!({"a": {"b": 1, "c": [true, {"d": null}]}, "e": [], "f": {}});
        let mut paths: Vec<String> = leaf_paths(&value).iter().map(|p| p.join(".")).collect();
        paths.sort();
        assert_eq!(paths, vec!["a.b", "a.c.0", "a.c.1.d", "e", "f"]);
    }

    #[test]
    fn scalar_root_is_a_single_leaf() {
        assert_eq!(leaf_paths(&json!(3)), vec![Vec::<String>::new()]);
        assert_eq!(to_pointer(&[]), "");
    }

    #[test]
    fn pointer_escapes_segments() {
        let path = vec!["a/b".to_string(), "c~d".to_string()];
        assert_eq!(to_pointer(&path), "/a~1b/c~0d");
    }

    #[test]
    fn first_max_prefers_earliest_on_ties() {
        assert_eq!(first_max_by(&[1, 3, 3, 2], |a, b| a.cmp(b)), 1);
        assert_eq!(first_max_by(&[5], |a, b| a.cmp(b)), 0);
    }
}
