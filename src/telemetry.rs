//! Telemetry metric name constants.
//!
//! Centralised metric names for provider operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `parlay_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider`: registered provider name (e.g. "mock", "espn")
//! - `kind`: provider kind: "ai" or "data"
//! - `operation`: domain call (e.g. "generate_parlay", "team_roster")
//! - `status`: outcome: "ok" or "error" ("healthy" | "unhealthy" for checks)

/// Total provider selections made by the registry.
///
/// Labels: `provider`, `kind`, `fallback` ("true" | "false").
pub const SELECTIONS_TOTAL: &str = "parlay_provider_selections_total";

/// Total health probes run.
///
/// Labels: `provider`, `status` ("healthy" | "unhealthy").
pub const HEALTH_CHECKS_TOTAL: &str = "parlay_health_checks_total";

/// Health probe duration in seconds.
///
/// Labels: `provider`.
pub const HEALTH_CHECK_DURATION_SECONDS: &str = "parlay_health_check_duration_seconds";

/// Total domain requests issued to providers.
///
/// Labels: `provider`, `operation`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "parlay_provider_requests_total";

/// Domain request duration in seconds.
///
/// Labels: `provider`, `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "parlay_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `provider`, `operation`.
pub const RETRIES_TOTAL: &str = "parlay_retries_total";

/// Total data cache hits.
///
/// Labels: `operation`.
pub const CACHE_HITS_TOTAL: &str = "parlay_cache_hits_total";

/// Total data cache misses.
///
/// Labels: `operation`.
pub const CACHE_MISSES_TOTAL: &str = "parlay_cache_misses_total";

/// Total field conflicts detected while fusing provider data.
///
/// Labels: `strategy`.
pub const FUSION_CONFLICTS_TOTAL: &str = "parlay_fusion_conflicts_total";

/// Record one domain request against a provider.
pub(crate) fn record_request(
    operation: &'static str,
    provider: &str,
    start: std::time::Instant,
    ok: bool,
) {
    let status = if ok { "ok" } else { "error" };
    let elapsed = start.elapsed().as_secs_f64();
    metrics::counter!(REQUESTS_TOTAL,
        "provider" => provider.to_owned(),
        "operation" => operation,
        "status" => status,
    )
    .increment(1);
    metrics::histogram!(REQUEST_DURATION_SECONDS,
        "provider" => provider.to_owned(),
        "operation" => operation,
    )
    .record(elapsed);
}
