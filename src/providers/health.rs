//! Periodic provider health checks.
//!
//! A [`HealthMonitor`] owns one tokio task that runs [`check_all`] every
//! `health_check_interval`. Each pass snapshots the registered handles,
//! probes them concurrently without holding the registry lock, and then
//! writes the outcomes back. Every probe runs in its own task so a
//! panicking provider is recorded as unhealthy instead of aborting the pass.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use super::registry::ProviderRegistration;
use super::traits::ProviderHandle;
use crate::{ParlayError, Result, telemetry};

/// Registry tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Time between health passes. Default: 5 minutes.
    #[serde(with = "secs")]
    pub health_check_interval: Duration,
    /// Deadline for one provider's probe. Default: 10 seconds.
    #[serde(with = "secs")]
    pub health_check_timeout: Duration,
    /// Start the monitor when the manager initializes. Default: true.
    pub enable_health_monitoring: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            health_check_interval: Duration::from_secs(300),
            health_check_timeout: Duration::from_secs(10),
            enable_health_monitoring: true,
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    pub fn health_check_timeout(mut self, timeout: Duration) -> Self {
        self.health_check_timeout = timeout;
        self
    }

    pub fn enable_health_monitoring(mut self, enabled: bool) -> Self {
        self.enable_health_monitoring = enabled;
        self
    }

    /// Reject tuning the monitor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.health_check_interval.is_zero() {
            return Err(ParlayError::InvalidConfig(
                "health_check_interval must be greater than zero".into(),
            ));
        }
        if self.health_check_timeout.is_zero() {
            return Err(ParlayError::InvalidConfig(
                "health_check_timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

pub(crate) type Registrations = Arc<RwLock<HashMap<String, ProviderRegistration>>>;

const TIMED_OUT: &str = "health check timed out";
const PANICKED: &str = "health check panicked";
const FAILED: &str = "connection validation failed";

struct Probe {
    name: String,
    handle: ProviderHandle,
    healthy: bool,
    response_time: Duration,
    error: Option<String>,
}

async fn probe(name: String, handle: ProviderHandle, timeout: Duration) -> Probe {
    let start = Instant::now();
    let outcome = tokio::time::timeout(timeout, handle.provider().validate_connection()).await;
    let response_time = start.elapsed();
    let (healthy, error) = match outcome {
        Ok(true) => (true, None),
        Ok(false) => {
            let reason = handle
                .provider()
                .health()
                .last_error
                .unwrap_or_else(|| FAILED.to_string());
            (false, Some(reason))
        }
        Err(_) => (false, Some(TIMED_OUT.to_string())),
    };
    Probe {
        name,
        handle,
        healthy,
        response_time,
        error,
    }
}

/// Run one health pass over every registration, enabled or not.
///
/// Returns the number of providers probed.
#[instrument(skip_all)]
pub(crate) async fn check_all(
    registrations: &RwLock<HashMap<String, ProviderRegistration>>,
    timeout: Duration,
) -> usize {
    let snapshot: Vec<(String, ProviderHandle)> = registrations
        .read()
        .await
        .values()
        .map(|r| (r.name.clone(), r.provider.clone()))
        .collect();
    if snapshot.is_empty() {
        return 0;
    }

    let tasks = snapshot
        .iter()
        .cloned()
        .map(|(name, handle)| tokio::spawn(probe(name, handle, timeout)));
    let probes: Vec<Probe> = join_all(tasks)
        .await
        .into_iter()
        .zip(snapshot)
        .map(|(joined, (name, handle))| {
            joined.unwrap_or_else(|e| {
                warn!(provider = %name, error = %e, "health probe task failed");
                Probe {
                    name,
                    handle,
                    healthy: false,
                    response_time: Duration::ZERO,
                    error: Some(PANICKED.to_string()),
                }
            })
        })
        .collect();

    let count = probes.len();
    let mut map = registrations.write().await;
    for p in probes {
        let status = if p.healthy { "healthy" } else { "unhealthy" };
        metrics::counter!(telemetry::HEALTH_CHECKS_TOTAL,
            "provider" => p.name.clone(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::HEALTH_CHECK_DURATION_SECONDS,
            "provider" => p.name.clone(),
        )
        .record(p.response_time.as_secs_f64());

        // Unregistered or replaced while the pass was in flight.
        let Some(registration) = map
            .get_mut(&p.name)
            .filter(|r| r.provider.same_as(&p.handle))
        else {
            debug!(provider = %p.name, "discarding health result for a replaced provider");
            continue;
        };
        if !p.healthy {
            warn!(provider = %p.name, error = ?p.error, "provider failed health check");
        }
        registration
            .health
            .record_probe(p.healthy, Some(p.response_time), p.error);
    }
    debug!(providers = count, "health pass complete");
    count
}

/// Handle to the background health task. Dropping it stops the task.
pub(crate) struct HealthMonitor {
    handle: JoinHandle<()>,
    shutdown: mpsc::Sender<()>,
    interval: Duration,
}

impl HealthMonitor {
    /// Spawn the task. The first pass runs one interval from now.
    ///
    /// `interval` must be non-zero; see [`RegistryConfig::validate`].
    pub(crate) fn spawn(registrations: Registrations, interval: Duration, timeout: Duration) -> Self {
        let (shutdown, mut shutdown_rx) = mpsc::channel::<()>(1);
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        check_all(&registrations, timeout).await;
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("health monitor received shutdown signal");
                        break;
                    }
                }
            }
        });
        debug!(interval_secs = interval.as_secs(), "health monitor started");
        Self {
            handle,
            shutdown,
            interval,
        }
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown.try_send(()) {
            debug!(error = ?e, "health monitor shutdown signal not delivered");
        }
        self.handle.abort();
    }
}
