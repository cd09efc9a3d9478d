//! Periodic probe scheduling
//!
//! Each tick probes every configured target concurrently; a failing
//! target never blocks or aborts the others. The loop stops when the
//! shutdown signal flips.

use crate::health::HealthService;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use vigil_core::TriggerReason;

const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(300);

/// Scheduler timing configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Time between probe rounds
    pub interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_PROBE_INTERVAL,
        }
    }
}

impl SchedulerConfig {
    /// Load from environment variables
    ///
    /// - `VIGIL_PROBE_INTERVAL_SECS`: seconds between rounds (300)
    pub fn from_env() -> Result<Self> {
        let interval = match std::env::var("VIGIL_PROBE_INTERVAL_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    Error::InvalidConfig(format!(
                        "VIGIL_PROBE_INTERVAL_SECS is not valid: {}",
                        raw
                    ))
                })?;
                if secs == 0 {
                    return Err(Error::InvalidConfig(
                        "probe interval must be at least 1 second".to_string(),
                    ));
                }
                Duration::from_secs(secs)
            }
            Err(_) => DEFAULT_PROBE_INTERVAL,
        };
        Ok(Self { interval })
    }
}

/// Runs scheduled probe rounds against every configured target
pub struct ProbeScheduler {
    service: Arc<HealthService>,
    config: SchedulerConfig,
}

impl ProbeScheduler {
    pub fn new(service: Arc<HealthService>, config: SchedulerConfig) -> Self {
        Self { service, config }
    }

    /// Probe every configured target once, concurrently
    #[instrument(skip(self))]
    pub async fn tick(&self) {
        let targets = self.service.target_names();
        debug!(targets = targets.len(), "starting probe round");

        let mut handles = Vec::with_capacity(targets.len());
        for target in targets {
            let service = self.service.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = service
                    .run_health_check(&target, TriggerReason::Scheduled)
                    .await
                {
                    warn!(target = %target, error = %e, "scheduled health check failed");
                }
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "probe task panicked");
            }
        }
    }

    /// Run probe rounds until the shutdown signal flips to true
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.interval);
        info!(interval_secs = self.config.interval.as_secs(), "probe scheduler started");

        loop {
            tokio::select! {
                _ = interval.tick() => self.tick().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("probe scheduler stopping");
                        return;
                    }
                }
            }
        }
    }
}
