//! Health check orchestration
//!
//! [`HealthService`] ties the pieces together: it probes a configured
//! target, records the outcome through the aggregator, and hands the
//! resulting transition to the alert manager. A check against an
//! unconfigured target reports [`HealthStatus::Unconfigured`] without
//! persisting anything.

use crate::aggregator::{HealthStatusAggregator, WindowStats};
use crate::alerts::{AlertLifecycleManager, ProbeTransition};
use crate::probe::Prober;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, warn};
use uuid::Uuid;
use vigil_core::{HealthStatus, TriggerReason};
use vigil_storage::{AlertModel, HealthCheckModel, HealthHistoryFilter, Store};

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// One monitored dependency
#[derive(Debug, Clone, PartialEq)]
pub struct TargetConfig {
    /// Service name, also the alerting service key
    pub service: String,
    /// Optional sub-scope (region, tenant)
    pub scope: Option<String>,
    /// URL the prober hits
    pub endpoint: String,
    /// Per-probe timeout
    pub timeout: Duration,
}

impl TargetConfig {
    pub fn new(service: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            scope: None,
            endpoint: endpoint.into(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Current derived health of one target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallHealth {
    pub target: String,
    pub status: HealthStatus,
    pub consecutive_failures: u32,
    pub stats: WindowStats,
    pub open_alerts: Vec<AlertModel>,
}

/// One point where a target's status changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: Option<HealthStatus>,
    pub to: HealthStatus,
    pub at: DateTime<Utc>,
    pub trigger: TriggerReason,
}

/// Probes targets and drives the alerting pipeline from the results
pub struct HealthService {
    store: Arc<dyn Store>,
    prober: Arc<dyn Prober>,
    aggregator: Arc<HealthStatusAggregator>,
    alerts: Arc<AlertLifecycleManager>,
    targets: HashMap<String, TargetConfig>,
}

impl HealthService {
    pub fn new(
        store: Arc<dyn Store>,
        prober: Arc<dyn Prober>,
        aggregator: Arc<HealthStatusAggregator>,
        alerts: Arc<AlertLifecycleManager>,
        targets: Vec<TargetConfig>,
    ) -> Self {
        let targets = targets
            .into_iter()
            .map(|t| (t.service.clone(), t))
            .collect();
        Self {
            store,
            prober,
            aggregator,
            alerts,
            targets,
        }
    }

    /// Names of all configured targets
    pub fn target_names(&self) -> Vec<String> {
        self.targets.keys().cloned().collect()
    }

    /// Probe one target and run the full record/aggregate/alert pipeline
    ///
    /// An unknown target yields an unpersisted `Unconfigured` record
    /// rather than an error, so dashboards can render it like any other
    /// status.
    #[instrument(skip(self), fields(target = %target, trigger = %trigger))]
    pub async fn run_health_check(
        &self,
        target: &str,
        trigger: TriggerReason,
    ) -> Result<HealthCheckModel> {
        let config = match self.targets.get(target) {
            Some(config) => config,
            None => {
                warn!("health check requested for unconfigured target");
                return Ok(unconfigured_check(target, trigger));
            }
        };
        let scope = config.scope.as_deref();

        let outcome = self.prober.probe(&config.endpoint, config.timeout).await;
        let recorded = self
            .aggregator
            .record_probe(&config.service, scope, &outcome, trigger)
            .await?;

        let consecutive_failures = self
            .aggregator
            .consecutive_failures(&config.service, scope)
            .await?;

        self.alerts
            .handle_transition(&ProbeTransition {
                service: config.service.clone(),
                scope: config.scope.clone(),
                previous: recorded.previous_status,
                current: recorded.status,
                consecutive_failures,
                last_error: outcome.error.clone(),
            })
            .await?;

        Ok(recorded)
    }

    /// Derived status plus open alerts for a target
    ///
    /// An unconfigured target short-circuits to `Unconfigured` rather
    /// than letting the empty probe window read as healthy.
    pub async fn overall_health(&self, target: &str) -> Result<OverallHealth> {
        let config = match self.targets.get(target) {
            Some(config) => config,
            None => {
                return Ok(OverallHealth {
                    target: target.to_string(),
                    status: HealthStatus::Unconfigured,
                    consecutive_failures: 0,
                    stats: WindowStats::empty(),
                    open_alerts: Vec::new(),
                });
            }
        };
        let scope = config.scope.as_deref();

        let evaluation = self.aggregator.evaluate(target, scope).await?;
        let open_alerts = self.store.open_alerts(target, scope).await?;

        Ok(OverallHealth {
            target: target.to_string(),
            status: evaluation.status,
            consecutive_failures: evaluation.consecutive_failures,
            stats: evaluation.stats,
            open_alerts,
        })
    }

    /// Filtered probe history for a target, newest first
    pub async fn health_history(
        &self,
        target: &str,
        filter: &HealthHistoryFilter,
    ) -> Result<Vec<HealthCheckModel>> {
        Ok(self.store.health_history(target, filter).await?)
    }

    /// Status transitions for a target, newest first
    pub async fn status_changes(&self, target: &str, limit: usize) -> Result<Vec<StatusChange>> {
        let scope = self
            .targets
            .get(target)
            .and_then(|t| t.scope.as_deref());
        let history = self
            .store
            .recent_health_checks(target, scope, limit)
            .await?;

        Ok(history
            .into_iter()
            .filter(|check| check.is_transition())
            .map(|check| StatusChange {
                from: check.previous_status,
                to: check.status,
                at: check.checked_at,
                trigger: check.trigger,
            })
            .collect())
    }
}

fn unconfigured_check(target: &str, trigger: TriggerReason) -> HealthCheckModel {
    HealthCheckModel {
        id: Uuid::new_v4(),
        target: target.to_string(),
        scope: None,
        status: HealthStatus::Unconfigured,
        previous_status: None,
        success: false,
        message: Some("no endpoint configured for target".to_string()),
        detail: None,
        response_time_ms: None,
        trigger,
        checked_at: Utc::now(),
    }
}
