//! Health status aggregation over persisted probe history
//!
//! The aggregator derives every figure from the store on each call —
//! there is no in-process counter to lose on restart or to drift across
//! instances. Writes for one (target, scope) are serialized through a
//! per-target mutex so the `previous_status` chain stays accurate;
//! probes against different targets proceed independently.

use crate::Result;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::instrument;
use uuid::Uuid;
use vigil_core::{HealthStatus, HealthThresholds, ProbeOutcome, TriggerReason};
use vigil_storage::{HealthCheckModel, Store};

/// Probe statistics over the rolling window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub total: u64,
    pub successes: u64,
    /// Success percentage; an empty window reads as 100 so a cold start
    /// never raises a false alarm
    pub success_rate: f64,
}

impl WindowStats {
    /// Stats for a window with no observations
    pub fn empty() -> Self {
        Self {
            total: 0,
            successes: 0,
            success_rate: 100.0,
        }
    }
}

/// Derived overall health of a target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthEvaluation {
    pub status: HealthStatus,
    pub consecutive_failures: u32,
    pub stats: WindowStats,
}

/// Derives health classifications from the persisted probe history
pub struct HealthStatusAggregator {
    store: Arc<dyn Store>,
    thresholds: HealthThresholds,
    /// One write lock per (target, scope)
    target_locks: Mutex<HashMap<(String, Option<String>), Arc<Mutex<()>>>>,
}

impl HealthStatusAggregator {
    /// Create an aggregator over the given store and thresholds
    pub fn new(store: Arc<dyn Store>, thresholds: HealthThresholds) -> Self {
        Self {
            store,
            thresholds,
            target_locks: Mutex::new(HashMap::new()),
        }
    }

    /// The thresholds this aggregator classifies with
    pub fn thresholds(&self) -> &HealthThresholds {
        &self.thresholds
    }

    /// Count failures from the newest record back to the first healthy one
    pub async fn consecutive_failures(
        &self,
        target: &str,
        scope: Option<&str>,
    ) -> Result<u32> {
        let limit = self.thresholds.consecutive_failure_threshold as usize + 1;
        let recent = self.store.recent_health_checks(target, scope, limit).await?;

        let mut count = 0u32;
        for check in &recent {
            if check.status == HealthStatus::Unhealthy {
                count += 1;
            } else {
                break;
            }
        }
        Ok(count)
    }

    /// Success rate over the trailing window
    pub async fn window_stats(&self, target: &str, scope: Option<&str>) -> Result<WindowStats> {
        let since = Utc::now() - Duration::hours(self.thresholds.window_hours);
        let checks = self.store.health_checks_since(target, scope, since).await?;

        if checks.is_empty() {
            return Ok(WindowStats::empty());
        }

        let total = checks.len() as u64;
        let successes = checks.iter().filter(|c| c.success).count() as u64;
        Ok(WindowStats {
            total,
            successes,
            success_rate: successes as f64 / total as f64 * 100.0,
        })
    }

    /// Overall status of a target, derived entirely from stored history
    #[instrument(skip(self), fields(target = %target))]
    pub async fn evaluate(&self, target: &str, scope: Option<&str>) -> Result<HealthEvaluation> {
        let consecutive_failures = self.consecutive_failures(target, scope).await?;
        let stats = self.window_stats(target, scope).await?;
        let status = self
            .thresholds
            .classify(consecutive_failures, stats.success_rate);

        Ok(HealthEvaluation {
            status,
            consecutive_failures,
            stats,
        })
    }

    /// Persist one probe outcome as a health check record
    ///
    /// Serialized per (target, scope) so concurrent probes against the
    /// same target cannot interleave their previous-status chains.
    #[instrument(skip(self, outcome), fields(target = %target, trigger = %trigger))]
    pub async fn record_probe(
        &self,
        target: &str,
        scope: Option<&str>,
        outcome: &ProbeOutcome,
        trigger: TriggerReason,
    ) -> Result<HealthCheckModel> {
        let lock = self.target_lock(target, scope).await;
        let _guard = lock.lock().await;

        let status = self.thresholds.classify_probe(outcome);
        let message = match &outcome.error {
            Some(error) => error.clone(),
            None => format!("ok in {}ms", outcome.latency_ms),
        };

        let check = HealthCheckModel {
            id: Uuid::new_v4(),
            target: target.to_string(),
            scope: scope.map(|s| s.to_string()),
            status,
            previous_status: None, // set by the store from the chain tail
            success: outcome.success,
            message: Some(message),
            detail: Some(serde_json::json!({
                "status_code": outcome.status_code,
                "latency_ms": outcome.latency_ms,
                "error": outcome.error,
            })),
            response_time_ms: Some(outcome.latency_ms),
            trigger,
            checked_at: Utc::now(),
        };

        Ok(self.store.append_health_check(check).await?)
    }

    async fn target_lock(&self, target: &str, scope: Option<&str>) -> Arc<Mutex<()>> {
        let key = (target.to_string(), scope.map(|s| s.to_string()));
        let mut locks = self.target_locks.lock().await;
        locks.entry(key).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_storage::MemoryStore;

    fn aggregator(store: Arc<MemoryStore>) -> HealthStatusAggregator {
        HealthStatusAggregator::new(store, HealthThresholds::default())
    }

    async fn record(agg: &HealthStatusAggregator, target: &str, success: bool) {
        let outcome = if success {
            ProbeOutcome::success(200, 20)
        } else {
            ProbeOutcome::failure(None, 20, "connection refused")
        };
        agg.record_probe(target, None, &outcome, TriggerReason::Scheduled)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_consecutive_failures_reset_by_healthy_probe() {
        let store = Arc::new(MemoryStore::new());
        let agg = aggregator(store);

        // History U, U, U, H (newest last): the healthy tail resets the count.
        for success in [false, false, false, true] {
            record(&agg, "ocr", success).await;
        }
        assert_eq!(agg.consecutive_failures("ocr", None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_consecutive_failures_counted_from_newest() {
        let store = Arc::new(MemoryStore::new());
        let agg = aggregator(store);

        // History H, U, U, U (newest last).
        for success in [true, false, false, false] {
            record(&agg, "ocr", success).await;
        }
        assert_eq!(agg.consecutive_failures("ocr", None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_empty_window_reads_as_full_success() {
        let store = Arc::new(MemoryStore::new());
        let agg = aggregator(store);
        let stats = agg.window_stats("ocr", None).await.unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.success_rate, 100.0);

        let eval = agg.evaluate("ocr", None).await.unwrap();
        assert_eq!(eval.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_success_rate_drives_degraded_and_unhealthy() {
        let store = Arc::new(MemoryStore::new());
        let agg = aggregator(store);

        // 8 of 10 succeed: 80% is degraded but the last probes are healthy,
        // so the consecutive count stays low.
        for success in [false, false, true, true, true, true, true, true, true, true] {
            record(&agg, "ocr", success).await;
        }
        let eval = agg.evaluate("ocr", None).await.unwrap();
        assert_eq!(eval.consecutive_failures, 0);
        assert!((eval.stats.success_rate - 80.0).abs() < f64::EPSILON);
        assert_eq!(eval.status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn test_threshold_failures_make_unhealthy() {
        let store = Arc::new(MemoryStore::new());
        let agg = aggregator(store);
        for _ in 0..3 {
            record(&agg, "ocr", false).await;
        }
        let eval = agg.evaluate("ocr", None).await.unwrap();
        assert_eq!(eval.consecutive_failures, 3);
        assert_eq!(eval.status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_record_probe_chains_previous_status() {
        let store = Arc::new(MemoryStore::new());
        let agg = aggregator(store);

        record(&agg, "ocr", true).await;
        let outcome = ProbeOutcome::failure(Some(503), 15, "service unavailable");
        let recorded = agg
            .record_probe("ocr", None, &outcome, TriggerReason::Manual)
            .await
            .unwrap();

        assert_eq!(recorded.status, HealthStatus::Unhealthy);
        assert_eq!(recorded.previous_status, Some(HealthStatus::Healthy));
        assert_eq!(recorded.trigger, TriggerReason::Manual);
        assert!(recorded.is_transition());
    }

    #[tokio::test]
    async fn test_slow_success_is_degraded_observation() {
        let store = Arc::new(MemoryStore::new());
        let agg = aggregator(store);
        let outcome = ProbeOutcome::success(200, 8_000);
        let recorded = agg
            .record_probe("ocr", None, &outcome, TriggerReason::Scheduled)
            .await
            .unwrap();
        assert_eq!(recorded.status, HealthStatus::Degraded);
        assert!(recorded.success);
    }

    #[tokio::test]
    async fn test_concurrent_probes_same_target_keep_chain_intact() {
        let store = Arc::new(MemoryStore::new());
        let agg = Arc::new(aggregator(store.clone()));

        let mut handles = Vec::new();
        for i in 0..10 {
            let agg = agg.clone();
            handles.push(tokio::spawn(async move {
                let outcome = if i % 2 == 0 {
                    ProbeOutcome::success(200, 10)
                } else {
                    ProbeOutcome::failure(None, 10, "refused")
                };
                agg.record_probe("ocr", None, &outcome, TriggerReason::Scheduled)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Every record's previous_status equals its predecessor's status.
        let history = store.recent_health_checks("ocr", None, 10).await.unwrap();
        for pair in history.windows(2) {
            assert_eq!(pair[0].previous_status, Some(pair[1].status));
        }
    }
}
