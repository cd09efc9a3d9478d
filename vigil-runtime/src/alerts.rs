//! Alert lifecycle: creation, deduplication, transitions and resolution
//!
//! Creation is serialized behind a single guard so the "at most one open
//! alert per (type, service, scope)" rule holds under concurrent probes.
//! A duplicate create updates the existing open alert in place instead of
//! raising a second incident.

use crate::notify::NotificationDispatcher;
use crate::{Error, Result};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use uuid::Uuid;
use vigil_core::{AlertSeverity, AlertStatus, AlertType, HealthStatus, HealthThresholds};
use vigil_storage::{AlertModel, Store};

/// Knobs for alert creation and renotification
#[derive(Debug, Clone, PartialEq)]
pub struct AlertManagerConfig {
    /// Minutes between renotifications for one ongoing incident
    pub cooldown_minutes: i64,
    /// Whether an ongoing incident renotifies after the cooldown elapses
    pub renotify_after_cooldown: bool,
}

impl Default for AlertManagerConfig {
    fn default() -> Self {
        Self {
            cooldown_minutes: 30,
            renotify_after_cooldown: false,
        }
    }
}

impl AlertManagerConfig {
    /// Load from environment variables
    ///
    /// - `VIGIL_ALERT_COOLDOWN_MINUTES`: renotification cooldown (30)
    /// - `VIGIL_ALERT_RENOTIFY`: renotify after cooldown, `true`/`false` (false)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let cooldown_minutes = match std::env::var("VIGIL_ALERT_COOLDOWN_MINUTES") {
            Ok(raw) => raw.parse().map_err(|_| {
                Error::InvalidConfig(format!("VIGIL_ALERT_COOLDOWN_MINUTES is not valid: {}", raw))
            })?,
            Err(_) => defaults.cooldown_minutes,
        };
        let renotify_after_cooldown = match std::env::var("VIGIL_ALERT_RENOTIFY") {
            Ok(raw) => raw.parse().map_err(|_| {
                Error::InvalidConfig(format!("VIGIL_ALERT_RENOTIFY is not valid: {}", raw))
            })?,
            Err(_) => defaults.renotify_after_cooldown,
        };

        if cooldown_minutes < 0 {
            return Err(Error::InvalidConfig(
                "alert cooldown must not be negative".to_string(),
            ));
        }
        Ok(Self {
            cooldown_minutes,
            renotify_after_cooldown,
        })
    }
}

/// A request to raise (or refresh) an alert
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub detail: Option<serde_json::Value>,
    pub service: String,
    pub scope: Option<String>,
    pub related_alert_id: Option<Uuid>,
    /// Initial status; recovery notices are created already resolved
    pub status: AlertStatus,
}

/// A probe-driven status change for one target
#[derive(Debug, Clone)]
pub struct ProbeTransition {
    pub service: String,
    pub scope: Option<String>,
    pub previous: Option<HealthStatus>,
    pub current: HealthStatus,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
}

/// Drives alerts through their lifecycle
pub struct AlertLifecycleManager {
    store: Arc<dyn Store>,
    dispatcher: Arc<NotificationDispatcher>,
    thresholds: HealthThresholds,
    config: AlertManagerConfig,
    /// Serializes create() so the open-alert dedup check cannot race
    create_guard: Mutex<()>,
}

impl AlertLifecycleManager {
    pub fn new(
        store: Arc<dyn Store>,
        dispatcher: Arc<NotificationDispatcher>,
        thresholds: HealthThresholds,
        config: AlertManagerConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            thresholds,
            config,
            create_guard: Mutex::new(()),
        }
    }

    /// Raise an alert, deduplicating against the open alert for the same
    /// (type, service, scope)
    ///
    /// A duplicate refreshes the existing alert's message and escalates
    /// its severity if the new request is more severe; it renotifies only
    /// when configured to and the cooldown has elapsed.
    #[instrument(skip(self, new), fields(alert_type = %new.alert_type, service = %new.service))]
    pub async fn create(&self, new: NewAlert) -> Result<AlertModel> {
        let _guard = self.create_guard.lock().await;
        let now = Utc::now();

        if new.status.is_open() {
            if let Some(mut existing) = self
                .store
                .find_open_alert(new.alert_type, &new.service, new.scope.as_deref())
                .await?
            {
                existing.message = new.message;
                existing.detail = new.detail;
                existing.severity = existing.severity.max(new.severity);
                existing.updated_at = now;

                if self.config.renotify_after_cooldown && self.cooldown_elapsed(&existing, now) {
                    let attempts = self.dispatcher.dispatch(&existing).await;
                    if !attempts.is_empty() {
                        existing.last_notified_at = Some(now);
                        existing.notification_attempts.extend(attempts);
                    }
                }

                self.store.update_alert(&existing).await?;
                info!(alert_id = %existing.id, "refreshed existing open alert");
                return Ok(existing);
            }
        }

        let resolved = !new.status.is_open();
        let mut alert = AlertModel {
            id: Uuid::new_v4(),
            alert_type: new.alert_type,
            severity: new.severity,
            title: new.title,
            message: new.message,
            detail: new.detail,
            service: new.service,
            scope: new.scope,
            status: new.status,
            acknowledged_by: None,
            acknowledged_at: None,
            acknowledgement_note: None,
            resolved_by: resolved.then(|| "vigil".to_string()),
            resolved_at: resolved.then_some(now),
            resolution_note: None,
            notification_attempts: vec![],
            last_notified_at: None,
            related_alert_id: new.related_alert_id,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_alert(alert.clone()).await?;

        let attempts = self.dispatcher.dispatch(&alert).await;
        if !attempts.is_empty() {
            alert.last_notified_at = Some(Utc::now());
            alert.notification_attempts = attempts;
            alert.updated_at = Utc::now();
            self.store.update_alert(&alert).await?;
        }

        info!(alert_id = %alert.id, severity = %alert.severity, "alert created");
        Ok(alert)
    }

    /// A human takes ownership of an active alert
    pub async fn acknowledge(
        &self,
        alert_id: Uuid,
        actor: &str,
        note: Option<&str>,
    ) -> Result<AlertModel> {
        let mut alert = self.require(alert_id).await?;
        if alert.status != AlertStatus::Active {
            return Err(Error::InvalidTransition(format!(
                "cannot acknowledge alert in status {}",
                alert.status
            )));
        }
        alert.status = AlertStatus::Acknowledged;
        alert.acknowledged_by = Some(actor.to_string());
        alert.acknowledged_at = Some(Utc::now());
        alert.acknowledgement_note = note.map(|n| n.to_string());
        alert.updated_at = Utc::now();
        self.store.update_alert(&alert).await?;
        Ok(alert)
    }

    /// Close an open alert because the condition cleared
    pub async fn resolve(
        &self,
        alert_id: Uuid,
        actor: &str,
        note: Option<&str>,
    ) -> Result<AlertModel> {
        let mut alert = self.require(alert_id).await?;
        if !alert.is_open() {
            return Err(Error::InvalidTransition(format!(
                "cannot resolve alert in status {}",
                alert.status
            )));
        }
        alert.status = AlertStatus::Resolved;
        alert.resolved_by = Some(actor.to_string());
        alert.resolved_at = Some(Utc::now());
        alert.resolution_note = note.map(|n| n.to_string());
        alert.updated_at = Utc::now();
        self.store.update_alert(&alert).await?;
        Ok(alert)
    }

    /// Close an open alert without action
    pub async fn suppress(&self, alert_id: Uuid, actor: &str) -> Result<AlertModel> {
        let mut alert = self.require(alert_id).await?;
        if !alert.is_open() {
            return Err(Error::InvalidTransition(format!(
                "cannot suppress alert in status {}",
                alert.status
            )));
        }
        alert.status = AlertStatus::Suppressed;
        alert.resolved_by = Some(actor.to_string());
        alert.resolved_at = Some(Utc::now());
        alert.updated_at = Utc::now();
        self.store.update_alert(&alert).await?;
        Ok(alert)
    }

    /// Resolve every open alert for a service at once
    pub async fn resolve_by_service(
        &self,
        service: &str,
        scope: Option<&str>,
        actor: &str,
        note: &str,
    ) -> Result<u64> {
        Ok(self
            .store
            .bulk_resolve_alerts(service, scope, actor, note)
            .await?)
    }

    /// React to a probe-driven status change
    ///
    /// Three conditions raise or close alerts:
    /// - the target is unhealthy with the failure threshold reached:
    ///   raise (or refresh) a connection-failure alert;
    /// - the target went unhealthy to healthy: close every open alert for
    ///   it and record a recovery notice, already resolved;
    /// - the target just became degraded: raise a warning.
    #[instrument(skip(self, transition), fields(service = %transition.service, current = %transition.current))]
    pub async fn handle_transition(
        &self,
        transition: &ProbeTransition,
    ) -> Result<Option<AlertModel>> {
        let scope = transition.scope.as_deref();

        if transition.current == HealthStatus::Unhealthy
            && transition.consecutive_failures >= self.thresholds.consecutive_failure_threshold
        {
            let error = transition
                .last_error
                .clone()
                .unwrap_or_else(|| "probe failed".to_string());
            let alert = self
                .create(NewAlert {
                    alert_type: AlertType::ConnectionFailure,
                    severity: AlertSeverity::Error,
                    title: format!("{} is unhealthy", transition.service),
                    message: format!(
                        "{} consecutive probe failures; last error: {}",
                        transition.consecutive_failures, error
                    ),
                    detail: Some(serde_json::json!({
                        "consecutive_failures": transition.consecutive_failures,
                        "last_error": transition.last_error,
                    })),
                    service: transition.service.clone(),
                    scope: transition.scope.clone(),
                    related_alert_id: None,
                    status: AlertStatus::Active,
                })
                .await?;
            return Ok(Some(alert));
        }

        if transition.previous == Some(HealthStatus::Unhealthy)
            && transition.current == HealthStatus::Healthy
        {
            let incident = self
                .store
                .find_open_alert(AlertType::ConnectionFailure, &transition.service, scope)
                .await?;

            let resolved = self
                .resolve_by_service(
                    &transition.service,
                    scope,
                    "vigil",
                    "target recovered",
                )
                .await?;
            if resolved > 0 {
                info!(count = resolved, "auto-resolved open alerts on recovery");
            }

            let alert = self
                .create(NewAlert {
                    alert_type: AlertType::Recovered,
                    severity: AlertSeverity::Info,
                    title: format!("{} recovered", transition.service),
                    message: "target is healthy again after an unhealthy period".to_string(),
                    detail: None,
                    service: transition.service.clone(),
                    scope: transition.scope.clone(),
                    related_alert_id: incident.map(|a| a.id),
                    status: AlertStatus::Resolved,
                })
                .await?;
            return Ok(Some(alert));
        }

        if transition.current == HealthStatus::Degraded
            && transition.previous != Some(HealthStatus::Degraded)
        {
            let alert = self
                .create(NewAlert {
                    alert_type: AlertType::Degraded,
                    severity: AlertSeverity::Warning,
                    title: format!("{} is degraded", transition.service),
                    message: "target is responding slowly or unreliably".to_string(),
                    detail: None,
                    service: transition.service.clone(),
                    scope: transition.scope.clone(),
                    related_alert_id: None,
                    status: AlertStatus::Active,
                })
                .await?;
            return Ok(Some(alert));
        }

        Ok(None)
    }

    async fn require(&self, alert_id: Uuid) -> Result<AlertModel> {
        self.store
            .get_alert(alert_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("alert {}", alert_id)))
    }

    fn cooldown_elapsed(&self, alert: &AlertModel, now: chrono::DateTime<Utc>) -> bool {
        match alert.last_notified_at {
            Some(last) => now - last >= Duration::minutes(self.config.cooldown_minutes),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::ChannelKind;
    use vigil_storage::{ChannelConfigModel, ChannelEndpoint, MemoryStore};

    fn manager(store: Arc<MemoryStore>) -> AlertLifecycleManager {
        manager_with(store, AlertManagerConfig::default())
    }

    fn manager_with(store: Arc<MemoryStore>, config: AlertManagerConfig) -> AlertLifecycleManager {
        let dispatcher = Arc::new(NotificationDispatcher::new(store.clone(), vec![]));
        AlertLifecycleManager::new(store, dispatcher, HealthThresholds::default(), config)
    }

    /// A config that never suppresses on its own, so the manager's
    /// renotify knob is the only gate under test.
    fn webhook_config() -> ChannelConfigModel {
        ChannelConfigModel {
            id: Uuid::new_v4(),
            name: "hooks".to_string(),
            services: vec![],
            alert_types: vec![],
            min_severity: vigil_core::AlertSeverity::Info,
            channels: vec![ChannelEndpoint {
                kind: ChannelKind::Webhook,
                endpoint: "http://hooks.internal/vigil".to_string(),
                enabled: true,
            }],
            cooldown_minutes: 30,
            suppress_duplicates: false,
            enabled: true,
        }
    }

    async fn backdate_notification(store: &MemoryStore, alert_id: Uuid, minutes: i64) {
        let mut alert = store.get_alert(alert_id).await.unwrap().unwrap();
        alert.last_notified_at = Some(Utc::now() - Duration::minutes(minutes));
        store.update_alert(&alert).await.unwrap();
    }

    fn new_alert(service: &str) -> NewAlert {
        NewAlert {
            alert_type: AlertType::ConnectionFailure,
            severity: AlertSeverity::Error,
            title: format!("{} is unhealthy", service),
            message: "3 consecutive probe failures".to_string(),
            detail: None,
            service: service.to_string(),
            scope: None,
            related_alert_id: None,
            status: AlertStatus::Active,
        }
    }

    fn unhealthy_transition(service: &str, failures: u32) -> ProbeTransition {
        ProbeTransition {
            service: service.to_string(),
            scope: None,
            previous: Some(HealthStatus::Unhealthy),
            current: HealthStatus::Unhealthy,
            consecutive_failures: failures,
            last_error: Some("connection refused".to_string()),
        }
    }

    #[tokio::test]
    async fn test_duplicate_create_updates_open_alert() {
        let store = Arc::new(MemoryStore::new());
        let mgr = manager(store.clone());

        let first = mgr.create(new_alert("ocr")).await.unwrap();

        let mut second = new_alert("ocr");
        second.message = "5 consecutive probe failures".to_string();
        second.severity = AlertSeverity::Critical;
        let updated = mgr.create(second).await.unwrap();

        assert_eq!(updated.id, first.id);
        assert_eq!(updated.message, "5 consecutive probe failures");
        assert_eq!(updated.severity, AlertSeverity::Critical);
        assert_eq!(store.open_alerts("ocr", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_severity_never_downgrades_on_refresh() {
        let store = Arc::new(MemoryStore::new());
        let mgr = manager(store);

        let mut first = new_alert("ocr");
        first.severity = AlertSeverity::Critical;
        mgr.create(first).await.unwrap();

        let refreshed = mgr.create(new_alert("ocr")).await.unwrap();
        assert_eq!(refreshed.severity, AlertSeverity::Critical);
    }

    #[tokio::test]
    async fn test_distinct_dedup_keys_create_distinct_alerts() {
        let store = Arc::new(MemoryStore::new());
        let mgr = manager(store.clone());

        mgr.create(new_alert("ocr")).await.unwrap();
        mgr.create(new_alert("mapping")).await.unwrap();
        let mut scoped = new_alert("ocr");
        scoped.scope = Some("eu-west".to_string());
        mgr.create(scoped).await.unwrap();

        assert_eq!(store.open_alerts("ocr", None).await.unwrap().len(), 2);
        assert_eq!(store.open_alerts("mapping", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_never_renotifies_by_default() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_channel_config(webhook_config()).await.unwrap();
        let mgr = manager(store.clone());

        let first = mgr.create(new_alert("ocr")).await.unwrap();
        assert_eq!(first.notification_attempts.len(), 1);

        // Even well past the cooldown, a refresh with the knob off stays quiet.
        backdate_notification(&store, first.id, 90).await;
        let refreshed = mgr.create(new_alert("ocr")).await.unwrap();
        assert_eq!(refreshed.notification_attempts.len(), 1);
        assert_eq!(
            refreshed.last_notified_at,
            store
                .get_alert(first.id)
                .await
                .unwrap()
                .unwrap()
                .last_notified_at
        );
    }

    #[tokio::test]
    async fn test_renotify_waits_out_the_cooldown() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_channel_config(webhook_config()).await.unwrap();
        let mgr = manager_with(
            store.clone(),
            AlertManagerConfig {
                cooldown_minutes: 30,
                renotify_after_cooldown: true,
            },
        );

        let first = mgr.create(new_alert("ocr")).await.unwrap();
        assert_eq!(first.notification_attempts.len(), 1);

        // Inside the cooldown a refresh does not re-dispatch.
        let refreshed = mgr.create(new_alert("ocr")).await.unwrap();
        assert_eq!(refreshed.id, first.id);
        assert_eq!(refreshed.notification_attempts.len(), 1);
    }

    #[tokio::test]
    async fn test_renotify_fires_after_cooldown_elapses() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_channel_config(webhook_config()).await.unwrap();
        let mgr = manager_with(
            store.clone(),
            AlertManagerConfig {
                cooldown_minutes: 30,
                renotify_after_cooldown: true,
            },
        );

        let first = mgr.create(new_alert("ocr")).await.unwrap();
        let before = first.last_notified_at.unwrap();
        backdate_notification(&store, first.id, 31).await;

        let refreshed = mgr.create(new_alert("ocr")).await.unwrap();
        assert_eq!(refreshed.id, first.id);
        assert_eq!(refreshed.notification_attempts.len(), 2);
        assert!(refreshed.last_notified_at.unwrap() >= before);
    }

    #[tokio::test]
    async fn test_acknowledge_then_resolve() {
        let store = Arc::new(MemoryStore::new());
        let mgr = manager(store);

        let alert = mgr.create(new_alert("ocr")).await.unwrap();
        let acked = mgr
            .acknowledge(alert.id, "casey", Some("looking into it"))
            .await
            .unwrap();
        assert_eq!(acked.status, AlertStatus::Acknowledged);
        assert_eq!(acked.acknowledged_by.as_deref(), Some("casey"));
        assert_eq!(
            acked.acknowledgement_note.as_deref(),
            Some("looking into it")
        );

        let resolved = mgr
            .resolve(alert.id, "casey", Some("restarted the service"))
            .await
            .unwrap();
        assert_eq!(resolved.status, AlertStatus::Resolved);
        assert_eq!(
            resolved.resolution_note.as_deref(),
            Some("restarted the service")
        );
    }

    #[tokio::test]
    async fn test_lifecycle_rejects_invalid_transitions() {
        let store = Arc::new(MemoryStore::new());
        let mgr = manager(store);

        let alert = mgr.create(new_alert("ocr")).await.unwrap();
        mgr.resolve(alert.id, "casey", None).await.unwrap();

        assert!(matches!(
            mgr.acknowledge(alert.id, "casey", None).await,
            Err(Error::InvalidTransition(_))
        ));
        assert!(matches!(
            mgr.resolve(alert.id, "casey", None).await,
            Err(Error::InvalidTransition(_))
        ));
        assert!(matches!(
            mgr.suppress(alert.id, "casey").await,
            Err(Error::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_alert_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let mgr = manager(store);
        assert!(matches!(
            mgr.acknowledge(Uuid::new_v4(), "casey", None).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_threshold_transition_raises_connection_failure() {
        let store = Arc::new(MemoryStore::new());
        let mgr = manager(store.clone());

        let alert = mgr
            .handle_transition(&unhealthy_transition("ocr", 3))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(alert.alert_type, AlertType::ConnectionFailure);
        assert_eq!(alert.severity, AlertSeverity::Error);

        // Repeated failures refresh the same incident.
        mgr.handle_transition(&unhealthy_transition("ocr", 4))
            .await
            .unwrap();
        assert_eq!(store.open_alerts("ocr", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_below_threshold_failures_raise_nothing() {
        let store = Arc::new(MemoryStore::new());
        let mgr = manager(store.clone());

        let result = mgr
            .handle_transition(&unhealthy_transition("ocr", 2))
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(store.open_alerts("ocr", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recovery_closes_incident_and_records_notice() {
        let store = Arc::new(MemoryStore::new());
        let mgr = manager(store.clone());

        let incident = mgr
            .handle_transition(&unhealthy_transition("ocr", 3))
            .await
            .unwrap()
            .unwrap();

        let recovery = ProbeTransition {
            service: "ocr".to_string(),
            scope: None,
            previous: Some(HealthStatus::Unhealthy),
            current: HealthStatus::Healthy,
            consecutive_failures: 0,
            last_error: None,
        };
        let notice = mgr.handle_transition(&recovery).await.unwrap().unwrap();

        assert_eq!(notice.alert_type, AlertType::Recovered);
        assert_eq!(notice.status, AlertStatus::Resolved);
        assert_eq!(notice.related_alert_id, Some(incident.id));
        assert!(store.open_alerts("ocr", None).await.unwrap().is_empty());

        let closed = store.get_alert(incident.id).await.unwrap().unwrap();
        assert_eq!(closed.status, AlertStatus::Resolved);
        assert_eq!(closed.resolved_by.as_deref(), Some("vigil"));
    }

    #[tokio::test]
    async fn test_degraded_transition_raises_warning_once() {
        let store = Arc::new(MemoryStore::new());
        let mgr = manager(store.clone());

        let degraded = ProbeTransition {
            service: "ocr".to_string(),
            scope: None,
            previous: Some(HealthStatus::Healthy),
            current: HealthStatus::Degraded,
            consecutive_failures: 0,
            last_error: None,
        };
        let alert = mgr.handle_transition(&degraded).await.unwrap().unwrap();
        assert_eq!(alert.alert_type, AlertType::Degraded);
        assert_eq!(alert.severity, AlertSeverity::Warning);

        // Staying degraded raises nothing new.
        let steady = ProbeTransition {
            previous: Some(HealthStatus::Degraded),
            ..degraded
        };
        assert!(mgr.handle_transition(&steady).await.unwrap().is_none());
        assert_eq!(store.open_alerts("ocr", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_healthy_steady_state_raises_nothing() {
        let store = Arc::new(MemoryStore::new());
        let mgr = manager(store);

        let steady = ProbeTransition {
            service: "ocr".to_string(),
            scope: None,
            previous: Some(HealthStatus::Healthy),
            current: HealthStatus::Healthy,
            consecutive_failures: 0,
            last_error: None,
        };
        assert!(mgr.handle_transition(&steady).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_creates_yield_one_open_alert() {
        let store = Arc::new(MemoryStore::new());
        let mgr = Arc::new(manager(store.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let mgr = mgr.clone();
            handles.push(tokio::spawn(async move {
                mgr.create(new_alert("ocr")).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.open_alerts("ocr", None).await.unwrap().len(), 1);
    }
}
