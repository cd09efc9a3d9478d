//! In-memory reference store
//!
//! Backs the runtime's tests and single-process deployments that do not
//! need durability. One `RwLock` guards all state: appends and bulk
//! updates happen under a single write guard, which is what upholds the
//! previous-status chain and the atomicity of bulk resolution.

use crate::models::{
    AlertModel, ChannelConfigModel, HealthCheckModel, HealthHistoryFilter, StageRecordModel,
    WorkItemModel,
};
use crate::store::Store;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use vigil_core::{AlertStatus, AlertType};

#[derive(Default)]
struct State {
    work_items: HashMap<Uuid, WorkItemModel>,
    /// Keyed by (item, stage); the uniqueness invariant lives here
    stage_records: HashMap<(Uuid, String), StageRecordModel>,
    /// Append-only probe history per (target, scope), oldest first
    health_checks: HashMap<(String, Option<String>), Vec<HealthCheckModel>>,
    alerts: HashMap<Uuid, AlertModel>,
    channel_configs: HashMap<Uuid, ChannelConfigModel>,
}

/// In-memory [`Store`] implementation
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

fn scope_key(target: &str, scope: Option<&str>) -> (String, Option<String>) {
    (target.to_string(), scope.map(|s| s.to_string()))
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_work_item(&self, item: WorkItemModel) -> Result<WorkItemModel> {
        let mut state = self.state.write().await;
        let entry = state.work_items.entry(item.id).or_insert(item);
        Ok(entry.clone())
    }

    async fn get_work_item(&self, item_id: Uuid) -> Result<Option<WorkItemModel>> {
        let state = self.state.read().await;
        Ok(state.work_items.get(&item_id).cloned())
    }

    async fn mark_processing_started(&self, item_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.write().await;
        let item = state
            .work_items
            .get_mut(&item_id)
            .ok_or_else(|| Error::NotFound(format!("work item {}", item_id)))?;
        if item.processing_started_at.is_none() {
            item.processing_started_at = Some(at);
            item.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_processing_ended(
        &self,
        item_id: Uuid,
        at: DateTime<Utc>,
        total_duration_ms: i64,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let item = state
            .work_items
            .get_mut(&item_id)
            .ok_or_else(|| Error::NotFound(format!("work item {}", item_id)))?;
        if item.processing_ended_at.is_none() {
            item.processing_ended_at = Some(at);
            item.total_duration_ms = Some(total_duration_ms);
            item.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn completed_item_durations(&self, limit: usize) -> Result<Vec<i64>> {
        let state = self.state.read().await;
        let mut completed: Vec<&WorkItemModel> = state
            .work_items
            .values()
            .filter(|i| i.total_duration_ms.is_some())
            .collect();
        completed.sort_by_key(|i| std::cmp::Reverse(i.processing_ended_at));
        Ok(completed
            .into_iter()
            .take(limit)
            .filter_map(|i| i.total_duration_ms)
            .collect())
    }

    async fn upsert_stage_record(&self, record: StageRecordModel) -> Result<StageRecordModel> {
        let mut state = self.state.write().await;
        let key = (record.item_id, record.stage.clone());
        let entry = state.stage_records.entry(key).or_insert(record);
        Ok(entry.clone())
    }

    async fn get_stage_record(
        &self,
        item_id: Uuid,
        stage: &str,
    ) -> Result<Option<StageRecordModel>> {
        let state = self.state.read().await;
        Ok(state
            .stage_records
            .get(&(item_id, stage.to_string()))
            .cloned())
    }

    async fn update_stage_record(&self, record: &StageRecordModel) -> Result<()> {
        let mut state = self.state.write().await;
        let key = (record.item_id, record.stage.clone());
        match state.stage_records.get_mut(&key) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(Error::NotFound(format!(
                "stage record {}/{}",
                record.item_id, record.stage
            ))),
        }
    }

    async fn list_stage_records(&self, item_id: Uuid) -> Result<Vec<StageRecordModel>> {
        let state = self.state.read().await;
        let mut records: Vec<StageRecordModel> = state
            .stage_records
            .values()
            .filter(|r| r.item_id == item_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.order_index);
        Ok(records)
    }

    async fn append_health_check(&self, mut check: HealthCheckModel) -> Result<HealthCheckModel> {
        let mut state = self.state.write().await;
        let key = scope_key(&check.target, check.scope.as_deref());
        let history = state.health_checks.entry(key).or_default();
        // The chain invariant is enforced here, under the write lock.
        check.previous_status = history.last().map(|c| c.status);
        history.push(check.clone());
        Ok(check)
    }

    async fn latest_health_check(
        &self,
        target: &str,
        scope: Option<&str>,
    ) -> Result<Option<HealthCheckModel>> {
        let state = self.state.read().await;
        Ok(state
            .health_checks
            .get(&scope_key(target, scope))
            .and_then(|h| h.last().cloned()))
    }

    async fn recent_health_checks(
        &self,
        target: &str,
        scope: Option<&str>,
        limit: usize,
    ) -> Result<Vec<HealthCheckModel>> {
        let state = self.state.read().await;
        Ok(state
            .health_checks
            .get(&scope_key(target, scope))
            .map(|h| h.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn health_checks_since(
        &self,
        target: &str,
        scope: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<Vec<HealthCheckModel>> {
        let state = self.state.read().await;
        Ok(state
            .health_checks
            .get(&scope_key(target, scope))
            .map(|h| {
                h.iter()
                    .rev()
                    .filter(|c| c.checked_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn health_history(
        &self,
        target: &str,
        filter: &HealthHistoryFilter,
    ) -> Result<Vec<HealthCheckModel>> {
        let state = self.state.read().await;
        let mut matches: Vec<HealthCheckModel> = state
            .health_checks
            .iter()
            .filter(|((t, _), _)| t == target)
            .flat_map(|(_, h)| h.iter())
            .filter(|c| filter.status.map_or(true, |s| c.status == s))
            .filter(|c| filter.trigger.map_or(true, |t| c.trigger == t))
            .filter(|c| filter.since.map_or(true, |s| c.checked_at >= s))
            .cloned()
            .collect();
        matches.sort_by_key(|c| std::cmp::Reverse(c.checked_at));
        if let Some(limit) = filter.limit {
            matches.truncate(limit);
        }
        Ok(matches)
    }

    async fn find_open_alert(
        &self,
        alert_type: AlertType,
        service: &str,
        scope: Option<&str>,
    ) -> Result<Option<AlertModel>> {
        let state = self.state.read().await;
        Ok(state
            .alerts
            .values()
            .find(|a| {
                a.is_open()
                    && a.alert_type == alert_type
                    && a.service == service
                    && a.scope.as_deref() == scope
            })
            .cloned())
    }

    async fn insert_alert(&self, alert: AlertModel) -> Result<()> {
        let mut state = self.state.write().await;
        if state.alerts.contains_key(&alert.id) {
            return Err(Error::AlreadyExists(format!("alert {}", alert.id)));
        }
        state.alerts.insert(alert.id, alert);
        Ok(())
    }

    async fn update_alert(&self, alert: &AlertModel) -> Result<()> {
        let mut state = self.state.write().await;
        match state.alerts.get_mut(&alert.id) {
            Some(existing) => {
                *existing = alert.clone();
                Ok(())
            }
            None => Err(Error::NotFound(format!("alert {}", alert.id))),
        }
    }

    async fn get_alert(&self, alert_id: Uuid) -> Result<Option<AlertModel>> {
        let state = self.state.read().await;
        Ok(state.alerts.get(&alert_id).cloned())
    }

    async fn open_alerts(&self, service: &str, scope: Option<&str>) -> Result<Vec<AlertModel>> {
        let state = self.state.read().await;
        let mut alerts: Vec<AlertModel> = state
            .alerts
            .values()
            .filter(|a| a.is_open() && a.service == service)
            .filter(|a| scope.is_none() || a.scope.as_deref() == scope)
            .cloned()
            .collect();
        alerts.sort_by_key(|a| a.created_at);
        Ok(alerts)
    }

    async fn bulk_resolve_alerts(
        &self,
        service: &str,
        scope: Option<&str>,
        resolved_by: &str,
        note: &str,
    ) -> Result<u64> {
        // One write guard for the whole sweep: all matching alerts resolve
        // or none do.
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut resolved = 0u64;
        for alert in state.alerts.values_mut() {
            if !alert.is_open() || alert.service != service {
                continue;
            }
            if scope.is_some() && alert.scope.as_deref() != scope {
                continue;
            }
            alert.status = AlertStatus::Resolved;
            alert.resolved_by = Some(resolved_by.to_string());
            alert.resolved_at = Some(now);
            alert.resolution_note = Some(note.to_string());
            alert.updated_at = now;
            resolved += 1;
        }
        Ok(resolved)
    }

    async fn channel_configs_for(&self, service: &str) -> Result<Vec<ChannelConfigModel>> {
        let state = self.state.read().await;
        let mut configs: Vec<ChannelConfigModel> = state
            .channel_configs
            .values()
            .filter(|c| {
                c.enabled && (c.services.is_empty() || c.services.iter().any(|s| s == service))
            })
            .cloned()
            .collect();
        configs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(configs)
    }

    async fn upsert_channel_config(&self, config: ChannelConfigModel) -> Result<()> {
        let mut state = self.state.write().await;
        state.channel_configs.insert(config.id, config);
        Ok(())
    }
}
