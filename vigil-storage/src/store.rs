//! The persistence seam the runtime depends on

use crate::models::{
    AlertModel, ChannelConfigModel, HealthCheckModel, HealthHistoryFilter, StageRecordModel,
    WorkItemModel,
};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use vigil_core::AlertType;

/// Abstraction over the durable store holding stage, health and alert
/// records.
///
/// Implementations must uphold three invariants:
/// - at most one stage record per (item, stage) pair;
/// - `previous_status` on an appended health check equals the status of
///   the immediately preceding record for the same (target, scope);
/// - `bulk_resolve_alerts` resolves all matching open alerts atomically.
#[async_trait]
pub trait Store: Send + Sync {
    // ── Work items ──────────────────────────────────────────────

    /// Insert a work item, returning the existing one if already present
    async fn insert_work_item(&self, item: WorkItemModel) -> Result<WorkItemModel>;

    /// Fetch a work item by id
    async fn get_work_item(&self, item_id: Uuid) -> Result<Option<WorkItemModel>>;

    /// Stamp `processing_started_at` once; later calls are no-ops
    async fn mark_processing_started(&self, item_id: Uuid, at: DateTime<Utc>) -> Result<()>;

    /// Stamp `processing_ended_at` and the total duration once; later
    /// calls are no-ops
    async fn mark_processing_ended(
        &self,
        item_id: Uuid,
        at: DateTime<Utc>,
        total_duration_ms: i64,
    ) -> Result<()>;

    /// Total durations of recently completed items, newest first
    async fn completed_item_durations(&self, limit: usize) -> Result<Vec<i64>>;

    // ── Stage records ───────────────────────────────────────────

    /// Create a stage record if absent, otherwise return the existing one
    async fn upsert_stage_record(&self, record: StageRecordModel) -> Result<StageRecordModel>;

    /// Fetch the record for one (item, stage) pair
    async fn get_stage_record(
        &self,
        item_id: Uuid,
        stage: &str,
    ) -> Result<Option<StageRecordModel>>;

    /// Replace a stage record by id
    async fn update_stage_record(&self, record: &StageRecordModel) -> Result<()>;

    /// All stage records for an item, in pipeline order
    async fn list_stage_records(&self, item_id: Uuid) -> Result<Vec<StageRecordModel>>;

    // ── Health checks ───────────────────────────────────────────

    /// Append one probe record; the store sets `previous_status` from the
    /// latest record for the same (target, scope) under its write lock
    async fn append_health_check(&self, check: HealthCheckModel) -> Result<HealthCheckModel>;

    /// The most recent record for a (target, scope)
    async fn latest_health_check(
        &self,
        target: &str,
        scope: Option<&str>,
    ) -> Result<Option<HealthCheckModel>>;

    /// Up to `limit` most recent records, newest first
    async fn recent_health_checks(
        &self,
        target: &str,
        scope: Option<&str>,
        limit: usize,
    ) -> Result<Vec<HealthCheckModel>>;

    /// All records at or after `since`, newest first
    async fn health_checks_since(
        &self,
        target: &str,
        scope: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<Vec<HealthCheckModel>>;

    /// Filtered history, newest first
    async fn health_history(
        &self,
        target: &str,
        filter: &HealthHistoryFilter,
    ) -> Result<Vec<HealthCheckModel>>;

    // ── Alerts ──────────────────────────────────────────────────

    /// The open (active or acknowledged) alert for a dedup key, if any
    async fn find_open_alert(
        &self,
        alert_type: AlertType,
        service: &str,
        scope: Option<&str>,
    ) -> Result<Option<AlertModel>>;

    /// Insert a new alert
    async fn insert_alert(&self, alert: AlertModel) -> Result<()>;

    /// Replace an alert by id
    async fn update_alert(&self, alert: &AlertModel) -> Result<()>;

    /// Fetch an alert by id
    async fn get_alert(&self, alert_id: Uuid) -> Result<Option<AlertModel>>;

    /// All open alerts for a service (and scope, when given)
    async fn open_alerts(&self, service: &str, scope: Option<&str>) -> Result<Vec<AlertModel>>;

    /// Resolve every open alert for a service atomically, returning how
    /// many were resolved
    async fn bulk_resolve_alerts(
        &self,
        service: &str,
        scope: Option<&str>,
        resolved_by: &str,
        note: &str,
    ) -> Result<u64>;

    // ── Notification channel configuration ──────────────────────

    /// Channel configs applicable to a service
    async fn channel_configs_for(&self, service: &str) -> Result<Vec<ChannelConfigModel>>;

    /// Create or replace a channel config (administrative path)
    async fn upsert_channel_config(&self, config: ChannelConfigModel) -> Result<()>;
}
