//! Record models for the Vigil monitoring engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vigil_core::{
    AlertSeverity, AlertStatus, AlertType, ChannelKind, HealthStatus, ItemSource, StageStatus,
    TriggerReason,
};

/// One stage of one work item
///
/// At most one record exists per (item, stage) pair; the record is
/// mutated in place as the stage progresses and never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecordModel {
    pub id: Uuid,
    pub item_id: Uuid,
    pub stage: String,
    pub display_name: String,
    pub order_index: i32,
    pub status: StageStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate timestamps for one work item
///
/// `processing_started_at`, `processing_ended_at` and `total_duration_ms`
/// are each written exactly once by the stage tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItemModel {
    pub id: Uuid,
    pub source: ItemSource,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_ended_at: Option<DateTime<Utc>>,
    pub total_duration_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One probe execution against a target
///
/// Append-only. `previous_status` is denormalized from the immediately
/// preceding record for the same (target, scope) so transition detection
/// is a single-record comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckModel {
    pub id: Uuid,
    pub target: String,
    pub scope: Option<String>,
    pub status: HealthStatus,
    pub previous_status: Option<HealthStatus>,
    pub success: bool,
    pub message: Option<String>,
    pub detail: Option<serde_json::Value>,
    pub response_time_ms: Option<i64>,
    pub trigger: TriggerReason,
    pub checked_at: DateTime<Utc>,
}

impl HealthCheckModel {
    /// Whether this record marks a status change from its predecessor
    pub fn is_transition(&self) -> bool {
        self.previous_status != Some(self.status)
    }
}

/// Outcome of one notification delivery attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationAttempt {
    pub channel: ChannelKind,
    pub recipient: String,
    pub success: bool,
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

/// An open or closed incident
///
/// At most one alert with an open status exists per
/// (type, service, scope) tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertModel {
    pub id: Uuid,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub detail: Option<serde_json::Value>,
    pub service: String,
    pub scope: Option<String>,
    pub status: AlertStatus,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledgement_note: Option<String>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_note: Option<String>,
    pub notification_attempts: Vec<NotificationAttempt>,
    pub last_notified_at: Option<DateTime<Utc>>,
    /// Chains a follow-up alert (e.g. a recovery) to the incident it closed
    pub related_alert_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlertModel {
    /// Whether the alert still represents an open incident
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }
}

/// One endpoint of a notification channel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEndpoint {
    pub kind: ChannelKind,
    /// Channel-specific destination (address, webhook URL, paging key)
    pub endpoint: String,
    pub enabled: bool,
}

/// Per-deployment notification routing configuration
///
/// Read-only at alert time; mutated only through administrative
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfigModel {
    pub id: Uuid,
    pub name: String,
    /// Services this config applies to; empty means all services
    pub services: Vec<String>,
    /// Alert types this config applies to; empty means all types
    pub alert_types: Vec<AlertType>,
    /// Minimum severity an alert must have to use this config
    pub min_severity: AlertSeverity,
    pub channels: Vec<ChannelEndpoint>,
    /// Minimum minutes between repeated notifications for one alert
    pub cooldown_minutes: i64,
    /// Whether repeated notifications inside the cooldown are suppressed
    pub suppress_duplicates: bool,
    pub enabled: bool,
}

impl ChannelConfigModel {
    /// Whether this config applies to the given alert
    pub fn matches(&self, alert: &AlertModel) -> bool {
        if !self.enabled {
            return false;
        }
        if !self.services.is_empty() && !self.services.iter().any(|s| s == &alert.service) {
            return false;
        }
        if !self.alert_types.is_empty() && !self.alert_types.contains(&alert.alert_type) {
            return false;
        }
        alert.severity >= self.min_severity
    }
}

/// Filters for health history queries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthHistoryFilter {
    pub status: Option<HealthStatus>,
    pub trigger: Option<TriggerReason>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}
