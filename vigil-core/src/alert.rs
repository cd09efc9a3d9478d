//! Alert taxonomy
//!
//! Types, severities, statuses and notification channel kinds shared by
//! the alert lifecycle manager, the dispatcher and the storage models.
//! An alert is "open" while it is active or acknowledged; the dedup key
//! (type, service, scope) may have at most one open alert at a time.

use serde::{Deserialize, Serialize};

/// The condition an alert describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// The dependency is unreachable or refusing connections
    ConnectionFailure,

    /// Elevated error rate over the rolling window
    HighErrorRate,

    /// Probes are timing out
    Timeout,

    /// The dependency is responding but degraded
    Degraded,

    /// A previously unhealthy dependency recovered
    Recovered,

    /// The target configuration is invalid or missing
    ConfigError,

    /// The dependency rejected our credentials
    AuthFailure,

    /// The dependency is rate-limiting us
    RateLimited,
}

impl AlertType {
    /// Stable string form used in storage and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::ConnectionFailure => "connection_failure",
            AlertType::HighErrorRate => "high_error_rate",
            AlertType::Timeout => "timeout",
            AlertType::Degraded => "degraded",
            AlertType::Recovered => "recovered",
            AlertType::ConfigError => "config_error",
            AlertType::AuthFailure => "auth_failure",
            AlertType::RateLimited => "rate_limited",
        }
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How urgent an alert is
///
/// Ordering follows declaration order: `Info < Warning < Error < Critical`,
/// so severity gates can be expressed as plain comparisons.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Informational, no action required
    Info,

    /// Worth attention, service still functional
    Warning,

    /// Service-impacting problem
    Error,

    /// Severe, immediate attention required
    Critical,
}

impl AlertSeverity {
    /// Stable string form used in storage and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Error => "error",
            AlertSeverity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// Open and unhandled
    Active,

    /// Open, a human has taken ownership
    Acknowledged,

    /// Closed, the condition cleared
    Resolved,

    /// Closed without action, deliberately muted
    Suppressed,
}

impl AlertStatus {
    /// Whether the alert still represents an open incident
    pub fn is_open(&self) -> bool {
        matches!(self, AlertStatus::Active | AlertStatus::Acknowledged)
    }

    /// Stable string form used in storage and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
            AlertStatus::Suppressed => "suppressed",
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of notification channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Email delivery
    Email,

    /// Slack message
    Slack,

    /// Generic HTTP webhook
    Webhook,

    /// Paging/on-call escalation, the most intrusive channel
    Pager,
}

impl ChannelKind {
    /// Stable string form used in storage and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Slack => "slack",
            ChannelKind::Webhook => "webhook",
            ChannelKind::Pager => "pager",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
