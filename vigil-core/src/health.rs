//! Health classification for external dependency probes
//!
//! A probe returns a structured [`ProbeOutcome`]; classification never
//! throws. The per-probe status records what a single probe observed,
//! while [`HealthThresholds::classify`] derives the overall status for a
//! target from the consecutive-failure count and the rolling success rate,
//! evaluated in priority order.

use serde::{Deserialize, Serialize};

/// Health classification for a probe or a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Responding normally
    Healthy,

    /// Responding, but slowly or unreliably
    Degraded,

    /// Failing or unreachable
    Unhealthy,

    /// No endpoint is configured for the target
    Unconfigured,
}

impl HealthStatus {
    /// Stable string form used in storage and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Unconfigured => "unconfigured",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a probe was executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    /// Fired by the periodic scheduler
    Scheduled,

    /// Requested by an administrator
    Manual,

    /// Fired in response to an application error
    ErrorTriggered,

    /// Fired to confirm a suspected recovery
    RecoveryVerification,
}

impl TriggerReason {
    /// Stable string form used in storage and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerReason::Scheduled => "scheduled",
            TriggerReason::Manual => "manual",
            TriggerReason::ErrorTriggered => "error_triggered",
            TriggerReason::RecoveryVerification => "recovery_verification",
        }
    }
}

impl std::fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured result of one probe execution
///
/// Probe failures are data, not errors: a timeout or connection refusal
/// is captured here and flows into classification like any other
/// observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Whether the dependency answered successfully
    pub success: bool,
    /// HTTP-like status code, when one was received
    pub status_code: Option<u16>,
    /// Round-trip time in milliseconds
    pub latency_ms: i64,
    /// Error description for failed probes
    pub error: Option<String>,
}

impl ProbeOutcome {
    /// A successful observation
    pub fn success(status_code: u16, latency_ms: i64) -> Self {
        Self {
            success: true,
            status_code: Some(status_code),
            latency_ms,
            error: None,
        }
    }

    /// A failed observation
    pub fn failure(status_code: Option<u16>, latency_ms: i64, error: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code,
            latency_ms,
            error: Some(error.into()),
        }
    }
}

/// Thresholds driving health classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthThresholds {
    /// Consecutive failed probes before a target is unhealthy
    pub consecutive_failure_threshold: u32,
    /// Success rate (percent) below which a target is unhealthy
    pub success_rate_floor: f64,
    /// Success rate (percent) below which a target is degraded
    pub success_rate_degraded: f64,
    /// Trailing window for the rolling success rate, in hours
    pub window_hours: i64,
    /// Successful probes slower than this are classified degraded
    pub degraded_latency_ms: i64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            consecutive_failure_threshold: 3,
            success_rate_floor: 70.0,
            success_rate_degraded: 90.0,
            window_hours: 24,
            degraded_latency_ms: 5_000,
        }
    }
}

impl HealthThresholds {
    /// Load thresholds from environment variables
    ///
    /// Environment variables (all optional, defaults in parentheses):
    /// - `VIGIL_FAILURE_THRESHOLD`: consecutive failures (3)
    /// - `VIGIL_SUCCESS_RATE_FLOOR`: unhealthy below this percent (70)
    /// - `VIGIL_SUCCESS_RATE_DEGRADED`: degraded below this percent (90)
    /// - `VIGIL_HEALTH_WINDOW_HOURS`: rolling window (24)
    /// - `VIGIL_DEGRADED_LATENCY_MS`: slow-probe cutoff (5000)
    pub fn from_env() -> crate::Result<Self> {
        fn parse<T: std::str::FromStr>(var: &str, default: T) -> crate::Result<T> {
            match std::env::var(var) {
                Ok(raw) => raw
                    .parse()
                    .map_err(|_| crate::Error::InvalidConfig(format!("{} is not valid: {}", var, raw))),
                Err(_) => Ok(default),
            }
        }

        let defaults = Self::default();
        let thresholds = Self {
            consecutive_failure_threshold: parse(
                "VIGIL_FAILURE_THRESHOLD",
                defaults.consecutive_failure_threshold,
            )?,
            success_rate_floor: parse("VIGIL_SUCCESS_RATE_FLOOR", defaults.success_rate_floor)?,
            success_rate_degraded: parse(
                "VIGIL_SUCCESS_RATE_DEGRADED",
                defaults.success_rate_degraded,
            )?,
            window_hours: parse("VIGIL_HEALTH_WINDOW_HOURS", defaults.window_hours)?,
            degraded_latency_ms: parse("VIGIL_DEGRADED_LATENCY_MS", defaults.degraded_latency_ms)?,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    /// Validate threshold consistency
    pub fn validate(&self) -> crate::Result<()> {
        if self.consecutive_failure_threshold == 0 {
            return Err(crate::Error::InvalidConfig(
                "consecutive_failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.success_rate_floor > self.success_rate_degraded {
            return Err(crate::Error::InvalidConfig(format!(
                "success_rate_floor ({}) must not exceed success_rate_degraded ({})",
                self.success_rate_floor, self.success_rate_degraded
            )));
        }
        if self.window_hours <= 0 {
            return Err(crate::Error::InvalidConfig(
                "window_hours must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Classify a single probe observation
    pub fn classify_probe(&self, outcome: &ProbeOutcome) -> HealthStatus {
        if !outcome.success {
            HealthStatus::Unhealthy
        } else if outcome.latency_ms > self.degraded_latency_ms {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    /// Derive the overall status for a target, first match wins
    pub fn classify(&self, consecutive_failures: u32, success_rate: f64) -> HealthStatus {
        if consecutive_failures >= self.consecutive_failure_threshold {
            HealthStatus::Unhealthy
        } else if success_rate < self.success_rate_floor {
            HealthStatus::Unhealthy
        } else if success_rate < self.success_rate_degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}
