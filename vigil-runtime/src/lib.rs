//! # Vigil Runtime
//!
//! Orchestration for the Vigil monitoring engine: stage lifecycle
//! tracking, health probing and aggregation, the alert lifecycle, and
//! notification dispatch. Every component is stateless apart from its
//! injected collaborators and treats the store as the single source of
//! truth.

pub mod aggregator;
pub mod alerts;
pub mod health;
pub mod notify;
pub mod probe;
pub mod scheduler;
pub mod tracker;

// Re-export commonly used types
pub use aggregator::{HealthEvaluation, HealthStatusAggregator, WindowStats};
pub use alerts::{AlertLifecycleManager, AlertManagerConfig, NewAlert, ProbeTransition};
pub use health::{HealthService, OverallHealth, StatusChange, TargetConfig};
pub use notify::{ChannelSender, NotificationDispatcher, WebhookSender};
pub use probe::{HttpProber, Prober};
pub use scheduler::{ProbeScheduler, SchedulerConfig};
pub use tracker::{ProgressReport, StageTracker};

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for runtime operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<vigil_core::Error> for Error {
    fn from(e: vigil_core::Error) -> Self {
        match e {
            vigil_core::Error::UnknownStage(stage) => Error::UnknownStage(stage),
            vigil_core::Error::InvalidCatalog(msg) => Error::InvalidConfig(msg),
            vigil_core::Error::InvalidConfig(msg) => Error::InvalidConfig(msg),
        }
    }
}

// NotFound keeps its meaning across the seam; everything else surfaces as
// a storage error so callers can classify it as transient.
impl From<vigil_storage::Error> for Error {
    fn from(e: vigil_storage::Error) -> Self {
        match e {
            vigil_storage::Error::NotFound(msg) => Error::NotFound(msg),
            other => Error::Storage(other.to_string()),
        }
    }
}
