//! # Vigil Core
//!
//! Domain types for the Vigil monitoring engine: the pipeline stage
//! catalog, weighted progress calculation, remaining-time estimation,
//! health classification, and the alert taxonomy.
//!
//! Everything in this crate is pure and synchronous; orchestration and
//! I/O live in `vigil-runtime`.

pub mod alert;
pub mod catalog;
pub mod estimate;
pub mod health;
pub mod progress;
pub mod source;

// Re-export commonly used types
pub use alert::{AlertSeverity, AlertStatus, AlertType, ChannelKind};
pub use catalog::{StageCatalog, StageSpec};
pub use estimate::{format_duration_human, DurationEstimator};
pub use health::{HealthStatus, HealthThresholds, ProbeOutcome, TriggerReason};
pub use progress::{ProgressSnapshot, StageProgressCalculator, StageStatus};
pub use source::ItemSource;

/// Result type for Vigil core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Vigil core operations
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
