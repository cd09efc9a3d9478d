//! # Vigil Storage
//!
//! The persistence collaborator for the Vigil monitoring engine. The
//! engine treats the durable store as the single source of truth and
//! never caches stage or health state across calls; this crate defines
//! the record models, the [`Store`] trait the runtime depends on, and an
//! in-memory reference implementation.

pub mod memory;
pub mod models;
mod store;

// Re-export commonly used types
pub use memory::MemoryStore;
pub use models::{
    AlertModel, ChannelConfigModel, ChannelEndpoint, HealthCheckModel, HealthHistoryFilter,
    NotificationAttempt, StageRecordModel, WorkItemModel,
};
pub use store::Store;

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for storage operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
