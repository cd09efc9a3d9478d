//! Shared test utilities for Vigil crates
//!
//! This crate provides:
//! - **Fixtures**: pre-wired monitoring stacks and catalog/source factories
//! - **Builders**: fluent builders for channel configs and targets
//! - **Mocks**: scripted probers and recording notification senders
//!
//! # Example
//!
//! ```ignore
//! use vigil_tests::{fixtures::MonitoringStack, mocks::ScriptedProber};
//!
//! #[tokio::test]
//! async fn test_failing_target_raises_alert() {
//!     let stack = MonitoringStack::builder()
//!         .prober(ScriptedProber::failing_then_recovering(3))
//!         .target("ocr", "http://ocr.internal/health")
//!         .build();
//!
//!     // Probe and verify
//!     // ...
//! }
//! ```

pub mod builders;
pub mod fixtures;
pub mod mocks;

// Re-export commonly used items
pub use builders::ChannelConfigBuilder;
pub use fixtures::MonitoringStack;
pub use mocks::{RecordingSender, ScriptedProber};
