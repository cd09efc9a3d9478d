//! Work-item source attribution
//!
//! The origin of a work item is a closed tagged variant rather than
//! free-text, so matching on it is exhaustive at compile time.

use serde::{Deserialize, Serialize};

/// Where a work item entered the pipeline from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemSource {
    /// Produced by an automation workflow
    Automation {
        /// Identifier of the workflow that submitted the item
        workflow: String,
    },

    /// Submitted through the public API
    Api {
        /// API client identifier
        client_id: String,
    },

    /// Uploaded manually by a user
    Manual {
        /// User identifier
        user: String,
    },

    /// Ingested from an email inbox
    Email {
        /// Sender address
        sender: String,
    },
}

impl ItemSource {
    /// Short label for logs and dashboards
    pub fn label(&self) -> &'static str {
        match self {
            ItemSource::Automation { .. } => "automation",
            ItemSource::Api { .. } => "api",
            ItemSource::Manual { .. } => "manual",
            ItemSource::Email { .. } => "email",
        }
    }
}

impl std::fmt::Display for ItemSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
