//! Weighted stage progress calculation
//!
//! Progress is derived from the per-item stage statuses by a single walk
//! over the catalog: completed and skipped stages contribute their full
//! weight, an in-progress stage contributes half its weight and ends the
//! accumulation, and a failed stage short-circuits the walk entirely so
//! that later-stage weights cannot inflate a broken item's score.

use crate::catalog::StageCatalog;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Status of one stage of one work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage has not started
    Pending,

    /// Stage is currently running
    InProgress,

    /// Stage finished successfully
    Completed,

    /// Stage finished with an error
    Failed,

    /// Stage was skipped for this item
    Skipped,
}

impl StageStatus {
    /// Whether this status is terminal for the stage
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StageStatus::Completed | StageStatus::Failed | StageStatus::Skipped
        )
    }

    /// Stable string form used in storage and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::InProgress => "in_progress",
            StageStatus::Completed => "completed",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time progress of one work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Id of the stage the item is currently on
    pub current_stage: String,
    /// Status of the current stage
    pub current_status: StageStatus,
    /// Overall completion percentage in [0, 100]
    pub percent: u8,
    /// Weight accumulated by the walk
    pub completed_weight: f64,
    /// Total catalog weight
    pub total_weight: f64,
}

/// Computes weighted completion from per-stage statuses
pub struct StageProgressCalculator<'a> {
    catalog: &'a StageCatalog,
}

impl<'a> StageProgressCalculator<'a> {
    /// Create a calculator over the given catalog
    pub fn new(catalog: &'a StageCatalog) -> Self {
        Self { catalog }
    }

    /// Compute the progress snapshot for one item
    ///
    /// `statuses` maps stage id to the item's status for that stage;
    /// stages without an entry are treated as [`StageStatus::Pending`].
    pub fn progress(&self, statuses: &HashMap<String, StageStatus>) -> ProgressSnapshot {
        let mut completed_weight = 0.0_f64;
        let mut current: Option<(&str, StageStatus)> = None;

        for stage in self.catalog.stages() {
            let status = statuses
                .get(&stage.id)
                .copied()
                .unwrap_or(StageStatus::Pending);

            match status {
                StageStatus::Completed | StageStatus::Skipped => {
                    completed_weight += stage.weight as f64;
                }
                StageStatus::InProgress => {
                    // Half weight: visible motion without overstating completion.
                    completed_weight += stage.weight as f64 / 2.0;
                    current = Some((&stage.id, StageStatus::InProgress));
                    break;
                }
                StageStatus::Failed => {
                    // Failure short-circuits the walk with the weight so far.
                    return self.snapshot(&stage.id, StageStatus::Failed, completed_weight);
                }
                StageStatus::Pending => {
                    if current.is_none() {
                        current = Some((&stage.id, StageStatus::Pending));
                    }
                }
            }
        }

        let (current_stage, current_status) = match current {
            Some((id, status)) => (id, status),
            // Every stage completed or skipped: the item is done.
            None => (self.catalog.terminal().id.as_str(), StageStatus::Completed),
        };

        self.snapshot(current_stage, current_status, completed_weight)
    }

    fn snapshot(
        &self,
        current_stage: &str,
        current_status: StageStatus,
        completed_weight: f64,
    ) -> ProgressSnapshot {
        let total_weight = self.catalog.total_weight() as f64;
        let percent = (completed_weight / total_weight * 100.0)
            .round()
            .clamp(0.0, 100.0) as u8;

        ProgressSnapshot {
            current_stage: current_stage.to_string(),
            current_status,
            percent,
            completed_weight,
            total_weight,
        }
    }
}
