//! Remaining-time estimation
//!
//! Two-tier estimate: when completed items from the same cohort exist,
//! remaining time is the historical average total duration scaled by the
//! unfinished share of the item's progress. With no history, a static
//! fallback prices the remaining catalog weight at a configured
//! milliseconds-per-weight-unit rate. The estimate degrades, it never
//! fails.

use crate::catalog::StageCatalog;
use crate::progress::{ProgressSnapshot, StageStatus};
use chrono::Duration;

/// Default rate for the static fallback, in ms per weight unit
pub const DEFAULT_MS_PER_WEIGHT_UNIT: f64 = 1_500.0;

/// Estimates remaining processing time for an in-flight work item
#[derive(Debug, Clone)]
pub struct DurationEstimator {
    /// Static fallback rate used when no history exists
    ms_per_weight_unit: f64,
}

impl Default for DurationEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_MS_PER_WEIGHT_UNIT)
    }
}

impl DurationEstimator {
    /// Create an estimator with the given static fallback rate
    pub fn new(ms_per_weight_unit: f64) -> Self {
        Self {
            ms_per_weight_unit: ms_per_weight_unit.max(0.0),
        }
    }

    /// Mean of historical completed-item durations, if any
    ///
    /// Non-positive durations are ignored; an empty or all-invalid history
    /// yields `None` and the caller falls through to the static estimate.
    pub fn historical_average_ms(durations: &[i64]) -> Option<f64> {
        let valid: Vec<i64> = durations.iter().copied().filter(|d| *d > 0).collect();
        if valid.is_empty() {
            return None;
        }
        Some(valid.iter().sum::<i64>() as f64 / valid.len() as f64)
    }

    /// Estimate remaining time for an item in milliseconds
    ///
    /// Uses the historical average when available, otherwise the static
    /// weight-based fallback. Returns 0 for items that are already done.
    pub fn estimate_remaining_ms(
        &self,
        catalog: &StageCatalog,
        snapshot: &ProgressSnapshot,
        historical_avg_ms: Option<f64>,
    ) -> i64 {
        if snapshot.percent >= 100 {
            return 0;
        }

        if let Some(avg) = historical_avg_ms.filter(|avg| *avg > 0.0) {
            let remaining = avg * (100 - snapshot.percent) as f64 / 100.0;
            return remaining.round() as i64;
        }

        let remaining_weight = self.remaining_catalog_weight(catalog, snapshot);
        (remaining_weight * self.ms_per_weight_unit).round() as i64
    }

    /// Remaining catalog weight from the current stage onward
    ///
    /// The current stage counts at half weight, every later stage at full
    /// weight. A completed item has no remaining weight.
    fn remaining_catalog_weight(&self, catalog: &StageCatalog, snapshot: &ProgressSnapshot) -> f64 {
        if snapshot.current_status == StageStatus::Completed {
            return 0.0;
        }

        let Some(current_index) = catalog.order_index(&snapshot.current_stage) else {
            return 0.0;
        };

        catalog
            .stages()
            .iter()
            .enumerate()
            .skip(current_index)
            .map(|(i, stage)| {
                if i == current_index {
                    stage.weight as f64 / 2.0
                } else {
                    stage.weight as f64
                }
            })
            .sum()
    }
}

/// Format a duration for human-readable display
pub fn format_duration_human(duration: Duration) -> String {
    let total_secs = duration.num_seconds().max(0);

    if total_secs < 60 {
        format!("{}s", total_secs)
    } else if total_secs < 3600 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        if secs == 0 {
            format!("{}m", mins)
        } else {
            format!("{}m {}s", mins, secs)
        }
    } else {
        let hours = total_secs / 3600;
        let mins = (total_secs % 3600) / 60;
        if mins == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, mins)
        }
    }
}
