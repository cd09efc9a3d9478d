//! Stage lifecycle tracking for work items
//!
//! The tracker is stateless and thread-safe: all stage state lives in the
//! store, and transitions for distinct stages of one item may run
//! concurrently. Transitions for the *same* stage are expected to arrive
//! ordered from the upstream pipeline; concurrent writers to one stage
//! are a caller error and resolve as last-write-wins.

use crate::{Error, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;
use vigil_core::{
    DurationEstimator, ItemSource, ProgressSnapshot, StageCatalog, StageProgressCalculator,
    StageStatus,
};
use vigil_storage::{StageRecordModel, Store, WorkItemModel};

/// How many recent completed items feed the historical time estimate
const ESTIMATE_HISTORY_LIMIT: usize = 50;

/// Progress of one work item as reported to callers
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProgressReport {
    pub item_id: Uuid,
    pub current_stage: String,
    pub current_status: StageStatus,
    pub percent: u8,
    /// Estimated remaining time; `None` once the item is done
    pub estimated_remaining_ms: Option<i64>,
}

/// Orchestrates stage-record creation and transition for work items
#[derive(Clone)]
pub struct StageTracker {
    store: Arc<dyn Store>,
    catalog: Arc<StageCatalog>,
    estimator: DurationEstimator,
}

impl StageTracker {
    /// Create a tracker over the given store and catalog
    pub fn new(store: Arc<dyn Store>, catalog: Arc<StageCatalog>) -> Self {
        Self {
            store,
            catalog,
            estimator: DurationEstimator::default(),
        }
    }

    /// Override the duration estimator
    pub fn with_estimator(mut self, estimator: DurationEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// Enter a work item into the pipeline
    ///
    /// Creates one stage record per catalog stage: stages named in
    /// `skip_stages` start skipped, all others pending. The first catalog
    /// stage is immediately completed (an item is by definition received
    /// once tracking begins), which seeds the item's
    /// `processing_started_at`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownStage`] if `skip_stages` names a stage not
    /// in the catalog; nothing is written in that case.
    #[instrument(skip(self, source), fields(item_id = %item_id))]
    pub async fn initialize_stages(
        &self,
        item_id: Uuid,
        source: ItemSource,
        skip_stages: &[String],
    ) -> Result<Vec<StageRecordModel>> {
        for stage in skip_stages {
            self.catalog.require(stage)?;
        }

        let now = Utc::now();
        self.store
            .insert_work_item(WorkItemModel {
                id: item_id,
                source,
                processing_started_at: None,
                processing_ended_at: None,
                total_duration_ms: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        for (index, spec) in self.catalog.stages().iter().enumerate() {
            // The first stage completes immediately below; skipping it
            // would contradict that, so it always starts pending.
            let status = if index > 0 && skip_stages.iter().any(|s| s == &spec.id) {
                StageStatus::Skipped
            } else {
                StageStatus::Pending
            };

            self.store
                .upsert_stage_record(StageRecordModel {
                    id: Uuid::new_v4(),
                    item_id,
                    stage: spec.id.clone(),
                    display_name: spec.display_name.clone(),
                    order_index: index as i32,
                    status,
                    scheduled_at: Some(now),
                    started_at: None,
                    completed_at: None,
                    duration_ms: None,
                    result: None,
                    error_message: None,
                    created_at: now,
                    updated_at: now,
                })
                .await?;
        }

        self.store.mark_processing_started(item_id, now).await?;

        let first_stage = self.catalog.first().id.clone();
        self.transition_stage(item_id, &first_stage, StageStatus::Completed, None, None)
            .await?;

        Ok(self.store.list_stage_records(item_id).await?)
    }

    /// Move one stage of one item to a new status
    ///
    /// Upsert semantics: the record is created if the item was never
    /// initialized for this stage. The call is idempotent — entering
    /// `InProgress` stamps `started_at` only once, a terminal status
    /// stamps `completed_at` and the duration only once, and a repeated
    /// identical terminal transition changes nothing.
    #[instrument(skip(self, result, error), fields(item_id = %item_id, stage = %stage, status = %new_status))]
    pub async fn transition_stage(
        &self,
        item_id: Uuid,
        stage: &str,
        new_status: StageStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<StageRecordModel> {
        let spec = self.catalog.require(stage)?;
        let order_index = self
            .catalog
            .order_index(stage)
            .unwrap_or_default() as i32;

        let now = Utc::now();
        let mut record = self
            .store
            .upsert_stage_record(StageRecordModel {
                id: Uuid::new_v4(),
                item_id,
                stage: spec.id.clone(),
                display_name: spec.display_name.clone(),
                order_index,
                status: StageStatus::Pending,
                scheduled_at: Some(now),
                started_at: None,
                completed_at: None,
                duration_ms: None,
                result: None,
                error_message: None,
                created_at: now,
                updated_at: now,
            })
            .await?;

        // A repeated identical terminal transition is a no-op: the
        // duration and timestamps must not be recomputed.
        if record.status == new_status && new_status.is_terminal() {
            debug!("stage already in requested terminal status");
            return Ok(record);
        }

        match new_status {
            StageStatus::InProgress => {
                if record.started_at.is_none() {
                    record.started_at = Some(now);
                }
            }
            StageStatus::Completed | StageStatus::Failed | StageStatus::Skipped => {
                if record.completed_at.is_none() {
                    record.completed_at = Some(now);
                }
                if record.duration_ms.is_none() {
                    // Without a start timestamp the duration stays null
                    // rather than being guessed.
                    if let (Some(started), Some(completed)) =
                        (record.started_at, record.completed_at)
                    {
                        record.duration_ms = Some((completed - started).num_milliseconds());
                    }
                }
            }
            StageStatus::Pending => {}
        }

        if let Some(result) = result {
            record.result = Some(result);
        }
        if let Some(error) = error {
            record.error_message = Some(error);
        }
        record.status = new_status;
        record.updated_at = now;

        self.store.update_stage_record(&record).await?;

        if record.stage == self.catalog.terminal().id && new_status == StageStatus::Completed {
            self.finish_item(item_id, &record).await?;
        }

        Ok(record)
    }

    /// Reset a failed stage to its restart point
    ///
    /// Clears the error, timestamps and duration and returns the stage to
    /// pending so the pipeline can re-run it. Only failed stages can be
    /// retried.
    #[instrument(skip(self), fields(item_id = %item_id, stage = %stage))]
    pub async fn retry_stage(&self, item_id: Uuid, stage: &str) -> Result<StageRecordModel> {
        self.catalog.require(stage)?;
        let mut record = self
            .store
            .get_stage_record(item_id, stage)
            .await?
            .ok_or_else(|| Error::NotFound(format!("stage record {}/{}", item_id, stage)))?;

        if record.status != StageStatus::Failed {
            return Err(Error::InvalidTransition(format!(
                "stage {} is {}, only failed stages can be retried",
                stage, record.status
            )));
        }

        record.status = StageStatus::Pending;
        record.started_at = None;
        record.completed_at = None;
        record.duration_ms = None;
        record.error_message = None;
        record.updated_at = Utc::now();
        self.store.update_stage_record(&record).await?;
        Ok(record)
    }

    /// Current progress of an item, with a remaining-time estimate
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn get_progress(&self, item_id: Uuid) -> Result<ProgressReport> {
        let snapshot = self.snapshot(item_id).await?;

        let estimated_remaining_ms = if snapshot.percent >= 100 {
            None
        } else {
            let durations = self
                .store
                .completed_item_durations(ESTIMATE_HISTORY_LIMIT)
                .await?;
            let avg = DurationEstimator::historical_average_ms(&durations);
            Some(
                self.estimator
                    .estimate_remaining_ms(&self.catalog, &snapshot, avg),
            )
        };

        Ok(ProgressReport {
            item_id,
            current_stage: snapshot.current_stage,
            current_status: snapshot.current_status,
            percent: snapshot.percent,
            estimated_remaining_ms,
        })
    }

    /// Ordered stage history for an item
    pub async fn get_timeline(&self, item_id: Uuid) -> Result<Vec<StageRecordModel>> {
        Ok(self.store.list_stage_records(item_id).await?)
    }

    async fn snapshot(&self, item_id: Uuid) -> Result<ProgressSnapshot> {
        let records = self.store.list_stage_records(item_id).await?;
        let statuses: HashMap<String, StageStatus> = records
            .into_iter()
            .map(|r| (r.stage, r.status))
            .collect();
        Ok(StageProgressCalculator::new(&self.catalog).progress(&statuses))
    }

    /// Stamp the item's end-of-processing aggregates, once
    ///
    /// Upsert semantics on transitions mean the terminal stage can
    /// complete for an item that was never initialized; there is no work
    /// item to stamp then, and the stage record alone stands.
    async fn finish_item(&self, item_id: Uuid, terminal: &StageRecordModel) -> Result<()> {
        let ended_at = terminal.completed_at.unwrap_or_else(Utc::now);
        let Some(item) = self.store.get_work_item(item_id).await? else {
            warn!("no work item on record, skipping end-of-processing stamp");
            return Ok(());
        };

        let total_ms = match item.processing_started_at {
            Some(started) => (ended_at - started).num_milliseconds(),
            None => {
                warn!("work item has no processing_started_at, total duration set to 0");
                0
            }
        };

        self.store
            .mark_processing_ended(item_id, ended_at, total_ms)
            .await?;
        Ok(())
    }
}
