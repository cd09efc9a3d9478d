//! Pipeline stage catalog
//!
//! The set of stages a work item moves through is fixed per deployment and
//! described by a [`StageCatalog`]: an ordered list of stages, each with a
//! relative weight that determines its contribution to the overall
//! completion percentage. The catalog is constructed explicitly and passed
//! to the components that need it; there is no process-wide default.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// One named step in the processing pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    /// Stable stage identifier (e.g. `"ocr"`)
    pub id: String,
    /// Human-readable name for timelines and dashboards
    pub display_name: String,
    /// Relative contribution to overall completion percentage
    pub weight: u32,
    /// Typical duration of this stage, used by the static time estimate
    pub expected_duration_ms: i64,
    /// Whether the stage may be skipped at initialization
    pub skippable: bool,
    /// Whether completion requires an external actor (e.g. human review)
    pub requires_external_actor: bool,
}

impl StageSpec {
    /// Create a stage spec with the given id, display name and weight
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, weight: u32) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            weight,
            expected_duration_ms: 0,
            skippable: false,
            requires_external_actor: false,
        }
    }

    /// Set the expected duration in milliseconds
    pub fn with_expected_duration_ms(mut self, ms: i64) -> Self {
        self.expected_duration_ms = ms;
        self
    }

    /// Mark the stage as skippable
    pub fn skippable(mut self) -> Self {
        self.skippable = true;
        self
    }

    /// Mark the stage as requiring an external actor
    pub fn requires_external_actor(mut self) -> Self {
        self.requires_external_actor = true;
        self
    }
}

/// Ordered, validated collection of pipeline stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageCatalog {
    stages: Vec<StageSpec>,
}

impl StageCatalog {
    /// Build a catalog from an ordered list of stages
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCatalog`] if the list is empty, contains
    /// duplicate stage ids, or has zero total weight.
    pub fn new(stages: Vec<StageSpec>) -> Result<Self> {
        if stages.is_empty() {
            return Err(Error::InvalidCatalog("catalog has no stages".to_string()));
        }

        for (i, stage) in stages.iter().enumerate() {
            if stage.id.is_empty() {
                return Err(Error::InvalidCatalog(format!(
                    "stage at index {} has an empty id",
                    i
                )));
            }
            if stages[..i].iter().any(|s| s.id == stage.id) {
                return Err(Error::InvalidCatalog(format!(
                    "duplicate stage id: {}",
                    stage.id
                )));
            }
        }

        if stages.iter().map(|s| s.weight).sum::<u32>() == 0 {
            return Err(Error::InvalidCatalog(
                "catalog total weight must be positive".to_string(),
            ));
        }

        Ok(Self { stages })
    }

    /// The default catalog for the document-processing pipeline
    pub fn document_pipeline() -> Self {
        Self::new(vec![
            StageSpec::new("received", "Received", 5).with_expected_duration_ms(1_000),
            StageSpec::new("uploaded", "Uploaded", 10).with_expected_duration_ms(5_000),
            StageSpec::new("ocr", "OCR Extraction", 25).with_expected_duration_ms(45_000),
            StageSpec::new("extract", "Field Extraction", 30).with_expected_duration_ms(30_000),
            StageSpec::new("map", "Field Mapping", 10).with_expected_duration_ms(10_000),
            StageSpec::new("validate", "Validation", 5).with_expected_duration_ms(5_000),
            StageSpec::new("review", "Manual Review", 0)
                .skippable()
                .requires_external_actor(),
            StageSpec::new("done", "Done", 0),
        ])
        .expect("default catalog is valid")
    }

    /// Stages in pipeline order
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Look up a stage by id
    pub fn get(&self, stage_id: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|s| s.id == stage_id)
    }

    /// Look up a stage by id, returning an error for unknown ids
    pub fn require(&self, stage_id: &str) -> Result<&StageSpec> {
        self.get(stage_id)
            .ok_or_else(|| Error::UnknownStage(stage_id.to_string()))
    }

    /// Zero-based position of a stage in the pipeline
    pub fn order_index(&self, stage_id: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.id == stage_id)
    }

    /// The first stage of the pipeline
    pub fn first(&self) -> &StageSpec {
        &self.stages[0]
    }

    /// The terminal stage of the pipeline
    pub fn terminal(&self) -> &StageSpec {
        self.stages.last().expect("catalog is non-empty")
    }

    /// Sum of all stage weights
    pub fn total_weight(&self) -> u32 {
        self.stages.iter().map(|s| s.weight).sum()
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the catalog is empty (never true for a constructed catalog)
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_pipeline_weights() {
        let catalog = StageCatalog::document_pipeline();
        assert_eq!(catalog.len(), 8);
        assert_eq!(catalog.total_weight(), 85);
        assert_eq!(catalog.first().id, "received");
        assert_eq!(catalog.terminal().id, "done");
    }

    #[test]
    fn test_empty_catalog_rejected() {
        assert!(matches!(
            StageCatalog::new(vec![]),
            Err(Error::InvalidCatalog(_))
        ));
    }

    #[test]
    fn test_duplicate_stage_ids_rejected() {
        let result = StageCatalog::new(vec![
            StageSpec::new("a", "A", 1),
            StageSpec::new("a", "A again", 2),
        ]);
        assert!(matches!(result, Err(Error::InvalidCatalog(_))));
    }

    #[test]
    fn test_zero_total_weight_rejected() {
        let result = StageCatalog::new(vec![StageSpec::new("a", "A", 0)]);
        assert!(matches!(result, Err(Error::InvalidCatalog(_))));
    }

    #[test]
    fn test_require_unknown_stage() {
        let catalog = StageCatalog::document_pipeline();
        assert_eq!(
            catalog.require("shred"),
            Err(Error::UnknownStage("shred".to_string()))
        );
    }
}
