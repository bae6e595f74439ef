//! The pipeline model: ordered stage definitions and state
//! classification.
//!
//! Each run constructs its own `PipelineModel` from configuration and
//! passes it explicitly through correlation and reconciliation; there
//! is no shared global model.

mod states;

pub use states::{
    classify_build_service, classify_mirror, classify_source_repo, StageKind, StateClass,
};

use crate::errors::{ConfigurationError, UnknownStateError};
use serde::{Deserialize, Serialize};

/// One stage of the release pipeline, bound to one target system
/// instance.
///
/// The same stage kind may appear more than once when the pipeline has
/// parallel targets (e.g. a public and an internal build service), as
/// long as the `(id, target)` pair is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDefinition {
    /// Stage identifier, unique within the pipeline (e.g. `merged`,
    /// `submitted-downstream`, `published-public-mirror`).
    pub id: String,
    /// The kind of external system backing the stage.
    pub kind: StageKind,
    /// The target system instance name (e.g. `public-obs`).
    pub target: String,
}

impl StageDefinition {
    /// Creates a new stage definition.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: StageKind, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            target: target.into(),
        }
    }
}

/// The ordered release pipeline for one tracked component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineModel {
    stages: Vec<StageDefinition>,
}

impl PipelineModel {
    /// Builds a pipeline model from an ordered list of stage
    /// definitions.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if the list is empty, a stage id
    /// is blank, or an `(id, target)` pair repeats.
    pub fn new(stages: Vec<StageDefinition>) -> Result<Self, ConfigurationError> {
        if stages.is_empty() {
            return Err(ConfigurationError::new("pipeline has no stages"));
        }
        let mut seen = std::collections::HashSet::new();
        for stage in &stages {
            if stage.id.trim().is_empty() {
                return Err(ConfigurationError::new("stage id cannot be empty"));
            }
            if !seen.insert((stage.id.clone(), stage.target.clone())) {
                return Err(ConfigurationError::new(format!(
                    "duplicate stage '{}' for target '{}'",
                    stage.id, stage.target
                )));
            }
        }
        Ok(Self { stages })
    }

    /// Returns the stages in pipeline order.
    #[must_use]
    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    /// Returns the distinct stage ids in pipeline order.
    ///
    /// Parallel targets of the same stage share one position.
    #[must_use]
    pub fn stage_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for stage in &self.stages {
            if !ids.contains(&stage.id.as_str()) {
                ids.push(&stage.id);
            }
        }
        ids
    }

    /// Returns the pipeline position of a stage id, if present.
    #[must_use]
    pub fn position(&self, stage_id: &str) -> Option<usize> {
        self.stage_ids().iter().position(|id| *id == stage_id)
    }

    /// Classifies a raw transitional state for a stage kind.
    ///
    /// # Errors
    ///
    /// Returns `UnknownStateError` when the state is outside the
    /// enumerated vocabulary for the kind. This is surfaced rather
    /// than silently ignored: an unrecognized state usually signals a
    /// vocabulary change upstream.
    pub fn classify(&self, kind: StageKind, raw_state: &str) -> Result<StateClass, UnknownStateError> {
        let class = match kind {
            StageKind::SourceRepo => classify_source_repo(raw_state),
            StageKind::BuildService => classify_build_service(raw_state),
            StageKind::Mirror => classify_mirror(raw_state),
        };
        class.ok_or_else(|| UnknownStateError::new(kind, raw_state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn model() -> PipelineModel {
        PipelineModel::new(vec![
            StageDefinition::new("merged", StageKind::SourceRepo, "src-host"),
            StageDefinition::new("submitted-downstream", StageKind::BuildService, "public-obs"),
            StageDefinition::new("submitted-downstream", StageKind::BuildService, "internal-obs"),
            StageDefinition::new("published-public-mirror", StageKind::Mirror, "public-mirror"),
        ])
        .unwrap()
    }

    #[test]
    fn test_empty_pipeline_rejected() {
        assert!(PipelineModel::new(vec![]).is_err());
    }

    #[test]
    fn test_duplicate_stage_target_rejected() {
        let result = PipelineModel::new(vec![
            StageDefinition::new("merged", StageKind::SourceRepo, "a"),
            StageDefinition::new("merged", StageKind::SourceRepo, "a"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parallel_targets_share_position() {
        let model = model();
        assert_eq!(
            model.stage_ids(),
            vec!["merged", "submitted-downstream", "published-public-mirror"]
        );
        assert_eq!(model.position("submitted-downstream"), Some(1));
        assert_eq!(model.position("published-public-mirror"), Some(2));
        assert_eq!(model.position("unknown"), None);
    }

    #[test]
    fn test_classify_known_state() {
        let model = model();
        assert_eq!(
            model.classify(StageKind::SourceRepo, "merged").unwrap(),
            StateClass::Success
        );
        assert_eq!(
            model.classify(StageKind::BuildService, "review").unwrap(),
            StateClass::Pending
        );
    }

    #[test]
    fn test_classify_unknown_state_is_error() {
        let model = model();
        let err = model.classify(StageKind::Mirror, "teleported").unwrap_err();
        assert_eq!(err.raw_state, "teleported");
        assert_eq!(err.kind, StageKind::Mirror);
    }
}
