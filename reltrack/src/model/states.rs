//! Stage kinds, state classification, and the per-kind transitional
//! state vocabularies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of external system backing a pipeline stage.
///
/// This is a closed set: the pipeline model fixes which systems can
/// appear in a release pipeline, and adapters are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    /// A source-control host; transitional objects are pull requests.
    SourceRepo,
    /// A build service; transitional objects are submit requests.
    BuildService,
    /// A distribution mirror; transitional objects are published
    /// artifacts.
    Mirror,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceRepo => write!(f, "source-repo"),
            Self::BuildService => write!(f, "build-service"),
            Self::Mirror => write!(f, "mirror"),
        }
    }
}

/// How a raw transitional state counts toward pipeline progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    /// The change has not yet cleared this stage.
    Pending,
    /// The change cleared this stage.
    Success,
    /// The change was rejected at this stage.
    Failure,
}

impl fmt::Display for StateClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

impl StateClass {
    /// Returns true if the class counts as terminal success.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if the class counts as terminal failure.
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failure)
    }
}

/// Classifies a raw pull-request state.
///
/// Vocabulary: `open`, `draft`, `merged`, `closed`. A closed-unmerged
/// pull request counts as failure.
#[must_use]
pub fn classify_source_repo(raw: &str) -> Option<StateClass> {
    match raw {
        "open" | "draft" => Some(StateClass::Pending),
        "merged" => Some(StateClass::Success),
        "closed" => Some(StateClass::Failure),
        _ => None,
    }
}

/// Classifies a raw submit-request state.
///
/// Vocabulary: `new`, `review`, `accepted`, `declined`, `revoked`,
/// `superseded`.
#[must_use]
pub fn classify_build_service(raw: &str) -> Option<StateClass> {
    match raw {
        "new" | "review" => Some(StateClass::Pending),
        "accepted" => Some(StateClass::Success),
        "declined" | "revoked" | "superseded" => Some(StateClass::Failure),
        _ => None,
    }
}

/// Classifies a raw artifact-presence state.
///
/// Vocabulary: `published`, `syncing`, `absent`, `stale`. A stale
/// artifact (present but carrying an older change) counts as failure
/// because it blocks the expected publication.
#[must_use]
pub fn classify_mirror(raw: &str) -> Option<StateClass> {
    match raw {
        "published" => Some(StateClass::Success),
        "syncing" | "absent" => Some(StateClass::Pending),
        "stale" => Some(StateClass::Failure),
        _ => None,
    }
}
