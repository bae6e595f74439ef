//! The immutable status report produced for each tracked component.

use crate::record::StageRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a component stands in its release lifecycle.
///
/// Valid transitions across runs: `not-started → in-progress →
/// {blocked, released}`, with `blocked → in-progress` once the
/// blocking condition clears. A component never regresses from
/// `released`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentState {
    /// No record of the change exists anywhere yet.
    NotStarted,
    /// The change is moving; the first unreached stage is pending or
    /// unknown.
    InProgress,
    /// The first unreached stage reported a terminal failure.
    Blocked,
    /// Every configured stage is reached.
    Released,
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not-started"),
            Self::InProgress => write!(f, "in-progress"),
            Self::Blocked => write!(f, "blocked"),
            Self::Released => write!(f, "released"),
        }
    }
}

/// What the engine concluded about one `(stage, target)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageObservation {
    /// A record at this stage classified as success.
    Success,
    /// A record at this stage classified as failure.
    Failure,
    /// A record exists but the change has not cleared the stage.
    Pending,
    /// The adapter for this triple was unavailable or timed out;
    /// neither success nor failure can be concluded.
    Unknown,
    /// The adapter answered and legitimately found nothing.
    Absent,
}

impl fmt::Display for StageObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Pending => write!(f, "pending"),
            Self::Unknown => write!(f, "unknown"),
            Self::Absent => write!(f, "absent"),
        }
    }
}

/// One entry in a report's evidence chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEvidence {
    /// The pipeline stage.
    pub stage_id: String,
    /// The target system instance.
    pub target: String,
    /// What the engine concluded for this pair.
    pub observation: StageObservation,
    /// The backing record, when one exists.
    pub record: Option<StageRecord>,
    /// Set when this stage reported success while an earlier stage had
    /// not: evidence of an observation race or a configuration
    /// mismatch, not of pipeline progress.
    pub out_of_order: bool,
}

/// Categories of per-run data-quality warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    /// An adapter reported a state outside the stage vocabulary.
    UnknownState,
    /// An adapter was unavailable; its triple degraded to unknown.
    AdapterUnavailable,
    /// A record matched multiple groups at equal rule priority.
    CorrelationAmbiguity,
    /// A record could not be linked to any group.
    OrphanRecord,
    /// The run soft deadline expired with fetches outstanding.
    DeadlineExceeded,
    /// A stage reported success before an earlier stage completed.
    OutOfOrder,
    /// Live data showed less progress than a previous run; the prior
    /// state was retained.
    Regression,
}

impl fmt::Display for WarningCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownState => write!(f, "unknown_state"),
            Self::AdapterUnavailable => write!(f, "adapter_unavailable"),
            Self::CorrelationAmbiguity => write!(f, "correlation_ambiguity"),
            Self::OrphanRecord => write!(f, "orphan_record"),
            Self::DeadlineExceeded => write!(f, "deadline_exceeded"),
            Self::OutOfOrder => write!(f, "out_of_order"),
            Self::Regression => write!(f, "regression"),
        }
    }
}

/// A data-quality annotation attached to a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunWarning {
    /// The warning category.
    pub code: WarningCode,
    /// Human-readable description.
    pub message: String,
}

impl RunWarning {
    /// Creates a new warning.
    #[must_use]
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// The consolidated status of one tracked component for one run.
///
/// Produced once per run per component and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// The component the report describes.
    pub component: String,
    /// The derived lifecycle state.
    pub state: ComponentState,
    /// The last contiguously reached stage, if any stage is reached.
    pub current_stage: Option<String>,
    /// Why the component is blocked, when `state` is `Blocked`.
    pub blocked_reason: Option<String>,
    /// Per-(stage, target) evidence in pipeline order.
    pub evidence: Vec<StageEvidence>,
    /// Data-quality warnings collected while deriving the report.
    pub warnings: Vec<RunWarning>,
    /// When the report was derived.
    pub generated_at: DateTime<Utc>,
}

impl StatusReport {
    /// Returns true if any triple degraded to unknown.
    #[must_use]
    pub fn is_partially_unknown(&self) -> bool {
        self.evidence
            .iter()
            .any(|e| e.observation == StageObservation::Unknown)
    }
}

/// The outcome of a whole run: one report per component, in
/// configuration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Component reports in configuration order.
    pub reports: Vec<StatusReport>,
    /// True when at least one component is partially unknown.
    pub degraded: bool,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// Returns the report for a component by name.
    #[must_use]
    pub fn report_for(&self, component: &str) -> Option<&StatusReport> {
        self.reports.iter().find(|r| r.component == component)
    }
}
