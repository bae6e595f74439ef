//! The reconciliation engine.
//!
//! Reconciliation itself is a pure, synchronous reduction over the
//! already-fetched record set: it walks the pipeline model in order,
//! derives one observation per `(stage, target)` pair from the primary
//! change group, and reduces the sequence to a single component state.
//! The async fetch orchestration around it lives in [`run`].

mod run;


pub use run::RunCoordinator;

use crate::correlate::Correlation;
use crate::model::{PipelineModel, StateClass};
use crate::record::StageRecord;
use crate::report::{
    ComponentState, RunWarning, StageEvidence, StageObservation, StatusReport, WarningCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the fetch for one `(stage, target)` pair ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchOutcome {
    /// The adapter answered (possibly with zero records).
    Complete,
    /// The adapter could not be queried; the triple is unknown.
    Unavailable {
        /// The transport-level reason.
        reason: String,
    },
}

/// Fetch outcome for one `(stage, target)` pair of a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripleOutcome {
    /// The pipeline stage.
    pub stage_id: String,
    /// The target system instance.
    pub target: String,
    /// How the fetch ended.
    pub outcome: FetchOutcome,
}

impl TripleOutcome {
    /// Creates a completed outcome.
    #[must_use]
    pub fn complete(stage_id: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            stage_id: stage_id.into(),
            target: target.into(),
            outcome: FetchOutcome::Complete,
        }
    }

    /// Creates an unavailable outcome.
    #[must_use]
    pub fn unavailable(
        stage_id: impl Into<String>,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            stage_id: stage_id.into(),
            target: target.into(),
            outcome: FetchOutcome::Unavailable {
                reason: reason.into(),
            },
        }
    }
}

/// Derives one component's status report from its correlated records.
///
/// The walk honors strict stage gating: the current stage is the last
/// *contiguous* reached stage from the start of the pipeline. A later
/// stage reporting success past a gap is recorded as evidence but
/// flagged out-of-order, since an artifact cannot legitimately appear
/// downstream before its upstream stage completed.
#[must_use]
pub fn reconcile(
    component: &str,
    pipeline: &PipelineModel,
    correlation: &Correlation,
    outcomes: &[TripleOutcome],
    now: DateTime<Utc>,
) -> StatusReport {
    let mut warnings: Vec<RunWarning> = correlation.warnings.clone();
    let primary = correlation.primary();

    // One observation per (stage, target), in pipeline order.
    let mut evidence: Vec<StageEvidence> = Vec::new();
    for def in pipeline.stages() {
        let records: Vec<&StageRecord> = primary
            .map(|group| {
                group
                    .records_for_stage(&def.id)
                    .filter(|r| r.target == def.target)
                    .collect()
            })
            .unwrap_or_default();

        let (observation, record) = observe(pipeline, def, &records, outcomes, &mut warnings);
        evidence.push(StageEvidence {
            stage_id: def.id.clone(),
            target: def.target.clone(),
            observation,
            record: record.cloned(),
            out_of_order: false,
        });
    }

    // Aggregate parallel targets into one class per stage position.
    let stage_ids = pipeline.stage_ids();
    let stage_class: Vec<StageObservation> = stage_ids
        .iter()
        .map(|id| aggregate_stage(&evidence, id))
        .collect();

    let reached = stage_class
        .iter()
        .position(|class| *class != StageObservation::Success)
        .unwrap_or(stage_ids.len());

    // Successes past the gate are observation races or configuration
    // mismatches, never progress.
    for entry in &mut evidence {
        if entry.observation == StageObservation::Success {
            if let Some(pos) = pipeline.position(&entry.stage_id) {
                if pos > reached {
                    entry.out_of_order = true;
                    warnings.push(RunWarning::new(
                        WarningCode::OutOfOrder,
                        format!(
                            "stage '{}' on '{}' succeeded before stage '{}' completed",
                            entry.stage_id, entry.target, stage_ids[reached]
                        ),
                    ));
                }
            }
        }
    }

    let has_records = primary.is_some_and(|g| !g.records.is_empty());
    let any_unknown = stage_class.contains(&StageObservation::Unknown);

    // Pre-gate components sit at stage 0 even though nothing is
    // reached yet; only a component with no trace anywhere has no
    // current stage.
    let current_stage = if reached > 0 {
        Some(stage_ids[reached - 1].to_string())
    } else if has_records || any_unknown {
        Some(stage_ids[0].to_string())
    } else {
        None
    };

    let (state, blocked_reason) = if reached == stage_ids.len() {
        (ComponentState::Released, None)
    } else if stage_class[reached] == StageObservation::Failure {
        let reason = evidence
            .iter()
            .find(|e| {
                e.stage_id == stage_ids[reached] && e.observation == StageObservation::Failure
            })
            .and_then(|e| {
                e.record.as_ref().map(|r| {
                    r.blocking_reason
                        .clone()
                        .unwrap_or_else(|| r.raw_state.clone())
                })
            });
        (ComponentState::Blocked, reason)
    } else if has_records || any_unknown {
        (ComponentState::InProgress, None)
    } else {
        (ComponentState::NotStarted, None)
    };

    StatusReport {
        component: component.to_string(),
        state,
        current_stage,
        blocked_reason,
        evidence,
        warnings,
        generated_at: now,
    }
}

/// Like [`reconcile`], but guards against regression from a previous
/// run's report: a component once released stays released, with a
/// warning when the live data disagrees.
#[must_use]
pub fn reconcile_with_previous(
    previous: &StatusReport,
    component: &str,
    pipeline: &PipelineModel,
    correlation: &Correlation,
    outcomes: &[TripleOutcome],
    now: DateTime<Utc>,
) -> StatusReport {
    let mut report = reconcile(component, pipeline, correlation, outcomes, now);
    if previous.state == ComponentState::Released && report.state != ComponentState::Released {
        report.warnings.push(RunWarning::new(
            WarningCode::Regression,
            format!(
                "live data reports '{}' but the component was already released; retaining released",
                report.state
            ),
        ));
        report.state = ComponentState::Released;
        report.blocked_reason = None;
        report.current_stage = pipeline.stage_ids().last().map(ToString::to_string);
    }
    report
}

/// Derives the observation for one `(stage, target)` pair from its
/// records, falling back to the fetch outcome when no record exists.
fn observe<'a>(
    pipeline: &PipelineModel,
    def: &crate::model::StageDefinition,
    records: &[&'a StageRecord],
    outcomes: &[TripleOutcome],
    warnings: &mut Vec<RunWarning>,
) -> (StageObservation, Option<&'a StageRecord>) {
    let mut pending: Option<&StageRecord> = None;
    let mut failure: Option<&StageRecord> = None;
    let mut unknown: Option<&StageRecord> = None;

    for record in records {
        match pipeline.classify(def.kind, &record.raw_state) {
            Ok(StateClass::Success) => return (StageObservation::Success, Some(record)),
            Ok(StateClass::Failure) => failure = failure.or(Some(record)),
            Ok(StateClass::Pending) => pending = pending.or(Some(record)),
            Err(err) => {
                warnings.push(RunWarning::new(WarningCode::UnknownState, err.to_string()));
                unknown = unknown.or(Some(record));
            }
        }
    }

    if let Some(record) = failure {
        return (StageObservation::Failure, Some(record));
    }
    if let Some(record) = pending {
        return (StageObservation::Pending, Some(record));
    }
    if let Some(record) = unknown {
        return (StageObservation::Unknown, Some(record));
    }

    let unavailable = outcomes.iter().find_map(|o| {
        (o.stage_id == def.id && o.target == def.target)
            .then(|| match &o.outcome {
                FetchOutcome::Complete => None,
                FetchOutcome::Unavailable { reason } => Some(reason.clone()),
            })
            .flatten()
    });
    if let Some(reason) = unavailable {
        warnings.push(RunWarning::new(
            WarningCode::AdapterUnavailable,
            format!("stage '{}' on '{}': {reason}", def.id, def.target),
        ));
        return (StageObservation::Unknown, None);
    }

    (StageObservation::Absent, None)
}

/// Reduces all targets of one stage position to a single class.
fn aggregate_stage(evidence: &[StageEvidence], stage_id: &str) -> StageObservation {
    let entries = evidence.iter().filter(|e| e.stage_id == stage_id);
    let mut agg = StageObservation::Absent;
    for entry in entries {
        agg = match (agg, entry.observation) {
            (_, StageObservation::Success) | (StageObservation::Success, _) => {
                StageObservation::Success
            }
            (_, StageObservation::Failure) | (StageObservation::Failure, _) => {
                StageObservation::Failure
            }
            (_, StageObservation::Pending) | (StageObservation::Pending, _) => {
                StageObservation::Pending
            }
            (_, StageObservation::Unknown) | (StageObservation::Unknown, _) => {
                StageObservation::Unknown
            }
            (StageObservation::Absent, StageObservation::Absent) => StageObservation::Absent,
        };
    }
    agg
}
