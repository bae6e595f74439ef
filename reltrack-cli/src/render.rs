//! Markdown rendering of a run summary.

use reltrack::prelude::{RunSummary, StatusReport};
use std::fmt::Write;

/// Renders the whole run as a markdown document, one section per
/// component in configuration order.
#[must_use]
pub fn render_markdown(summary: &RunSummary) -> String {
    let mut out = String::from("# Release Status\n");
    for report in &summary.reports {
        render_report(&mut out, report);
    }
    if summary.degraded {
        out.push_str("\n_Some stages could not be observed; results are partial._\n");
    }
    out
}

fn render_report(out: &mut String, report: &StatusReport) {
    // Write into a String cannot fail.
    let _ = write!(out, "\n## {} ({})\n\n", report.component, report.state);

    if let Some(stage) = &report.current_stage {
        let _ = writeln!(out, "Current stage: {stage}\n");
    }
    if let Some(reason) = &report.blocked_reason {
        let _ = writeln!(out, "Blocked: {reason}\n");
    }

    out.push_str("| Stage | Target | Observation | Evidence |\n");
    out.push_str("|-------|--------|-------------|----------|\n");
    for entry in &report.evidence {
        let evidence = entry.record.as_ref().map_or_else(String::new, |record| {
            let label = &record.natural_id;
            match &record.url {
                Some(url) => format!("[{label}]({url})"),
                None => label.clone(),
            }
        });
        let mut observation = entry.observation.to_string();
        if entry.out_of_order {
            observation.push_str(" (out of order)");
        }
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            entry.stage_id, entry.target, observation, evidence
        );
    }

    let revisions = source_revisions(report);
    if !revisions.is_empty() {
        out.push_str("\nSource revisions:\n");
        for revision in revisions {
            let _ = writeln!(out, "- {revision}");
        }
    }

    if !report.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for warning in &report.warnings {
            let _ = writeln!(out, "- [{}] {}", warning.code, warning.message);
        }
    }
}

/// Distinct source revisions seen in the evidence chain, sorted.
fn source_revisions(report: &StatusReport) -> Vec<String> {
    let mut revisions: Vec<String> = report
        .evidence
        .iter()
        .filter_map(|e| e.record.as_ref())
        .filter_map(|r| r.revision.clone())
        .collect();
    revisions.sort_unstable();
    revisions.dedup();
    revisions
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use reltrack::prelude::{
        ComponentState, RunWarning, StageEvidence, StageKind, StageObservation, StageRecord,
        WarningCode,
    };

    fn report() -> StatusReport {
        StatusReport {
            component: "agama".to_string(),
            state: ComponentState::Blocked,
            current_stage: Some("merged".to_string()),
            blocked_reason: Some("build error in staging".to_string()),
            evidence: vec![
                StageEvidence {
                    stage_id: "merged".to_string(),
                    target: "src-host".to_string(),
                    observation: StageObservation::Success,
                    record: Some(
                        StageRecord::new(
                            "merged",
                            StageKind::SourceRepo,
                            "src-host",
                            "14",
                            "merged",
                        )
                        .with_revision("e8d2f1b")
                        .with_url("https://src.example.org/pool/agama/pulls/14"),
                    ),
                    out_of_order: false,
                },
                StageEvidence {
                    stage_id: "built".to_string(),
                    target: "public-obs".to_string(),
                    observation: StageObservation::Failure,
                    record: Some(StageRecord::new(
                        "built",
                        StageKind::BuildService,
                        "public-obs",
                        "1302942",
                        "declined",
                    )),
                    out_of_order: false,
                },
            ],
            warnings: vec![RunWarning::new(WarningCode::OrphanRecord, "record 9 unlinked")],
            generated_at: Utc::now(),
        }
    }

    fn summary(degraded: bool) -> RunSummary {
        RunSummary {
            reports: vec![report()],
            degraded,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_section_per_component() {
        let md = render_markdown(&summary(false));
        assert!(md.starts_with("# Release Status\n"));
        assert!(md.contains("## agama (blocked)"));
        assert!(md.contains("Current stage: merged"));
        assert!(md.contains("Blocked: build error in staging"));
    }

    #[test]
    fn test_evidence_table_links_records() {
        let md = render_markdown(&summary(false));
        assert!(md.contains("| merged | src-host | success | [14](https://src.example.org/pool/agama/pulls/14) |"));
        assert!(md.contains("| built | public-obs | failure | 1302942 |"));
    }

    #[test]
    fn test_revisions_and_warnings_listed() {
        let md = render_markdown(&summary(false));
        assert!(md.contains("- e8d2f1b"));
        assert!(md.contains("- [orphan_record] record 9 unlinked"));
    }

    #[test]
    fn test_degraded_footnote() {
        assert!(!render_markdown(&summary(false)).contains("results are partial"));
        assert!(render_markdown(&summary(true)).contains("results are partial"));
    }
}
