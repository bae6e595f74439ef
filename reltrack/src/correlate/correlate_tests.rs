//! Correlator grouping and determinism tests.

use super::{correlate, IdentityRule};
use crate::config::{StageBinding, TrackedComponent};
use crate::model::StageKind;
use crate::record::StageRecord;
use crate::report::WarningCode;
use pretty_assertions::assert_eq;

fn component(rules: Vec<IdentityRule>) -> TrackedComponent {
    TrackedComponent::new(
        "agama",
        rules,
        vec![
            StageBinding::new(
                "merged",
                StageKind::SourceRepo,
                "src-host",
                "https://src.example.org/pool/",
            ),
            StageBinding::new(
                "submitted-downstream",
                StageKind::BuildService,
                "public-obs",
                "https://build.example.org/project/show/Fac",
            ),
        ],
    )
}

fn pr(id: &str) -> StageRecord {
    StageRecord::new("merged", StageKind::SourceRepo, "src-host", id, "merged")
}

fn sr(id: &str) -> StageRecord {
    StageRecord::new(
        "submitted-downstream",
        StageKind::BuildService,
        "public-obs",
        id,
        "new",
    )
}

#[test]
fn test_groups_records_sharing_a_package_name() {
    let component = component(vec![IdentityRule::PackageName]);
    let records = vec![pr("1").with_package("agama"), sr("100").with_package("agama")];

    let correlation = correlate(&component, records);

    assert_eq!(correlation.groups.len(), 1);
    let group = &correlation.groups[0];
    assert!(!group.orphan);
    assert_eq!(group.key, "package-name:agama");
    assert_eq!(group.stage_span(), 2);
    assert!(correlation.warnings.is_empty());
}

#[test]
fn test_grouping_is_order_independent() {
    let component = component(vec![IdentityRule::PackageName, IdentityRule::RevisionHash]);
    let records = vec![
        pr("1").with_package("agama").with_revision("e8d2f1b"),
        sr("100").with_version("11+254.ge8d2f1b"),
        sr("101").with_package("agama"),
    ];

    let forward = correlate(&component, records.clone());
    let mut shuffled = records;
    shuffled.reverse();
    let backward = correlate(&component, shuffled);

    assert_eq!(forward, backward);
}

#[test]
fn test_revision_rule_reads_hash_embedded_in_version() {
    let component = component(vec![IdentityRule::RevisionHash]);
    let records = vec![
        pr("1").with_revision("e8d2f1b"),
        sr("100").with_version("11+254.ge8d2f1b"),
    ];

    let correlation = correlate(&component, records);
    assert_eq!(correlation.groups.len(), 1);
    assert_eq!(correlation.groups[0].key, "revision-hash:e8d2f1b");
}

#[test]
fn test_unmatched_records_become_separate_orphans() {
    // Neither record carries any identity field the rules can use.
    let component = component(vec![IdentityRule::PackageName]);
    let records = vec![pr("1"), sr("100")];

    let correlation = correlate(&component, records);

    assert_eq!(correlation.groups.len(), 2);
    assert!(correlation.groups.iter().all(|g| g.orphan));
    assert_eq!(correlation.warnings.len(), 2);
    assert!(correlation
        .warnings
        .iter()
        .all(|w| w.code == WarningCode::OrphanRecord));
    assert!(correlation.primary().is_none());
}

#[test]
fn test_ambiguous_record_is_kept_as_orphan() {
    // Two groups form under the package rule; a third record carries
    // only a branch shared by both, so the branch rule matches twice.
    let component = component(vec![IdentityRule::PackageName, IdentityRule::BranchName]);
    let records = vec![
        pr("1").with_package("agama").with_branch("main"),
        sr("100").with_package("agama-web").with_branch("main"),
        sr("200").with_branch("main"),
    ];

    let correlation = correlate(&component, records);

    assert_eq!(correlation.groups.len(), 3);
    let orphans: Vec<_> = correlation.groups.iter().filter(|g| g.orphan).collect();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].records[0].natural_id, "200");
    assert!(correlation
        .warnings
        .iter()
        .any(|w| w.code == WarningCode::CorrelationAmbiguity));
}

#[test]
fn test_rule_priority_breaks_ties() {
    // The package rule outranks the branch rule, so the record joins
    // the package group even though the branch rule also applies.
    let component = component(vec![IdentityRule::PackageName, IdentityRule::BranchName]);
    let records = vec![
        pr("1").with_package("agama").with_branch("main"),
        sr("100").with_package("agama-web").with_branch("main"),
        sr("200").with_package("agama").with_branch("main"),
    ];

    let correlation = correlate(&component, records);

    let agama = correlation
        .groups
        .iter()
        .find(|g| g.key == "package-name:agama")
        .unwrap();
    assert_eq!(agama.records.len(), 2);
}

#[test]
fn test_parallel_targets_coexist_in_one_group() {
    let component = component(vec![IdentityRule::PackageName]);
    let mut internal = sr("300").with_package("agama");
    internal.target = "internal-obs".to_string();
    let records = vec![
        sr("100").with_package("agama"),
        internal,
    ];

    let correlation = correlate(&component, records);
    assert_eq!(correlation.groups.len(), 1);
    let targets: Vec<_> = correlation.groups[0]
        .records
        .iter()
        .map(|r| r.target.as_str())
        .collect();
    assert!(targets.contains(&"public-obs"));
    assert!(targets.contains(&"internal-obs"));
}

#[test]
fn test_primary_prefers_widest_stage_span() {
    let component = component(vec![IdentityRule::PackageName]);
    let records = vec![
        pr("1").with_package("agama"),
        sr("100").with_package("agama"),
        sr("200").with_package("agama-web"),
    ];

    let correlation = correlate(&component, records);
    let primary = correlation.primary().unwrap();
    assert_eq!(primary.key, "package-name:agama");
}
