//! Cross-system identity correlation.
//!
//! Records from different systems refer to the same logical change
//! through different identifier schemes. Identity rules are data, not
//! code: an ordered predicate list per component, evaluated by a small
//! interpreter. No polymorphic hierarchy is involved, so a team can
//! reuse the engine with different rules by editing configuration
//! only.

#[cfg(test)]
mod correlate_tests;

use crate::adapter::parse::{trailing_revision, version_prefix};
use crate::config::TrackedComponent;
use crate::errors::CorrelationAmbiguityError;
use crate::record::StageRecord;
use crate::report::{RunWarning, WarningCode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One identity-matching predicate.
///
/// Rules extract a comparable key from a record; two records whose
/// keys are equal under a rule belong to the same change. A rule that
/// cannot extract a key from a record simply does not apply to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityRule {
    /// Exact package-name match.
    PackageName,
    /// Match on the version up to its build suffix (`+`/`~`).
    VersionPrefix,
    /// Exact branch-name match.
    BranchName,
    /// Match on the source revision hash, explicit or embedded in the
    /// version string.
    RevisionHash,
}

impl fmt::Display for IdentityRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PackageName => write!(f, "package-name"),
            Self::VersionPrefix => write!(f, "version-prefix"),
            Self::BranchName => write!(f, "branch-name"),
            Self::RevisionHash => write!(f, "revision-hash"),
        }
    }
}

impl IdentityRule {
    /// Extracts the rule's comparison key from a record, if the record
    /// carries the fields the rule needs.
    #[must_use]
    pub fn key_for(self, record: &StageRecord) -> Option<String> {
        match self {
            Self::PackageName => record.package.clone(),
            Self::VersionPrefix => record
                .version
                .as_deref()
                .map(|v| version_prefix(v).to_string()),
            Self::BranchName => record.branch.clone(),
            Self::RevisionHash => record
                .revision
                .clone()
                .or_else(|| record.version.as_deref().and_then(trailing_revision)),
        }
    }
}

/// A set of records believed to represent one logical change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeGroup {
    /// Derived identity, e.g. `package-name:agama`.
    pub key: String,
    /// True when the group holds a single record no rule could link.
    pub orphan: bool,
    /// Member records in canonical order.
    pub records: Vec<StageRecord>,
}

impl ChangeGroup {
    /// Returns the member records observed at the given stage.
    pub fn records_for_stage<'a>(
        &'a self,
        stage_id: &'a str,
    ) -> impl Iterator<Item = &'a StageRecord> {
        self.records.iter().filter(move |r| r.stage_id == stage_id)
    }

    /// Number of distinct stages the group has evidence for.
    #[must_use]
    pub fn stage_span(&self) -> usize {
        let mut seen: Vec<&str> = Vec::new();
        for record in &self.records {
            if !seen.contains(&record.stage_id.as_str()) {
                seen.push(&record.stage_id);
            }
        }
        seen.len()
    }
}

/// The result of correlating one component's fetched records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    /// All groups, orphans included, in deterministic order.
    pub groups: Vec<ChangeGroup>,
    /// Data-quality warnings raised during grouping.
    pub warnings: Vec<RunWarning>,
}

impl Correlation {
    /// The group the status report is derived from: the non-orphan
    /// group with evidence at the most stages, ties broken by key.
    #[must_use]
    pub fn primary(&self) -> Option<&ChangeGroup> {
        self.groups
            .iter()
            .filter(|g| !g.orphan)
            .max_by(|a, b| {
                a.stage_span()
                    .cmp(&b.stage_span())
                    .then_with(|| b.key.cmp(&a.key))
            })
    }
}

/// Partitions a component's fetched records into change groups.
///
/// The input is canonically sorted first, so for a fixed record set
/// the output is identical regardless of which adapter answered
/// first. For each record the rules are tried in priority order; the
/// highest-priority rule that links the record to exactly one existing
/// group wins. A record that links to several groups at one priority
/// is kept as an orphan with a `correlation_ambiguity` warning rather
/// than guessed into a group, and a record no rule applies to becomes
/// an orphan with an `orphan_record` warning.
#[must_use]
pub fn correlate(component: &TrackedComponent, mut records: Vec<StageRecord>) -> Correlation {
    records.sort_by_key(StageRecord::sort_key);

    let mut groups: Vec<ChangeGroup> = Vec::new();
    let mut warnings: Vec<RunWarning> = Vec::new();

    for record in records {
        match place(component, &groups, &record) {
            Placement::Existing(idx) => groups[idx].records.push(record),
            Placement::Fresh(key) => groups.push(ChangeGroup {
                key,
                orphan: false,
                records: vec![record],
            }),
            Placement::Ambiguous(err) => {
                tracing::warn!(record = %err.record_id, rule = %err.rule, "ambiguous correlation");
                warnings.push(RunWarning::new(
                    WarningCode::CorrelationAmbiguity,
                    err.to_string(),
                ));
                groups.push(orphan_group(record));
            }
            Placement::Orphan => {
                warnings.push(RunWarning::new(
                    WarningCode::OrphanRecord,
                    format!(
                        "record '{}' at stage '{}' matches no identity rule",
                        record.natural_id, record.stage_id
                    ),
                ));
                groups.push(orphan_group(record));
            }
        }
    }

    Correlation { groups, warnings }
}

enum Placement {
    Existing(usize),
    Fresh(String),
    Ambiguous(CorrelationAmbiguityError),
    Orphan,
}

/// The highest-priority rule for which both records carry a key
/// decides whether they represent the same change. Lower-priority
/// rules never override it: two records with different package names
/// are different changes even when their branches agree.
fn pair_verdict(
    rules: &[IdentityRule],
    a: &StageRecord,
    b: &StageRecord,
) -> Option<(usize, bool)> {
    for (idx, rule) in rules.iter().enumerate() {
        if let (Some(ka), Some(kb)) = (rule.key_for(a), rule.key_for(b)) {
            return Some((idx, ka == kb));
        }
    }
    None
}

/// A record matches a group at the best (lowest-index) rule any member
/// links through; at equal index a positive verdict wins.
fn group_verdict(
    rules: &[IdentityRule],
    group: &ChangeGroup,
    record: &StageRecord,
) -> Option<(usize, bool)> {
    let mut best: Option<(usize, bool)> = None;
    for member in &group.records {
        if let Some((idx, same)) = pair_verdict(rules, member, record) {
            best = match best {
                None => Some((idx, same)),
                Some((best_idx, best_same)) => {
                    if idx < best_idx || (idx == best_idx && same && !best_same) {
                        Some((idx, same))
                    } else {
                        Some((best_idx, best_same))
                    }
                }
            };
        }
    }
    best
}

fn place(component: &TrackedComponent, groups: &[ChangeGroup], record: &StageRecord) -> Placement {
    let rules = &component.rules;

    let mut matches: Vec<(usize, usize)> = Vec::new(); // (rule index, group index)
    for (group_idx, group) in groups.iter().enumerate() {
        if group.orphan {
            continue;
        }
        if let Some((rule_idx, true)) = group_verdict(rules, group, record) {
            matches.push((rule_idx, group_idx));
        }
    }

    if let Some(best_rule) = matches.iter().map(|&(rule_idx, _)| rule_idx).min() {
        let at_best: Vec<usize> = matches
            .iter()
            .filter(|(rule_idx, _)| *rule_idx == best_rule)
            .map(|(_, group_idx)| *group_idx)
            .collect();
        if at_best.len() == 1 {
            return Placement::Existing(at_best[0]);
        }
        // Several groups tie at the same rule priority; do not guess.
        return Placement::Ambiguous(CorrelationAmbiguityError::new(
            &record.natural_id,
            rules[best_rule].to_string(),
            at_best.len(),
        ));
    }

    rules
        .iter()
        .find_map(|rule| rule.key_for(record).map(|key| (*rule, key)))
        .map_or(Placement::Orphan, |(rule, key)| {
            Placement::Fresh(format!("{rule}:{key}"))
        })
}

fn orphan_group(record: StageRecord) -> ChangeGroup {
    ChangeGroup {
        key: format!("orphan:{}:{}", record.stage_id, record.natural_id),
        orphan: true,
        records: vec![record],
    }
}
