//! Stage records: single observations from one external system.

use crate::model::StageKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observation fetched from one external system.
///
/// Records are created fresh on each fetch and never mutated: the
/// producing adapter owns a record until it hands it to the
/// correlator. The identity fields (`package`, `version`, `branch`,
/// `revision`) are what the configured identity rules operate on; any
/// of them may be absent depending on what the source system exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    /// The pipeline stage this record was fetched for.
    pub stage_id: String,
    /// The kind of system that produced the record.
    pub kind: StageKind,
    /// The target system instance the record came from.
    pub target: String,
    /// The record's natural identifier in its own system (pull-request
    /// index, submit-request id, artifact file name).
    pub natural_id: String,
    /// The raw transitional state as reported by the system.
    pub raw_state: String,
    /// When the record was last updated upstream, if known.
    pub updated_at: Option<DateTime<Utc>>,
    /// Why the change is stuck at this stage, if the system said so
    /// (e.g. "review required", "build failed").
    pub blocking_reason: Option<String>,
    /// Package name the record refers to.
    pub package: Option<String>,
    /// Package or artifact version.
    pub version: Option<String>,
    /// Branch name, for source-control records.
    pub branch: Option<String>,
    /// Source revision hash, when the system exposes or embeds one.
    pub revision: Option<String>,
    /// A link to the record in its own system.
    pub url: Option<String>,
}

impl StageRecord {
    /// Creates a record with the mandatory fields; identity fields
    /// start unset.
    #[must_use]
    pub fn new(
        stage_id: impl Into<String>,
        kind: StageKind,
        target: impl Into<String>,
        natural_id: impl Into<String>,
        raw_state: impl Into<String>,
    ) -> Self {
        Self {
            stage_id: stage_id.into(),
            kind,
            target: target.into(),
            natural_id: natural_id.into(),
            raw_state: raw_state.into(),
            updated_at: None,
            blocking_reason: None,
            package: None,
            version: None,
            branch: None,
            revision: None,
            url: None,
        }
    }

    /// Sets the upstream update time.
    #[must_use]
    pub fn with_updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// Sets the blocking reason.
    #[must_use]
    pub fn with_blocking_reason(mut self, reason: impl Into<String>) -> Self {
        self.blocking_reason = Some(reason.into());
        self
    }

    /// Sets the package name.
    #[must_use]
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    /// Sets the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the branch name.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Sets the revision hash.
    #[must_use]
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// Sets the record URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// A stable sort key so downstream processing never depends on
    /// adapter answer order.
    #[must_use]
    pub fn sort_key(&self) -> (String, String, String) {
        (
            self.stage_id.clone(),
            self.target.clone(),
            self.natural_id.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let record = StageRecord::new("merged", StageKind::SourceRepo, "src-host", "42", "merged")
            .with_package("agama")
            .with_branch("main")
            .with_revision("e8d2f1b");

        assert_eq!(record.stage_id, "merged");
        assert_eq!(record.package.as_deref(), Some("agama"));
        assert_eq!(record.revision.as_deref(), Some("e8d2f1b"));
        assert!(record.blocking_reason.is_none());
    }

    #[test]
    fn test_sort_key_orders_by_stage_then_target_then_id() {
        let a = StageRecord::new("built", StageKind::BuildService, "obs", "1", "new");
        let b = StageRecord::new("built", StageKind::BuildService, "obs", "2", "new");
        let c = StageRecord::new("merged", StageKind::SourceRepo, "host", "1", "open");

        let mut records = vec![c.clone(), b.clone(), a.clone()];
        records.sort_by_key(StageRecord::sort_key);
        assert_eq!(records, vec![a, b, c]);
    }

    #[test]
    fn test_record_serializes() {
        let record = StageRecord::new("merged", StageKind::SourceRepo, "src-host", "42", "open");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#""raw_state":"open""#));
    }
}
