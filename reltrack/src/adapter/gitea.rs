//! Source-repo adapter for Gitea-style hosts.
//!
//! The binding URL names an organisation (`https://host/org/`); the
//! repository queried is the hinted package name underneath it. Pull
//! requests come from the REST API as JSON.

use crate::adapter::client::HttpClient;
use crate::adapter::{ComponentHint, SourceAdapter};
use crate::config::StageBinding;
use crate::errors::{AdapterError, ConfigurationError};
use crate::model::StageKind;
use crate::record::StageRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One pull request as the Gitea API reports it. Only the fields the
/// tracker reads are modelled.
#[derive(Debug, Deserialize)]
struct PullRequest {
    number: u64,
    #[serde(default)]
    state: String,
    #[serde(default)]
    merged: bool,
    #[serde(default)]
    draft: bool,
    base: Option<BranchRef>,
    head: Option<BranchRef>,
    html_url: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct BranchRef {
    #[serde(rename = "ref", default)]
    ref_name: String,
    sha: Option<String>,
}

impl PullRequest {
    /// Maps the API's split state fields onto the single raw-state
    /// vocabulary: `merged` and `draft` win over the coarse
    /// open/closed state.
    fn raw_state(&self) -> &str {
        if self.merged {
            "merged"
        } else if self.draft {
            "draft"
        } else {
            &self.state
        }
    }
}

/// Pull-request adapter for one stage binding.
#[derive(Debug)]
pub struct GiteaAdapter {
    client: HttpClient,
    stage_id: String,
    target: String,
    base: reqwest::Url,
    org: String,
    branch: Option<String>,
}

impl GiteaAdapter {
    /// Creates the adapter for one source-repo binding.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` when the binding URL does not
    /// parse or carries no organisation path.
    pub fn new(client: HttpClient, binding: &StageBinding) -> Result<Self, ConfigurationError> {
        let base = reqwest::Url::parse(&binding.url).map_err(|e| {
            ConfigurationError::new(format!("invalid source-repo URL '{}': {e}", binding.url))
        })?;
        let org = base
            .path_segments()
            .and_then(|mut segments| segments.find(|s| !s.is_empty()))
            .map(ToString::to_string)
            .ok_or_else(|| {
                ConfigurationError::new(format!(
                    "source-repo URL '{}' names no organisation",
                    binding.url
                ))
            })?;
        Ok(Self {
            client,
            stage_id: binding.stage_id.clone(),
            target: binding.target.clone(),
            base,
            org,
            branch: binding.branch.clone(),
        })
    }

    fn pulls_url(&self, package: &str) -> Result<reqwest::Url, AdapterError> {
        let path = format!("/api/v1/repos/{}/{package}/pulls?state=all", self.org);
        self.base
            .join(&path)
            .map_err(|e| AdapterError::decode(&self.target, e.to_string()))
    }

    fn record_from(&self, pull: &PullRequest, hint: &ComponentHint) -> StageRecord {
        let mut record = StageRecord::new(
            &self.stage_id,
            StageKind::SourceRepo,
            &self.target,
            pull.number.to_string(),
            pull.raw_state(),
        )
        .with_package(&hint.package);
        if let Some(base) = &pull.base {
            record = record.with_branch(&base.ref_name);
        }
        if let Some(sha) = pull.head.as_ref().and_then(|h| h.sha.as_ref()) {
            record = record.with_revision(sha);
        }
        if let Some(url) = &pull.html_url {
            record = record.with_url(url);
        }
        if let Some(at) = pull.updated_at {
            record = record.with_updated_at(at);
        }
        record
    }

    fn records_from_payload(
        &self,
        payload: &str,
        hint: &ComponentHint,
    ) -> Result<Vec<StageRecord>, AdapterError> {
        let pulls: Vec<PullRequest> = serde_json::from_str(payload)
            .map_err(|e| AdapterError::decode(&self.target, e.to_string()))?;
        Ok(pulls
            .iter()
            .filter(|pull| match (&self.branch, &pull.base) {
                (Some(branch), Some(base)) => &base.ref_name == branch,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .map(|pull| self.record_from(pull, hint))
            .collect())
    }
}

#[async_trait]
impl SourceAdapter for GiteaAdapter {
    fn stage_id(&self) -> &str {
        &self.stage_id
    }

    fn target(&self) -> &str {
        &self.target
    }

    async fn fetch(&self, hint: &ComponentHint) -> Result<Vec<StageRecord>, AdapterError> {
        let url = self.pulls_url(&hint.package)?;
        // A repository the host does not know is an empty answer, not
        // a failure.
        let Some(payload) = self.client.get_text(url.as_str(), &self.target).await? else {
            tracing::debug!(target = self.target, package = hint.package, "repository not found");
            return Ok(Vec::new());
        };
        self.records_from_payload(&payload, hint)
    }
}
