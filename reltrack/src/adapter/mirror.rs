//! Mirror adapter: artifact presence via directory-listing scraping.
//!
//! A mirror exposes a plain HTML index of published artifacts. The
//! adapter collects every link whose file name matches one of the
//! binding's glob patterns and reports the lexicographically newest
//! one as a published record; artifact names embed their version, so
//! lexicographic order tracks release order.
//!
//! A listing only evidences presence, so this adapter emits `published`
//! or nothing. The `syncing` and `stale` states in the mirror
//! vocabulary are for sources that expose sync metadata (e.g. a mirror
//! status API); classification handles them either way.

use crate::adapter::client::HttpClient;
use crate::adapter::parse::{glob_to_regex, trailing_revision, version_from_filename};
use crate::adapter::{ComponentHint, SourceAdapter};
use crate::config::StageBinding;
use crate::errors::{AdapterError, ConfigurationError};
use crate::model::StageKind;
use crate::record::StageRecord;
use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};

/// Published-artifact adapter for one stage binding.
#[derive(Debug)]
pub struct MirrorAdapter {
    client: HttpClient,
    stage_id: String,
    target: String,
    base: reqwest::Url,
    patterns: Vec<Regex>,
}

impl MirrorAdapter {
    /// Creates the adapter for one mirror binding.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` when the binding URL does not
    /// parse, no patterns are configured, or a pattern is invalid.
    pub fn new(client: HttpClient, binding: &StageBinding) -> Result<Self, ConfigurationError> {
        let base = reqwest::Url::parse(&binding.url).map_err(|e| {
            ConfigurationError::new(format!("invalid mirror URL '{}': {e}", binding.url))
        })?;
        if binding.patterns.is_empty() {
            return Err(ConfigurationError::new(format!(
                "mirror stage '{}' has no artifact patterns",
                binding.stage_id
            )));
        }
        let patterns = binding
            .patterns
            .iter()
            .map(|p| {
                glob_to_regex(p).map_err(|e| {
                    ConfigurationError::new(format!("invalid artifact pattern '{p}': {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            client,
            stage_id: binding.stage_id.clone(),
            target: binding.target.clone(),
            base,
            patterns,
        })
    }

    /// Extracts the link targets from a directory-listing page.
    fn listing_hrefs(&self, payload: &str) -> Result<Vec<String>, AdapterError> {
        let anchor = Selector::parse("a[href]")
            .map_err(|e| AdapterError::decode(&self.target, e.to_string()))?;
        let document = Html::parse_document(payload);
        Ok(document
            .select(&anchor)
            .filter_map(|a| a.value().attr("href"))
            .map(ToString::to_string)
            .collect())
    }

    fn newest_matching(&self, hrefs: &[String]) -> Option<String> {
        let mut matching: Vec<&str> = hrefs
            .iter()
            .map(|href| filename_of(href))
            .filter(|name| self.patterns.iter().any(|re| re.is_match(name)))
            .collect();
        matching.sort_unstable();
        matching.last().map(ToString::to_string)
    }

    fn record_from(&self, filename: &str, hint: &ComponentHint) -> StageRecord {
        let mut record = StageRecord::new(
            &self.stage_id,
            StageKind::Mirror,
            &self.target,
            filename,
            "published",
        )
        .with_package(&hint.package);
        if let Some(version) = version_from_filename(filename) {
            record = record.with_version(&version);
        }
        if let Some(revision) = trailing_revision(stem_of(filename)) {
            record = record.with_revision(revision);
        }
        if let Ok(url) = self.base.join(filename) {
            record = record.with_url(url.as_str());
        }
        record
    }
}

/// The last path segment of a link target.
fn filename_of(href: &str) -> &str {
    href.trim_end_matches('/').rsplit('/').next().unwrap_or(href)
}

/// The file name with its final extension removed, so a trailing
/// revision embedded before `.iso` is still found.
fn stem_of(filename: &str) -> &str {
    filename
        .rfind('.')
        .map_or(filename, |idx| &filename[..idx])
}

#[async_trait]
impl SourceAdapter for MirrorAdapter {
    fn stage_id(&self) -> &str {
        &self.stage_id
    }

    fn target(&self) -> &str {
        &self.target
    }

    async fn fetch(&self, hint: &ComponentHint) -> Result<Vec<StageRecord>, AdapterError> {
        let Some(payload) = self.client.get_text(self.base.as_str(), &self.target).await? else {
            return Ok(Vec::new());
        };
        let hrefs = self.listing_hrefs(&payload)?;
        match self.newest_matching(&hrefs) {
            Some(filename) => Ok(vec![self.record_from(&filename, hint)]),
            None => {
                tracing::debug!(
                    target = self.target,
                    url = %self.base,
                    "no artifact matched the configured patterns"
                );
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn adapter() -> MirrorAdapter {
        let binding = StageBinding::new(
            "published",
            StageKind::Mirror,
            "public-mirror",
            "https://mirror.example.org/iso/",
        )
        .with_patterns(["agama-live.*.iso"]);
        MirrorAdapter::new(HttpClient::new(Duration::from_secs(5)).unwrap(), &binding).unwrap()
    }

    fn hint() -> ComponentHint {
        ComponentHint {
            component: "agama".to_string(),
            package: "agama".to_string(),
        }
    }

    const LISTING: &str = r#"<html><body><pre>
        <a href="../">../</a>
        <a href="agama-live.x86_64-12.250310.iso">agama-live.x86_64-12.250310.iso</a>
        <a href="agama-live.x86_64-12.250404.iso">agama-live.x86_64-12.250404.iso</a>
        <a href="agama-live.x86_64-12.250404.iso.sha256">agama-live.x86_64-12.250404.iso.sha256</a>
        <a href="other-live.x86_64-3.0.iso">other-live.x86_64-3.0.iso</a>
    </pre></body></html>"#;

    #[test]
    fn test_binding_without_patterns_rejected() {
        let binding = StageBinding::new(
            "published",
            StageKind::Mirror,
            "public-mirror",
            "https://mirror.example.org/iso/",
        );
        let client = HttpClient::new(Duration::from_secs(5)).unwrap();
        assert!(MirrorAdapter::new(client, &binding).is_err());
    }

    #[test]
    fn test_newest_matching_artifact_wins() {
        let adapter = adapter();
        let hrefs = adapter.listing_hrefs(LISTING).unwrap();
        assert_eq!(
            adapter.newest_matching(&hrefs).as_deref(),
            Some("agama-live.x86_64-12.250404.iso")
        );
    }

    #[test]
    fn test_checksum_files_do_not_match() {
        let adapter = adapter();
        let hrefs = vec!["agama-live.x86_64-12.1.iso.sha256".to_string()];
        assert_eq!(adapter.newest_matching(&hrefs), None);
    }

    #[test]
    fn test_record_carries_version_and_url() {
        let record = adapter().record_from("agama-live.x86_64-12.250404.iso", &hint());
        assert_eq!(record.raw_state, "published");
        assert_eq!(record.version.as_deref(), Some("12.250404"));
        assert_eq!(
            record.url.as_deref(),
            Some("https://mirror.example.org/iso/agama-live.x86_64-12.250404.iso")
        );
        assert_eq!(record.package.as_deref(), Some("agama"));
    }

    #[test]
    fn test_revision_extracted_from_snapshot_names() {
        let record = adapter().record_from("agama-live.x86_64-12.ge8d2f1b.iso", &hint());
        assert_eq!(record.revision.as_deref(), Some("e8d2f1b"));
    }

    #[test]
    fn test_absolute_hrefs_reduce_to_filenames() {
        assert_eq!(
            filename_of("/iso/agama-live.x86_64-12.1.iso"),
            "agama-live.x86_64-12.1.iso"
        );
        assert_eq!(filename_of("plain.iso"), "plain.iso");
    }
}
