//! Build-service adapter for OBS-style submit requests.
//!
//! The binding URL is the project page (`.../project/show/<project>`);
//! the adapter queries the request search API for submit requests
//! targeting the hinted package in that project, then enriches each
//! record with the version parsed from the source package's obsinfo
//! or spec file. Responses are XML; they are read leniently with an
//! HTML parser, which tolerates the minor dialect differences between
//! build-service deployments.

use crate::adapter::client::HttpClient;
use crate::adapter::parse::{parse_obsinfo_version, parse_spec, trailing_revision};
use crate::adapter::{ComponentHint, SourceAdapter};
use crate::config::StageBinding;
use crate::errors::{AdapterError, ConfigurationError};
use crate::model::StageKind;
use crate::record::StageRecord;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use scraper::{ElementRef, Html, Selector};

const REQUEST_STATES: [&str; 6] = [
    "new",
    "review",
    "accepted",
    "declined",
    "revoked",
    "superseded",
];

/// Submit-request adapter for one stage binding.
#[derive(Debug)]
pub struct ObsAdapter {
    client: HttpClient,
    stage_id: String,
    target: String,
    base: reqwest::Url,
    project: String,
}

impl ObsAdapter {
    /// Creates the adapter for one build-service binding.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` when the binding URL does not
    /// parse or does not end in a project name.
    pub fn new(client: HttpClient, binding: &StageBinding) -> Result<Self, ConfigurationError> {
        let base = reqwest::Url::parse(&binding.url).map_err(|e| {
            ConfigurationError::new(format!("invalid build-service URL '{}': {e}", binding.url))
        })?;
        let project = base
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
            .map(ToString::to_string)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                ConfigurationError::new(format!(
                    "build-service URL '{}' names no project",
                    binding.url
                ))
            })?;
        Ok(Self {
            client,
            stage_id: binding.stage_id.clone(),
            target: binding.target.clone(),
            base,
            project,
        })
    }

    fn search_url(&self, package: &str) -> Result<reqwest::Url, AdapterError> {
        let states = REQUEST_STATES
            .iter()
            .map(|s| format!("state/@name='{s}'"))
            .collect::<Vec<_>>()
            .join(" or ");
        let query = format!(
            "({states}) and action/target/@project='{}' and action/target/@package='{package}'",
            self.project
        );
        let mut url = self
            .base
            .join("/search/request")
            .map_err(|e| AdapterError::decode(&self.target, e.to_string()))?;
        url.query_pairs_mut().append_pair("match", &query);
        Ok(url)
    }

    fn records_from_payload(&self, payload: &str) -> Result<Vec<ParsedRequest>, AdapterError> {
        let select = |selector: &str| {
            Selector::parse(selector)
                .map_err(|e| AdapterError::decode(&self.target, e.to_string()))
        };
        let request_sel = select("request")?;
        let state_sel = select("state")?;
        let source_sel = select("action > source")?;
        let target_sel = select("action > target")?;
        let comment_sel = select("state > comment")?;
        let description_sel = select("description")?;

        let document = Html::parse_document(payload);
        let mut records = Vec::new();
        for request in document.select(&request_sel) {
            let Some(id) = request.value().attr("id") else {
                continue;
            };
            let state = request.select(&state_sel).next();
            let raw_state = state
                .and_then(|s| s.value().attr("name"))
                .unwrap_or("unknown");

            let mut record = StageRecord::new(
                &self.stage_id,
                StageKind::BuildService,
                &self.target,
                id,
                raw_state,
            );

            let package = attr_of(&request, &target_sel, "package")
                .or_else(|| attr_of(&request, &source_sel, "package"));
            if let Some(package) = package {
                record = record.with_package(package);
            }
            if let Some(revision) =
                attr_of(&request, &source_sel, "rev").and_then(|rev| trailing_revision(&rev))
            {
                record = record.with_revision(revision);
            }
            if let Some(when) = state.and_then(|s| s.value().attr("when")) {
                if let Ok(at) = NaiveDateTime::parse_from_str(when, "%Y-%m-%dT%H:%M:%S") {
                    record = record.with_updated_at(at.and_utc());
                }
            }

            // A declined request carries the reviewer's reason, either
            // as a state comment or in the request description.
            if raw_state == "declined" {
                let reason = text_of(&request, &comment_sel)
                    .or_else(|| text_of(&request, &description_sel));
                if let Some(reason) = reason {
                    record = record.with_blocking_reason(reason);
                }
            }

            if let Ok(url) = self.base.join(&format!("/request/show/{id}")) {
                record = record.with_url(url.as_str());
            }

            let source = request.select(&source_sel).next().and_then(|source| {
                let project = source.value().attr("project")?;
                let package = source.value().attr("package")?;
                Some((project.to_string(), package.to_string()))
            });
            records.push(ParsedRequest { record, source });
        }
        Ok(records)
    }

    /// Reads the package version from the request's source package,
    /// preferring an `.obsinfo` file over the spec file, as the
    /// sources themselves do. Failures only cost the version field.
    async fn source_version(&self, project: &str, package: &str) -> Option<String> {
        let listing_url = self.base.join(&format!("/source/{project}/{package}")).ok()?;
        let listing = self
            .client
            .get_text(listing_url.as_str(), &self.target)
            .await
            .ok()??;
        let files = listing_entries(&listing)?;

        let exact = format!("{package}.obsinfo");
        let obsinfo = files
            .iter()
            .find(|f| **f == exact)
            .or_else(|| files.iter().find(|f| f.ends_with(".obsinfo")));
        if let Some(file) = obsinfo {
            let content = self.source_file(project, package, file).await?;
            if let Some(version) = parse_obsinfo_version(&content) {
                return Some(version);
            }
        }

        let spec = format!("{package}.spec");
        if files.contains(&spec) {
            let content = self.source_file(project, package, &spec).await?;
            let (version, _release) = parse_spec(&content);
            if !version.is_empty() {
                return Some(version);
            }
        }
        None
    }

    async fn source_file(&self, project: &str, package: &str, file: &str) -> Option<String> {
        let url = self
            .base
            .join(&format!("/source/{project}/{package}/{file}"))
            .ok()?;
        match self.client.get_text(url.as_str(), &self.target).await {
            Ok(content) => content,
            Err(err) => {
                tracing::debug!(project, package, file, error = %err, "source file fetch failed");
                None
            }
        }
    }
}

/// A submit request with the source coordinates needed for version
/// enrichment.
#[derive(Debug)]
struct ParsedRequest {
    record: StageRecord,
    source: Option<(String, String)>,
}

/// Entry names from a source directory listing.
fn listing_entries(payload: &str) -> Option<Vec<String>> {
    let entry_sel = Selector::parse("entry").ok()?;
    let document = Html::parse_document(payload);
    Some(
        document
            .select(&entry_sel)
            .filter_map(|e| e.value().attr("name"))
            .map(ToString::to_string)
            .collect(),
    )
}

fn attr_of(request: &ElementRef<'_>, selector: &Selector, name: &str) -> Option<String> {
    request
        .select(selector)
        .next()
        .and_then(|e| e.value().attr(name))
        .map(ToString::to_string)
}

fn text_of(request: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    let text = request
        .select(selector)
        .next()
        .map(|e| e.text().collect::<String>())?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[async_trait]
impl SourceAdapter for ObsAdapter {
    fn stage_id(&self) -> &str {
        &self.stage_id
    }

    fn target(&self) -> &str {
        &self.target
    }

    async fn fetch(&self, hint: &ComponentHint) -> Result<Vec<StageRecord>, AdapterError> {
        let url = self.search_url(&hint.package)?;
        let Some(payload) = self.client.get_text(url.as_str(), &self.target).await? else {
            return Ok(Vec::new());
        };
        let parsed = self.records_from_payload(&payload)?;

        // One version lookup per distinct source package.
        let mut versions: std::collections::HashMap<(String, String), Option<String>> =
            std::collections::HashMap::new();
        let mut records = Vec::with_capacity(parsed.len());
        for ParsedRequest { mut record, source } in parsed {
            if let Some(source) = source {
                let version = match versions.get(&source) {
                    Some(version) => version.clone(),
                    None => {
                        let version = self.source_version(&source.0, &source.1).await;
                        versions.insert(source, version.clone());
                        version
                    }
                };
                if let Some(version) = version {
                    record = record.with_version(version);
                }
            }
            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn adapter() -> ObsAdapter {
        let binding = StageBinding::new(
            "built",
            StageKind::BuildService,
            "public-obs",
            "https://build.example.org/project/show/openSUSE:Factory",
        );
        ObsAdapter::new(HttpClient::new(Duration::from_secs(5)).unwrap(), &binding).unwrap()
    }

    const PAYLOAD: &str = r#"<collection matches="2">
        <request id="1302942" creator="jreidinger">
            <action type="submit">
                <source project="systemsmanagement:Agama:Devel" package="agama" rev="e8d2f1b9aa00"/>
                <target project="openSUSE:Factory" package="agama"/>
            </action>
            <state name="declined" who="factory-auto" when="2025-09-05T14:55:46" created="2025-09-05T14:53:29">
                <comment>build error in staging</comment>
            </state>
            <description>Current development branch of agama</description>
        </request>
        <request id="1302950" creator="jreidinger">
            <action type="submit">
                <source project="systemsmanagement:Agama:Devel" package="agama"/>
                <target project="openSUSE:Factory" package="agama"/>
            </action>
            <state name="accepted" who="dimstar" when="2025-09-06T08:00:00" created="2025-09-05T20:00:00"/>
        </request>
    </collection>"#;

    #[test]
    fn test_project_extracted_from_binding_url() {
        assert_eq!(adapter().project, "openSUSE:Factory");
    }

    #[test]
    fn test_url_without_project_rejected() {
        let binding = StageBinding::new(
            "built",
            StageKind::BuildService,
            "public-obs",
            "https://build.example.org/",
        );
        let client = HttpClient::new(Duration::from_secs(5)).unwrap();
        assert!(ObsAdapter::new(client, &binding).is_err());
    }

    #[test]
    fn test_search_url_restricts_states_and_target() {
        let url = adapter().search_url("agama").unwrap();
        assert!(url.as_str().starts_with("https://build.example.org/search/request?match="));
        let query = url.query().unwrap();
        assert!(query.contains("state"));
        let decoded: String = url.query_pairs().map(|(_, v)| v.into_owned()).collect();
        assert!(decoded.contains("state/@name='accepted'"));
        assert!(decoded.contains("action/target/@project='openSUSE:Factory'"));
        assert!(decoded.contains("action/target/@package='agama'"));
    }

    #[test]
    fn test_requests_become_records() {
        let parsed = adapter().records_from_payload(PAYLOAD).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].record.natural_id, "1302942");
        assert_eq!(parsed[0].record.raw_state, "declined");
        assert_eq!(parsed[1].record.natural_id, "1302950");
        assert_eq!(parsed[1].record.raw_state, "accepted");
    }

    #[test]
    fn test_declined_request_carries_comment_as_reason() {
        let parsed = adapter().records_from_payload(PAYLOAD).unwrap();
        assert_eq!(
            parsed[0].record.blocking_reason.as_deref(),
            Some("build error in staging")
        );
        assert_eq!(parsed[1].record.blocking_reason, None);
    }

    #[test]
    fn test_identity_fields_from_request() {
        let parsed = adapter().records_from_payload(PAYLOAD).unwrap();
        assert_eq!(parsed[0].record.package.as_deref(), Some("agama"));
        assert_eq!(parsed[0].record.revision.as_deref(), Some("e8d2f1b9aa00"));
        assert!(parsed[0].record.updated_at.is_some());
        assert_eq!(
            parsed[0].record.url.as_deref(),
            Some("https://build.example.org/request/show/1302942")
        );
    }

    #[test]
    fn test_source_coordinates_extracted_for_enrichment() {
        let parsed = adapter().records_from_payload(PAYLOAD).unwrap();
        assert_eq!(
            parsed[0].source,
            Some((
                "systemsmanagement:Agama:Devel".to_string(),
                "agama".to_string()
            ))
        );
    }

    #[test]
    fn test_empty_collection_yields_no_records() {
        let parsed = adapter()
            .records_from_payload(r#"<collection matches="0"></collection>"#)
            .unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_listing_entries_from_directory_xml() {
        let listing = r#"<directory name="agama" rev="42">
            <entry name="agama.obsinfo" size="120"/>
            <entry name="agama.spec" size="4096"/>
        </directory>"#;
        assert_eq!(
            listing_entries(listing),
            Some(vec!["agama.obsinfo".to_string(), "agama.spec".to_string()])
        );
    }
}
