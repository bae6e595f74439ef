//! YAML configuration file loading.
//!
//! The on-disk schema mirrors the core configuration, with durations
//! spelled in seconds so the file stays hand-editable.

use anyhow::{Context, Result};
use reltrack::prelude::{
    CacheOptions, IdentityRule, RunOptions, StageBinding, StageKind, TrackedComponent,
    TrackingConfig,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    components: Vec<FileComponent>,
    #[serde(default)]
    options: FileOptions,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileComponent {
    name: String,
    rules: Vec<IdentityRule>,
    stages: Vec<FileStage>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileStage {
    stage: String,
    kind: StageKind,
    target: String,
    url: String,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    patterns: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileOptions {
    concurrency: Option<usize>,
    fetch_timeout_secs: Option<u64>,
    soft_deadline_secs: Option<u64>,
    cache: Option<FileCache>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileCache {
    dir: PathBuf,
    max_age_secs: u64,
}

impl FileStage {
    fn into_binding(self) -> StageBinding {
        let mut binding = StageBinding::new(self.stage, self.kind, self.target, self.url);
        if let Some(branch) = self.branch {
            binding = binding.with_branch(branch);
        }
        if !self.patterns.is_empty() {
            binding = binding.with_patterns(self.patterns);
        }
        binding
    }
}

impl FileConfig {
    fn into_tracking_config(self) -> TrackingConfig {
        let components = self
            .components
            .into_iter()
            .map(|c| {
                TrackedComponent::new(
                    c.name,
                    c.rules,
                    c.stages.into_iter().map(FileStage::into_binding).collect(),
                )
            })
            .collect();

        let defaults = RunOptions::default();
        let options = RunOptions {
            concurrency: self.options.concurrency.unwrap_or(defaults.concurrency),
            fetch_timeout: self
                .options
                .fetch_timeout_secs
                .map_or(defaults.fetch_timeout, Duration::from_secs),
            soft_deadline: self.options.soft_deadline_secs.map(Duration::from_secs),
            cache: self.options.cache.map(|c| CacheOptions {
                dir: c.dir,
                max_age: Duration::from_secs(c.max_age_secs),
            }),
        };

        TrackingConfig::new(components).with_options(options)
    }
}

/// Parses a configuration from YAML text.
pub fn parse(yaml: &str) -> Result<TrackingConfig> {
    let file: FileConfig = serde_yaml::from_str(yaml).context("invalid configuration file")?;
    Ok(file.into_tracking_config())
}

/// Loads and parses the configuration file at `path`.
pub fn load(path: &Path) -> Result<TrackingConfig> {
    let yaml = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read configuration file {}", path.display()))?;
    parse(&yaml)
}
