//! In-memory run configuration.
//!
//! The core does not read configuration files; a surface layer (the
//! CLI crate) parses whatever format it likes and hands over these
//! structures. `TrackingConfig::validate` is the fatal gate: nothing
//! is fetched for a run whose configuration does not validate.

use crate::adapter::parse::glob_to_regex;
use crate::correlate::IdentityRule;
use crate::errors::ConfigurationError;
use crate::model::{PipelineModel, StageDefinition, StageKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Binds one pipeline stage of a component to a concrete target
/// system instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageBinding {
    /// Stage identifier, unique per `(stage, target)` pair.
    pub stage_id: String,
    /// The kind of system serving the stage.
    pub kind: StageKind,
    /// Target system instance name.
    pub target: String,
    /// Base URL of the target system (repository root, build-service
    /// project page, mirror directory).
    pub url: String,
    /// Branch filter for source-repo stages.
    #[serde(default)]
    pub branch: Option<String>,
    /// Artifact file-name glob patterns for mirror stages.
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl StageBinding {
    /// Creates a binding with no branch filter or patterns.
    #[must_use]
    pub fn new(
        stage_id: impl Into<String>,
        kind: StageKind,
        target: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            stage_id: stage_id.into(),
            kind,
            target: target.into(),
            url: url.into(),
            branch: None,
            patterns: Vec::new(),
        }
    }

    /// Sets the branch filter.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Sets the artifact glob patterns.
    #[must_use]
    pub fn with_patterns(mut self, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.patterns = patterns.into_iter().map(Into::into).collect();
        self
    }
}

/// A named unit of tracking: one package or project whose change flow
/// the run follows. Immutable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedComponent {
    /// Component name; doubles as the package name hint for adapters.
    pub name: String,
    /// Identity rules in priority order, highest first.
    pub rules: Vec<IdentityRule>,
    /// Stage bindings in pipeline order.
    pub stages: Vec<StageBinding>,
}

impl TrackedComponent {
    /// Creates a component with the given rules and stage bindings.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        rules: Vec<IdentityRule>,
        stages: Vec<StageBinding>,
    ) -> Self {
        Self {
            name: name.into(),
            rules,
            stages,
        }
    }

    /// Builds the component's pipeline model from its stage bindings.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` when the bindings do not form a
    /// valid pipeline.
    pub fn pipeline(&self) -> Result<PipelineModel, ConfigurationError> {
        let stages = self
            .stages
            .iter()
            .map(|b| StageDefinition::new(&b.stage_id, b.kind, &b.target))
            .collect();
        PipelineModel::new(stages).map_err(|e| e.with_component(&self.name))
    }

    /// Validates the component definition.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` for an empty name, an empty rule
    /// list, missing stages, a blank target URL, a mirror stage
    /// without patterns, or a pattern that does not translate to a
    /// valid matcher.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let fail = |message: String| {
            Err(ConfigurationError::new(message).with_component(&self.name))
        };

        if self.name.trim().is_empty() {
            return Err(ConfigurationError::new("component name cannot be empty"));
        }
        if self.rules.is_empty() {
            return fail(format!("component '{}' has no identity rules", self.name));
        }
        self.pipeline()?;
        for binding in &self.stages {
            if binding.url.trim().is_empty() {
                return fail(format!(
                    "stage '{}' of '{}' has no target URL",
                    binding.stage_id, self.name
                ));
            }
            if binding.kind == StageKind::Mirror && binding.patterns.is_empty() {
                return fail(format!(
                    "mirror stage '{}' of '{}' has no artifact patterns",
                    binding.stage_id, self.name
                ));
            }
            for pattern in &binding.patterns {
                if glob_to_regex(pattern).is_err() {
                    return fail(format!(
                        "invalid artifact pattern '{pattern}' on stage '{}'",
                        binding.stage_id
                    ));
                }
            }
        }
        Ok(())
    }
}

/// On-disk fetch cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheOptions {
    /// Directory holding cached payloads.
    pub dir: PathBuf,
    /// How long a cached payload stays valid.
    pub max_age: Duration,
}

/// Knobs for one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Maximum concurrent fetches across all (component, stage,
    /// target) triples.
    pub concurrency: usize,
    /// Per-fetch timeout; expiry degrades the triple to unknown.
    pub fetch_timeout: Duration,
    /// Soft deadline for the whole run. Triples still outstanding when
    /// it expires are reported as unknown instead of failing the run.
    pub soft_deadline: Option<Duration>,
    /// Optional fetch cache.
    pub cache: Option<CacheOptions>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            fetch_timeout: Duration::from_secs(30),
            soft_deadline: None,
            cache: None,
        }
    }
}

/// Everything a run needs: the tracked components and the run knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// The components to track.
    pub components: Vec<TrackedComponent>,
    /// Run options.
    #[serde(default)]
    pub options: RunOptions,
}

impl TrackingConfig {
    /// Creates a config with default run options.
    #[must_use]
    pub fn new(components: Vec<TrackedComponent>) -> Self {
        Self {
            components,
            options: RunOptions::default(),
        }
    }

    /// Sets the run options.
    #[must_use]
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Validates the whole configuration. Any error here is fatal and
    /// must abort the run before the first fetch.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigurationError` found.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.components.is_empty() {
            return Err(ConfigurationError::new("no components configured"));
        }
        if self.options.concurrency == 0 {
            return Err(ConfigurationError::new("concurrency must be at least 1"));
        }
        let mut names = std::collections::HashSet::new();
        for component in &self.components {
            component.validate()?;
            if !names.insert(component.name.as_str()) {
                return Err(ConfigurationError::new(format!(
                    "duplicate component '{}'",
                    component.name
                )));
            }
        }
        Ok(())
    }
}
