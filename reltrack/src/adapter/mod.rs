//! Source adapters: the uniform fetch contract over external systems.
//!
//! Each adapter is scoped to one stage kind and one target system
//! instance. "Not found" is an ordinary empty answer; only transport,
//! auth, and timeout failures are errors, and the engine degrades
//! those to `unknown` instead of treating them as pipeline failures.

pub mod parse;

#[cfg(feature = "http")]
mod client;
#[cfg(feature = "http")]
mod gitea;
#[cfg(feature = "http")]
mod mirror;
#[cfg(feature = "http")]
mod obs;

#[cfg(feature = "http")]
pub use client::HttpClient;
#[cfg(feature = "http")]
pub use gitea::GiteaAdapter;
#[cfg(feature = "http")]
pub use mirror::MirrorAdapter;
#[cfg(feature = "http")]
pub use obs::ObsAdapter;
#[cfg(feature = "http")]
pub use client::HttpAdapterFactory;

use crate::config::{StageBinding, TrackedComponent};
use crate::errors::{AdapterError, ConfigurationError};
use crate::record::StageRecord;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// What an adapter needs to know about the component it fetches for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentHint {
    /// The tracked component's name.
    pub component: String,
    /// The package name to query external systems for. Usually equal
    /// to the component name.
    pub package: String,
}

impl ComponentHint {
    /// Builds the hint for a component.
    #[must_use]
    pub fn for_component(component: &TrackedComponent) -> Self {
        Self {
            component: component.name.clone(),
            package: component.name.clone(),
        }
    }
}

/// The uniform fetch contract.
///
/// Implementations must not mutate anything upstream: a fetch is a
/// read-only observation.
#[async_trait]
pub trait SourceAdapter: Send + Sync + Debug {
    /// The pipeline stage the adapter serves.
    fn stage_id(&self) -> &str;

    /// The target system instance the adapter queries.
    fn target(&self) -> &str;

    /// Lists the records currently known for the hinted component.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError::Unavailable` for transport-level
    /// failures; a legitimately absent component is `Ok(vec![])`.
    async fn fetch(&self, hint: &ComponentHint) -> Result<Vec<StageRecord>, AdapterError>;
}

/// Builds the adapter for one stage binding.
///
/// The run coordinator resolves every `(component, stage, target)`
/// triple through a factory before the first fetch, so a binding the
/// factory cannot serve aborts the run as a configuration error.
pub trait AdapterFactory: Send + Sync {
    /// Resolves the adapter serving one stage binding of a component.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` when the binding cannot be
    /// served (unsupported kind, unusable URL).
    fn adapter_for(
        &self,
        component: &TrackedComponent,
        binding: &StageBinding,
    ) -> Result<Arc<dyn SourceAdapter>, ConfigurationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlate::IdentityRule;

    #[test]
    fn test_component_hint_uses_name_as_package() {
        let component = TrackedComponent::new("agama", vec![IdentityRule::PackageName], vec![]);
        let hint = ComponentHint::for_component(&component);
        assert_eq!(hint.component, "agama");
        assert_eq!(hint.package, "agama");
    }
}
