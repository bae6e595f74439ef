//! Test support: scripted adapters and an adapter factory over them.
//!
//! These are compiled into the library so downstream crates can build
//! synthetic runs without touching any external system.

use crate::adapter::{AdapterFactory, ComponentHint, SourceAdapter};
use crate::config::{StageBinding, TrackedComponent};
use crate::errors::{AdapterError, ConfigurationError};
use crate::record::StageRecord;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// An adapter that replays a scripted answer and counts calls.
#[derive(Debug)]
pub struct ScriptedAdapter {
    stage_id: String,
    target: String,
    answer: Mutex<Result<Vec<StageRecord>, AdapterError>>,
    call_count: Mutex<usize>,
    delay: Mutex<Option<std::time::Duration>>,
}

impl ScriptedAdapter {
    /// Creates an adapter answering with the given records.
    #[must_use]
    pub fn answering(
        stage_id: impl Into<String>,
        target: impl Into<String>,
        records: Vec<StageRecord>,
    ) -> Self {
        Self {
            stage_id: stage_id.into(),
            target: target.into(),
            answer: Mutex::new(Ok(records)),
            call_count: Mutex::new(0),
            delay: Mutex::new(None),
        }
    }

    /// Creates an adapter that fails as unavailable.
    #[must_use]
    pub fn unavailable(
        stage_id: impl Into<String>,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let target = target.into();
        Self {
            answer: Mutex::new(Err(AdapterError::unavailable(&target, reason))),
            stage_id: stage_id.into(),
            target,
            call_count: Mutex::new(0),
            delay: Mutex::new(None),
        }
    }

    /// Makes every fetch sleep first, to exercise timeout handling.
    #[must_use]
    pub fn with_delay(self, delay: std::time::Duration) -> Self {
        *self.delay.lock() = Some(delay);
        self
    }

    /// Replaces the scripted answer.
    pub fn set_answer(&self, answer: Result<Vec<StageRecord>, AdapterError>) {
        *self.answer.lock() = answer;
    }

    /// Returns how many times `fetch` was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.call_count.lock()
    }
}

#[async_trait]
impl SourceAdapter for ScriptedAdapter {
    fn stage_id(&self) -> &str {
        &self.stage_id
    }

    fn target(&self) -> &str {
        &self.target
    }

    async fn fetch(&self, _hint: &ComponentHint) -> Result<Vec<StageRecord>, AdapterError> {
        *self.call_count.lock() += 1;
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.answer.lock().clone()
    }
}

/// A factory resolving `(stage, target)` pairs to scripted adapters.
#[derive(Debug, Default)]
pub struct ScriptedFactory {
    adapters: HashMap<(String, String), Arc<ScriptedAdapter>>,
}

impl ScriptedFactory {
    /// Creates an empty factory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter for its `(stage, target)` pair.
    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<ScriptedAdapter>) -> Self {
        self.adapters.insert(
            (adapter.stage_id().to_string(), adapter.target().to_string()),
            adapter,
        );
        self
    }
}

impl AdapterFactory for ScriptedFactory {
    fn adapter_for(
        &self,
        component: &TrackedComponent,
        binding: &StageBinding,
    ) -> Result<Arc<dyn SourceAdapter>, ConfigurationError> {
        self.adapters
            .get(&(binding.stage_id.clone(), binding.target.clone()))
            .map(|adapter| Arc::clone(adapter) as Arc<dyn SourceAdapter>)
            .ok_or_else(|| {
                ConfigurationError::new(format!(
                    "no adapter scripted for stage '{}' on '{}'",
                    binding.stage_id, binding.target
                ))
                .with_component(&component.name)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StageKind;

    #[tokio::test]
    async fn test_scripted_adapter_replays_and_counts() {
        let record = StageRecord::new("merged", StageKind::SourceRepo, "host", "1", "merged");
        let adapter = ScriptedAdapter::answering("merged", "host", vec![record.clone()]);
        let hint = ComponentHint {
            component: "agama".to_string(),
            package: "agama".to_string(),
        };

        let answer = adapter.fetch(&hint).await.unwrap();
        assert_eq!(answer, vec![record]);
        assert_eq!(adapter.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_adapter() {
        let adapter = ScriptedAdapter::unavailable("merged", "host", "connection refused");
        let hint = ComponentHint {
            component: "agama".to_string(),
            package: "agama".to_string(),
        };
        let err = adapter.fetch(&hint).await.unwrap_err();
        assert!(matches!(err, AdapterError::Unavailable { .. }));
    }
}
