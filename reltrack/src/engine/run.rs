//! Run orchestration: bounded concurrent fetches feeding the pure
//! reconciliation phase.
//!
//! Fetches across (component, stage, target) triples are mutually
//! independent, so the coordinator issues them through a semaphore-
//! bounded join set: one logical unit of concurrency per triple. The
//! run is a single batch with a clear start and end; no background
//! process survives it.

use crate::adapter::{AdapterFactory, ComponentHint, SourceAdapter};
use crate::config::{TrackingConfig, TrackedComponent};
use crate::correlate::correlate;
use crate::engine::{reconcile, TripleOutcome};
use crate::errors::{AdapterError, TrackError};
use crate::record::StageRecord;
use crate::report::{RunSummary, RunWarning, WarningCode};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

type FetchResult = (usize, String, String, Result<Vec<StageRecord>, AdapterError>);

/// Drives one reconciliation run end to end.
pub struct RunCoordinator {
    config: TrackingConfig,
    factory: Arc<dyn AdapterFactory>,
}

impl RunCoordinator {
    /// Creates a coordinator for one configuration and adapter
    /// factory.
    #[must_use]
    pub fn new(config: TrackingConfig, factory: Arc<dyn AdapterFactory>) -> Self {
        Self { config, factory }
    }

    /// Executes the run: validate, fetch, correlate, reconcile.
    ///
    /// Per-triple failures degrade to unknown; only configuration
    /// errors abort. When the soft deadline expires, reports are still
    /// emitted for every component, with outstanding triples marked
    /// unknown.
    ///
    /// # Errors
    ///
    /// Returns `TrackError::Configuration` when the configuration does
    /// not validate or an adapter cannot be resolved.
    pub async fn run(&self) -> Result<RunSummary, TrackError> {
        self.config.validate()?;

        // Resolve every adapter before the first fetch so that an
        // unservable binding aborts instead of half-running.
        let mut triples: Vec<(usize, Arc<dyn SourceAdapter>)> = Vec::new();
        for (idx, component) in self.config.components.iter().enumerate() {
            for binding in &component.stages {
                let adapter = self.factory.adapter_for(component, binding)?;
                triples.push((idx, adapter));
            }
        }

        let started_at = Utc::now();
        let options = &self.config.options;
        let semaphore = Arc::new(Semaphore::new(options.concurrency));
        let fetch_timeout = options.fetch_timeout;

        let mut pending: HashSet<(usize, String, String)> = HashSet::new();
        let mut join_set: JoinSet<FetchResult> = JoinSet::new();
        for (idx, adapter) in triples {
            let component = &self.config.components[idx];
            let hint = ComponentHint::for_component(component);
            let stage_id = adapter.stage_id().to_string();
            let target = adapter.target().to_string();
            pending.insert((idx, stage_id.clone(), target.clone()));

            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        match tokio::time::timeout(fetch_timeout, adapter.fetch(&hint)).await {
                            Ok(result) => result,
                            Err(_) => Err(AdapterError::unavailable(
                                adapter.target(),
                                format!("fetch timed out after {fetch_timeout:?}"),
                            )),
                        }
                    }
                    Err(closed) => {
                        Err(AdapterError::unavailable(adapter.target(), closed.to_string()))
                    }
                };
                (idx, stage_id, target, result)
            });
        }

        let deadline = options.soft_deadline.map(|d| Instant::now() + d);
        let mut deadline_hit = false;
        let mut fetched: Vec<FetchResult> = Vec::new();

        while !join_set.is_empty() {
            let next = match deadline {
                Some(at) => match tokio::time::timeout_at(at, join_set.join_next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        deadline_hit = true;
                        tracing::warn!("run soft deadline exceeded; marking outstanding fetches unknown");
                        join_set.abort_all();
                        break;
                    }
                },
                None => join_set.join_next().await,
            };
            match next {
                Some(Ok(result)) => {
                    pending.remove(&(result.0, result.1.clone(), result.2.clone()));
                    fetched.push(result);
                }
                Some(Err(join_err)) => {
                    // The triple stays pending and degrades to unknown.
                    tracing::error!(error = %join_err, "fetch task failed");
                }
                None => break,
            }
        }

        let mut reports = Vec::with_capacity(self.config.components.len());
        for (idx, component) in self.config.components.iter().enumerate() {
            let report = self.reconcile_component(idx, component, &fetched, &pending, deadline_hit)?;
            reports.push(report);
        }

        let degraded = reports
            .iter()
            .any(crate::report::StatusReport::is_partially_unknown);
        Ok(RunSummary {
            reports,
            degraded,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn reconcile_component(
        &self,
        idx: usize,
        component: &TrackedComponent,
        fetched: &[FetchResult],
        still_pending: &HashSet<(usize, String, String)>,
        deadline_hit: bool,
    ) -> Result<crate::report::StatusReport, TrackError> {
        let mut records: Vec<StageRecord> = Vec::new();
        let mut outcomes: Vec<TripleOutcome> = Vec::new();
        let mut affected_by_deadline = false;

        for (result_idx, stage_id, target, result) in fetched {
            if *result_idx != idx {
                continue;
            }
            match result {
                Ok(fetched_records) => {
                    records.extend(fetched_records.iter().cloned());
                    outcomes.push(TripleOutcome::complete(stage_id, target));
                }
                Err(err) => {
                    tracing::warn!(
                        component = component.name,
                        stage = stage_id,
                        target = target,
                        error = %err,
                        "fetch degraded to unknown"
                    );
                    outcomes.push(TripleOutcome::unavailable(stage_id, target, err.to_string()));
                }
            }
        }
        for (pending_idx, stage_id, target) in still_pending {
            if *pending_idx == idx {
                affected_by_deadline = deadline_hit;
                outcomes.push(TripleOutcome::unavailable(
                    stage_id,
                    target,
                    "fetch did not complete before the run ended",
                ));
            }
        }
        // Outcome order must not depend on task completion order.
        outcomes.sort_by(|a, b| (&a.stage_id, &a.target).cmp(&(&b.stage_id, &b.target)));

        let pipeline = component.pipeline()?;
        let correlation = correlate(component, records);
        let mut report = reconcile(
            &component.name,
            &pipeline,
            &correlation,
            &outcomes,
            Utc::now(),
        );
        if affected_by_deadline {
            report.warnings.push(RunWarning::new(
                WarningCode::DeadlineExceeded,
                "run soft deadline expired with fetches outstanding",
            ));
        }
        Ok(report)
    }
}
