//! # Reltrack
//!
//! Release-pipeline propagation tracking: follows a logical software
//! change from its source-control merge, through build-service submit
//! requests, to its publication on distribution mirrors.
//!
//! The crate is organised around a small set of concerns:
//!
//! - **Pipeline model**: an ordered list of stages per tracked
//!   component, each backed by one kind of external system
//! - **Source adapters**: a uniform read-only fetch contract over
//!   source-control hosts, build services, and mirrors
//! - **Correlation**: grouping the fetched records that belong to the
//!   same logical change, by prioritised identity rules
//! - **Reconciliation**: reducing one component's correlated records
//!   to a single pipeline position and component state
//! - **Status report**: the per-component answer, with per-stage
//!   evidence and run warnings
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use reltrack::prelude::*;
//! use std::sync::Arc;
//!
//! let config = TrackingConfig::new(components);
//! let factory = Arc::new(HttpAdapterFactory::new(&config.options)?);
//! let summary = RunCoordinator::new(config, factory).run().await?;
//! for report in &summary.reports {
//!     println!("{}: {}", report.component, report.state);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod adapter;
pub mod cache;
pub mod config;
pub mod correlate;
pub mod engine;
pub mod errors;
pub mod model;
pub mod record;
pub mod report;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapter::{AdapterFactory, ComponentHint, SourceAdapter};
    #[cfg(feature = "http")]
    pub use crate::adapter::{HttpAdapterFactory, HttpClient};
    pub use crate::cache::FetchCache;
    pub use crate::config::{
        CacheOptions, RunOptions, StageBinding, TrackedComponent, TrackingConfig,
    };
    pub use crate::correlate::{correlate, ChangeGroup, Correlation, IdentityRule};
    pub use crate::engine::{reconcile, reconcile_with_previous, RunCoordinator, TripleOutcome};
    pub use crate::errors::{AdapterError, ConfigurationError, TrackError, UnknownStateError};
    pub use crate::model::{
        PipelineModel, StageDefinition, StageKind, StateClass,
    };
    pub use crate::record::StageRecord;
    pub use crate::report::{
        ComponentState, RunSummary, RunWarning, StageEvidence, StageObservation, StatusReport,
        WarningCode,
    };
}
