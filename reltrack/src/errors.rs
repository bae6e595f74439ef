//! Error types for release tracking.
//!
//! The taxonomy separates fatal configuration problems (which abort a
//! run before any fetch) from per-record and per-fetch problems, which
//! are isolated and surfaced as warnings on the affected component's
//! status report.

use crate::model::StageKind;
use thiserror::Error;

/// The main error type for reltrack operations.
#[derive(Debug, Error)]
pub enum TrackError {
    /// A malformed component or pipeline definition. Fatal: aborts the
    /// run before any fetch is issued.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// An adapter reported a state string outside the enumerated set
    /// for its stage kind.
    #[error("{0}")]
    UnknownState(#[from] UnknownStateError),

    /// An external system could not be queried.
    #[error("{0}")]
    Adapter(#[from] AdapterError),

    /// A record matched more than one group at equal rule priority.
    #[error("{0}")]
    CorrelationAmbiguity(#[from] CorrelationAmbiguityError),
}

/// Error raised when a component or pipeline definition is malformed.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ConfigurationError {
    /// The error message.
    pub message: String,
    /// The component the error applies to, if any.
    pub component: Option<String>,
}

impl ConfigurationError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            component: None,
        }
    }

    /// Attaches the component name the error applies to.
    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }
}

/// Error raised when an adapter reports a transitional state outside
/// the enumerated vocabulary for its stage kind.
///
/// This is surfaced rather than silently mapped to pending, since an
/// unrecognized state usually means the upstream system changed its
/// vocabulary and the pipeline model needs updating.
#[derive(Debug, Clone, Error)]
#[error("Unknown state '{raw_state}' for stage kind '{kind}'")]
pub struct UnknownStateError {
    /// The stage kind the state was reported for.
    pub kind: StageKind,
    /// The raw state string as reported by the adapter.
    pub raw_state: String,
}

impl UnknownStateError {
    /// Creates a new unknown-state error.
    #[must_use]
    pub fn new(kind: StageKind, raw_state: impl Into<String>) -> Self {
        Self {
            kind,
            raw_state: raw_state.into(),
        }
    }
}

/// Errors produced by source adapters.
///
/// Ordinary "not found" is not an error: adapters return an empty
/// record list for it. `Unavailable` covers transport, auth, and
/// timeout failures; the engine degrades the affected triple to
/// `unknown` instead of treating it as a pipeline failure.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// The external system could not be reached or refused the query.
    #[error("Adapter for {target} unavailable: {reason}")]
    Unavailable {
        /// The target system instance.
        target: String,
        /// The transport-level reason.
        reason: String,
    },

    /// The external system answered with a payload the adapter could
    /// not decode.
    #[error("Adapter for {target} returned an undecodable payload: {reason}")]
    Decode {
        /// The target system instance.
        target: String,
        /// What failed to decode.
        reason: String,
    },
}

impl AdapterError {
    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Returns the target system instance the error applies to.
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Self::Unavailable { target, .. } | Self::Decode { target, .. } => target,
        }
    }
}

/// Error raised when a record matches more than one existing group at
/// the same rule priority.
///
/// The record is kept as an orphan rather than guessed into a group.
#[derive(Debug, Clone, Error)]
#[error(
    "Record '{record_id}' matches {group_count} groups under rule '{rule}'; keeping it unresolved"
)]
pub struct CorrelationAmbiguityError {
    /// The natural identifier of the ambiguous record.
    pub record_id: String,
    /// The rule under which the ambiguity arose.
    pub rule: String,
    /// How many groups matched.
    pub group_count: usize,
}

impl CorrelationAmbiguityError {
    /// Creates a new correlation ambiguity error.
    #[must_use]
    pub fn new(record_id: impl Into<String>, rule: impl Into<String>, group_count: usize) -> Self {
        Self {
            record_id: record_id.into(),
            rule: rule.into(),
            group_count,
        }
    }
}
