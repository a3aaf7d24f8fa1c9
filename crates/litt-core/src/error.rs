//! Errors raised by ledger operations.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::stopwatch::{Action, Phase};
use crate::timespec::ResolutionError;
use crate::types::{AliasKey, RecordId, ValidationError};

/// Every failure a ledger operation can report.
///
/// None of these leave the ledger partially modified: operations validate
/// before they apply.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The stopwatch action is not valid in the current state.
    #[error("cannot {action} while {phase}: {reason}")]
    InvalidTransition {
        action: Action,
        phase: Phase,
        reason: &'static str,
    },

    #[error("record ID already exists: {0}")]
    DuplicateIdentifier(RecordId),

    #[error("record ID does not exist: {0}")]
    UnknownIdentifier(RecordId),

    #[error("alias does not exist: {0}")]
    UnknownAlias(AliasKey),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The end of an interval does not come strictly after its start.
    #[error("end time {end} must be strictly after start time {start}")]
    InvalidInterval {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// A finite interval was requested with neither endpoint.
    #[error("at least one of start and end must be specified")]
    MissingInterval,

    /// A filter pattern failed to compile.
    #[error("invalid filter pattern {pattern:?}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl CoreError {
    pub(crate) const fn transition(action: Action, phase: Phase, reason: &'static str) -> Self {
        Self::InvalidTransition {
            action,
            phase,
            reason,
        }
    }
}
