//! Process exit codes.
//!
//! Scripts wrapped around `tt` branch on these, so they are stable:
//!
//! | code | meaning                                   |
//! |------|-------------------------------------------|
//! | 1    | start while running, or any other failure |
//! | 2    | stop while not running                    |
//! | 3    | interrupt while interrupted               |
//! | 4    | resume without a stopwatch                |
//! | 5    | resume without an interruption            |
//! | 6    | track with neither endpoint               |
//! | 7    | end not after start                       |
//! | 8    | unparsable timespec                       |
//! | 9    | unknown record ID                         |
//! | 10   | hook failed                               |
//! | 13   | duplicate record ID                       |
//! | 14   | unknown alias                             |
//! | 15   | invalid filter                            |
//! | 16   | ledger modified concurrently              |
//! | 127  | dry run                                   |

use std::error::Error as StdError;

use litt_core::{Action, CoreError, Phase, ResolutionError};
use litt_store::StoreError;
use thiserror::Error;

use crate::hooks::HookError;

/// Returned by `--dryrun` after printing what would have been written.
#[derive(Debug, Error)]
#[error("dry run, nothing was written")]
pub struct DryRun;

/// A `-f` argument that is not a filter expression.
#[derive(Debug, Error)]
#[error("invalid filter {text}")]
pub struct InvalidFilter {
    pub text: String,
    #[source]
    pub source: serde_json::Error,
}

pub const FAILURE: u8 = 1;
pub const DRY_RUN: u8 = 127;

/// Exit code for the first cause in the chain that has one.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain().find_map(code_for).unwrap_or(FAILURE)
}

fn code_for(cause: &(dyn StdError + 'static)) -> Option<u8> {
    if cause.is::<DryRun>() {
        return Some(DRY_RUN);
    }
    if cause.is::<HookError>() {
        return Some(10);
    }
    if cause.is::<InvalidFilter>() {
        return Some(15);
    }
    if cause.is::<ResolutionError>() {
        return Some(8);
    }
    if let Some(StoreError::PersistConflict { .. }) = cause.downcast_ref::<StoreError>() {
        return Some(16);
    }
    cause.downcast_ref::<CoreError>().map(core_code)
}

const fn core_code(err: &CoreError) -> u8 {
    match err {
        CoreError::InvalidTransition { action, phase, .. } => match (action, phase) {
            (Action::Stop, _) => 2,
            (Action::Interrupt, _) => 3,
            (Action::Resume, Phase::Idle) => 4,
            (Action::Resume, _) => 5,
            _ => FAILURE,
        },
        CoreError::MissingInterval => 6,
        CoreError::InvalidInterval { .. } => 7,
        CoreError::Resolution(_) => 8,
        CoreError::UnknownIdentifier(_) => 9,
        CoreError::DuplicateIdentifier(_) => 13,
        CoreError::UnknownAlias(_) => 14,
        CoreError::InvalidPattern { .. } => 15,
        CoreError::Validation(_) => FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use anyhow::Context;
    use chrono::DateTime;
    use litt_core::{AliasKey, RecordId};

    fn code(err: impl Into<anyhow::Error>) -> u8 {
        exit_code(&err.into())
    }

    fn transition(action: Action, phase: Phase) -> CoreError {
        CoreError::InvalidTransition {
            action,
            phase,
            reason: "test",
        }
    }

    #[test]
    fn stopwatch_errors_keep_their_codes() {
        assert_eq!(code(transition(Action::Start, Phase::Running)), 1);
        assert_eq!(code(transition(Action::Stop, Phase::Idle)), 2);
        assert_eq!(code(transition(Action::Interrupt, Phase::Interrupted)), 3);
        assert_eq!(code(transition(Action::Resume, Phase::Idle)), 4);
        assert_eq!(code(transition(Action::Resume, Phase::Running)), 5);
    }

    #[test]
    fn ledger_errors_keep_their_codes() {
        let t = DateTime::from_timestamp(0, 0).unwrap();
        assert_eq!(code(CoreError::MissingInterval), 6);
        assert_eq!(code(CoreError::InvalidInterval { start: t, end: t }), 7);
        assert_eq!(code(CoreError::from(ResolutionError::new("soon"))), 8);
        assert_eq!(code(ResolutionError::new("soon")), 8);
        let id = RecordId::new("x").unwrap();
        assert_eq!(code(CoreError::UnknownIdentifier(id.clone())), 9);
        assert_eq!(code(CoreError::DuplicateIdentifier(id)), 13);
        let key = AliasKey::new("x").unwrap();
        assert_eq!(code(CoreError::UnknownAlias(key)), 14);
    }

    #[test]
    fn code_is_found_behind_context() {
        let err = Err::<(), _>(CoreError::MissingInterval)
            .context("failed to track")
            .unwrap_err();
        assert_eq!(exit_code(&err), 6);
    }

    #[test]
    fn other_failures_are_one() {
        assert_eq!(code(anyhow::anyhow!("boom")), FAILURE);
        assert_eq!(code(DryRun), DRY_RUN);
        assert_eq!(
            code(StoreError::PersistConflict {
                expected: 1,
                found: 2
            }),
            16
        );
    }
}
