//! Core domain logic for the time ledger.
//!
//! This crate contains the fundamental types and logic for:
//! - Stopwatch: one primary interval plus at most one interruption
//! - Field resolution: alias expansion, per-field overrides and tag union
//! - Querying: filter expressions over committed records
//!
//! Nothing here touches the filesystem; loading and persisting live in
//! `litt-store`.

pub mod changes;
pub mod error;
pub mod filter;
pub mod hooks;
pub mod ledger;
pub mod resolve;
pub mod stopwatch;
pub mod timespec;
pub mod types;

pub use changes::{Change, ChangeSet};
pub use error::CoreError;
pub use filter::{Comparison, FilterExpr, Query, TimeCondition};
pub use hooks::{HookDispatcher, HookEvent, NoHooks, UnknownHookEvent};
pub use ledger::{Amendment, Ledger, RecordDraft, closed_interval};
pub use resolve::{FieldOptions, Patch, Resolution, explicit_patch, resolve};
pub use stopwatch::{
    Action, Cancelled, Closing, Effect, OpenInterval, Phase, Stopwatch, Toggle, transition,
};
pub use timespec::{Dialect, NaturalTimespecs, ResolutionError, TimespecResolver};
pub use types::{
    AliasKey, Fields, InterruptionRef, RecordId, StructuredData, TagSet, TimeRecord,
    ValidationError,
};
