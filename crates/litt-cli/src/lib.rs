//! Command-line front end for the time ledger.
//!
//! Parses arguments, loads configuration, runs one command against the
//! ledger and maps failures to stable exit codes.

mod cli;
pub mod commands;
mod config;
pub mod exit;
pub mod hooks;
pub mod output;

pub use cli::{
    Cli, CommitArgs, Commands, FieldArgs, IntervalArgs, LedgerCommand, LsArgs, QuickFieldArgs,
    SortKey,
};
pub use config::{Config, StoredSettings};
pub use output::OutputFormat;
