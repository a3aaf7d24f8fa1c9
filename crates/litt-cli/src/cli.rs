//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::output::OutputFormat;

/// Personal time ledger.
///
/// Track time against tasks with a stopwatch, pause it for interruptions,
/// log closed intervals after the fact, and query what was recorded.
/// Running `tt` without a command prints the open stopwatch, if any.
#[derive(Debug, Parser)]
#[command(name = "tt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format for commands that produce output.
    #[arg(long, global = true, value_enum)]
    pub output_format: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print or update persistent configuration.
    ///
    /// With `--output-format`, stores that format as the default; otherwise
    /// prints the effective configuration.
    Config,

    #[command(flatten)]
    Ledger(LedgerCommand),
}

/// Subcommands that load the ledger.
#[derive(Debug, Subcommand)]
pub enum LedgerCommand {
    /// List aliases, or create, overwrite or remove one.
    ///
    /// Giving a key with no fields removes the alias.
    Alias {
        /// Alias key to define.
        #[arg(short, long)]
        key: Option<String>,

        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Start the stopwatch.
    Start {
        #[command(flatten)]
        fields: QuickFieldArgs,

        /// When the interval began.
        #[arg(short, long, value_name = "TIMESPEC")]
        start_time: Option<String>,
    },

    /// Stop the stopwatch and commit the interval.
    Stop {
        #[command(flatten)]
        fields: QuickFieldArgs,

        #[command(flatten)]
        commit: CommitArgs,

        /// When the interval ended.
        #[arg(short, long, value_name = "TIMESPEC")]
        end_time: Option<String>,
    },

    /// Start the stopwatch when idle, stop it when running.
    Sw {
        #[command(flatten)]
        fields: QuickFieldArgs,

        #[command(flatten)]
        commit: CommitArgs,

        /// When the interval began (used when starting).
        #[arg(short, long, value_name = "TIMESPEC")]
        start_time: Option<String>,

        /// When the interval ended (used when stopping).
        #[arg(short, long, value_name = "TIMESPEC")]
        end_time: Option<String>,
    },

    /// Discard the innermost open interval without committing it.
    Cancel,

    /// Pause the running stopwatch with an interruption.
    #[command(visible_alias = "i")]
    Interrupt {
        #[command(flatten)]
        fields: QuickFieldArgs,
    },

    /// Commit the interruption and resume the stopwatch.
    #[command(visible_alias = "r")]
    Resume {
        #[command(flatten)]
        fields: QuickFieldArgs,

        #[command(flatten)]
        commit: CommitArgs,
    },

    /// Record a closed interval.
    ///
    /// At least one endpoint is required; the other defaults to now.
    Track {
        #[command(flatten)]
        fields: QuickFieldArgs,

        #[command(flatten)]
        commit: CommitArgs,

        #[command(flatten)]
        interval: IntervalArgs,

        /// Print the record that would be committed and exit with status 127.
        #[arg(long)]
        dryrun: bool,
    },

    /// Change fields or times of a committed record.
    Amend {
        /// Record to amend.
        #[arg(short, long, value_name = "ID")]
        id: String,

        #[command(flatten)]
        fields: FieldArgs,

        /// Tags to remove.
        #[arg(short, long = "untag", value_name = "TAG")]
        untags: Vec<String>,

        #[command(flatten)]
        interval: IntervalArgs,

        /// Print the amended record and exit with status 127 without saving.
        #[arg(long)]
        dryrun: bool,
    },

    /// List, filter and export committed records.
    Ls(LsArgs),
}

/// Fields shared by every command that writes record or alias fields.
#[derive(Debug, Clone, Default, Args)]
pub struct FieldArgs {
    /// Short description of the work.
    #[arg(short, long)]
    pub description: Option<String>,

    /// Longer free-form detail.
    #[arg(short = 'D', long)]
    pub detail: Option<String>,

    /// Tag to add; repeat for several.
    #[arg(short, long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Opaque data stored base64-encoded with the record.
    #[arg(short = 'S', long, value_name = "DATA")]
    pub structured_data: Option<String>,
}

/// Fields plus alias selection.
#[derive(Debug, Clone, Default, Args)]
pub struct QuickFieldArgs {
    /// Alias key, or the description when no such alias exists.
    pub quicktext: Option<String>,

    /// Alias to fill fields from; must exist.
    #[arg(short, long, value_name = "KEY")]
    pub alias: Option<String>,

    #[command(flatten)]
    pub fields: FieldArgs,
}

/// Options that apply when an interval is committed.
#[derive(Debug, Clone, Default, Args)]
pub struct CommitArgs {
    /// Identifier to commit under; generated when omitted.
    #[arg(short, long, value_name = "ID")]
    pub id: Option<String>,

    /// Tags to remove from the committed record.
    #[arg(short, long = "untag", value_name = "TAG")]
    pub untags: Vec<String>,
}

/// Both endpoints of an interval.
#[derive(Debug, Clone, Default, Args)]
pub struct IntervalArgs {
    /// When the interval began.
    #[arg(short, long, value_name = "TIMESPEC")]
    pub start_time: Option<String>,

    /// When the interval ended.
    #[arg(short, long, value_name = "TIMESPEC")]
    pub end_time: Option<String>,
}

/// Arguments of `tt ls`.
#[derive(Debug, Clone, Default, Args)]
pub struct LsArgs {
    /// A single record to show.
    pub record: Option<String>,

    /// Records to show; repeat for several. Filters are ignored.
    #[arg(short, long = "id", value_name = "ID")]
    pub ids: Vec<String>,

    /// JSON filter expression; repeat to narrow further.
    #[arg(short, long = "filter", value_name = "FILTER")]
    pub filters: Vec<String>,

    /// Field to sort by.
    #[arg(short, long, value_enum, default_value_t = SortKey::CommitTime)]
    pub sort_by: SortKey,

    /// Render a timesheet CSV.
    #[arg(short, long)]
    pub csv: bool,

    /// Include structured data.
    #[arg(short, long)]
    pub with_structured_data: bool,

    /// Leave out the detail field.
    #[arg(short = 'D', long)]
    pub without_detail: bool,

    /// Write to this file instead of stdout.
    #[arg(short, long, value_name = "PATH")]
    pub outfile: Option<PathBuf>,
}

/// Record fields `tt ls` can sort by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    #[default]
    #[value(name = "CommitTime")]
    CommitTime,
    #[value(name = "StartTime")]
    StartTime,
    #[value(name = "EndTime")]
    EndTime,
    #[value(name = "Description")]
    Description,
    #[value(name = "Detail")]
    Detail,
    #[value(name = "ID")]
    Id,
}
