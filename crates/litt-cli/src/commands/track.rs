//! Closed-interval commands: `track` and `amend`.

use std::io::Write;

use anyhow::Result;
use chrono::Local;
use litt_core::{
    Amendment, FieldOptions, Ledger, RecordId, TimeRecord, closed_interval, explicit_patch,
};

use super::{Context, field_options, quick_field_options, record_id};
use crate::cli::{CommitArgs, FieldArgs, IntervalArgs, QuickFieldArgs};
use crate::exit::DryRun;
use crate::output::{OutputFormat, human_record, record_value, write_committed, write_json};

/// Commits a record for a past interval. A missing endpoint defaults to now.
pub fn track<W: Write>(
    writer: &mut W,
    ctx: &Context,
    ledger: &mut Ledger,
    fields: &QuickFieldArgs,
    commit: &CommitArgs,
    interval: &IntervalArgs,
    dryrun: bool,
) -> Result<()> {
    let (start, end) = closed_interval(
        ctx.resolve_optional(interval.start_time.as_deref())?,
        ctx.resolve_optional(interval.end_time.as_deref())?,
        ctx.now,
    )?;
    let options = quick_field_options(fields, &commit.untags)?;
    let requested = record_id(commit.id.as_deref())?;
    let id = ledger.track(&options, start, end, requested, ctx.now)?;

    if dryrun {
        return preview(writer, ctx, ledger, &id);
    }
    write_committed(writer, &id, ctx.format)
}

/// Changes fields or endpoints of a committed record.
///
/// Only what is given changes; aliases are not consulted.
#[expect(clippy::too_many_arguments, reason = "mirrors the command line")]
pub fn amend<W: Write>(
    writer: &mut W,
    ctx: &Context,
    ledger: &mut Ledger,
    id: &str,
    fields: &FieldArgs,
    untags: &[String],
    interval: &IntervalArgs,
    dryrun: bool,
) -> Result<()> {
    let id = RecordId::new(id)?;
    let amendment = Amendment {
        patch: explicit_patch(&FieldOptions {
            untags: untags.to_vec(),
            ..field_options(fields)
        }),
        start_time: ctx.resolve_optional(interval.start_time.as_deref())?,
        end_time: ctx.resolve_optional(interval.end_time.as_deref())?,
    };
    ledger.amend(&id, &amendment)?;

    if dryrun {
        return preview(writer, ctx, ledger, &id);
    }
    write_committed(writer, &id, ctx.format)
}

/// Prints the record as it would be written and aborts the invocation.
fn preview<W: Write>(writer: &mut W, ctx: &Context, ledger: &Ledger, id: &RecordId) -> Result<()> {
    if let Some(record) = ledger.record(id) {
        write_record(writer, ctx, id, record)?;
    }
    Err(DryRun.into())
}

fn write_record<W: Write>(
    writer: &mut W,
    ctx: &Context,
    id: &RecordId,
    record: &TimeRecord,
) -> Result<()> {
    if ctx.format == OutputFormat::Human {
        writeln!(writer, "Record \"{id}\"")?;
        writeln!(writer, "{}", human_record(record, &Local))?;
        return Ok(());
    }
    write_json(writer, &record_value(record, true, true)?, ctx.format)
}
