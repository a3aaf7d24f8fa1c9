//! Stopwatch commands: `start`, `stop`, `sw`, `cancel`, `interrupt`, `resume`.

use std::io::Write;

use anyhow::Result;
use litt_core::{Cancelled, Closing, Ledger, Phase, Toggle};

use super::{Context, quick_field_options, record_id};
use crate::cli::{CommitArgs, QuickFieldArgs};
use crate::output::{OutputFormat, write_committed, write_json};

fn closing(
    ctx: &Context,
    fields: &QuickFieldArgs,
    commit: &CommitArgs,
    end_time: Option<&str>,
) -> Result<Closing> {
    Ok(Closing {
        options: quick_field_options(fields, &commit.untags)?,
        id: record_id(commit.id.as_deref())?,
        end_time: ctx.resolve_optional(end_time)?,
    })
}

pub fn start(
    ctx: &Context,
    ledger: &mut Ledger,
    fields: &QuickFieldArgs,
    start_time: Option<&str>,
) -> Result<()> {
    let options = quick_field_options(fields, &[])?;
    let start_time = ctx.resolve_optional(start_time)?.unwrap_or(ctx.now);
    ledger.start(&options, start_time)?;
    tracing::info!(%start_time, "started stopwatch");
    Ok(())
}

pub fn stop<W: Write>(
    writer: &mut W,
    ctx: &Context,
    ledger: &mut Ledger,
    fields: &QuickFieldArgs,
    commit: &CommitArgs,
    end_time: Option<&str>,
) -> Result<()> {
    let closing = closing(ctx, fields, commit, end_time)?;
    let id = ledger.stop(&closing, ctx.now)?;
    write_committed(writer, &id, ctx.format)
}

pub fn toggle<W: Write>(
    writer: &mut W,
    ctx: &Context,
    ledger: &mut Ledger,
    fields: &QuickFieldArgs,
    commit: &CommitArgs,
    start_time: Option<&str>,
    end_time: Option<&str>,
) -> Result<()> {
    let options = quick_field_options(fields, &[])?;
    let start_time = ctx.resolve_optional(start_time)?;
    let closing = closing(ctx, fields, commit, end_time)?;
    match ledger.toggle(&options, start_time, &closing, ctx.now)? {
        Toggle::Started => {
            tracing::info!("started stopwatch");
            Ok(())
        }
        Toggle::Stopped(id) => write_committed(writer, &id, ctx.format),
    }
}

pub fn cancel<W: Write>(writer: &mut W, ctx: &Context, ledger: &mut Ledger) -> Result<()> {
    let cancelled = ledger.cancel()?;
    if ctx.format != OutputFormat::Human {
        let discarded = match &cancelled {
            Cancelled::Nothing => None,
            Cancelled::Primary(interval) | Cancelled::Interruption(interval) => Some(interval),
        };
        return write_json(writer, &discarded, ctx.format);
    }
    let message = match cancelled {
        Cancelled::Nothing => "Nothing to cancel.",
        Cancelled::Primary(_) => "Cancelled stopwatch.",
        Cancelled::Interruption(_) => "Cancelled interruption.",
    };
    writeln!(writer, "{message}")?;
    Ok(())
}

pub fn interrupt(ctx: &Context, ledger: &mut Ledger, fields: &QuickFieldArgs) -> Result<()> {
    let options = quick_field_options(fields, &[])?;
    match ledger.interrupt(&options, ctx.now)? {
        Phase::Running => tracing::info!("no stopwatch was running, started one instead"),
        phase => tracing::info!(%phase, "opened interruption"),
    }
    Ok(())
}

pub fn resume<W: Write>(
    writer: &mut W,
    ctx: &Context,
    ledger: &mut Ledger,
    fields: &QuickFieldArgs,
    commit: &CommitArgs,
) -> Result<()> {
    let closing = closing(ctx, fields, commit, None)?;
    let id = ledger.resume(&closing, ctx.now)?;
    write_committed(writer, &id, ctx.format)
}

#[cfg(test)]
mod tests {
    use super::*;

    use litt_core::{AliasKey, CoreError, Fields, RecordId, Stopwatch};

    use crate::commands::testing::{context, quick, t};
    use crate::exit::exit_code;

    fn commit_as(id: &str) -> CommitArgs {
        CommitArgs {
            id: Some(id.to_string()),
            ..CommitArgs::default()
        }
    }

    fn no_fields() -> QuickFieldArgs {
        QuickFieldArgs::default()
    }

    #[test]
    fn start_stop_prints_committed_id() {
        let mut ledger = Ledger::new();
        let ctx = context(OutputFormat::Human, t(0));
        start(&ctx, &mut ledger, &quick("email"), None).unwrap();

        let mut out = Vec::new();
        let ctx = context(OutputFormat::Human, t(1));
        let commit = commit_as("r1");
        stop(&mut out, &ctx, &mut ledger, &no_fields(), &commit, None).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "Committed Record ID: r1\n");
        let record = ledger.record(&RecordId::new("r1").unwrap()).unwrap();
        assert_eq!(record.start_time, t(0));
        assert_eq!(record.end_time, t(1));
        assert_eq!(record.fields.description.as_deref(), Some("email"));
    }

    #[test]
    fn start_time_is_resolved_against_now() {
        let mut ledger = Ledger::new();
        let ctx = context(OutputFormat::Json, t(5));
        start(&ctx, &mut ledger, &quick("x"), Some("2 hours ago")).unwrap();
        let Stopwatch::Running(primary) = ledger.stopwatch() else {
            panic!("expected running stopwatch");
        };
        assert_eq!(primary.start_time, t(3));
    }

    #[test]
    fn stop_with_alias_merges_untags() {
        let mut ledger = Ledger::new();
        ledger.put_alias(
            AliasKey::new("meet").unwrap(),
            Fields {
                description: Some("Meeting".to_string()),
                tags: ["Work", "Meetings"].into_iter().collect(),
                ..Fields::default()
            },
        );
        let ctx = context(OutputFormat::Json, t(0));
        start(&ctx, &mut ledger, &quick("meet"), None).unwrap();

        let commit = CommitArgs {
            id: Some("m".to_string()),
            untags: vec!["Meetings".to_string()],
        };
        let mut out = Vec::new();
        let ctx = context(OutputFormat::Json, t(1));
        stop(&mut out, &ctx, &mut ledger, &no_fields(), &commit, None).unwrap();

        let record = ledger.record(&RecordId::new("m").unwrap()).unwrap();
        assert_eq!(record.fields.description.as_deref(), Some("Meeting"));
        assert_eq!(record.fields.tags.to_string(), "Work");
        assert_eq!(String::from_utf8(out).unwrap(), "\"m\"\n");
    }

    #[test]
    fn second_start_fails_with_code_one() {
        let mut ledger = Ledger::new();
        let ctx = context(OutputFormat::Json, t(0));
        start(&ctx, &mut ledger, &quick("a"), None).unwrap();
        let err = start(&ctx, &mut ledger, &quick("b"), None).unwrap_err();
        assert_eq!(exit_code(&err), 1);
        assert!(err.downcast_ref::<CoreError>().is_some());
    }

    #[test]
    fn stop_when_idle_fails_with_code_two() {
        let mut ledger = Ledger::new();
        let mut out = Vec::new();
        let err = stop(
            &mut out,
            &context(OutputFormat::Json, t(0)),
            &mut ledger,
            &QuickFieldArgs::default(),
            &CommitArgs::default(),
            None,
        )
        .unwrap_err();
        assert_eq!(exit_code(&err), 2);
        assert!(out.is_empty());
    }

    #[test]
    fn toggle_starts_then_stops() {
        let mut ledger = Ledger::new();
        let mut out = Vec::new();
        let fields = quick("reading");
        let commit = commit_as("s");

        let ctx = context(OutputFormat::Json, t(0));
        toggle(&mut out, &ctx, &mut ledger, &fields, &commit, None, None).unwrap();
        assert!(out.is_empty());
        let ctx = context(OutputFormat::Json, t(1));
        toggle(&mut out, &ctx, &mut ledger, &fields, &commit, None, None).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "\"s\"\n");
    }

    #[test]
    fn interrupt_resume_cancel_cycle() {
        let mut ledger = Ledger::new();
        let ctx = context(OutputFormat::Human, t(0));
        start(&ctx, &mut ledger, &quick("writing"), None).unwrap();
        let ctx = context(OutputFormat::Human, t(1));
        interrupt(&ctx, &mut ledger, &quick("call")).unwrap();

        let err = interrupt(&ctx, &mut ledger, &quick("again")).unwrap_err();
        assert_eq!(exit_code(&err), 3);

        let mut out = Vec::new();
        let ctx = context(OutputFormat::Human, t(2));
        let commit = commit_as("call");
        resume(&mut out, &ctx, &mut ledger, &no_fields(), &commit).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Committed Record ID: call\n"
        );

        let mut out = Vec::new();
        let commit = CommitArgs::default();
        let err = resume(&mut out, &ctx, &mut ledger, &no_fields(), &commit).unwrap_err();
        assert_eq!(exit_code(&err), 5);

        let ctx = context(OutputFormat::Human, t(3));
        cancel(&mut out, &ctx, &mut ledger).unwrap();
        cancel(&mut out, &ctx, &mut ledger).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Cancelled stopwatch.\nNothing to cancel.\n"
        );
        assert!(ledger.record(&RecordId::new("call").unwrap()).is_some());
    }

    #[test]
    fn resume_without_stopwatch_fails_with_code_four() {
        let mut ledger = Ledger::new();
        let mut out = Vec::new();
        let ctx = context(OutputFormat::Json, t(0));
        let commit = CommitArgs::default();
        let err = resume(&mut out, &ctx, &mut ledger, &no_fields(), &commit).unwrap_err();
        assert_eq!(exit_code(&err), 4);
    }

    #[test]
    fn cancel_as_json_prints_discarded_interval() {
        let mut ledger = Ledger::new();
        let ctx = context(OutputFormat::Json, t(0));
        start(&ctx, &mut ledger, &quick("oops"), None).unwrap();
        let mut out = Vec::new();
        let ctx = context(OutputFormat::JsonCompact, t(1));
        cancel(&mut out, &ctx, &mut ledger).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"Description\":\"oops\",\"StartTime\":1767225600}\n"
        );
    }
}
