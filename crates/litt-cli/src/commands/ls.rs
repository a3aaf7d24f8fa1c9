//! `tt ls`: list committed records.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::str::FromStr;

use anyhow::{Context as _, Result};
use chrono::{Local, TimeZone};
use litt_core::{FilterExpr, Ledger, Query, RecordId, StructuredData, TimeRecord};

use super::Context;
use crate::cli::{LsArgs, SortKey};
use crate::exit::InvalidFilter;
use crate::output::{OutputFormat, format_instant, human_record, record_value, write_json};

type Row<'a> = (&'a RecordId, &'a TimeRecord);

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Lists the records named by identifier, or every record the filters match.
pub fn run<W: Write>(writer: &mut W, ctx: &Context, ledger: &Ledger, args: &LsArgs) -> Result<()> {
    let mut rows = select(ctx, ledger, args)?;
    sort(&mut rows, args.sort_by);

    let Some(path) = &args.outfile else {
        return render(writer, ctx, ledger, &rows, args);
    };
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut file = BufWriter::new(file);
    render(&mut file, ctx, ledger, &rows, args)?;
    file.flush()
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), records = rows.len(), "wrote listing");
    Ok(())
}

fn select<'a>(ctx: &Context, ledger: &'a Ledger, args: &LsArgs) -> Result<Vec<Row<'a>>> {
    let ids: Vec<&String> = args.record.iter().chain(&args.ids).collect();
    if !ids.is_empty() {
        // Named records bypass the filters.
        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            let id = RecordId::new(id.as_str())?;
            match ledger.records().get_key_value(&id) {
                Some(row) => rows.push(row),
                None => tracing::debug!(%id, "no such record, skipping"),
            }
        }
        return Ok(rows);
    }

    let exprs = args
        .filters
        .iter()
        .map(|text| {
            FilterExpr::from_str(text).map_err(|source| InvalidFilter {
                text: text.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let query = Query::compile(&exprs, ctx.timespecs(), ctx.now)?;
    Ok(query.select(ledger.records()))
}

/// Stable sort; records without the key come first.
fn sort(rows: &mut [Row<'_>], key: SortKey) {
    match key {
        SortKey::CommitTime => rows.sort_by_key(|(_, record)| record.commit_time),
        SortKey::StartTime => rows.sort_by_key(|(_, record)| record.start_time),
        SortKey::EndTime => rows.sort_by_key(|(_, record)| record.end_time),
        SortKey::Description => {
            rows.sort_by(|(_, a), (_, b)| a.fields.description.cmp(&b.fields.description))
        }
        SortKey::Detail => rows.sort_by(|(_, a), (_, b)| a.fields.detail.cmp(&b.fields.detail)),
        SortKey::Id => rows.sort_by(|(a, _), (b, _)| a.cmp(b)),
    }
}

fn render<W: Write>(
    writer: &mut W,
    ctx: &Context,
    ledger: &Ledger,
    rows: &[Row<'_>],
    args: &LsArgs,
) -> Result<()> {
    let (with_data, with_detail) = (args.with_structured_data, !args.without_detail);
    if args.csv {
        return write_csv(writer, ledger.records(), rows, args, &Local);
    }
    if ctx.format != OutputFormat::Human {
        let listing = rows
            .iter()
            .map(|(id, record)| Ok((*id, record_value(record, with_data, with_detail)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;
        return write_json(writer, &listing, ctx.format);
    }
    for (id, record) in rows {
        let mut shown = (*record).clone();
        if !with_data {
            shown.fields.structured_data = None;
        }
        if !with_detail {
            shown.fields.detail = None;
        }
        writeln!(writer, "Record \"{id}\"")?;
        writeln!(writer, "{}", human_record(&shown, &Local))?;
    }
    Ok(())
}

/// Writes one row per record.
///
/// Durations are in hours; interruption time is subtracted from `Duration`.
/// Each tag gets a column marked `x`, except tags every listed record carries.
fn write_csv<W, Tz>(
    writer: &mut W,
    all: &BTreeMap<RecordId, TimeRecord>,
    rows: &[Row<'_>],
    args: &LsArgs,
    tz: &Tz,
) -> Result<()>
where
    W: Write,
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let tag_columns = tag_columns(rows);

    let mut header = vec![
        "RecordId",
        "StartTime",
        "EndTime",
        "CommitTime",
        "Duration",
        "InterruptionDuration",
        "Description",
    ];
    if !args.without_detail {
        header.push("Detail");
    }
    if args.with_structured_data {
        header.push("StructuredData");
    }
    header.extend(tag_columns.iter().copied());
    let header: Vec<String> = header.into_iter().map(escape_field).collect();
    writeln!(writer, "{}", header.join(","))?;

    for (id, record) in rows {
        let interrupted = interruption_hours(record, all);
        let mut fields = vec![
            escape_field(id.as_str()),
            format_instant(record.start_time, tz),
            format_instant(record.end_time, tz),
            format_instant(record.commit_time, tz),
            format!("{:.2}", hours(record) - interrupted),
            format!("{interrupted:.2}"),
            escape_field(record.fields.description.as_deref().unwrap_or_default()),
        ];
        if !args.without_detail {
            fields.push(escape_field(record.fields.detail.as_deref().unwrap_or_default()));
        }
        if args.with_structured_data {
            let data = record.fields.structured_data.as_ref();
            fields.push(data.map_or_else(String::new, StructuredData::to_base64));
        }
        for tag in &tag_columns {
            let marked = record.fields.tags.contains(tag);
            let mark = if marked { "x" } else { "" };
            fields.push(mark.to_string());
        }
        writeln!(writer, "{}", fields.join(","))?;
    }
    Ok(())
}

fn tag_columns<'a>(rows: &[Row<'a>]) -> Vec<&'a str> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for &(_, record) in rows {
        for tag in record.fields.tags.iter() {
            *counts.entry(tag).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .filter(|&(_, count)| count < rows.len())
        .map(|(tag, _)| tag)
        .collect()
}

#[expect(
    clippy::cast_precision_loss,
    reason = "record spans are far below 2^52 seconds"
)]
fn hours(record: &TimeRecord) -> f64 {
    record.duration().num_seconds() as f64 / SECONDS_PER_HOUR
}

/// Total length of the interruptions linked from `record` that are still in
/// the ledger.
fn interruption_hours(record: &TimeRecord, all: &BTreeMap<RecordId, TimeRecord>) -> f64 {
    record
        .interruptions
        .iter()
        .filter_map(|link| all.get(&link.id))
        .map(hours)
        .sum()
}

/// Quotes a field containing a comma, quote or line break.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
