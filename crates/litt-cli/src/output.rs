//! Rendering of command results.
//!
//! JSON output always has sorted object keys. Human output shows times in the
//! given time zone as `%FT%T%z`.

use std::fmt;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use clap::ValueEnum;
use litt_core::{AliasKey, Fields, OpenInterval, RecordId, TimeRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::ser::PrettyFormatter;

/// Output format for commands that produce output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    Human,
    #[default]
    Json,
    JsonCompact,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Human => "human",
            Self::Json => "json",
            Self::JsonCompact => "json-compact",
        };
        f.write_str(name)
    }
}

/// Writes `value` as JSON followed by a newline.
///
/// Pretty output is indented by four spaces.
pub fn write_json<W: Write, T: Serialize + ?Sized>(
    writer: &mut W,
    value: &T,
    format: OutputFormat,
) -> Result<()> {
    // Through `Value` so object keys come out sorted.
    let value = serde_json::to_value(value)?;
    if format == OutputFormat::JsonCompact {
        serde_json::to_writer(&mut *writer, &value)?;
    } else {
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut *writer, formatter);
        value.serialize(&mut serializer)?;
    }
    writeln!(writer)?;
    Ok(())
}

/// Prints the identifier a command committed.
pub fn write_committed<W: Write>(
    writer: &mut W,
    id: &RecordId,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Human => writeln!(writer, "Committed Record ID: {id}")?,
        _ => write_json(writer, id, format)?,
    }
    Ok(())
}

/// Formats a span of seconds: `4.00s`, `42s`, `1h 05m`.
pub fn format_duration(seconds: i64) -> String {
    if seconds < 10 {
        #[expect(
            clippy::cast_precision_loss,
            reason = "only used for spans under ten seconds"
        )]
        let fractional = seconds as f64;
        format!("{fractional:.2}s")
    } else if seconds < 60 {
        format!("{seconds}s")
    } else {
        format!("{}h {:02}m", seconds / 3600, (seconds % 3600) / 60)
    }
}

/// Formats an instant in `tz` as `2026-01-01T09:30:00+0100`.
pub fn format_instant<Tz>(instant: DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    instant.with_timezone(tz).format("%FT%T%z").to_string()
}

fn write_fields(f: &mut fmt::Formatter<'_>, fields: &Fields) -> fmt::Result {
    if let Some(description) = &fields.description {
        writeln!(f, "Description: {description}")?;
    }
    if !fields.tags.is_empty() {
        writeln!(f, "Tags: {}", fields.tags)?;
    }
    if let Some(detail) = &fields.detail {
        writeln!(f, "Details:\n    {detail}")?;
    }
    if let Some(data) = &fields.structured_data {
        writeln!(f, "StructuredData:\n    {}", data.to_base64())?;
    }
    Ok(())
}

struct HumanRecord<'a, Tz> {
    record: &'a TimeRecord,
    tz: &'a Tz,
}

impl<Tz> fmt::Display for HumanRecord<'_, Tz>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.record;
        let started = format_instant(record.start_time, self.tz);
        let ended = format_instant(record.end_time, self.tz);
        let elapsed = format_duration(record.duration().num_seconds());
        writeln!(f, "Record started at: {started}")?;
        writeln!(f, "Record ended at: {ended}")?;
        writeln!(f, "Elapsed wall-clock time: {elapsed}")?;
        write_fields(f, &record.fields)
    }
}

/// Human block for a committed record.
pub fn human_record<'a, Tz>(record: &'a TimeRecord, tz: &'a Tz) -> impl fmt::Display + 'a
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    HumanRecord { record, tz }
}

struct HumanOpenInterval<'a, Tz> {
    interval: &'a OpenInterval,
    now: DateTime<Utc>,
    tz: &'a Tz,
}

impl<Tz> fmt::Display for HumanOpenInterval<'_, Tz>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let interval = self.interval;
        let started = format_instant(interval.start_time, self.tz);
        let elapsed = format_duration((self.now - interval.start_time).num_seconds());
        writeln!(f, "Record started at: {started}")?;
        writeln!(f, "Recording is still ongoing.")?;
        writeln!(f, "Elapsed wall-clock time: {elapsed}")?;
        write_fields(f, &interval.fields)
    }
}

/// Human block for an interval that is still open at `now`.
pub fn human_open_interval<'a, Tz>(
    interval: &'a OpenInterval,
    now: DateTime<Utc>,
    tz: &'a Tz,
) -> impl fmt::Display + 'a
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    HumanOpenInterval { interval, now, tz }
}

struct HumanAlias<'a> {
    key: &'a AliasKey,
    template: &'a Fields,
}

impl fmt::Display for HumanAlias<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self.key;
        writeln!(f, "Alias \"{key}\"")?;
        write_fields(f, self.template)
    }
}

/// Human block for an alias template.
pub fn human_alias<'a>(key: &'a AliasKey, template: &'a Fields) -> impl fmt::Display + 'a {
    HumanAlias { key, template }
}

/// Serializes a record, dropping the fields a listing leaves out.
pub fn record_value(
    record: &TimeRecord,
    with_structured_data: bool,
    with_detail: bool,
) -> Result<Value> {
    let mut value = serde_json::to_value(record)?;
    if let Value::Object(map) = &mut value {
        if !with_structured_data {
            map.remove("StructuredData");
        }
        if !with_detail {
            map.remove("Detail");
        }
    }
    Ok(value)
}
