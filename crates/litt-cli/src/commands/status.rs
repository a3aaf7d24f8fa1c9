//! Default command: show the open stopwatch and interruption.

use std::io::Write;

use anyhow::Result;
use chrono::Local;
use litt_core::Ledger;
use serde_json::json;

use super::Context;
use crate::output::{OutputFormat, human_open_interval, write_json};

pub fn run<W: Write>(writer: &mut W, ctx: &Context, ledger: &Ledger) -> Result<()> {
    let (primary, interruption) = ledger.stopwatch().parts();

    if ctx.format != OutputFormat::Human {
        return write_json(
            writer,
            &json!({ "Stopwatch": primary, "Interruption": interruption }),
            ctx.format,
        );
    }

    let Some(primary) = primary else {
        writeln!(writer, "No stopwatch running.")?;
        return Ok(());
    };
    let primary = human_open_interval(primary, ctx.now, &Local);
    writeln!(writer, "Stopwatch\n{primary}")?;
    if let Some(interruption) = interruption {
        let interruption = human_open_interval(interruption, ctx.now, &Local);
        writeln!(writer, "Interruption\n{interruption}")?;
    }
    Ok(())
}
