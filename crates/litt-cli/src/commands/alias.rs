//! `tt alias`: list aliases or put one.

use std::io::Write;

use anyhow::Result;
use litt_core::{AliasKey, Ledger, explicit_patch};

use super::{Context, field_options};
use crate::cli::FieldArgs;
use crate::output::{OutputFormat, human_alias, write_json};

/// Lists every alias when `key` is `None`; otherwise stores the template the
/// fields describe, removing the alias when they describe nothing.
pub fn run<W: Write>(
    writer: &mut W,
    ctx: &Context,
    ledger: &mut Ledger,
    key: Option<&str>,
    fields: &FieldArgs,
) -> Result<()> {
    let Some(key) = key else {
        return list(writer, ctx, ledger);
    };

    let key = AliasKey::new(key)?;
    let template = explicit_patch(&field_options(fields)).to_fields();
    let removed = template.is_empty();
    ledger.put_alias(key.clone(), template);
    if removed {
        tracing::info!(%key, "removed alias");
    } else {
        tracing::info!(%key, "stored alias");
    }
    Ok(())
}

fn list<W: Write>(writer: &mut W, ctx: &Context, ledger: &Ledger) -> Result<()> {
    if ctx.format != OutputFormat::Human {
        return write_json(writer, ledger.aliases(), ctx.format);
    }
    for (key, template) in ledger.aliases() {
        writeln!(writer, "{}", human_alias(key, template))?;
    }
    Ok(())
}
