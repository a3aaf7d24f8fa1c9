//! `tt config`: show the effective configuration, or persist the output format.

use std::io::Write;

use anyhow::{Context as _, Result};
use litt_core::{HookDispatcher, HookEvent};

use super::Context;
use crate::config::StoredSettings;
use crate::output::{OutputFormat, write_json};

/// With `set_format`, stores it as the default output format between
/// `pre_config_write` and `post_config_write`. Otherwise prints the
/// configuration in effect.
pub fn run<W, H>(
    writer: &mut W,
    ctx: &Context,
    hooks: &H,
    set_format: Option<OutputFormat>,
) -> Result<()>
where
    W: Write,
    H: HookDispatcher,
    H::Error: std::error::Error + Send + Sync + 'static,
{
    let Some(format) = set_format else {
        return show(writer, ctx);
    };

    let data_dir = &ctx.config.data_dir;
    let mut settings = StoredSettings::read(data_dir)?;
    settings.output_format = Some(format);
    let payload = serde_json::to_value(&settings)?;

    hooks
        .dispatch(HookEvent::PreConfigWrite, &payload)
        .context("pre_config_write hook failed")?;
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;
    let mut contents = serde_json::to_vec_pretty(&payload)?;
    contents.push(b'\n');
    litt_store::write_atomically(&ctx.config.settings_path(), &contents)
        .context("failed to write settings")?;
    hooks
        .dispatch(HookEvent::PostConfigWrite, &payload)
        .context("post_config_write hook failed")?;

    tracing::info!(%format, "stored default output format");
    Ok(())
}

fn show<W: Write>(writer: &mut W, ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    if ctx.format != OutputFormat::Human {
        return write_json(writer, config, ctx.format);
    }
    writeln!(writer, "data_dir: {}", config.data_dir.display())?;
    writeln!(writer, "output_format: {}", config.output_format)?;
    writeln!(writer, "date_dialect: {}", config.date_dialect)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::path::Path;

    use chrono::Utc;
    use litt_core::NoHooks;
    use serde_json::Value;
    use tempfile::TempDir;

    use crate::Config;

    fn context_in(dir: &Path, format: Option<OutputFormat>) -> Context {
        let config = Config {
            data_dir: dir.to_path_buf(),
            ..Config::default()
        };
        Context::new(config, format, Utc::now())
    }

    #[derive(Default)]
    struct Recording {
        events: RefCell<Vec<(HookEvent, Value)>>,
    }

    impl HookDispatcher for Recording {
        type Error = std::convert::Infallible;

        fn dispatch(&self, event: HookEvent, payload: &Value) -> Result<(), Self::Error> {
            self.events.borrow_mut().push((event, payload.clone()));
            Ok(())
        }
    }

    #[test]
    fn show_in_human_form() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(temp.path(), Some(OutputFormat::Human));
        let mut out = Vec::new();
        run(&mut out, &ctx, &NoHooks, None).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            format!(
                "data_dir: {}\noutput_format: json\ndate_dialect: uk\n",
                temp.path().display()
            )
        );
    }

    #[test]
    fn show_as_json() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(temp.path(), None);
        let mut out = Vec::new();
        run(&mut out, &ctx, &NoHooks, None).unwrap();

        let shown: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(shown["output_format"], "json");
        assert_eq!(shown["date_dialect"], "uk");
    }

    #[test]
    fn setting_format_writes_settings_between_hooks() {
        let temp = TempDir::new().unwrap();
        let ctx = context_in(temp.path(), Some(OutputFormat::Human));
        let hooks = Recording::default();
        let mut out = Vec::new();
        run(&mut out, &ctx, &hooks, Some(OutputFormat::Human)).unwrap();

        assert!(out.is_empty());
        let stored = StoredSettings::read(temp.path()).unwrap();
        assert_eq!(stored.output_format, Some(OutputFormat::Human));

        let events = hooks.events.borrow();
        let kinds: Vec<HookEvent> = events.iter().map(|(event, _)| *event).collect();
        let expected = [HookEvent::PreConfigWrite, HookEvent::PostConfigWrite];
        assert_eq!(kinds, expected);
        assert_eq!(events[0].1, serde_json::json!({"OutputFormat": "human"}));
    }
}
