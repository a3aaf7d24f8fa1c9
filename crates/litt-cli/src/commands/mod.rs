//! CLI subcommand implementations.
//!
//! Commands operate on an in-memory [`Ledger`] held by a [`Session`], which
//! owns the load → mutate → persist lifecycle and raises the hook events
//! around it.

pub mod alias;
pub mod config;
pub mod ls;
pub mod status;
pub mod stopwatch;
pub mod track;

use std::path::Path;

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use litt_core::{
    AliasKey, CoreError, FieldOptions, HookDispatcher, HookEvent, Ledger, NaturalTimespecs,
    RecordId, ResolutionError, StructuredData, TimespecResolver,
};
use litt_store::{Loaded, Store};
use serde_json::Value;

use crate::Config;
use crate::cli::{FieldArgs, QuickFieldArgs};
use crate::output::OutputFormat;

/// Per-invocation settings shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    pub format: OutputFormat,
    /// The single reference instant for this invocation.
    pub now: DateTime<Utc>,
    timespecs: NaturalTimespecs,
}

impl Context {
    pub fn new(config: Config, format: Option<OutputFormat>, now: DateTime<Utc>) -> Self {
        Self {
            format: format.unwrap_or(config.output_format),
            timespecs: NaturalTimespecs::new(config.date_dialect),
            config,
            now,
        }
    }

    pub const fn timespecs(&self) -> &NaturalTimespecs {
        &self.timespecs
    }

    pub fn resolve_time(&self, text: &str) -> Result<DateTime<Utc>, ResolutionError> {
        self.timespecs.resolve(text, self.now)
    }

    pub fn resolve_optional(
        &self,
        text: Option<&str>,
    ) -> Result<Option<DateTime<Utc>>, ResolutionError> {
        text.map(|text| self.resolve_time(text)).transpose()
    }
}

/// A locked, loaded ledger plus the hooks to notify about it.
pub struct Session<H> {
    store: Store,
    ledger: Ledger,
    version: u64,
    hooks: H,
}

impl<H> Session<H>
where
    H: HookDispatcher,
    H::Error: std::error::Error + Send + Sync + 'static,
{
    /// Raises `pre_load`, then locks and loads the ledger in `data_dir`,
    /// creating the directory on first use.
    pub fn open(data_dir: &Path, hooks: H) -> Result<Self> {
        hooks
            .dispatch(HookEvent::PreLoad, &Value::Null)
            .context("pre_load hook failed")?;

        let store = Store::open(data_dir).context("failed to open ledger")?;
        let Loaded { ledger, version } = store.load().context("failed to load ledger")?;
        Ok(Self {
            store,
            ledger,
            version,
            hooks,
        })
    }

    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub const fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    /// Persists the ledger if anything changed, surrounded by `pre_commit`
    /// and `post_commit`.
    ///
    /// Returns whether anything was written.
    pub fn commit(self) -> Result<bool> {
        if !self.ledger.is_modified() {
            tracing::debug!("ledger unchanged, nothing to persist");
            return Ok(false);
        }

        let payload = self
            .ledger
            .changes()
            .to_payload()
            .context("failed to encode change set")?;
        self.hooks
            .dispatch(HookEvent::PreCommit, &payload)
            .context("pre_commit hook failed")?;
        self.store
            .persist(&self.ledger, self.version)
            .context("failed to persist ledger")?;
        self.hooks
            .dispatch(HookEvent::PostCommit, &payload)
            .context("post_commit hook failed")?;
        Ok(true)
    }
}

/// Converts field arguments into resolver input.
pub fn field_options(fields: &FieldArgs) -> FieldOptions {
    FieldOptions {
        description: fields.description.clone(),
        detail: fields.detail.clone(),
        tags: fields.tags.clone(),
        structured_data: fields
            .structured_data
            .as_ref()
            .map(|data| StructuredData::new(data.as_bytes())),
        ..FieldOptions::default()
    }
}

/// Converts field arguments with alias selection into resolver input.
pub fn quick_field_options(
    quick: &QuickFieldArgs,
    untags: &[String],
) -> Result<FieldOptions, CoreError> {
    Ok(FieldOptions {
        quicktext: quick.quicktext.clone(),
        alias: quick.alias.as_deref().map(AliasKey::new).transpose()?,
        untags: untags.to_vec(),
        ..field_options(&quick.fields)
    })
}

pub fn record_id(id: Option<&str>) -> Result<Option<RecordId>, CoreError> {
    id.map(RecordId::new).transpose().map_err(CoreError::from)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    use chrono::Duration;

    /// 2026-01-01T00:00:00Z plus `hours`.
    pub fn t(hours: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_767_225_600, 0).unwrap() + Duration::hours(hours)
    }

    pub fn context(format: OutputFormat, now: DateTime<Utc>) -> Context {
        let config = Config {
            data_dir: std::env::temp_dir(),
            ..Config::default()
        };
        Context::new(config, Some(format), now)
    }

    pub fn quick(text: &str) -> QuickFieldArgs {
        QuickFieldArgs {
            quicktext: Some(text.to_string()),
            ..QuickFieldArgs::default()
        }
    }
}
