//! The in-memory ledger: committed records, aliases and stopwatch state.
//!
//! A command loads the ledger, mutates it here, and hands it back to the store.
//! Every mutating method validates before it applies, so an error leaves the
//! ledger exactly as it was. Changes to records and aliases are tracked in a
//! [`ChangeSet`] for hooks.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::changes::ChangeSet;
use crate::error::CoreError;
use crate::resolve::{FieldOptions, Patch, resolve};
use crate::stopwatch::Stopwatch;
use crate::types::{AliasKey, Fields, InterruptionRef, RecordId, TimeRecord};

/// A fully resolved record that has not been committed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDraft {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub fields: Fields,
    pub interruptions: Vec<InterruptionRef>,
}

impl RecordDraft {
    /// Creates a draft, rejecting intervals that do not move forward.
    pub fn new(
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        fields: Fields,
    ) -> Result<Self, CoreError> {
        check_interval(start_time, end_time)?;
        Ok(Self {
            start_time,
            end_time,
            fields,
            interruptions: Vec::new(),
        })
    }
}

/// Changes to an existing record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Amendment {
    pub patch: Patch,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Ledger contents plus the changes made since load.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    records: BTreeMap<RecordId, TimeRecord>,
    aliases: BTreeMap<AliasKey, Fields>,
    stopwatch: Stopwatch,
    changes: ChangeSet,
    stopwatch_changed: bool,
}

impl Ledger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a ledger from loaded contents. No changes are pending.
    pub fn from_parts(
        records: BTreeMap<RecordId, TimeRecord>,
        aliases: BTreeMap<AliasKey, Fields>,
        stopwatch: Stopwatch,
    ) -> Self {
        Self {
            records,
            aliases,
            stopwatch,
            changes: ChangeSet::default(),
            stopwatch_changed: false,
        }
    }

    pub const fn records(&self) -> &BTreeMap<RecordId, TimeRecord> {
        &self.records
    }

    pub fn record(&self, id: &RecordId) -> Option<&TimeRecord> {
        self.records.get(id)
    }

    pub const fn aliases(&self) -> &BTreeMap<AliasKey, Fields> {
        &self.aliases
    }

    pub const fn stopwatch(&self) -> &Stopwatch {
        &self.stopwatch
    }

    /// Record and alias images touched since load.
    pub const fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// True when anything, including the stopwatch, differs from what was loaded.
    pub fn is_modified(&self) -> bool {
        self.stopwatch_changed || !self.changes.is_empty()
    }

    /// Commits a draft under `id`, or under a generated identifier.
    pub fn commit(
        &mut self,
        draft: RecordDraft,
        id: Option<RecordId>,
        now: DateTime<Utc>,
    ) -> Result<RecordId, CoreError> {
        check_interval(draft.start_time, draft.end_time)?;
        let id = self.allocate_id(id, now)?;
        self.insert_committed(id.clone(), draft, now);
        tracing::info!(%id, "committed record");
        Ok(id)
    }

    /// Resolves `options` and commits a closed interval in one step.
    pub fn track(
        &mut self,
        options: &FieldOptions,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        id: Option<RecordId>,
        now: DateTime<Utc>,
    ) -> Result<RecordId, CoreError> {
        let resolution = resolve(options, &self.aliases)?;
        let draft = RecordDraft::new(start_time, end_time, resolution.patch.to_fields())?;
        self.commit(draft, id, now)
    }

    /// Applies an amendment to an existing record.
    ///
    /// Identifier, commit time and interruption links never change; start and
    /// end change only when given, and must still form a valid interval.
    pub fn amend(
        &mut self,
        id: &RecordId,
        amendment: &Amendment,
    ) -> Result<&TimeRecord, CoreError> {
        let slot = self
            .records
            .get_mut(id)
            .ok_or_else(|| CoreError::UnknownIdentifier(id.clone()))?;

        let mut updated = slot.clone();
        amendment.patch.apply_to(&mut updated.fields);
        if let Some(start) = amendment.start_time {
            updated.start_time = start;
        }
        if let Some(end) = amendment.end_time {
            updated.end_time = end;
        }
        check_interval(updated.start_time, updated.end_time)?;

        self.changes
            .record_changed(id, Some(slot.clone()), Some(updated.clone()));
        tracing::info!(%id, "amended record");
        *slot = updated;
        Ok(slot)
    }

    /// Stores an alias template, or removes the alias when the template is empty.
    ///
    /// Returns the previous template.
    pub fn put_alias(&mut self, key: AliasKey, template: Fields) -> Option<Fields> {
        let previous = if template.is_empty() {
            self.aliases.remove(&key)
        } else {
            self.aliases.insert(key.clone(), template.clone())
        };
        let new = (!template.is_empty()).then_some(template);
        if previous.is_none() && new.is_none() {
            tracing::debug!(%key, "no such alias to remove");
            return None;
        }
        self.changes.alias_changed(&key, previous.clone(), new);
        tracing::debug!(%key, removed = previous.is_some(), "updated alias");
        previous
    }

    /// Generates an identifier not yet used in this ledger.
    ///
    /// Format: the commit date followed by four random capital letters, e.g.
    /// `20260310-QWZK`. Collisions are retried.
    pub fn generate_id(&self, now: DateTime<Utc>) -> RecordId {
        let date = now.format("%Y%m%d");
        loop {
            let random = Uuid::new_v4();
            let suffix: String = random.as_bytes()[..4]
                .iter()
                .map(|b| char::from(b'A' + b % 26))
                .collect();
            let candidate = format!("{date}-{suffix}");
            if let Ok(id) = RecordId::new(candidate) {
                if !self.records.contains_key(&id) {
                    return id;
                }
            }
        }
    }

    pub(crate) fn allocate_id(
        &self,
        requested: Option<RecordId>,
        now: DateTime<Utc>,
    ) -> Result<RecordId, CoreError> {
        match requested {
            Some(id) if self.records.contains_key(&id) => Err(CoreError::DuplicateIdentifier(id)),
            Some(id) => Ok(id),
            None => Ok(self.generate_id(now)),
        }
    }

    pub(crate) fn insert_committed(
        &mut self,
        id: RecordId,
        draft: RecordDraft,
        now: DateTime<Utc>,
    ) {
        let record = TimeRecord {
            start_time: draft.start_time,
            end_time: draft.end_time,
            commit_time: now,
            fields: draft.fields,
            interruptions: draft.interruptions,
        };
        self.changes.record_changed(&id, None, Some(record.clone()));
        self.records.insert(id, record);
    }

    pub(crate) fn replace_stopwatch(&mut self, stopwatch: Stopwatch) {
        self.stopwatch = stopwatch;
        self.stopwatch_changed = true;
    }
}

/// Completes a closed interval from the endpoints given; the missing one is
/// `now`. At least one endpoint is required.
pub fn closed_interval(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), CoreError> {
    if start.is_none() && end.is_none() {
        return Err(CoreError::MissingInterval);
    }
    let (start, end) = (start.unwrap_or(now), end.unwrap_or(now));
    check_interval(start, end)?;
    Ok((start, end))
}

fn check_interval(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), CoreError> {
    if end <= start {
        return Err(CoreError::InvalidInterval { start, end });
    }
    Ok(())
}
