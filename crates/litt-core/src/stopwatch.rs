//! The stopwatch: one primary interval and at most one interruption.
//!
//! Which actions are valid in which state lives in [`transition`]; the
//! [`Ledger`] methods below consult it before touching anything, so a rejected
//! action leaves both the stopwatch and the records as they were.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ledger::{Ledger, RecordDraft};
use crate::resolve::{FieldOptions, Patch, Resolution, resolve};
use crate::types::{AliasKey, Fields, InterruptionRef, RecordId, unix_seconds};

/// An interval that has been opened but not committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OpenInterval {
    #[serde(with = "unix_seconds")]
    pub start_time: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Fields,
    /// Alias the interval was opened with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<AliasKey>,
    /// Interruptions committed while this interval was paused.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interruptions: Vec<InterruptionRef>,
}

impl OpenInterval {
    pub fn open(start_time: DateTime<Utc>, resolution: Resolution) -> Self {
        Self {
            start_time,
            fields: resolution.patch.to_fields(),
            alias: resolution.alias,
            interruptions: Vec::new(),
        }
    }

    /// Builds the record this interval becomes when closed at `end_time`,
    /// with `patch` merged over the fields captured at open.
    pub fn close(&self, patch: &Patch, end_time: DateTime<Utc>) -> Result<RecordDraft, CoreError> {
        let mut fields = self.fields.clone();
        patch.apply_to(&mut fields);
        let mut draft = RecordDraft::new(self.start_time, end_time, fields)?;
        draft.interruptions.clone_from(&self.interruptions);
        Ok(draft)
    }
}

/// Stopwatch actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Start,
    Stop,
    Interrupt,
    Resume,
    Cancel,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Interrupt => "interrupt",
            Self::Resume => "resume",
            Self::Cancel => "cancel",
        };
        write!(f, "{s}")
    }
}

/// Coarse stopwatch state, without the intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Running,
    Interrupted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Interrupted => "interrupted",
        };
        write!(f, "{s}")
    }
}

/// What a valid action does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    OpenPrimary,
    CommitPrimary,
    OpenInterruption,
    CommitInterruption,
    DiscardPrimary,
    DiscardInterruption,
    Nothing,
}

/// The stopwatch transition table.
pub fn transition(action: Action, phase: Phase) -> Result<Effect, CoreError> {
    let reject = |reason| Err(CoreError::transition(action, phase, reason));
    match (action, phase) {
        (Action::Start | Action::Interrupt, Phase::Idle) => Ok(Effect::OpenPrimary),
        (Action::Start, Phase::Running) => reject("already running"),
        (Action::Start | Action::Stop, Phase::Interrupted) => reject("interruption active"),
        (Action::Stop | Action::Resume, Phase::Idle) => reject("not running"),
        (Action::Stop, Phase::Running) => Ok(Effect::CommitPrimary),
        (Action::Interrupt, Phase::Running) => Ok(Effect::OpenInterruption),
        (Action::Interrupt, Phase::Interrupted) => reject("already interrupted"),
        (Action::Resume, Phase::Running) => reject("no interruption to resume"),
        (Action::Resume, Phase::Interrupted) => Ok(Effect::CommitInterruption),
        (Action::Cancel, Phase::Idle) => Ok(Effect::Nothing),
        (Action::Cancel, Phase::Running) => Ok(Effect::DiscardPrimary),
        (Action::Cancel, Phase::Interrupted) => Ok(Effect::DiscardInterruption),
    }
}

/// Stopwatch state persisted between invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Stopwatch {
    #[default]
    Idle,
    Running(OpenInterval),
    Interrupted {
        primary: OpenInterval,
        interruption: OpenInterval,
    },
}

impl Stopwatch {
    /// Rebuilds the state from its stored halves.
    ///
    /// Returns `None` for an interruption without a primary interval.
    pub fn from_parts(
        primary: Option<OpenInterval>,
        interruption: Option<OpenInterval>,
    ) -> Option<Self> {
        match (primary, interruption) {
            (None, None) => Some(Self::Idle),
            (Some(primary), None) => Some(Self::Running(primary)),
            (Some(primary), Some(interruption)) => Some(Self::Interrupted {
                primary,
                interruption,
            }),
            (None, Some(_)) => None,
        }
    }

    /// The stored halves: primary interval and interruption.
    pub const fn parts(&self) -> (Option<&OpenInterval>, Option<&OpenInterval>) {
        match self {
            Self::Idle => (None, None),
            Self::Running(primary) => (Some(primary), None),
            Self::Interrupted {
                primary,
                interruption,
            } => (Some(primary), Some(interruption)),
        }
    }

    pub const fn phase(&self) -> Phase {
        match self {
            Self::Idle => Phase::Idle,
            Self::Running(_) => Phase::Running,
            Self::Interrupted { .. } => Phase::Interrupted,
        }
    }

    /// The interval currently accumulating time.
    pub const fn active(&self) -> Option<&OpenInterval> {
        match self {
            Self::Idle => None,
            Self::Running(primary) => Some(primary),
            Self::Interrupted { interruption, .. } => Some(interruption),
        }
    }
}

/// Overrides supplied when an interval is closed.
#[derive(Debug, Clone, Default)]
pub struct Closing {
    pub options: FieldOptions,
    /// Identifier to commit under; generated when absent.
    pub id: Option<RecordId>,
    /// End of the interval; the commit time when absent.
    pub end_time: Option<DateTime<Utc>>,
}

/// Outcome of the context-sensitive `sw` action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toggle {
    Started,
    Stopped(RecordId),
}

/// Outcome of `cancel`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cancelled {
    Nothing,
    Primary(OpenInterval),
    Interruption(OpenInterval),
}

impl Ledger {
    /// Opens the primary interval.
    pub fn start(
        &mut self,
        options: &FieldOptions,
        start_time: DateTime<Utc>,
    ) -> Result<&OpenInterval, CoreError> {
        transition(Action::Start, self.stopwatch().phase())?;
        let resolution = resolve(options, self.aliases())?;
        self.open_primary(OpenInterval::open(start_time, resolution))
    }

    /// Commits the primary interval and returns to idle.
    pub fn stop(&mut self, closing: &Closing, now: DateTime<Utc>) -> Result<RecordId, CoreError> {
        let phase = self.stopwatch().phase();
        transition(Action::Stop, phase)?;
        let Stopwatch::Running(primary) = self.stopwatch() else {
            return Err(CoreError::transition(Action::Stop, phase, "not running"));
        };

        let resolution = resolve(&closing.options, self.aliases())?;
        let draft = primary.close(&resolution.patch, closing.end_time.unwrap_or(now))?;
        let id = self.allocate_id(closing.id.clone(), now)?;

        self.replace_stopwatch(Stopwatch::Idle);
        self.insert_committed(id.clone(), draft, now);
        tracing::info!(%id, "stopped stopwatch");
        Ok(id)
    }

    /// Starts when idle, stops when running.
    pub fn toggle(
        &mut self,
        options: &FieldOptions,
        start_time: Option<DateTime<Utc>>,
        closing: &Closing,
        now: DateTime<Utc>,
    ) -> Result<Toggle, CoreError> {
        if self.stopwatch().phase() == Phase::Idle {
            self.start(options, start_time.unwrap_or(now))?;
            Ok(Toggle::Started)
        } else {
            self.stop(closing, now).map(Toggle::Stopped)
        }
    }

    /// Pauses the primary interval with an interruption, or starts the
    /// primary interval when idle.
    pub fn interrupt(
        &mut self,
        options: &FieldOptions,
        now: DateTime<Utc>,
    ) -> Result<Phase, CoreError> {
        let effect = transition(Action::Interrupt, self.stopwatch().phase())?;
        let resolution = resolve(options, self.aliases())?;
        let opened = OpenInterval::open(now, resolution);

        if effect == Effect::OpenPrimary {
            self.open_primary(opened)?;
            return Ok(Phase::Running);
        }

        let Stopwatch::Running(primary) = self.stopwatch().clone() else {
            return Err(CoreError::transition(
                Action::Interrupt,
                self.stopwatch().phase(),
                "not running",
            ));
        };
        self.replace_stopwatch(Stopwatch::Interrupted {
            primary,
            interruption: opened,
        });
        tracing::debug!("opened interruption");
        Ok(Phase::Interrupted)
    }

    /// Commits the interruption and resumes the primary interval.
    ///
    /// The primary keeps its original start time; the committed interruption
    /// is linked from it.
    pub fn resume(&mut self, closing: &Closing, now: DateTime<Utc>) -> Result<RecordId, CoreError> {
        let phase = self.stopwatch().phase();
        transition(Action::Resume, phase)?;
        let Stopwatch::Interrupted {
            primary,
            interruption,
        } = self.stopwatch()
        else {
            return Err(CoreError::transition(Action::Resume, phase, "no interruption to resume"));
        };

        let resolution = resolve(&closing.options, self.aliases())?;
        let draft = interruption.close(&resolution.patch, closing.end_time.unwrap_or(now))?;
        let id = self.allocate_id(closing.id.clone(), now)?;

        let mut primary = primary.clone();
        let link = InterruptionRef { id: id.clone() };
        primary.interruptions.push(link);
        self.replace_stopwatch(Stopwatch::Running(primary));
        self.insert_committed(id.clone(), draft, now);
        tracing::info!(%id, "committed interruption");
        Ok(id)
    }

    /// Discards the innermost open interval without committing it.
    pub fn cancel(&mut self) -> Result<Cancelled, CoreError> {
        let effect = transition(Action::Cancel, self.stopwatch().phase())?;
        let previous = self.stopwatch().clone();
        let cancelled = match (effect, previous) {
            (Effect::DiscardPrimary, Stopwatch::Running(primary)) => {
                self.replace_stopwatch(Stopwatch::Idle);
                Cancelled::Primary(primary)
            }
            (
                Effect::DiscardInterruption,
                Stopwatch::Interrupted {
                    primary,
                    interruption,
                },
            ) => {
                self.replace_stopwatch(Stopwatch::Running(primary));
                Cancelled::Interruption(interruption)
            }
            _ => Cancelled::Nothing,
        };
        tracing::debug!(?cancelled, "cancelled");
        Ok(cancelled)
    }

    fn open_primary(&mut self, primary: OpenInterval) -> Result<&OpenInterval, CoreError> {
        self.replace_stopwatch(Stopwatch::Running(primary));
        self.stopwatch()
            .active()
            .ok_or_else(|| CoreError::transition(Action::Start, Phase::Idle, "not running"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    use crate::types::{StructuredData, TagSet};

    fn t(hours: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_767_225_600, 0).unwrap() + Duration::hours(hours)
    }

    fn described(text: &str) -> FieldOptions {
        FieldOptions {
            description: Some(text.to_string()),
            ..FieldOptions::default()
        }
    }

    #[test]
    fn transition_table_rejects_invalid_actions() {
        let rejected = [
            (Action::Start, Phase::Running),
            (Action::Start, Phase::Interrupted),
            (Action::Stop, Phase::Idle),
            (Action::Stop, Phase::Interrupted),
            (Action::Interrupt, Phase::Interrupted),
            (Action::Resume, Phase::Idle),
            (Action::Resume, Phase::Running),
        ];
        for (action, phase) in rejected {
            assert!(
                transition(action, phase).is_err(),
                "{action} should be rejected while {phase}"
            );
        }
        assert_eq!(
            transition(Action::Interrupt, Phase::Idle).unwrap(),
            Effect::OpenPrimary
        );
        assert_eq!(
            transition(Action::Cancel, Phase::Idle).unwrap(),
            Effect::Nothing
        );
    }

    #[test]
    fn transition_error_message_names_reason() {
        let err = transition(Action::Start, Phase::Running).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot start while running: already running"
        );
    }

    #[test]
    fn start_then_stop_commits_record() {
        let mut ledger = Ledger::new();
        ledger.start(&described("coding"), t(0)).unwrap();
        assert_eq!(ledger.stopwatch().phase(), Phase::Running);

        let id = ledger.stop(&Closing::default(), t(2)).unwrap();
        assert_eq!(ledger.stopwatch().phase(), Phase::Idle);
        let record = ledger.record(&id).unwrap();
        assert_eq!(record.start_time, t(0));
        assert_eq!(record.end_time, t(2));
        assert_eq!(record.commit_time, t(2));
        assert_eq!(record.fields.description.as_deref(), Some("coding"));
    }

    #[test]
    fn second_start_is_rejected_and_state_kept() {
        let mut ledger = Ledger::new();
        ledger.start(&described("first"), t(0)).unwrap();
        let err = ledger.start(&described("second"), t(1)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        let active = ledger.stopwatch().active().unwrap();
        assert_eq!(active.fields.description.as_deref(), Some("first"));
        assert_eq!(active.start_time, t(0));
    }

    #[test]
    fn stop_overrides_merge_over_captured_fields() {
        let mut ledger = Ledger::new();
        let options = FieldOptions {
            description: Some("draft".to_string()),
            detail: Some("kept".to_string()),
            tags: vec!["a".to_string(), "b".to_string()],
            ..FieldOptions::default()
        };
        ledger.start(&options, t(0)).unwrap();

        let closing = Closing {
            options: FieldOptions {
                description: Some("final".to_string()),
                tags: vec!["c".to_string()],
                untags: vec!["a".to_string()],
                ..FieldOptions::default()
            },
            id: Some(RecordId::new("custom").unwrap()),
            end_time: Some(t(1)),
        };
        let id = ledger.stop(&closing, t(3)).unwrap();
        assert_eq!(id.as_str(), "custom");
        let record = ledger.record(&id).unwrap();
        assert_eq!(record.fields.description.as_deref(), Some("final"));
        assert_eq!(record.fields.detail.as_deref(), Some("kept"));
        let expected: TagSet = ["b", "c"].into_iter().collect();
        assert_eq!(record.fields.tags, expected);
        assert_eq!(record.end_time, t(1));
    }

    #[test]
    fn stop_before_start_time_is_rejected_and_still_running() {
        let mut ledger = Ledger::new();
        ledger.start(&described("x"), t(5)).unwrap();
        let closing = Closing {
            end_time: Some(t(5)),
            ..Closing::default()
        };
        let err = ledger.stop(&closing, t(6)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidInterval { .. }));
        assert_eq!(ledger.stopwatch().phase(), Phase::Running);
        assert!(ledger.records().is_empty());
    }

    #[test]
    fn interrupt_then_resume_keeps_primary_times() {
        let mut ledger = Ledger::new();
        ledger.start(&described("deep work"), t(0)).unwrap();
        assert_eq!(
            ledger.interrupt(&described("phone call"), t(1)).unwrap(),
            Phase::Interrupted
        );

        let interruption_id = ledger.resume(&Closing::default(), t(2)).unwrap();
        let interruption = ledger.record(&interruption_id).unwrap();
        assert_eq!(interruption.start_time, t(1));
        assert_eq!(interruption.end_time, t(2));
        assert_eq!(
            interruption.fields.description.as_deref(),
            Some("phone call")
        );

        let primary_id = ledger.stop(&Closing::default(), t(4)).unwrap();
        let primary = ledger.record(&primary_id).unwrap();
        assert_eq!(primary.start_time, t(0));
        assert_eq!(primary.end_time, t(4));
        assert_eq!(primary.fields.description.as_deref(), Some("deep work"));
        assert_eq!(
            primary.interruptions,
            vec![InterruptionRef {
                id: interruption_id
            }]
        );
    }

    #[test]
    fn interrupt_when_idle_acts_as_start() {
        let mut ledger = Ledger::new();
        assert_eq!(
            ledger.interrupt(&described("surprise"), t(0)).unwrap(),
            Phase::Running
        );
        let active = ledger.stopwatch().active().unwrap();
        assert_eq!(active.fields.description.as_deref(), Some("surprise"));
    }

    #[test]
    fn nested_interrupt_is_rejected() {
        let mut ledger = Ledger::new();
        ledger.start(&described("a"), t(0)).unwrap();
        ledger.interrupt(&described("b"), t(1)).unwrap();
        let err = ledger.interrupt(&described("c"), t(2)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot interrupt while interrupted: already interrupted"
        );
    }

    #[test]
    fn stop_while_interrupted_is_rejected() {
        let mut ledger = Ledger::new();
        ledger.start(&described("a"), t(0)).unwrap();
        ledger.interrupt(&described("b"), t(1)).unwrap();
        assert!(ledger.stop(&Closing::default(), t(2)).is_err());
        assert_eq!(ledger.stopwatch().phase(), Phase::Interrupted);
        assert!(ledger.records().is_empty());
    }

    #[test]
    fn resume_without_interruption_is_rejected() {
        let mut ledger = Ledger::new();
        assert!(ledger.resume(&Closing::default(), t(0)).is_err());
        ledger.start(&described("a"), t(0)).unwrap();
        let err = ledger.resume(&Closing::default(), t(1)).unwrap_err();
        assert!(err.to_string().contains("no interruption to resume"));
        assert_eq!(ledger.stopwatch().phase(), Phase::Running);
    }

    #[test]
    fn cancel_interruption_restores_primary() {
        let mut ledger = Ledger::new();
        let options = FieldOptions {
            description: Some("primary".to_string()),
            tags: vec!["focus".to_string()],
            structured_data: Some(StructuredData::new(b"ctx".to_vec())),
            ..FieldOptions::default()
        };
        ledger.start(&options, t(0)).unwrap();
        let before = ledger.stopwatch().clone();
        ledger.interrupt(&described("distraction"), t(1)).unwrap();

        let cancelled = ledger.cancel().unwrap();
        assert!(matches!(cancelled, Cancelled::Interruption(i) if i.start_time == t(1)));
        assert_eq!(ledger.stopwatch(), &before);
        assert!(ledger.records().is_empty());
    }

    #[test]
    fn cancel_primary_discards_without_record() {
        let mut ledger = Ledger::new();
        ledger.start(&described("oops"), t(0)).unwrap();
        assert!(matches!(ledger.cancel().unwrap(), Cancelled::Primary(_)));
        assert_eq!(ledger.stopwatch().phase(), Phase::Idle);
        assert!(ledger.records().is_empty());
        assert_eq!(ledger.cancel().unwrap(), Cancelled::Nothing);
    }

    #[test]
    fn toggle_starts_then_stops() {
        let mut ledger = Ledger::new();
        let options = described("toggle");
        let first = ledger
            .toggle(&options, None, &Closing::default(), t(0))
            .unwrap();
        assert_eq!(first, Toggle::Started);
        let second = ledger
            .toggle(&options, None, &Closing::default(), t(1))
            .unwrap();
        assert!(matches!(second, Toggle::Stopped(_)));
        assert_eq!(ledger.records().len(), 1);
    }

    #[test]
    fn repeated_start_stop_never_opens_two_primaries() {
        let mut ledger = Ledger::new();
        for i in 0..10 {
            let _ = ledger.start(&described("loop"), t(i * 2));
            let _ = ledger.start(&described("again"), t(i * 2));
            assert!(matches!(ledger.stopwatch(), Stopwatch::Running(_)));
            ledger.stop(&Closing::default(), t(i * 2 + 1)).unwrap();
        }
        assert_eq!(ledger.records().len(), 10);
    }

    #[test]
    fn from_parts_rejects_orphan_interruption() {
        let orphan = OpenInterval::open(t(0), Resolution::default());
        assert!(Stopwatch::from_parts(None, Some(orphan)).is_none());
        assert_eq!(Stopwatch::from_parts(None, None), Some(Stopwatch::Idle));
    }
}
