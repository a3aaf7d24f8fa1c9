//! Filter expressions over committed records.
//!
//! A query is a list of expressions combined with AND. Within one expression
//! every condition on every listed field is combined with OR. An expression
//! that lists no fields matches nothing.
//!
//! Per field:
//! - `Tags`: the record's tags intersect the wanted set, or equal it (so `[]`
//!   selects untagged records).
//! - `StartTime`/`EndTime`: compare against a resolved timespec.
//! - `Description`/`Detail`: unanchored regex search; absent text never matches.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::timespec::TimespecResolver;
use crate::types::{RecordId, TagSet, TimeRecord};

/// Comparison operator in a time condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "!=")]
    Ne,
}

impl Comparison {
    /// Evaluates `left <op> right`.
    pub fn holds<T: Ord>(self, left: &T, right: &T) -> bool {
        match self {
            Self::Lt => left < right,
            Self::Le => left <= right,
            Self::Eq => left == right,
            Self::Ge => left >= right,
            Self::Gt => left > right,
            Self::Ne => left != right,
        }
    }
}

/// A `{Condition, Timespec}` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TimeCondition {
    pub condition: Comparison,
    pub timespec: String,
}

/// One filter expression as written by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct FilterExpr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Vec<TimeCondition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Vec<TimeCondition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Vec<String>>,
}

impl FromStr for FilterExpr {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

/// A filter expression with timespecs resolved and patterns compiled.
#[derive(Debug, Clone)]
struct CompiledExpr {
    tags: Option<TagSet>,
    start_time: Option<Vec<(Comparison, DateTime<Utc>)>>,
    end_time: Option<Vec<(Comparison, DateTime<Utc>)>>,
    description: Option<Vec<Regex>>,
    detail: Option<Vec<Regex>>,
}

impl CompiledExpr {
    fn compile<R>(expr: &FilterExpr, resolver: &R, now: DateTime<Utc>) -> Result<Self, CoreError>
    where
        R: TimespecResolver + ?Sized,
    {
        Ok(Self {
            tags: expr.tags.clone(),
            start_time: resolve_conditions(expr.start_time.as_deref(), resolver, now)?,
            end_time: resolve_conditions(expr.end_time.as_deref(), resolver, now)?,
            description: compile_patterns(expr.description.as_deref())?,
            detail: compile_patterns(expr.detail.as_deref())?,
        })
    }

    fn matches(&self, record: &TimeRecord) -> bool {
        let fields = &record.fields;
        self.tags
            .as_ref()
            .is_some_and(|wanted| fields.tags.intersects(wanted) || &fields.tags == wanted)
            || time_matches(self.start_time.as_deref(), record.start_time)
            || time_matches(self.end_time.as_deref(), record.end_time)
            || text_matches(self.description.as_deref(), fields.description.as_deref())
            || text_matches(self.detail.as_deref(), fields.detail.as_deref())
    }
}

fn resolve_conditions<R>(
    conditions: Option<&[TimeCondition]>,
    resolver: &R,
    now: DateTime<Utc>,
) -> Result<Option<Vec<(Comparison, DateTime<Utc>)>>, CoreError>
where
    R: TimespecResolver + ?Sized,
{
    conditions
        .map(|conditions| {
            conditions
                .iter()
                .map(|c| Ok((c.condition, resolver.resolve(&c.timespec, now)?)))
                .collect()
        })
        .transpose()
}

fn compile_patterns(patterns: Option<&[String]>) -> Result<Option<Vec<Regex>>, CoreError> {
    patterns
        .map(|patterns| {
            patterns
                .iter()
                .map(|pattern| {
                    Regex::new(pattern).map_err(|source| CoreError::InvalidPattern {
                        pattern: pattern.clone(),
                        source,
                    })
                })
                .collect()
        })
        .transpose()
}

fn time_matches(conditions: Option<&[(Comparison, DateTime<Utc>)]>, value: DateTime<Utc>) -> bool {
    conditions.is_some_and(|conditions| {
        conditions
            .iter()
            .any(|(comparison, instant)| comparison.holds(&value, instant))
    })
}

fn text_matches(patterns: Option<&[Regex]>, value: Option<&str>) -> bool {
    match (patterns, value) {
        (Some(patterns), Some(text)) => patterns.iter().any(|re| re.is_match(text)),
        _ => false,
    }
}

/// A compiled query: every expression must match.
#[derive(Debug, Clone, Default)]
pub struct Query {
    exprs: Vec<CompiledExpr>,
}

impl Query {
    /// Resolves timespecs against `now` once and compiles every pattern.
    pub fn compile<R>(
        exprs: &[FilterExpr],
        resolver: &R,
        now: DateTime<Utc>,
    ) -> Result<Self, CoreError>
    where
        R: TimespecResolver + ?Sized,
    {
        let exprs = exprs
            .iter()
            .map(|expr| CompiledExpr::compile(expr, resolver, now))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { exprs })
    }

    pub fn matches(&self, record: &TimeRecord) -> bool {
        self.exprs.iter().all(|expr| expr.matches(record))
    }

    /// Matching records in identifier order.
    pub fn select<'a>(
        &self,
        records: &'a BTreeMap<RecordId, TimeRecord>,
    ) -> Vec<(&'a RecordId, &'a TimeRecord)> {
        records
            .iter()
            .filter(|(_, record)| self.matches(record))
            .collect()
    }
}
