//! Resolving free-form timespecs into instants.
//!
//! Resolution is a capability handed to the ledger and query engine, so tests
//! and alternative front ends can substitute their own clock and grammar.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A timespec that could not be turned into an instant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unable to parse timespec {text:?}")]
pub struct ResolutionError {
    pub text: String,
}

impl ResolutionError {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Converts timespec text into an absolute instant relative to `now`.
pub trait TimespecResolver {
    fn resolve(&self, text: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ResolutionError>;
}

/// Order of day and month in numeric dates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Uk,
    Us,
}

impl From<Dialect> for chrono_english::Dialect {
    fn from(value: Dialect) -> Self {
        match value {
            Dialect::Uk => Self::Uk,
            Dialect::Us => Self::Us,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uk => write!(f, "uk"),
            Self::Us => write!(f, "us"),
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uk" => Ok(Self::Uk),
            "us" => Ok(Self::Us),
            _ => Err(format!("unknown date dialect: {s}")),
        }
    }
}

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").unwrap());

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Formats accepted as a local wall-clock time.
const LOCAL_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// Default resolver for user-typed timespecs, interpreted in the local zone.
///
/// Supports:
/// - `now`, `now UTC`
/// - RFC 3339: "2026-01-15T10:30:00Z"
/// - Local wall-clock: "2026-01-15 10:30"
/// - Relative: "2 hours ago", "30 minutes ago", "1 week ago"
/// - Anything `chrono-english` understands: "yesterday 5pm", "last monday"
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalTimespecs {
    dialect: Dialect,
}

impl NaturalTimespecs {
    pub const fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }
}

impl TimespecResolver for NaturalTimespecs {
    fn resolve(&self, text: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, ResolutionError> {
        let trimmed = text.trim();
        let lowered = trimmed.to_lowercase();
        if lowered == "now" || lowered == "now utc" {
            return Ok(now);
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(dt.with_timezone(&Utc));
        }

        for format in LOCAL_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Local
                    .from_local_datetime(&naive)
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok_or_else(|| ResolutionError::new(text));
            }
        }

        if let Some(caps) = RELATIVE_TIME_RE.captures(&lowered) {
            return relative(&caps[1], &caps[2], now).ok_or_else(|| ResolutionError::new(text));
        }

        chrono_english::parse_date_string(trimmed, now.with_timezone(&Local), self.dialect.into())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                tracing::debug!(timespec = text, error = %e, "natural language parse failed");
                ResolutionError::new(text)
            })
    }
}

fn relative(amount: &str, unit: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let n: i64 = amount.parse().ok()?;
    let (max_for_unit, minutes_per_unit) = match unit {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        _ => return None,
    };
    if n > max_for_unit {
        return None;
    }
    Some(now - Duration::minutes(n * minutes_per_unit))
}
