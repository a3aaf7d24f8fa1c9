//! Lifecycle points external hooks can attach to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical hook events, in the order a mutating command raises them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// Before the ledger is read. Payload is `null`.
    PreLoad,
    /// Before the ledger is written. Payload is the change set.
    PreCommit,
    /// After the ledger is written. Payload is the change set.
    PostCommit,
    /// Before the configuration is written. Payload is the configuration.
    PreConfigWrite,
    /// After the configuration is written.
    PostConfigWrite,
}

impl HookEvent {
    pub const ALL: [Self; 5] = [
        Self::PreLoad,
        Self::PreCommit,
        Self::PostCommit,
        Self::PreConfigWrite,
        Self::PostConfigWrite,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PreLoad => "pre_load",
            Self::PreCommit => "pre_commit",
            Self::PostCommit => "post_commit",
            Self::PreConfigWrite => "pre_config_write",
            Self::PostConfigWrite => "post_config_write",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HookEvent {
    type Err = UnknownHookEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| UnknownHookEvent(s.to_string()))
    }
}

impl Serialize for HookEvent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HookEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown hook event strings.
#[derive(Debug, Clone)]
pub struct UnknownHookEvent(String);

impl fmt::Display for UnknownHookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown hook event: {}", self.0)
    }
}

impl std::error::Error for UnknownHookEvent {}

/// Receives lifecycle notifications.
///
/// An error aborts the command; for [`HookEvent::PreCommit`] that happens
/// before anything is written.
pub trait HookDispatcher {
    type Error;

    fn dispatch(&self, event: HookEvent, payload: &Value) -> Result<(), Self::Error>;
}

/// Dispatcher that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl HookDispatcher for NoHooks {
    type Error = std::convert::Infallible;

    fn dispatch(&self, _event: HookEvent, _payload: &Value) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_variants() {
        for event in HookEvent::ALL {
            let parsed: HookEvent = event.to_string().parse().expect("should parse");
            assert_eq!(parsed, event, "roundtrip failed for {event:?}");
        }
    }

    #[test]
    fn unknown_event_errors() {
        let err = "post_load".parse::<HookEvent>().unwrap_err();
        assert_eq!(err.to_string(), "unknown hook event: post_load");
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&HookEvent::PreConfigWrite).unwrap();
        assert_eq!(json, "\"pre_config_write\"");
    }
}
