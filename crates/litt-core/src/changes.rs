//! Old/new images of everything a command touched.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::types::{AliasKey, Fields, RecordId, TimeRecord};

/// Before and after images of one record or alias. `None` means absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change<T> {
    pub old: Option<T>,
    pub new: Option<T>,
}

/// All record and alias changes made to a ledger since it was loaded.
///
/// Repeated changes to the same key keep the first old image and the latest
/// new image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    records: BTreeMap<RecordId, Change<TimeRecord>>,
    aliases: BTreeMap<AliasKey, Change<Fields>>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.aliases.is_empty()
    }

    pub const fn records(&self) -> &BTreeMap<RecordId, Change<TimeRecord>> {
        &self.records
    }

    pub const fn aliases(&self) -> &BTreeMap<AliasKey, Change<Fields>> {
        &self.aliases
    }

    pub(crate) fn record_changed(
        &mut self,
        id: &RecordId,
        old: Option<TimeRecord>,
        new: Option<TimeRecord>,
    ) {
        self.records
            .entry(id.clone())
            .or_insert(Change { old, new: None })
            .new = new;
    }

    pub(crate) fn alias_changed(
        &mut self,
        key: &AliasKey,
        old: Option<Fields>,
        new: Option<Fields>,
    ) {
        self.aliases
            .entry(key.clone())
            .or_insert(Change { old, new: None })
            .new = new;
    }

    /// The hook payload for commit events.
    ///
    /// ```json
    /// {"Records": {"OldImage": {"<id>": null}, "NewImage": {"<id>": {...}}},
    ///  "Aliases": {"OldImage": {}, "NewImage": {}}}
    /// ```
    ///
    /// `null` when nothing changed.
    pub fn to_payload(&self) -> Result<Value, serde_json::Error> {
        if self.is_empty() {
            return Ok(Value::Null);
        }
        Ok(json!({
            "Records": images(&self.records)?,
            "Aliases": images(&self.aliases)?,
        }))
    }
}

fn images<K: AsRef<str>, T: Serialize>(
    changes: &BTreeMap<K, Change<T>>,
) -> Result<Value, serde_json::Error> {
    let mut old_image = Map::new();
    let mut new_image = Map::new();
    for (key, change) in changes {
        old_image.insert(key.as_ref().to_string(), serde_json::to_value(&change.old)?);
        new_image.insert(key.as_ref().to_string(), serde_json::to_value(&change.new)?);
    }
    Ok(json!({ "OldImage": old_image, "NewImage": new_image }))
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::DateTime;

    fn record(description: &str) -> TimeRecord {
        TimeRecord {
            start_time: DateTime::from_timestamp(100, 0).unwrap(),
            end_time: DateTime::from_timestamp(200, 0).unwrap(),
            commit_time: DateTime::from_timestamp(200, 0).unwrap(),
            fields: Fields {
                description: Some(description.to_string()),
                ..Fields::default()
            },
            interruptions: Vec::new(),
        }
    }

    #[test]
    fn empty_change_set_is_null_payload() {
        assert_eq!(ChangeSet::default().to_payload().unwrap(), Value::Null);
    }

    #[test]
    fn repeated_changes_keep_first_old_image() {
        let id = RecordId::new("r").unwrap();
        let mut changes = ChangeSet::default();
        changes.record_changed(&id, Some(record("a")), Some(record("b")));
        changes.record_changed(&id, Some(record("b")), Some(record("c")));
        let change = &changes.records()[&id];
        assert_eq!(change.old, Some(record("a")));
        assert_eq!(change.new, Some(record("c")));
    }

    #[test]
    fn payload_shape() {
        let id = RecordId::new("r").unwrap();
        let mut changes = ChangeSet::default();
        changes.record_changed(&id, None, Some(record("new")));
        let payload = changes.to_payload().unwrap();
        insta::assert_snapshot!(serde_json::to_string(&payload).unwrap(), @r#"{"Aliases":{"NewImage":{},"OldImage":{}},"Records":{"NewImage":{"r":{"CommitTime":200,"Description":"new","EndTime":200,"StartTime":100}},"OldImage":{"r":null}}}"#);
    }
}
