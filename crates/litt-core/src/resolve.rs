//! Field resolution: alias expansion and per-field overrides.
//!
//! Every command that sets record fields goes through [`resolve`]:
//!
//! 1. An explicit `--alias` is looked up and must exist.
//! 2. Otherwise a positional token is tried as an alias key, and falls back to
//!    being the description when no alias has that key.
//! 3. The alias template seeds the fields.
//! 4. Explicit description, detail and structured data replace seeded values.
//! 5. Tags are the union of alias and explicit tags, minus any untagged ones.
//!
//! The result is a [`Patch`], which distinguishes "unset" (`None`) from
//! "explicitly cleared" (`Some` of an empty value) so the same type drives both
//! new intervals and amendments.

use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::types::{AliasKey, Fields, StructuredData, TagSet};

/// Field options as supplied on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldOptions {
    /// Positional token: alias key first, description otherwise.
    pub quicktext: Option<String>,
    pub alias: Option<AliasKey>,
    pub description: Option<String>,
    pub detail: Option<String>,
    pub tags: Vec<String>,
    pub untags: Vec<String>,
    pub structured_data: Option<StructuredData>,
}

/// Field-level changes to apply on top of an existing field set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    pub description: Option<String>,
    pub detail: Option<String>,
    pub structured_data: Option<StructuredData>,
    pub add_tags: TagSet,
    pub remove_tags: TagSet,
}

impl Patch {
    /// Applies the patch: set scalars replace, empty scalars clear, tags union
    /// then subtract. Everything else is left alone.
    pub fn apply_to(&self, fields: &mut Fields) {
        if let Some(description) = &self.description {
            fields.description = non_empty(description);
        }
        if let Some(detail) = &self.detail {
            fields.detail = non_empty(detail);
        }
        if let Some(data) = &self.structured_data {
            fields.structured_data = (!data.is_empty()).then(|| data.clone());
        }
        fields.tags.extend_from(&self.add_tags);
        fields.tags.remove_all(&self.remove_tags);
    }

    /// Builds a fresh field set from this patch alone.
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::default();
        self.apply_to(&mut fields);
        fields
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Result of resolving field options against the alias table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// The alias that seeded the fields, if any.
    pub alias: Option<AliasKey>,
    pub patch: Patch,
}

/// Which alias (if any) the options select, and the description the positional
/// token contributes when it is not an alias key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasLookup {
    pub alias: Option<AliasKey>,
    pub fallback_description: Option<String>,
}

/// Decides whether the options name an alias.
///
/// An explicit alias wins over the positional token; an explicit alias that is
/// missing from the table is an error.
pub fn lookup_alias(
    options: &FieldOptions,
    aliases: &BTreeMap<AliasKey, Fields>,
) -> Result<AliasLookup, CoreError> {
    if let Some(key) = &options.alias {
        if !aliases.contains_key(key) {
            return Err(CoreError::UnknownAlias(key.clone()));
        }
        let fallback_description = options
            .quicktext
            .as_deref()
            .filter(|text| !AliasKey::new(*text).is_ok_and(|k| aliases.contains_key(&k)))
            .map(str::to_string);
        return Ok(AliasLookup {
            alias: Some(key.clone()),
            fallback_description,
        });
    }

    let Some(text) = options.quicktext.as_deref() else {
        return Ok(AliasLookup::default());
    };
    match AliasKey::new(text) {
        Ok(key) if aliases.contains_key(&key) => Ok(AliasLookup {
            alias: Some(key),
            fallback_description: None,
        }),
        _ => Ok(AliasLookup {
            alias: None,
            fallback_description: Some(text.to_string()),
        }),
    }
}

/// Resolves options into a patch, expanding any alias.
pub fn resolve(
    options: &FieldOptions,
    aliases: &BTreeMap<AliasKey, Fields>,
) -> Result<Resolution, CoreError> {
    let lookup = lookup_alias(options, aliases)?;
    let template = lookup
        .alias
        .as_ref()
        .and_then(|key| aliases.get(key))
        .cloned()
        .unwrap_or_default();

    let mut patch = explicit_patch(options);
    patch.description = patch
        .description
        .or(lookup.fallback_description)
        .or(template.description);
    patch.detail = patch.detail.or(template.detail);
    patch.structured_data = patch.structured_data.or(template.structured_data);
    patch.add_tags.extend_from(&template.tags);

    if let Some(alias) = &lookup.alias {
        tracing::debug!(%alias, "expanded alias");
    }

    Ok(Resolution {
        alias: lookup.alias,
        patch,
    })
}

/// Builds a patch from explicit options only, without consulting aliases.
///
/// Used by amend, where unset fields must stay untouched.
pub fn explicit_patch(options: &FieldOptions) -> Patch {
    Patch {
        description: options.description.clone(),
        detail: options.detail.clone(),
        structured_data: options.structured_data.clone(),
        add_tags: options.tags.iter().cloned().collect(),
        remove_tags: options.untags.iter().cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> AliasKey {
        AliasKey::new(s).unwrap()
    }

    fn tags(items: &[&str]) -> TagSet {
        items.iter().copied().collect()
    }

    fn table() -> BTreeMap<AliasKey, Fields> {
        let mut aliases = BTreeMap::new();
        aliases.insert(
            key("standup"),
            Fields {
                description: Some("Daily standup".to_string()),
                detail: Some("Team sync".to_string()),
                tags: tags(&["meeting", "team"]),
                structured_data: Some(StructuredData::new(b"sd".to_vec())),
            },
        );
        aliases
    }

    #[test]
    fn positional_alias_seeds_fields() {
        let options = FieldOptions {
            quicktext: Some("standup".to_string()),
            ..FieldOptions::default()
        };
        let resolution = resolve(&options, &table()).unwrap();
        assert_eq!(resolution.alias, Some(key("standup")));
        let fields = resolution.patch.to_fields();
        assert_eq!(fields.description.as_deref(), Some("Daily standup"));
        assert_eq!(fields.detail.as_deref(), Some("Team sync"));
        assert_eq!(fields.tags, tags(&["meeting", "team"]));
    }

    #[test]
    fn positional_non_alias_becomes_description() {
        let options = FieldOptions {
            quicktext: Some("write report".to_string()),
            ..FieldOptions::default()
        };
        let resolution = resolve(&options, &table()).unwrap();
        assert!(resolution.alias.is_none());
        assert_eq!(
            resolution.patch.description.as_deref(),
            Some("write report")
        );
    }

    #[test]
    fn explicit_description_beats_positional_text() {
        let options = FieldOptions {
            quicktext: Some("write report".to_string()),
            description: Some("Quarterly report".to_string()),
            ..FieldOptions::default()
        };
        let resolution = resolve(&options, &table()).unwrap();
        assert_eq!(
            resolution.patch.description.as_deref(),
            Some("Quarterly report")
        );
    }

    #[test]
    fn explicit_fields_override_alias() {
        let options = FieldOptions {
            alias: Some(key("standup")),
            description: Some("Retro".to_string()),
            tags: vec!["extra".to_string()],
            untags: vec!["team".to_string(), "never-there".to_string()],
            ..FieldOptions::default()
        };
        let fields = resolve(&options, &table()).unwrap().patch.to_fields();
        assert_eq!(fields.description.as_deref(), Some("Retro"));
        assert_eq!(fields.detail.as_deref(), Some("Team sync"));
        assert_eq!(fields.tags, tags(&["extra", "meeting"]));
    }

    #[test]
    fn unknown_explicit_alias_fails() {
        let options = FieldOptions {
            alias: Some(key("nope")),
            ..FieldOptions::default()
        };
        let err = resolve(&options, &table()).unwrap_err();
        assert!(matches!(err, CoreError::UnknownAlias(k) if k.as_str() == "nope"));
    }

    #[test]
    fn explicit_alias_keeps_positional_as_description() {
        let options = FieldOptions {
            alias: Some(key("standup")),
            quicktext: Some("ran long".to_string()),
            ..FieldOptions::default()
        };
        let fields = resolve(&options, &table()).unwrap().patch.to_fields();
        assert_eq!(fields.description.as_deref(), Some("ran long"));
    }

    #[test]
    fn patch_leaves_unset_fields_alone() {
        let mut fields = Fields {
            description: Some("keep".to_string()),
            detail: Some("also keep".to_string()),
            tags: tags(&["a"]),
            structured_data: None,
        };
        let patch = explicit_patch(&FieldOptions {
            tags: vec!["b".to_string()],
            ..FieldOptions::default()
        });
        patch.apply_to(&mut fields);
        assert_eq!(fields.description.as_deref(), Some("keep"));
        assert_eq!(fields.detail.as_deref(), Some("also keep"));
        assert_eq!(fields.tags, tags(&["a", "b"]));
    }

    #[test]
    fn empty_value_clears_field() {
        let mut fields = Fields {
            detail: Some("old".to_string()),
            ..Fields::default()
        };
        let patch = explicit_patch(&FieldOptions {
            detail: Some(String::new()),
            ..FieldOptions::default()
        });
        patch.apply_to(&mut fields);
        assert!(fields.detail.is_none());
    }
}
