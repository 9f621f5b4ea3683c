//! Declared key entries and the set that holds them.
//!
//! Entries arrive from the host as loosely shaped wire messages. They are
//! decoded here, once, into [`KeyEntry`] values; everything downstream works
//! with the typed form.

use crate::proto::{self, key::Fallback};
use crate::{ProviderError, Result};
use std::collections::btree_map::{self, BTreeMap};
use std::collections::HashMap;
use std::fmt;

/// Fallback used when the store has nothing at a key's path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultValue {
    String(String),
    Bool(bool),
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::String(value) => f.write_str(value),
            DefaultValue::Bool(value) => write!(f, "{}", value),
        }
    }
}

/// One declared name/path binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    pub name: String,
    pub path: String,
    pub literal_value: Option<String>,
    pub default_value: Option<DefaultValue>,
    pub delete_on_destroy: bool,
    pub resolved_value: Option<String>,
}

impl KeyEntry {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            literal_value: None,
            default_value: None,
            delete_on_destroy: false,
            resolved_value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.literal_value = Some(value.into());
        self
    }

    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default_value = Some(default);
        self
    }

    pub fn with_delete(mut self, delete: bool) -> Self {
        self.delete_on_destroy = delete;
        self
    }

    /// The value to push to the store, if this entry declares one.
    ///
    /// An empty literal counts as no literal.
    pub fn write_intent(&self) -> Option<&str> {
        self.literal_value.as_deref().filter(|value| !value.is_empty())
    }

    /// Equality ignoring the computed value.
    fn same_declaration(&self, other: &KeyEntry) -> bool {
        self.name == other.name
            && self.path == other.path
            && self.literal_value == other.literal_value
            && self.default_value == other.default_value
            && self.delete_on_destroy == other.delete_on_destroy
    }
}

impl TryFrom<proto::Key> for KeyEntry {
    type Error = ProviderError;

    fn try_from(key: proto::Key) -> Result<Self> {
        if key.name.is_empty() {
            return Err(ProviderError::InvalidInput(format!(
                "key with path '{}' is missing a name",
                key.path
            )));
        }
        if key.path.is_empty() {
            return Err(ProviderError::InvalidInput(format!(
                "Failed to get path for key '{}'",
                key.name
            )));
        }

        let default_value = key.fallback.map(|fallback| match fallback {
            Fallback::DefaultString(value) => DefaultValue::String(value),
            Fallback::DefaultBool(value) => DefaultValue::Bool(value),
        });

        Ok(Self {
            name: key.name,
            path: key.path,
            literal_value: key.value,
            default_value,
            delete_on_destroy: key.delete.unwrap_or(false),
            resolved_value: key.resolved_value,
        })
    }
}

impl From<&KeyEntry> for proto::Key {
    fn from(entry: &KeyEntry) -> Self {
        proto::Key {
            name: entry.name.clone(),
            path: entry.path.clone(),
            value: entry.literal_value.clone(),
            fallback: entry.default_value.as_ref().map(|default| match default {
                DefaultValue::String(value) => Fallback::DefaultString(value.clone()),
                DefaultValue::Bool(value) => Fallback::DefaultBool(*value),
            }),
            delete: Some(entry.delete_on_destroy),
            resolved_value: entry.resolved_value.clone(),
        }
    }
}

/// The declared keys of one `etcd_keys` instance, ordered by `(name, path)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet {
    entries: BTreeMap<(String, String), KeyEntry>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry.
    ///
    /// Re-adding an identical declaration is a no-op. A differing declaration
    /// with the same `(name, path)`, or a name already bound to another path,
    /// is rejected.
    pub fn insert(&mut self, entry: KeyEntry) -> Result<()> {
        if let Some(other) = self
            .entries
            .values()
            .find(|other| other.name == entry.name && other.path != entry.path)
        {
            return Err(ProviderError::InvalidInput(format!(
                "key '{}' is bound to both '{}' and '{}'",
                entry.name, other.path, entry.path
            )));
        }

        match self
            .entries
            .entry((entry.name.clone(), entry.path.clone()))
        {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(entry);
                Ok(())
            }
            btree_map::Entry::Occupied(slot) if slot.get().same_declaration(&entry) => Ok(()),
            btree_map::Entry::Occupied(_) => Err(ProviderError::InvalidInput(format!(
                "key '{}' at '{}' is declared twice with different settings",
                entry.name, entry.path
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str, path: &str) -> Option<&KeyEntry> {
        self.entries.get(&(name.to_string(), path.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyEntry> {
        self.entries.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut KeyEntry> {
        self.entries.values_mut()
    }

    /// Decodes and validates wire entries.
    pub fn from_proto(keys: Vec<proto::Key>) -> Result<Self> {
        let mut set = KeySet::new();
        for key in keys {
            set.insert(KeyEntry::try_from(key)?)?;
        }
        Ok(set)
    }

    pub fn to_proto(&self) -> Vec<proto::Key> {
        self.iter().map(proto::Key::from).collect()
    }

    /// `name -> resolved value` for every entry that has one.
    pub fn vars(&self) -> HashMap<String, String> {
        self.iter()
            .filter_map(|entry| {
                entry
                    .resolved_value
                    .as_ref()
                    .map(|value| (entry.name.clone(), value.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str, path: &str) -> proto::Key {
        proto::Key {
            name: name.to_string(),
            path: path.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn decodes_defaults_and_flags() {
        let mut raw = key("enabled", "/feature/enabled");
        raw.fallback = Some(Fallback::DefaultBool(true));
        raw.delete = Some(true);

        let entry = KeyEntry::try_from(raw).unwrap();
        assert_eq!(entry.default_value, Some(DefaultValue::Bool(true)));
        assert_eq!(entry.default_value.unwrap().to_string(), "true");
        assert!(entry.delete_on_destroy);
        assert_eq!(entry.literal_value, None);
    }

    #[test]
    fn delete_defaults_to_false() {
        let entry = KeyEntry::try_from(key("a", "/x")).unwrap();
        assert!(!entry.delete_on_destroy);
    }

    #[test]
    fn rejects_missing_name_or_path() {
        let err = KeyEntry::try_from(key("", "/x")).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidInput(_)));

        let err = KeyEntry::try_from(key("a", "")).unwrap_err();
        assert!(err.to_string().contains("'a'"));
    }

    #[test]
    fn empty_literal_is_not_a_write() {
        assert_eq!(KeyEntry::new("a", "/x").with_value("").write_intent(), None);
        assert_eq!(
            KeyEntry::new("a", "/x").with_value("1").write_intent(),
            Some("1")
        );
    }

    #[test]
    fn identical_duplicates_collapse() {
        let set = KeySet::from_proto(vec![key("a", "/x"), key("a", "/x")]).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn conflicting_duplicates_are_rejected() {
        let mut with_value = key("a", "/x");
        with_value.value = Some("1".to_string());
        assert!(KeySet::from_proto(vec![key("a", "/x"), with_value]).is_err());
    }

    #[test]
    fn one_name_cannot_bind_two_paths() {
        let err = KeySet::from_proto(vec![key("a", "/x"), key("a", "/y")]).unwrap_err();
        assert!(err.to_string().contains("bound to both"));
    }

    #[test]
    fn shared_paths_are_allowed() {
        let set = KeySet::from_proto(vec![key("a", "/x"), key("b", "/x")]).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn iterates_in_identity_order() {
        let set = KeySet::from_proto(vec![key("c", "/3"), key("a", "/1"), key("b", "/2")]).unwrap();
        let names: Vec<_> = set.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn proto_conversion_keeps_declaration() {
        let entry = KeyEntry::new("a", "/x")
            .with_default(DefaultValue::String("fallback".to_string()))
            .with_delete(true);
        let back = KeyEntry::try_from(proto::Key::from(&entry)).unwrap();
        assert_eq!(back, entry);
    }
}
