//! Persisted view and sort preferences.
//!
//! The record is stored as JSON under [`PREFERENCES_KEY`] and rewritten after every
//! change. Fields missing from the stored record take their defaults.

use std::{fmt, str::FromStr, sync::Arc};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::storage::{KeyValueStore, StorageError, PREFERENCES_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Grid,
    #[default]
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn toggled(self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Name,
    ModTime,
    Size,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Grid => "grid",
            ViewMode::List => "list",
        }
    }
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Name => "name",
            SortBy::ModTime => "mod_time",
            SortBy::Size => "size",
        }
    }
}

macro_rules! display_and_parse {
    ($ty:ty, [$($variant:expr),+]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                [$($variant),+]
                    .into_iter()
                    .find(|candidate| candidate.as_str() == s)
                    .ok_or_else(|| {
                        let expected: Vec<&str> = [$($variant),+].iter().map(|v| v.as_str()).collect();
                        format!("invalid value '{s}', expected one of: {}", expected.join(", "))
                    })
            }
        }
    };
}

display_and_parse!(ViewMode, [ViewMode::Grid, ViewMode::List]);
display_and_parse!(SortOrder, [SortOrder::Asc, SortOrder::Desc]);
display_and_parse!(SortBy, [SortBy::Name, SortBy::ModTime, SortBy::Size]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    pub view_mode: ViewMode,
    pub sort_order: SortOrder,
    pub sort_by: SortBy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Overwrite `target` with the stored value under `key`, if there is a readable one
fn merge_field<T: DeserializeOwned>(stored: &Map<String, Value>, key: &str, target: &mut T) {
    let Some(value) = stored.get(key) else {
        return;
    };

    match T::deserialize(value) {
        Ok(parsed) => *target = parsed,
        Err(err) => warn!(key, error = %err, "ignoring unreadable stored preference"),
    }
}

pub struct PreferencesStore<K: ?Sized> {
    store: Arc<K>,
    preferences: Preferences,
}

impl<K: KeyValueStore + ?Sized> PreferencesStore<K> {
    /// Read the stored record, merging it over the defaults field by field. A field
    /// that cannot be read keeps its default without affecting the others.
    pub fn load(store: Arc<K>) -> Self {
        let mut preferences = Preferences::default();

        if let Some(raw) = store.get(PREFERENCES_KEY) {
            match serde_json::from_str::<Map<String, Value>>(&raw) {
                Ok(stored) => {
                    merge_field(&stored, "viewMode", &mut preferences.view_mode);
                    merge_field(&stored, "sortOrder", &mut preferences.sort_order);
                    merge_field(&stored, "sortBy", &mut preferences.sort_by);
                    merge_field(&stored, "name", &mut preferences.name);
                }
                Err(err) => {
                    warn!(error = %err, "stored preferences are unreadable, using defaults");
                }
            }
        }

        PreferencesStore { store, preferences }
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn view_mode(&self) -> ViewMode {
        self.preferences.view_mode
    }

    pub fn sort_order(&self) -> SortOrder {
        self.preferences.sort_order
    }

    pub fn sort_by(&self) -> SortBy {
        self.preferences.sort_by
    }

    pub fn name(&self) -> Option<&str> {
        self.preferences.name.as_deref()
    }

    pub fn set_view_mode(&mut self, view_mode: ViewMode) -> Result<(), StorageError> {
        self.preferences.view_mode = view_mode;
        self.persist()
    }

    pub fn set_sort_order(&mut self, sort_order: SortOrder) -> Result<(), StorageError> {
        self.preferences.sort_order = sort_order;
        self.persist()
    }

    pub fn toggle_sort_order(&mut self) -> Result<(), StorageError> {
        self.preferences.sort_order = self.preferences.sort_order.toggled();
        self.persist()
    }

    pub fn set_sort_by(&mut self, sort_by: SortBy) -> Result<(), StorageError> {
        self.preferences.sort_by = sort_by;
        self.persist()
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), StorageError> {
        self.preferences.name = Some(name.into());
        self.persist()
    }

    fn persist(&self) -> Result<(), StorageError> {
        let json = serde_json::to_string(&self.preferences).map_err(StorageError::Serialize)?;
        self.store.set(PREFERENCES_KEY, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn defaults_when_nothing_is_stored() {
        let prefs = PreferencesStore::load(Arc::new(MemoryStore::new()));
        assert_eq!(prefs.view_mode(), ViewMode::List);
        assert_eq!(prefs.sort_order(), SortOrder::Desc);
        assert_eq!(prefs.sort_by(), SortBy::Name);
        assert_eq!(prefs.name(), None);
    }

    #[test]
    fn stored_fields_override_defaults() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(PREFERENCES_KEY, r#"{"viewMode":"grid","sortBy":"mod_time"}"#)
            .unwrap();

        let prefs = PreferencesStore::load(store);
        assert_eq!(prefs.view_mode(), ViewMode::Grid);
        assert_eq!(prefs.sort_by(), SortBy::ModTime);
        assert_eq!(prefs.sort_order(), SortOrder::Desc);
    }

    #[test]
    fn unreadable_record_falls_back_to_defaults() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(PREFERENCES_KEY, r#"{"viewMode":"carousel"}"#)
            .unwrap();

        let prefs = PreferencesStore::load(store);
        assert_eq!(prefs.preferences(), &Preferences::default());
    }

    #[test]
    fn one_bad_field_keeps_the_other_stored_fields() {
        let store = Arc::new(MemoryStore::new());
        store
            .set(
                PREFERENCES_KEY,
                r#"{"viewMode":"carousel","sortBy":"size","sortOrder":"asc","name":"Maria"}"#,
            )
            .unwrap();

        let prefs = PreferencesStore::load(store);
        assert_eq!(prefs.view_mode(), ViewMode::List);
        assert_eq!(prefs.sort_by(), SortBy::Size);
        assert_eq!(prefs.sort_order(), SortOrder::Asc);
        assert_eq!(prefs.name(), Some("Maria"));
    }

    #[test]
    fn record_that_is_not_an_object_uses_defaults() {
        let store = Arc::new(MemoryStore::new());
        store.set(PREFERENCES_KEY, "[1, 2]").unwrap();

        let prefs = PreferencesStore::load(store);
        assert_eq!(prefs.preferences(), &Preferences::default());
    }

    #[test]
    fn every_setter_persists() {
        let store = Arc::new(MemoryStore::new());
        let mut prefs = PreferencesStore::load(store.clone());

        prefs.set_view_mode(ViewMode::Grid).unwrap();
        assert_eq!(
            store.get(PREFERENCES_KEY).as_deref(),
            Some(r#"{"viewMode":"grid","sortOrder":"desc","sortBy":"name"}"#)
        );

        prefs.toggle_sort_order().unwrap();
        prefs.set_sort_by(SortBy::Size).unwrap();
        prefs.set_name("Maria").unwrap();

        let reloaded = PreferencesStore::load(store);
        assert_eq!(reloaded.view_mode(), ViewMode::Grid);
        assert_eq!(reloaded.sort_order(), SortOrder::Asc);
        assert_eq!(reloaded.sort_by(), SortBy::Size);
        assert_eq!(reloaded.name(), Some("Maria"));
    }

    #[test]
    fn toggling_twice_restores_order() {
        let mut prefs = PreferencesStore::load(Arc::new(MemoryStore::new()));
        prefs.set_sort_order(SortOrder::Asc).unwrap();
        prefs.toggle_sort_order().unwrap();
        assert_eq!(prefs.sort_order(), SortOrder::Desc);
        prefs.toggle_sort_order().unwrap();
        assert_eq!(prefs.sort_order(), SortOrder::Asc);
    }

    #[test]
    fn parses_cli_values() {
        assert_eq!("grid".parse::<ViewMode>(), Ok(ViewMode::Grid));
        assert_eq!("mod_time".parse::<SortBy>(), Ok(SortBy::ModTime));
        assert_eq!("asc".parse::<SortOrder>(), Ok(SortOrder::Asc));
        assert!("sideways".parse::<SortOrder>().is_err());
        assert_eq!(SortBy::ModTime.to_string(), "mod_time");
    }
}
