//! Persisted filter selection and saved presets.
//!
//! Both stores write through to a [`KeyValueStore`] on every mutation and
//! read once at construction. Missing or corrupt stored JSON loads as the
//! empty default.

use std::sync::Arc;

use chrono::Utc;
use internship_core::{FilterKey, FilterPatch, Filters, SavedPreference};
use internship_storage::{KeyValueStore, StorageError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

pub const FILTERS_KEY: &str = "internshipFilters";
pub const PREFERENCES_KEY: &str = "userPreferences";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to serialize {key}: {source}")]
    Serialize {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("preset name must not be blank")]
    BlankName,
    #[error("no saved preset with id '{0}'")]
    UnknownPreset(String),
}

fn load_or_default<T: DeserializeOwned + Default>(kv: &dyn KeyValueStore, key: &'static str) -> T {
    let raw = match kv.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(err) => {
            warn!(key, error = %err, "stored state unreadable; using defaults");
            return T::default();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|err| {
        warn!(key, error = %err, "stored state corrupt; using defaults");
        T::default()
    })
}

fn persist<T: Serialize>(kv: &dyn KeyValueStore, key: &'static str, value: &T) -> Result<(), StoreError> {
    let text = serde_json::to_string(value).map_err(|source| StoreError::Serialize { key, source })?;
    kv.set(key, &text)?;
    debug!(key, bytes = text.len(), "persisted state");
    Ok(())
}

/// Current filter selection. Mutations apply in memory first; a failed
/// write is reported but the in-memory state keeps the change.
pub struct FilterStore {
    kv: Arc<dyn KeyValueStore>,
    current: Filters,
}

impl FilterStore {
    pub fn load(kv: Arc<dyn KeyValueStore>) -> Self {
        let current = load_or_default(kv.as_ref(), FILTERS_KEY);
        Self { kv, current }
    }

    pub fn get(&self) -> &Filters {
        &self.current
    }

    pub fn update(&mut self, patch: FilterPatch) -> Result<(), StoreError> {
        self.current.merge(patch);
        self.save()
    }

    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.current = Filters::default();
        self.save()
    }

    pub fn clear_one(&mut self, key: FilterKey) -> Result<(), StoreError> {
        self.current.clear_key(key);
        self.save()
    }

    fn save(&self) -> Result<(), StoreError> {
        persist(self.kv.as_ref(), FILTERS_KEY, &self.current)
    }
}

/// Named filter snapshots, kept in creation order.
pub struct PreferenceStore {
    kv: Arc<dyn KeyValueStore>,
    presets: Vec<SavedPreference>,
}

impl PreferenceStore {
    pub fn load(kv: Arc<dyn KeyValueStore>) -> Self {
        let presets = load_or_default(kv.as_ref(), PREFERENCES_KEY);
        Self { kv, presets }
    }

    pub fn list(&self) -> &[SavedPreference] {
        &self.presets
    }

    pub fn find(&self, id: &str) -> Option<&SavedPreference> {
        self.presets.iter().find(|p| p.id == id)
    }

    pub fn save(&mut self, name: &str, filters: Filters) -> Result<SavedPreference, StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::BlankName);
        }
        let preset = SavedPreference::new(name, filters, Utc::now());
        self.presets.push(preset.clone());
        self.persist()?;
        Ok(preset)
    }

    /// Returns whether a preset was removed. Unknown ids are a no-op.
    pub fn delete(&mut self, id: &str) -> Result<bool, StoreError> {
        let before = self.presets.len();
        self.presets.retain(|p| p.id != id);
        if self.presets.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    /// Shallow-merges the preset into the current filter selection.
    pub fn apply(&self, id: &str, filters: &mut FilterStore) -> Result<Filters, StoreError> {
        let preset = self
            .find(id)
            .ok_or_else(|| StoreError::UnknownPreset(id.to_string()))?;
        filters.update(FilterPatch::from(preset.filters.clone()))?;
        Ok(filters.get().clone())
    }

    fn persist(&self) -> Result<(), StoreError> {
        persist(self.kv.as_ref(), PREFERENCES_KEY, &self.presets)
    }
}
