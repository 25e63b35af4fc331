use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::{key_is_within, normalize_key, RegistryView, SettingsStore};

/// Keys mapped to their named values, both stored in canonical form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct SettingsTree {
    keys: BTreeMap<String, BTreeMap<String, String>>,
}

impl SettingsTree {
    pub(crate) fn get(&self, key: &str, value: &str) -> Option<&String> {
        self.keys
            .get(&normalize_key(key))
            .and_then(|values| values.get(&value.to_ascii_lowercase()))
    }

    pub(crate) fn set(&mut self, key: &str, value: &str, data: &str) {
        self.keys
            .entry(normalize_key(key))
            .or_default()
            .insert(value.to_ascii_lowercase(), data.to_string());
    }

    pub(crate) fn remove_tree(&mut self, key: &str) -> usize {
        let root = normalize_key(key);
        let before = self.keys.len();
        self.keys.retain(|candidate, _| !key_is_within(candidate, &root));
        before - self.keys.len()
    }
}

/// In-process store, used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    views: Mutex<BTreeMap<RegistryView, SettingsTree>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(self, view: RegistryView, key: &str, value: &str, data: &str) -> Self {
        if let Ok(mut views) = self.views.lock() {
            views.entry(view).or_default().set(key, value, data);
        }
        self
    }

    pub fn key_exists(&self, view: RegistryView, key: &str) -> bool {
        let root = normalize_key(key);
        self.views.lock().is_ok_and(|views| {
            views
                .get(&view)
                .is_some_and(|tree| tree.keys.keys().any(|candidate| key_is_within(candidate, &root)))
        })
    }
}

impl SettingsStore for MemorySettingsStore {
    fn read(&self, view: RegistryView, key: &str, value: &str) -> Result<Option<String>> {
        let views = self
            .views
            .lock()
            .map_err(|_| anyhow!("settings store lock poisoned"))?;
        Ok(views
            .get(&view)
            .and_then(|tree| tree.get(key, value))
            .cloned())
    }

    fn write(&self, view: RegistryView, key: &str, value: &str, data: &str) -> Result<()> {
        let mut views = self
            .views
            .lock()
            .map_err(|_| anyhow!("settings store lock poisoned"))?;
        views.entry(view).or_default().set(key, value, data);
        Ok(())
    }

    fn remove_tree(&self, view: RegistryView, key: &str) -> Result<()> {
        let mut views = self
            .views
            .lock()
            .map_err(|_| anyhow!("settings store lock poisoned"))?;
        if let Some(tree) = views.get_mut(&view) {
            tree.remove_tree(key);
        }
        Ok(())
    }
}
