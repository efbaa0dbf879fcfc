//! In-memory key-value store.

use std::collections::HashMap;

use serde_json::Value;

use crate::{KeyValueStore, StoreError};

/// A [`KeyValueStore`] kept entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError> {
        Ok(keys
            .iter()
            .filter_map(|key| {
                self.entries
                    .get(*key)
                    .map(|value| ((*key).to_string(), value.clone()))
            })
            .collect())
    }

    fn set(&mut self, entries: HashMap<String, Value>) -> Result<(), StoreError> {
        self.entries.extend(entries);
        Ok(())
    }

    fn remove(&mut self, keys: &[&str]) -> Result<(), StoreError> {
        for key in keys {
            self.entries.remove(*key);
        }
        Ok(())
    }
}
