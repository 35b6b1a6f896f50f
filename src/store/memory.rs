use super::traits::{MonitorStore, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-process store. Used when no shared store is deployed and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a key, for inspection.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().ok().and_then(|values| values.get(key).cloned())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .values
            .lock()
            .map(|values| values.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl MonitorStore for MemoryStore {
    async fn get_dict(&self, key: &str) -> Result<Value, StoreError> {
        self.get(key).ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn put_dict(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| StoreError::Config("memory store lock poisoned".to_string()))?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}
