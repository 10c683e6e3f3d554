//! In-memory store, for tests and hosts without durable storage.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::PersistenceGateway;

/// HashMap-backed gateway. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put raw text under `key`, bypassing serialisation.
    pub fn insert_raw(&self, key: &str, json: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), json.to_string());
    }

    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.values.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PersistenceGateway for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_raw(key))
    }

    async fn save(&self, key: &str, json: &str) -> Result<()> {
        self.insert_raw(key, json);
        Ok(())
    }
}
