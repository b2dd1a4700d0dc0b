//! In-memory snapshot store.

use async_trait::async_trait;
use chat_core::{PortResult, SnapshotStore};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Snapshot store kept in process memory
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySnapshotStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value directly
    pub fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    /// Seed a value directly
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.lock().insert(key.into(), value.into());
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self, key: &str) -> PortResult<Option<String>> {
        Ok(self.get(key))
    }

    async fn save(&self, key: &str, value: &str) -> PortResult<()> {
        self.insert(key, value);
        Ok(())
    }
}
