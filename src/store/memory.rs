use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::StoreError;
use crate::store::Store;

/// In-memory [`Store`] backed by a sharded concurrent map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    cache: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.cache.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<String, StoreError> {
        self.cache
            .get(key)
            .map(|v| v.value().clone())
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }
}
