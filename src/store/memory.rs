//! In-memory backend with the same quota accounting as the SQLite backend.

use std::collections::HashMap;

use super::record_size;
use crate::error::StoreError;

pub struct MemoryKv {
    map: HashMap<String, String>,
    capacity_bytes: u64,
}

impl MemoryKv {
    pub fn new(capacity_bytes: u64) -> Self {
        Self {
            map: HashMap::new(),
            capacity_bytes,
        }
    }

    pub fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.map.get(key).cloned())
    }

    pub fn put(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let existing = self
            .map
            .get(key)
            .map(|v| record_size(key, v))
            .unwrap_or(0);
        let projected = self.total() - existing + record_size(key, value);
        if projected > self.capacity_bytes {
            return Err(StoreError::QuotaExceeded {
                key: key.to_string(),
            });
        }
        self.map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.map.remove(key);
        Ok(())
    }

    pub fn used_bytes(&mut self) -> Result<u64, StoreError> {
        Ok(self.total())
    }

    fn total(&self) -> u64 {
        self.map.iter().map(|(k, v)| record_size(k, v)).sum()
    }
}
