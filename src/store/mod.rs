//! Durable key/value storage with a byte-capacity quota.
//!
//! The store is the only component that touches durable state. Two backends
//! exist: SQLite for the real application and an in-memory map for tests.
//! Both enforce the same capacity accounting so quota behavior is testable
//! without a database file.

pub mod memory;
pub mod persister;
pub mod sqlite;

use std::path::Path;

use crate::error::StoreError;

/// Macro to dispatch a method call to the active backend variant.
macro_rules! dispatch {
    ($self:expr, $method:ident($($arg:expr),* $(,)?)) => {
        match &mut $self.inner {
            KvInner::Sqlite(kv) => kv.$method($($arg),*),
            KvInner::Memory(kv) => kv.$method($($arg),*),
        }
    };
}

enum KvInner {
    Sqlite(sqlite::SqliteKv),
    Memory(memory::MemoryKv),
}

/// Key/value store with quota enforcement. Values are opaque strings; callers
/// handle serialization.
pub struct KvStore {
    inner: KvInner,
}

impl KvStore {
    /// Open the SQLite-backed store at `path`, creating parent directories as
    /// needed. `capacity_bytes` caps the total size of keys plus values.
    pub fn open(path: &Path, capacity_bytes: u64) -> Result<Self, StoreError> {
        let kv = sqlite::SqliteKv::open(path, capacity_bytes)?;
        Ok(Self {
            inner: KvInner::Sqlite(kv),
        })
    }

    /// In-memory store with the same quota semantics, for tests.
    pub fn in_memory(capacity_bytes: u64) -> Self {
        Self {
            inner: KvInner::Memory(memory::MemoryKv::new(capacity_bytes)),
        }
    }

    pub fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        dispatch!(self, get(key))
    }

    /// Write a value, failing with [`StoreError::QuotaExceeded`] when the
    /// store would grow past its capacity. A failed write leaves the previous
    /// value intact.
    pub fn put(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        dispatch!(self, put(key, value))
    }

    pub fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        dispatch!(self, remove(key))
    }

    /// Total bytes currently accounted against the quota.
    pub fn used_bytes(&mut self) -> Result<u64, StoreError> {
        dispatch!(self, used_bytes())
    }
}

/// Size charged against the quota for one record.
pub(crate) fn record_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}
