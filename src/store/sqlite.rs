//! SQLite backend for the key/value store.

use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use super::record_size;
use crate::error::StoreError;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

pub struct SqliteKv {
    conn: Connection,
    capacity_bytes: u64,
}

impl SqliteKv {
    pub fn open(path: &Path, capacity_bytes: u64) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            capacity_bytes,
        })
    }

    pub fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn put(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let current: u64 = self.used_bytes()?;
        let existing = self
            .conn
            .query_row(
                "SELECT LENGTH(key) + LENGTH(value) FROM kv WHERE key = ?",
                [key],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .unwrap_or(0) as u64;

        let projected = current - existing + record_size(key, value);
        if projected > self.capacity_bytes {
            return Err(StoreError::QuotaExceeded {
                key: key.to_string(),
            });
        }

        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM kv WHERE key = ?", [key])?;
        Ok(())
    }

    pub fn used_bytes(&mut self) -> Result<u64, StoreError> {
        let used: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(key) + LENGTH(value)), 0) FROM kv",
            [],
            |row| row.get(0),
        )?;
        Ok(used as u64)
    }
}
