//! Quota-aware persistence of the user's collections.
//!
//! Every collection key is namespaced by the anonymous user identity. On
//! first load of an absent namespaced key the persister falls back to the
//! legacy unscoped key and copies it through, so data written before user
//! scoping existed survives. A save that hits the storage quota gets exactly
//! one recovery attempt: evict the oldest history item containing no
//! favorited image, then retry. Favorited data is never evicted silently.
//!
//! This component never mutates in-memory collections itself; eviction
//! outcomes are reported back so callers can apply them to their own state.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use super::KvStore;
use crate::error::StoreError;
use crate::model::{mint_id, HistoryItem};

pub const HISTORY: &str = "generation-history";
pub const GALLERY: &str = "gallery-collection";
pub const FOLDERS: &str = "project-folders";
pub const PROFILES: &str = "style-profiles";

/// Unscoped keys. These must never collide with `{collection}-{userId}`.
const USER_ID_KEY: &str = "user-id";
const THEME_KEY: &str = "theme";

/// Outcome of a successful save. When quota recovery ran, `evicted_history_id`
/// names the history item that was removed from durable storage; the caller
/// must drop it from its in-memory collection too.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub evicted_history_id: Option<String>,
}

pub struct Persister {
    kv: KvStore,
    user_id: String,
}

impl Persister {
    /// Open the persister, creating the anonymous user identity on first run.
    pub fn open(mut kv: KvStore) -> Result<Self, StoreError> {
        let user_id = match kv.get(USER_ID_KEY)? {
            Some(id) if !id.is_empty() => id,
            _ => {
                let id = format!("user-{}", Uuid::new_v4());
                kv.put(USER_ID_KEY, &id)?;
                debug!(user_id = %id, "created anonymous user identity");
                id
            }
        };
        Ok(Self { kv, user_id })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn scoped_key(&self, collection: &str) -> String {
        format!("{}-{}", collection, self.user_id)
    }

    /// Load a collection, migrating from the legacy unscoped key when the
    /// namespaced key is absent. Malformed records are treated as absence,
    /// never as an error to propagate.
    pub fn load_collection<T: DeserializeOwned>(
        &mut self,
        collection: &str,
    ) -> Result<Vec<T>, StoreError> {
        let scoped = self.scoped_key(collection);

        if let Some(raw) = self.kv.get(&scoped)? {
            match serde_json::from_str::<Vec<T>>(&raw) {
                Ok(items) => return Ok(items),
                Err(e) => {
                    warn!(key = %scoped, error = %e, "discarding malformed record");
                    self.kv.remove(&scoped)?;
                }
            }
        }

        // Legacy unscoped key: copy through once so subsequent loads read the
        // namespaced key directly.
        if let Some(raw) = self.kv.get(collection)? {
            match serde_json::from_str::<Vec<T>>(&raw) {
                Ok(items) => {
                    if let Err(e) = self.kv.put(&scoped, &raw) {
                        warn!(key = %scoped, error = %e, "legacy write-through failed");
                    } else {
                        debug!(key = %scoped, "migrated legacy collection");
                    }
                    return Ok(items);
                }
                Err(e) => {
                    warn!(key = %collection, error = %e, "ignoring malformed legacy record");
                }
            }
        }

        Ok(Vec::new())
    }

    /// Load history with the in-memory schema upgrade applied: images written
    /// before ids existed get a fresh id minted. The upgrade is not persisted
    /// until the next natural write.
    pub fn load_history(&mut self) -> Result<Vec<HistoryItem>, StoreError> {
        let mut items: Vec<HistoryItem> = self.load_collection(HISTORY)?;
        for item in &mut items {
            for img in &mut item.generated_images {
                if img.id.is_empty() {
                    img.id = mint_id();
                }
            }
        }
        Ok(items)
    }

    /// Save a non-history collection. On quota exhaustion, evicts the oldest
    /// unfavorited item from the *stored* history and retries once.
    pub fn save_collection<T: Serialize>(
        &mut self,
        collection: &str,
        items: &[T],
    ) -> Result<SaveReport, StoreError> {
        let scoped = self.scoped_key(collection);
        let raw = encode(&scoped, items)?;

        match self.kv.put(&scoped, &raw) {
            Ok(()) => Ok(SaveReport::default()),
            Err(StoreError::QuotaExceeded { .. }) => {
                let mut history = self.load_history()?;
                let evicted = evict_candidate(&mut history).ok_or(StoreError::NothingToEvict)?;
                warn!(
                    evicted = %evicted,
                    key = %scoped,
                    "evicting oldest unfavorited history item to recover quota"
                );
                self.put_history(&history)?;
                self.kv.put(&scoped, &raw)?;
                Ok(SaveReport {
                    evicted_history_id: Some(evicted),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Save the history collection. Quota recovery drops the oldest
    /// unfavorited item from the value being written before the single retry.
    pub fn save_history(&mut self, items: &[HistoryItem]) -> Result<SaveReport, StoreError> {
        let scoped = self.scoped_key(HISTORY);
        let raw = encode(&scoped, items)?;

        match self.kv.put(&scoped, &raw) {
            Ok(()) => Ok(SaveReport::default()),
            Err(StoreError::QuotaExceeded { .. }) => {
                let mut reduced = items.to_vec();
                let evicted = evict_candidate(&mut reduced).ok_or(StoreError::NothingToEvict)?;
                warn!(evicted = %evicted, "evicting oldest unfavorited history item to recover quota");
                let raw = encode(&scoped, &reduced)?;
                self.kv.put(&scoped, &raw)?;
                Ok(SaveReport {
                    evicted_history_id: Some(evicted),
                })
            }
            Err(e) => Err(e),
        }
    }

    fn put_history(&mut self, items: &[HistoryItem]) -> Result<(), StoreError> {
        let scoped = self.scoped_key(HISTORY);
        let raw = encode(&scoped, items)?;
        self.kv.put(&scoped, &raw)
    }

    /// Display preference; unscoped by design.
    pub fn load_theme(&mut self) -> Result<Option<String>, StoreError> {
        self.kv.get(THEME_KEY)
    }

    pub fn save_theme(&mut self, theme: &str) -> Result<(), StoreError> {
        self.kv.put(THEME_KEY, theme)
    }
}

fn encode<T: Serialize>(key: &str, items: &[T]) -> Result<String, StoreError> {
    serde_json::to_string(items).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })
}

/// Remove and return the id of the oldest history item with no favorited
/// image. History is stored oldest-first, so the first match wins.
fn evict_candidate(history: &mut Vec<HistoryItem>) -> Option<String> {
    let pos = history.iter().position(|item| item.has_no_favorites())?;
    Some(history.remove(pos).id)
}
