//! Cross-view synchronizer.
//!
//! `apply_image_update` is the only path by which an asset's `src` may change
//! after creation; every edit action (crop, upscale, remix, expand, fix,
//! add-object, add-person) terminates here. It mutates exactly one
//! `GeneratedImage`, persists History before Gallery, then refreshes the
//! denormalized gallery snapshot and any open detail view for the same image.

use tracing::debug;

use super::Library;
use crate::error::StoreError;

/// A partial update: only the set fields are overwritten. The asset's `id` is
/// never part of an update; identity is immutable.
#[derive(Debug, Clone, Default)]
pub struct ImageUpdate {
    pub src: Option<String>,
    pub is_favorite: Option<bool>,
    pub generation_time: Option<u64>,
    pub tags: Option<Vec<String>>,
}

impl Library {
    /// Apply `update` to the one image identified by `(history_id, image_id)`
    /// and propagate the same logical change to every view.
    ///
    /// Returns `Ok(false)` when the pair does not resolve: a concurrent
    /// delete may have already removed the target, which is a harmless race,
    /// not an error.
    pub fn apply_image_update(
        &mut self,
        history_id: &str,
        image_id: &str,
        update: ImageUpdate,
    ) -> Result<bool, StoreError> {
        let Some((run_idx, img_idx)) = self.resolve(history_id, image_id) else {
            debug!(history_id, image_id, "update target gone; no-op");
            return Ok(false);
        };

        // Stage the mutation; a hard save failure must leave the in-memory
        // history exactly as it was.
        let mut next = self.history().to_vec();
        {
            let img = &mut next[run_idx].generated_images[img_idx];
            if let Some(src) = &update.src {
                img.src = src.clone();
            }
            if let Some(fav) = update.is_favorite {
                img.is_favorite = fav;
            }
            if let Some(ms) = update.generation_time {
                img.generation_time = Some(ms);
            }
            if let Some(tags) = &update.tags {
                img.tags = tags.clone();
            }
        }

        // History is durable before any gallery write (read-your-writes).
        self.commit_history(next)?;

        let mut next_gallery = self.gallery().to_vec();
        let mut gallery_changed = false;
        for entry in next_gallery.iter_mut() {
            if entry.image_id == image_id {
                if let Some(src) = &update.src {
                    entry.src = src.clone();
                    gallery_changed = true;
                }
                if let Some(ms) = update.generation_time {
                    entry.generation_time = Some(ms);
                    gallery_changed = true;
                }
            }
        }
        if gallery_changed {
            self.commit_gallery(next_gallery)?;
        }

        if let Some(detail) = self.detail_mut() {
            if detail.image_id == image_id {
                if let Some(src) = &update.src {
                    detail.src = src.clone();
                }
                if let Some(ms) = update.generation_time {
                    detail.generation_time = Some(ms);
                }
            }
        }

        Ok(true)
    }
}
