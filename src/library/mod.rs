//! Owned in-memory collections backed by the persister.
//!
//! All readers observe this one `Library` instead of keeping independent
//! mirrors of the persisted collections; every mutation goes through its
//! methods, which persist before (or atomically with) updating memory.

pub mod registry;
pub mod sync;

use std::collections::HashMap;

use tracing::info;

use crate::error::StoreError;
use crate::model::{FavoriteImage, Folder, GalleryImage, GeneratedImage, HistoryItem, StyleProfile};
use crate::store::persister::{Persister, SaveReport, FOLDERS, GALLERY, PROFILES};

pub use sync::ImageUpdate;

/// Result of a gallery toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryToggle {
    Added,
    Removed,
}

pub struct Library {
    persister: Persister,
    history: Vec<HistoryItem>,
    gallery: Vec<GalleryImage>,
    folders: Vec<Folder>,
    profiles: Vec<StyleProfile>,
    /// imageId -> (historyId, index within the run). Maintained incrementally
    /// so the synchronizer resolves targets in O(1).
    index: HashMap<String, (String, usize)>,
    /// The detail view currently open, if any; refreshed by the synchronizer.
    open_detail: Option<GalleryImage>,
    history_limit: usize,
    gallery_limit: usize,
}

impl Library {
    /// Load all collections, running legacy migration and schema upgrades as
    /// the persister dictates.
    pub fn open(
        mut persister: Persister,
        history_limit: usize,
        gallery_limit: usize,
    ) -> Result<Self, StoreError> {
        let history = persister.load_history()?;
        let gallery = persister.load_collection(GALLERY)?;
        let folders = persister.load_collection(FOLDERS)?;
        let profiles = persister.load_collection(PROFILES)?;

        let mut lib = Self {
            persister,
            history,
            gallery,
            folders,
            profiles,
            index: HashMap::new(),
            open_detail: None,
            history_limit,
            gallery_limit,
        };
        lib.rebuild_index();
        info!(
            runs = lib.history.len(),
            gallery = lib.gallery.len(),
            folders = lib.folders.len(),
            profiles = lib.profiles.len(),
            "library loaded"
        );
        Ok(lib)
    }

    pub fn user_id(&self) -> &str {
        self.persister.user_id()
    }

    /// Display theme preference, shared across users by design.
    pub fn theme(&mut self) -> Result<Option<String>, StoreError> {
        self.persister.load_theme()
    }

    pub fn set_theme(&mut self, theme: &str) -> Result<(), StoreError> {
        self.persister.save_theme(theme)
    }

    pub fn history(&self) -> &[HistoryItem] {
        &self.history
    }

    pub fn gallery(&self) -> &[GalleryImage] {
        &self.gallery
    }

    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    pub fn profiles(&self) -> &[StyleProfile] {
        &self.profiles
    }

    /// The derived favorites projection: every favorited image across all
    /// runs, newest first, annotated with its owning run.
    pub fn favorites(&self) -> Vec<FavoriteImage> {
        let mut favorites: Vec<FavoriteImage> = self
            .history
            .iter()
            .flat_map(|item| {
                item.generated_images
                    .iter()
                    .enumerate()
                    .filter(|(_, img)| img.is_favorite)
                    .map(|(index, img)| FavoriteImage {
                        history_id: item.id.clone(),
                        index,
                        prompt: item.prompt.clone(),
                        image: img.clone(),
                    })
            })
            .collect();
        favorites.reverse();
        favorites
    }

    /// Locate an image by id. O(1) through the index.
    pub fn find_image(&self, image_id: &str) -> Option<(&HistoryItem, &GeneratedImage)> {
        let (history_id, idx) = self.index.get(image_id)?;
        let item = self.history.iter().find(|i| &i.id == history_id)?;
        let img = item.generated_images.get(*idx)?;
        Some((item, img))
    }

    /// Commit a completed generation run as one new history item, enforcing
    /// the bounded collection size. The cap is hard: the oldest item without
    /// favorites is pruned first, and when every item holds a favorite the
    /// oldest item goes anyway.
    pub fn commit_run(&mut self, item: HistoryItem) -> Result<String, StoreError> {
        let run_id = item.id.clone();
        let mut next = self.history.clone();
        next.push(item);
        let mut next_gallery = self.gallery.clone();
        let gallery_before = next_gallery.len();
        while next.len() > self.history_limit {
            let pos = next
                .iter()
                .position(|i| i.has_no_favorites())
                .unwrap_or(0);
            let pruned = next.remove(pos);
            info!(run = %pruned.id, "pruning history item over capacity");
            for img in &pruned.generated_images {
                next_gallery.retain(|g| g.image_id != img.id);
            }
        }
        let gallery_changed = next_gallery.len() != gallery_before;

        self.commit_history(next)?;
        if gallery_changed {
            self.commit_gallery(next_gallery)?;
        }
        Ok(run_id)
    }

    /// Remove one image from its run; the run itself is deleted when its last
    /// image goes. Gallery entries and the open detail view referencing the
    /// image are cleaned up in the same pass.
    pub fn delete_image(&mut self, history_id: &str, image_id: &str) -> Result<bool, StoreError> {
        let mut next = self.history.clone();
        let Some(item) = next.iter_mut().find(|i| i.id == history_id) else {
            return Ok(false);
        };
        let before = item.generated_images.len();
        item.generated_images.retain(|img| img.id != image_id);
        if item.generated_images.len() == before {
            return Ok(false);
        }
        next.retain(|i| !i.generated_images.is_empty());
        self.commit_history(next)?;

        if self.gallery.iter().any(|g| g.image_id == image_id) {
            let mut next_gallery = self.gallery.clone();
            next_gallery.retain(|g| g.image_id != image_id);
            self.commit_gallery(next_gallery)?;
        }
        if self
            .open_detail
            .as_ref()
            .is_some_and(|d| d.image_id == image_id)
        {
            self.open_detail = None;
        }
        Ok(true)
    }

    /// Toggle gallery membership for an image. At most one gallery entry per
    /// image id ever exists; adding over capacity evicts the oldest entry
    /// FIFO, independent of favorite status.
    pub fn toggle_gallery(&mut self, image_id: &str) -> Result<Option<GalleryToggle>, StoreError> {
        if self.gallery.iter().any(|g| g.image_id == image_id) {
            let mut next = self.gallery.clone();
            next.retain(|g| g.image_id != image_id);
            self.commit_gallery(next)?;
            if self
                .open_detail
                .as_ref()
                .is_some_and(|d| d.image_id == image_id)
            {
                self.open_detail = None;
            }
            return Ok(Some(GalleryToggle::Removed));
        }

        let Some((item, img)) = self.find_image(image_id) else {
            return Ok(None);
        };
        let entry = GalleryImage {
            id: crate::model::mint_id(),
            src: img.src.clone(),
            prompt: item.prompt.clone(),
            negative_prompt: item.negative_prompt.clone(),
            settings: item.settings.clone(),
            generation_time: img.generation_time,
            history_id: item.id.clone(),
            image_id: img.id.clone(),
        };

        let mut next = self.gallery.clone();
        next.push(entry);
        while next.len() > self.gallery_limit {
            next.remove(0);
        }
        self.commit_gallery(next)?;
        Ok(Some(GalleryToggle::Added))
    }

    /// Open the detail view for a gallery member.
    pub fn open_detail(&mut self, image_id: &str) -> Option<&GalleryImage> {
        self.open_detail = self
            .gallery
            .iter()
            .find(|g| g.image_id == image_id)
            .cloned();
        self.open_detail.as_ref()
    }

    pub fn close_detail(&mut self) {
        self.open_detail = None;
    }

    pub fn detail(&self) -> Option<&GalleryImage> {
        self.open_detail.as_ref()
    }

    /// Persist a staged history and adopt it only once the save succeeded, so
    /// a hard storage failure never leaves memory ahead of durable state. Any
    /// quota eviction the persister performed is mirrored afterwards.
    pub(crate) fn commit_history(&mut self, next: Vec<HistoryItem>) -> Result<(), StoreError> {
        let report = self.persister.save_history(&next)?;
        self.history = next;
        self.apply_report(report);
        self.rebuild_index();
        Ok(())
    }

    pub(crate) fn commit_gallery(&mut self, next: Vec<GalleryImage>) -> Result<(), StoreError> {
        let report = self.persister.save_collection(GALLERY, &next)?;
        self.gallery = next;
        self.apply_report(report);
        Ok(())
    }

    pub(crate) fn commit_folders(&mut self, next: Vec<Folder>) -> Result<(), StoreError> {
        let report = self.persister.save_collection(FOLDERS, &next)?;
        self.folders = next;
        self.apply_report(report);
        Ok(())
    }

    pub(crate) fn commit_profiles(&mut self, next: Vec<StyleProfile>) -> Result<(), StoreError> {
        let report = self.persister.save_collection(PROFILES, &next)?;
        self.profiles = next;
        self.apply_report(report);
        Ok(())
    }

    /// Mirror a quota eviction performed by the persister.
    fn apply_report(&mut self, report: SaveReport) {
        if let Some(evicted) = report.evicted_history_id {
            self.history.retain(|i| i.id != evicted);
            self.rebuild_index();
        }
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for item in &self.history {
            for (idx, img) in item.generated_images.iter().enumerate() {
                self.index.insert(img.id.clone(), (item.id.clone(), idx));
            }
        }
    }

    pub(crate) fn resolve(&self, history_id: &str, image_id: &str) -> Option<(usize, usize)> {
        let (owner, img_idx) = self.index.get(image_id)?;
        if owner != history_id {
            return None;
        }
        let run_idx = self.history.iter().position(|i| i.id == history_id)?;
        Some((run_idx, *img_idx))
    }

    pub(crate) fn detail_mut(&mut self) -> &mut Option<GalleryImage> {
        &mut self.open_detail
    }
}
