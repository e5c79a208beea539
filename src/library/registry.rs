//! Folder and style-profile registry: plain CRUD over independent
//! collections. The one cross-entity rule is that deleting a folder clears
//! the reference on its members instead of cascading.

use tracing::info;

use super::Library;
use crate::error::StoreError;
use crate::model::{mint_id, Folder, LiveConfig, StyleProfile};

impl Library {
    pub fn add_folder(&mut self, name: &str) -> Result<String, StoreError> {
        let folder = Folder {
            id: mint_id(),
            name: name.trim().to_string(),
        };
        let id = folder.id.clone();
        let mut next = self.folders().to_vec();
        next.push(folder);
        self.commit_folders(next)?;
        Ok(id)
    }

    /// Delete a folder and clear `folderId` on every member run.
    pub fn delete_folder(&mut self, folder_id: &str) -> Result<bool, StoreError> {
        if !self.folders().iter().any(|f| f.id == folder_id) {
            return Ok(false);
        }

        let mut next_history = self.history().to_vec();
        let mut history_changed = false;
        for item in next_history.iter_mut() {
            if item.folder_id.as_deref() == Some(folder_id) {
                item.folder_id = None;
                history_changed = true;
            }
        }
        if history_changed {
            self.commit_history(next_history)?;
        }

        let mut next = self.folders().to_vec();
        next.retain(|f| f.id != folder_id);
        self.commit_folders(next)?;
        info!(folder_id, "deleted folder");
        Ok(true)
    }

    /// Move a run into a folder, or out of any folder with `None`. Assigning
    /// to an unknown folder is refused.
    pub fn assign_folder(
        &mut self,
        history_id: &str,
        folder_id: Option<&str>,
    ) -> Result<bool, StoreError> {
        if let Some(fid) = folder_id {
            if !self.folders().iter().any(|f| f.id == fid) {
                return Ok(false);
            }
        }
        let mut next = self.history().to_vec();
        let Some(item) = next.iter_mut().find(|i| i.id == history_id) else {
            return Ok(false);
        };
        item.folder_id = folder_id.map(|s| s.to_string());
        self.commit_history(next)?;
        Ok(true)
    }

    /// Snapshot the live configuration under a name.
    pub fn save_profile(&mut self, name: &str, config: &LiveConfig) -> Result<String, StoreError> {
        let profile = StyleProfile::capture(name.trim(), config);
        let id = profile.id.clone();
        let mut next = self.profiles().to_vec();
        next.push(profile);
        self.commit_profiles(next)?;
        Ok(id)
    }

    pub fn delete_profile(&mut self, profile_id: &str) -> Result<bool, StoreError> {
        if !self.profiles().iter().any(|p| p.id == profile_id) {
            return Ok(false);
        }
        let mut next = self.profiles().to_vec();
        next.retain(|p| p.id != profile_id);
        self.commit_profiles(next)?;
        Ok(true)
    }

    /// Copy a profile's fields into the live configuration. Already-generated
    /// assets are untouched.
    pub fn apply_profile(&self, profile_id: &str, config: &mut LiveConfig) -> bool {
        match self.profiles().iter().find(|p| p.id == profile_id) {
            Some(profile) => {
                profile.apply_to(config);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{library, run_with_images};
    use super::*;

    #[test]
    fn test_folder_deletion_clears_member_references() {
        let mut lib = library(20, 25);
        lib.commit_run(run_with_images("1", 1)).unwrap();
        lib.commit_run(run_with_images("2", 1)).unwrap();

        let folder = lib.add_folder("winter shoot").unwrap();
        assert!(lib.assign_folder("1", Some(&folder)).unwrap());
        assert!(lib.assign_folder("2", Some(&folder)).unwrap());

        assert!(lib.delete_folder(&folder).unwrap());
        assert!(lib.folders().is_empty());
        // Members survive with the reference cleared, no cascade.
        assert_eq!(lib.history().len(), 2);
        assert!(lib.history().iter().all(|i| i.folder_id.is_none()));
    }

    #[test]
    fn test_assign_folder_refuses_unknown_targets() {
        let mut lib = library(20, 25);
        lib.commit_run(run_with_images("1", 1)).unwrap();

        assert!(!lib.assign_folder("1", Some("missing")).unwrap());
        assert!(!lib.assign_folder("missing-run", None).unwrap());

        let folder = lib.add_folder("f").unwrap();
        assert!(lib.assign_folder("1", Some(&folder)).unwrap());
        assert_eq!(lib.history()[0].folder_id.as_deref(), Some(folder.as_str()));
        // Clearing works too.
        assert!(lib.assign_folder("1", None).unwrap());
        assert!(lib.history()[0].folder_id.is_none());
    }

    #[test]
    fn test_profile_round_trip() {
        let mut lib = library(20, 25);
        let mut config = LiveConfig::default();
        config.prompt = "noir portrait".to_string();
        config.settings.camera_sensor = "Large Format".to_string();

        let id = lib.save_profile("noir", &config).unwrap();
        assert_eq!(lib.profiles().len(), 1);

        let mut fresh = LiveConfig::default();
        assert!(lib.apply_profile(&id, &mut fresh));
        assert_eq!(fresh.prompt, "noir portrait");
        assert_eq!(fresh.settings.camera_sensor, "Large Format");

        assert!(lib.delete_profile(&id).unwrap());
        assert!(!lib.delete_profile(&id).unwrap());
        assert!(!lib.apply_profile(&id, &mut fresh));
    }
}
