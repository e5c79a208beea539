//! Core data model: assets, runs, gallery references, folders, profiles.
//!
//! Persisted records use camelCase field names so they are byte-compatible
//! with collections written by earlier releases; the legacy-key migration in
//! the persister depends on that layout staying stable.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Mint a fresh opaque asset id. Every `GeneratedImage` gets exactly one of
/// these at creation; it is never reassigned afterwards.
pub fn mint_id() -> String {
    Uuid::new_v4().to_string()
}

/// Run ids are creation-timestamp-derived strings, kept strictly increasing
/// so two runs finishing within the same millisecond never collide.
pub fn mint_run_id() -> String {
    use std::sync::atomic::{AtomicI64, Ordering};
    static LAST: AtomicI64 = AtomicI64::new(0);

    let now = chrono::Utc::now().timestamp_millis();
    let prev = LAST
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |prev| {
            Some(now.max(prev + 1))
        })
        .unwrap_or(now);
    now.max(prev + 1).to_string()
}

/// A base64-encoded image payload plus mime type, as sent to the generation
/// service. `data` carries no `data:` prefix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImagePart {
    pub mime_type: String,
    pub data: String,
}

impl ImagePart {
    /// Split a `data:<mime>;base64,<payload>` URI into its parts.
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix("data:")?;
        let (mime_type, payload) = rest.split_once(";base64,")?;
        if mime_type.is_empty() || payload.is_empty() {
            return None;
        }
        Some(Self {
            mime_type: mime_type.to_string(),
            data: payload.to_string(),
        })
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// A reference image supplied by the user as generation input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub mime_type: String,
    /// Full data URI, ready for display.
    pub base64: String,
}

impl UploadedImage {
    pub fn as_part(&self) -> Option<ImagePart> {
        ImagePart::from_data_uri(&self.base64)
    }
}

/// The atomic asset. `id` is the sole join key used by every other entity;
/// `src` is the only field that changes when the pixels are replaced by an
/// edit. That split is what makes crop/upscale/remix behave as mutations of
/// one logical asset rather than producing new ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    /// May be empty in records written before ids existed; the persister
    /// mints one on load (see schema upgrade).
    #[serde(default)]
    pub id: String,
    pub src: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_favorite: bool,
    /// Milliseconds spent generating this image, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_time: Option<u64>,
}

impl GeneratedImage {
    pub fn new(src: String, generation_time: Option<u64>) -> Self {
        Self {
            id: mint_id(),
            src,
            tags: Vec::new(),
            is_favorite: false,
            generation_time,
        }
    }
}

/// Opaque snapshot of the generation configuration at run time. The studio
/// never interprets these fields; they round-trip through persistence and
/// style profiles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    #[serde(default)]
    pub base_model: String,
    #[serde(default)]
    pub camera_sensor: String,
    #[serde(default)]
    pub stylistic_budget: u8,
    #[serde(default)]
    pub consistency_lock: bool,
    #[serde(default)]
    pub aspect_ratio: String,
    #[serde(default)]
    pub face_lock_intensity: f32,
    #[serde(default)]
    pub preserve_glasses: bool,
    #[serde(default)]
    pub control_net_type: ControlNetType,
    #[serde(default)]
    pub simulated_force: u8,
    #[serde(default)]
    pub character_ids: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_model: "Photorealism V3".to_string(),
            camera_sensor: "Default".to_string(),
            stylistic_budget: 10,
            consistency_lock: true,
            aspect_ratio: "default".to_string(),
            face_lock_intensity: 1.0,
            preserve_glasses: true,
            control_net_type: ControlNetType::default(),
            simulated_force: 0,
            character_ids: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum ControlNetType {
    #[default]
    #[serde(rename = "OpenPose")]
    OpenPose,
    #[serde(rename = "Depth Map")]
    DepthMap,
    #[serde(rename = "Canny Edge")]
    CannyEdge,
}

/// One generation run. Owns its images; created atomically when the run
/// completes, deleted automatically when its last image is removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: String,
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    #[serde(default)]
    pub uploaded_images: Vec<UploadedImage>,
    pub generated_images: Vec<GeneratedImage>,
    #[serde(default)]
    pub settings: GenerationSettings,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
}

impl HistoryItem {
    /// True when no contained image is favorited, i.e. the item is eligible
    /// for automatic eviction.
    pub fn has_no_favorites(&self) -> bool {
        !self.generated_images.iter().any(|img| img.is_favorite)
    }
}

/// A curated reference into a `GeneratedImage`, with a denormalized snapshot
/// of display fields. The snapshot is a cache: the synchronizer is the single
/// point that refreshes it when the underlying `src` changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage {
    pub id: String,
    pub src: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    #[serde(default)]
    pub settings: GenerationSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_time: Option<u64>,
    pub history_id: String,
    pub image_id: String,
}

/// Pure grouping of history items. Deleting a folder clears the reference on
/// members rather than cascading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    pub name: String,
}

/// Named snapshot of prompt plus generation settings, independent of any
/// image. Applying one copies its fields back into the live configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StyleProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    #[serde(flatten)]
    pub settings: GenerationSettings,
}

/// The live generation configuration a profile is captured from and applied
/// back into.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveConfig {
    pub prompt: String,
    pub negative_prompt: String,
    pub settings: GenerationSettings,
}

impl StyleProfile {
    pub fn capture(name: &str, config: &LiveConfig) -> Self {
        Self {
            id: mint_id(),
            name: name.to_string(),
            prompt: config.prompt.clone(),
            negative_prompt: config.negative_prompt.clone(),
            settings: config.settings.clone(),
        }
    }

    /// Pure copy of the profile's fields into the live configuration. Has no
    /// effect on already-generated assets.
    pub fn apply_to(&self, config: &mut LiveConfig) {
        config.prompt = self.prompt.clone();
        config.negative_prompt = self.negative_prompt.clone();
        config.settings = self.settings.clone();
    }
}

/// One entry of the favorites projection. Favorites are never stored: this is
/// derived at query time from history, annotated with the owning run.
#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteImage {
    pub history_id: String,
    pub index: usize,
    pub prompt: String,
    pub image: GeneratedImage,
}

/// Display locale for synthesized instructions and text endpoints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Vi,
}
