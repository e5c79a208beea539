//! Error taxonomy for the studio core.
//!
//! Failures are distinguished by kind internally so recovery logic (quota
//! eviction, no-op vs. hard failure) can branch; at the CLI boundary they are
//! reduced to a single human-readable message via `Display`.

use thiserror::Error;

/// Errors from the durable storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The write would exceed the configured storage capacity.
    #[error("storage quota exceeded while saving '{key}'")]
    QuotaExceeded { key: String },

    /// Quota recovery found nothing eligible to evict: every history item
    /// still holds a favorited image. Only the user can free space.
    #[error("storage is full and nothing is eligible for removal; unfavorite or delete items to free space")]
    NothingToEvict,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("failed to encode record for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from the external generation service.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The service answered but produced no image, or explicitly declined
    /// (safety block). Distinct from transport problems: retrying the same
    /// request is pointless, the prompt needs to change.
    #[error("the model refused the request: {0}")]
    Refused(String),

    #[error("generation request failed: {0}")]
    Transport(String),

    #[error("unexpected response from generation service: {0}")]
    Protocol(String),
}

/// Errors from the edit-pipeline coordinator.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An edit is already in flight for this asset's current bitmap.
    #[error("an edit is already in progress for this image")]
    Busy,

    /// The (historyId, imageId) pair did not resolve when the edit started.
    #[error("image not found in history")]
    UnknownAsset,

    /// A series run stopped at a step; nothing was persisted.
    #[error("series generation failed at step {step} of {total}: {source}")]
    SeriesStep {
        step: usize,
        total: usize,
        #[source]
        source: GenerateError,
    },

    #[error("local crop failed: {0}")]
    Crop(String),

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
