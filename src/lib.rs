//! Atelier: an image-generation studio engine.
//!
//! The crate gives every generated image a durable identity, persists the
//! user's History/Gallery/Folders/StyleProfiles under per-user keys with
//! quota-aware degradation and one-time schema migration, and funnels the
//! whole family of edit actions (crop, upscale, remix, expand, fix,
//! add-object, add-person) through one coordinator that updates every view
//! atomically.

pub mod app;
pub mod config;
pub mod error;
pub mod gen;
pub mod library;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod store;
