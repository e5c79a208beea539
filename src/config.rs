use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::model::Locale;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub generator: GeneratorConfig,

    #[serde(default)]
    pub locale: Locale,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Total byte budget for persisted collections, mirroring the storage
    /// quotas the studio has to survive.
    #[serde(default = "default_capacity_bytes")]
    pub capacity_bytes: u64,

    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default = "default_gallery_limit")]
    pub gallery_limit: usize,
}

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("atelier")
        .join("atelier.db")
}

fn default_capacity_bytes() -> u64 {
    8 * 1024 * 1024 // comparable to a browser localStorage quota
}

fn default_history_limit() -> usize {
    20
}

fn default_gallery_limit() -> usize {
    25
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            capacity_bytes: default_capacity_bytes(),
            history_limit: default_history_limit(),
            gallery_limit: default_gallery_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model used for image generation and in-place edits.
    #[serde(default = "default_image_model")]
    pub image_model: String,

    /// Model used for prompt refinement and narratives.
    #[serde(default = "default_text_model")]
    pub text_model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_image_model() -> String {
    "gemini-2.5-flash-image".to_string()
}

fn default_text_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            image_model: default_image_model(),
            text_model: default_text_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            generator: GeneratorConfig::default(),
            locale: Locale::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &PathBuf) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            // Create default config
            let config = Config::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        Ok(())
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("atelier")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let config = Config::default();
        let content = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&content).unwrap();
        assert_eq!(parsed.store.history_limit, 20);
        assert_eq!(parsed.store.gallery_limit, 25);
        assert_eq!(parsed.generator.timeout_secs, 120);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let content = r#"
            [generator]
            endpoint = "http://localhost:8080/v1beta"
        "#;
        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(config.generator.endpoint, "http://localhost:8080/v1beta");
        assert_eq!(config.generator.image_model, "gemini-2.5-flash-image");
        assert_eq!(config.store.capacity_bytes, 8 * 1024 * 1024);
    }
}
