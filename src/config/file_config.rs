use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub db_dir: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub content_cache_age_sec: Option<usize>,
    pub allowed_origins: Option<Vec<String>>,

    /// Local directory holding `<album name>/cover.jpg` files.
    pub origin_dir: Option<String>,
    /// Base URL of a public bucket holding the same layout.
    pub origin_url: Option<String>,
    pub origin_timeout_sec: Option<u64>,

    pub transform: Option<TransformConfig>,
    pub artist_images: Option<ArtistImagesConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct TransformConfig {
    pub convert_binary: Option<String>,
    pub cover_max_width: Option<u32>,
    pub cover_quality: Option<u8>,
    pub artist_photo_size: Option<u32>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ArtistImagesConfig {
    pub token_url: Option<String>,
    pub search_url: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_sec: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
