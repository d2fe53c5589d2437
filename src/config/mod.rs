mod file_config;

pub use file_config::{ArtistImagesConfig, FileConfig, TransformConfig};

use crate::asset_cache::{
    ArtistImagesSettings, AssetSpecs, TransformSpec, DEFAULT_SEARCH_URL, DEFAULT_TOKEN_URL,
    DEFAULT_USER_AGENT,
};
use crate::server::{RequestsLoggingLevel, ServerConfig};
use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that take part in config resolution.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub content_cache_age_sec: usize,
    pub allowed_origins: Vec<String>,
    pub origin_dir: Option<PathBuf>,
    pub origin_url: Option<String>,
    pub origin_timeout_sec: u64,
    pub convert_binary: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OriginSettings {
    Directory(PathBuf),
    Http { base_url: String, timeout: Duration },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformSettings {
    pub convert_binary: PathBuf,
    pub cover_max_width: u32,
    pub cover_quality: u8,
    pub artist_photo_size: u32,
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            convert_binary: PathBuf::from("convert"),
            cover_max_width: 400,
            cover_quality: 85,
            artist_photo_size: 200,
        }
    }
}

impl TransformSettings {
    pub fn asset_specs(&self) -> AssetSpecs {
        AssetSpecs {
            cover: TransformSpec::cover(self.cover_max_width, self.cover_quality),
            artist_photo: TransformSpec::artist_photo(self.artist_photo_size),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub content_cache_age_sec: usize,
    pub allowed_origins: Vec<Regex>,
    pub origin: OriginSettings,
    pub transform: TransformSettings,
    pub artist_images: ArtistImagesSettings,
}

fn resolve_origin(
    dir: Option<PathBuf>,
    url: Option<String>,
    timeout: Duration,
) -> Result<Option<OriginSettings>> {
    match (dir, url) {
        (Some(_), Some(_)) => bail!("origin_dir and origin_url are mutually exclusive"),
        (Some(dir), None) => {
            if !dir.is_dir() {
                bail!("Origin directory does not exist: {:?}", dir);
            }
            Ok(Some(OriginSettings::Directory(dir)))
        }
        (None, Some(base_url)) => Ok(Some(OriginSettings::Http { base_url, timeout })),
        (None, None) => Ok(None),
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;
        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);
        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());
        let content_cache_age_sec = file
            .content_cache_age_sec
            .unwrap_or(cli.content_cache_age_sec);

        let allowed_origins = file
            .allowed_origins
            .unwrap_or_else(|| cli.allowed_origins.clone())
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .with_context(|| format!("Invalid allowed origin pattern: {}", pattern))
            })
            .collect::<Result<Vec<_>>>()?;

        let origin_timeout =
            Duration::from_secs(file.origin_timeout_sec.unwrap_or(cli.origin_timeout_sec));
        // An origin given in the file replaces the CLI one entirely.
        let origin = match resolve_origin(
            file.origin_dir.map(PathBuf::from),
            file.origin_url,
            origin_timeout,
        )? {
            Some(origin) => origin,
            None => resolve_origin(cli.origin_dir.clone(), cli.origin_url.clone(), origin_timeout)?
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "an asset origin must be specified via --origin-dir or --origin-url"
                    )
                })?,
        };

        let transform_file = file.transform.unwrap_or_default();
        let defaults = TransformSettings::default();
        let transform = TransformSettings {
            convert_binary: transform_file
                .convert_binary
                .map(PathBuf::from)
                .or_else(|| cli.convert_binary.clone())
                .unwrap_or(defaults.convert_binary),
            cover_max_width: transform_file
                .cover_max_width
                .unwrap_or(defaults.cover_max_width),
            cover_quality: transform_file
                .cover_quality
                .unwrap_or(defaults.cover_quality),
            artist_photo_size: transform_file
                .artist_photo_size
                .unwrap_or(defaults.artist_photo_size),
        };
        if transform.cover_quality > 100 {
            bail!("cover_quality must be within 1..=100");
        }

        let images_file = file.artist_images.unwrap_or_default();
        let artist_images = ArtistImagesSettings {
            token_url: images_file
                .token_url
                .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            search_url: images_file
                .search_url
                .unwrap_or_else(|| DEFAULT_SEARCH_URL.to_string()),
            user_agent: images_file
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            timeout: Duration::from_secs(images_file.timeout_sec.unwrap_or(10)),
        };

        Ok(Self {
            db_dir,
            port,
            metrics_port,
            logging_level,
            content_cache_age_sec,
            allowed_origins,
            origin,
            transform,
            artist_images,
        })
    }

    pub fn catalog_db_path(&self) -> PathBuf {
        self.db_dir.join("catalog.db")
    }

    pub fn assets_db_path(&self) -> PathBuf {
        self.db_dir.join("assets.db")
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            requests_logging_level: self.logging_level.clone(),
            port: self.port,
            metrics_port: self.metrics_port,
            content_cache_age_sec: self.content_cache_age_sec,
            allowed_origins: self.allowed_origins.clone(),
        }
    }
}

fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
