//! Imports an upload payload into the catalog database.
//!
//! The payload is the JSON array produced by the upload tooling, one object
//! per track with its tag metadata, key, tempo, length, waveforms and the
//! folders its stems were saved to.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dj_server::catalog_store::{CatalogStore, SqliteCatalogStore, TrackUpload};

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding catalog.db, created when missing.
    pub db_dir: PathBuf,

    /// JSON upload payload.
    pub upload: PathBuf,
}

fn read_uploads(path: &Path) -> Result<Vec<TrackUpload>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read upload file: {:?}", path))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse upload file: {:?}", path))
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()?;

    let uploads = read_uploads(&cli_args.upload)?;
    std::fs::create_dir_all(&cli_args.db_dir)
        .with_context(|| format!("Failed to create {:?}", cli_args.db_dir))?;
    let store = SqliteCatalogStore::new(cli_args.db_dir.join("catalog.db"))?;

    let tracks = store.import_tracks(&uploads)?;
    for track in &tracks {
        info!(
            "Imported {} ({}) into album {}",
            track.info.get("Title").and_then(|t| t.as_str()).unwrap_or("?"),
            track.id,
            track.album_id
        );
    }
    info!(
        "Catalog now has {} albums and {} tracks",
        store.get_albums_count(),
        store.get_tracks_count()
    );
    Ok(())
}
