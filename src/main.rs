use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dj_server::asset_cache::{
    AssetCache, AssetKind, BlobOrigin, ConvertTransformer, DirectoryOrigin, HttpOrigin,
    SqliteAssetStore, WebPlayerArtistImages,
};
use dj_server::catalog_store::{CatalogStore, SqliteCatalogStore};
use dj_server::config::{AppConfig, CliConfig, FileConfig, OriginSettings};
use dj_server::playback::PlaybackService;
use dj_server::sampler::HistorySampler;
use dj_server::server::{self, run_server, state::ServerState, RequestsLoggingLevel};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    Ok(std::env::current_dir()?.join(path_buf))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Its values override the CLI ones.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding catalog.db and assets.db.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 8080)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// The maximum age of content in the cache in seconds.
    #[clap(long, default_value_t = 3600)]
    pub content_cache_age_sec: usize,

    /// Regex of a browser origin allowed by CORS. Repeatable.
    #[clap(long = "allowed-origin")]
    pub allowed_origins: Vec<String>,

    /// Local directory holding the original album covers.
    #[clap(long, value_parser = parse_path)]
    pub origin_dir: Option<PathBuf>,

    /// Base URL of the bucket holding the original album covers.
    #[clap(long)]
    pub origin_url: Option<String>,

    /// Timeout in seconds for origin requests.
    #[clap(long, default_value_t = 30)]
    pub origin_timeout_sec: u64,

    /// ImageMagick convert binary.
    #[clap(long)]
    pub convert_binary: Option<PathBuf>,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            db_dir: args.db_dir.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            content_cache_age_sec: args.content_cache_age_sec,
            allowed_origins: args.allowed_origins.clone(),
            origin_dir: args.origin_dir.clone(),
            origin_url: args.origin_url.clone(),
            origin_timeout_sec: args.origin_timeout_sec,
            convert_binary: args.convert_binary.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
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

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&CliConfig::from(&cli_args), file_config)?;

    info!(
        "Opening SQLite catalog database at {:?}...",
        config.catalog_db_path()
    );
    let catalog_store = Arc::new(SqliteCatalogStore::new(config.catalog_db_path())?);
    let asset_store = Arc::new(SqliteAssetStore::new(config.assets_db_path())?);
    info!(
        "Asset cache holds {} covers and {} artist photos",
        asset_store.count(AssetKind::Cover)?,
        asset_store.count(AssetKind::ArtistPhoto)?
    );

    info!("Initializing metrics...");
    server::metrics::init_metrics();
    server::metrics::init_catalog_metrics(
        catalog_store.get_albums_count(),
        catalog_store.get_tracks_count(),
    );

    let origin: Arc<dyn BlobOrigin> = match &config.origin {
        OriginSettings::Directory(dir) => {
            info!("Serving original covers from {:?}", dir);
            Arc::new(DirectoryOrigin::new(dir))
        }
        OriginSettings::Http { base_url, timeout } => {
            info!("Serving original covers from {}", base_url);
            Arc::new(HttpOrigin::new(base_url, *timeout).context("Failed to build origin client")?)
        }
    };

    let transformer = ConvertTransformer::new(&config.transform.convert_binary);
    if let Err(e) = transformer.check_available().await {
        warn!(
            "{:?} is not usable, covers will be served empty: {}",
            config.transform.convert_binary, e
        );
    }

    let artist_images = WebPlayerArtistImages::new(config.artist_images.clone())
        .context("Failed to build artist image client")?;

    let assets = AssetCache::new(
        asset_store,
        origin,
        Arc::new(artist_images),
        Arc::new(transformer),
        config.transform.asset_specs(),
    );
    let playback = PlaybackService::new(
        catalog_store.clone(),
        HistorySampler::new(catalog_store.clone()),
        assets,
    );

    let state = ServerState::new(config.server_config(), catalog_store, Arc::new(playback));
    run_server(state).await
}
