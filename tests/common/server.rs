//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own databases, origin
//! directory and image fakes.

use super::constants::*;
use super::fixtures::demo_catalog;
use async_trait::async_trait;
use dj_server::asset_cache::{
    ArtistImageProvider, AssetCache, AssetSpecs, DirectoryOrigin, ImageTransformer,
    ResolveError, SqliteAssetStore, TransformError, TransformSpec,
};
use dj_server::catalog_store::{CatalogStore, SqliteCatalogStore, TrackUpload};
use dj_server::playback::PlaybackService;
use dj_server::sampler::HistorySampler;
use dj_server::server::{make_app, state::ServerState, RequestsLoggingLevel, ServerConfig};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Hands the original image back untouched.
struct PassthroughTransformer;

#[async_trait]
impl ImageTransformer for PassthroughTransformer {
    async fn transform(
        &self,
        input: &[u8],
        _spec: &TransformSpec,
    ) -> Result<Vec<u8>, TransformError> {
        Ok(input.to_vec())
    }
}

/// Knows a picture for every artist of the seeded catalog.
struct FixedArtistImages {
    artists: HashSet<String>,
}

#[async_trait]
impl ArtistImageProvider for FixedArtistImages {
    async fn fetch_artist_image(&self, name: &str) -> Result<Vec<u8>, ResolveError> {
        if self.artists.contains(name) {
            Ok(ARTIST_PHOTO_BYTES.to_vec())
        } else {
            Err(ResolveError::NotFound(format!("artist {}", name)))
        }
    }
}

/// Test server instance with isolated databases
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Catalog store for direct database access in tests
    pub catalog_store: Arc<SqliteCatalogStore>,

    _temp_db_dir: TempDir,
    _temp_origin_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a server over the demo catalog.
    pub async fn spawn() -> Self {
        Self::spawn_with(demo_catalog()).await
    }

    /// Spawns a server on a random port over a catalog imported from `uploads`.
    ///
    /// Every imported album gets a cover in the origin directory.
    ///
    /// # Panics
    ///
    /// Panics if the databases cannot be created, the port cannot be bound
    /// or the server does not become ready in time.
    pub async fn spawn_with(uploads: Vec<TrackUpload>) -> Self {
        let temp_db_dir = TempDir::new().expect("Failed to create temp db dir");
        let temp_origin_dir = TempDir::new().expect("Failed to create temp origin dir");

        let catalog_store = Arc::new(
            SqliteCatalogStore::new(temp_db_dir.path().join("catalog.db"))
                .expect("Failed to open catalog store"),
        );
        catalog_store
            .import_tracks(&uploads)
            .expect("Failed to import test catalog");

        let mut artists = HashSet::new();
        for upload in &uploads {
            if let Some(album) = upload.album_name() {
                let album_dir = temp_origin_dir.path().join(album);
                std::fs::create_dir_all(&album_dir).expect("Failed to create album dir");
                std::fs::write(album_dir.join("cover.jpg"), COVER_BYTES)
                    .expect("Failed to write cover");
            }
            if let Some(artist) = upload.metadata.get("Artist").and_then(|a| a.as_str()) {
                artists.insert(artist.to_string());
            }
        }

        let asset_store = Arc::new(
            SqliteAssetStore::new(temp_db_dir.path().join("assets.db"))
                .expect("Failed to open asset store"),
        );
        let assets = AssetCache::new(
            asset_store,
            Arc::new(DirectoryOrigin::new(temp_origin_dir.path())),
            Arc::new(FixedArtistImages { artists }),
            Arc::new(PassthroughTransformer),
            AssetSpecs::default(),
        );
        let playback = PlaybackService::new(
            catalog_store.clone(),
            HistorySampler::new(catalog_store.clone()),
            assets,
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            content_cache_age_sec: 0,
            ..Default::default()
        };
        let state = ServerState::new(config, catalog_store.clone(), Arc::new(playback));
        let app = make_app(state).expect("Failed to build app");

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            catalog_store,
            _temp_db_dir: temp_db_dir,
            _temp_origin_dir: temp_origin_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Id the importer assigned to the album called `name`.
    pub fn album_id(&self, name: &str) -> String {
        let (albums, _) = self
            .catalog_store
            .list_albums(1, 100)
            .expect("Failed to list albums");
        albums
            .into_iter()
            .find(|album| album.name == name)
            .map(|album| album.id)
            .unwrap_or_else(|| panic!("No album named {}", name))
    }

    /// Ids of the tracks of the album called `name`, in track order.
    pub fn track_ids(&self, album_name: &str) -> Vec<String> {
        self.catalog_store
            .get_album_tracks(&self.album_id(album_name))
            .expect("Failed to list tracks")
            .into_iter()
            .map(|track| track.id)
            .collect()
    }

    /// Waits for the server to become ready by polling `/`
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
