use axum::extract::FromRef;

use crate::catalog_store::CatalogStore;
use crate::playback::PlaybackService;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedCatalogStore = Arc<dyn CatalogStore>;
pub type GuardedPlaybackService = Arc<PlaybackService>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub catalog_store: GuardedCatalogStore,
    pub playback: GuardedPlaybackService,
    pub hash: String,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        catalog_store: GuardedCatalogStore,
        playback: GuardedPlaybackService,
    ) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            catalog_store,
            playback,
            hash: env!("DJ_SERVER_BUILD_HASH").to_string(),
        }
    }
}

impl FromRef<ServerState> for GuardedCatalogStore {
    fn from_ref(input: &ServerState) -> Self {
        input.catalog_store.clone()
    }
}

impl FromRef<ServerState> for GuardedPlaybackService {
    fn from_ref(input: &ServerState) -> Self {
        input.playback.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
