//! Playback records served to the player, and the service assembling them.

use crate::asset_cache::{AssetCache, ResolveError};
use crate::catalog_store::{Album, CatalogStore, Track, TrackSummary};
use crate::sampler::{HistorySampler, SampleError};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackInfo {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub length: f64,
    pub genre: String,
    pub vocal_waveform: Option<Vec<f64>>,
    pub instrumental_waveform: Vec<f64>,
    pub tempo: f64,
    pub instrumental: bool,
    pub key: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackRecord {
    pub id: String,
    /// Base64 JPEG, empty when the cover could not be produced.
    pub cover: String,
    pub info: PlaybackInfo,
    pub saved_album_name: String,
    pub cover_extension: String,
    pub saved_vocal_folder_path: String,
    pub saved_instrumental_folder_path: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AlbumTracks {
    pub tracks: Vec<TrackSummary>,
    pub cover: String,
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Sample(#[from] SampleError),

    #[error("catalog store failure: {0}")]
    Store(#[from] anyhow::Error),
}

fn tag(info: &serde_json::Value, name: &str) -> String {
    info.get(name)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn encode_cover(cover: Option<Vec<u8>>) -> String {
    cover.map(|bytes| BASE64.encode(bytes)).unwrap_or_default()
}

/// Maps a track and its album to a playback record with the given cover.
pub fn playback_record(track: &Track, album: &Album, cover: Option<Vec<u8>>) -> PlaybackRecord {
    let (vocal_waveform, vocal_folder_path) = if track.instrumental {
        (None, String::new())
    } else {
        (
            track.vocal_waveform.clone(),
            track.vocal_folder_path.clone().unwrap_or_default(),
        )
    };

    PlaybackRecord {
        id: track.id.clone(),
        cover: encode_cover(cover),
        info: PlaybackInfo {
            title: tag(&track.info, "Title"),
            artist: tag(&track.info, "Artist"),
            album: tag(&track.info, "Album"),
            length: track.total_duration,
            genre: tag(&track.info, "Genre"),
            vocal_waveform,
            instrumental_waveform: track.instrumental_waveform.clone(),
            tempo: track.tempo,
            instrumental: track.instrumental,
            key: track.key.clone(),
        },
        saved_album_name: album.name.clone(),
        cover_extension: album.cover_extension.clone(),
        saved_vocal_folder_path: vocal_folder_path,
        saved_instrumental_folder_path: track.instrumental_folder_path.clone(),
    }
}

/// Builds the playback record of `track`, resolving its album cover.
///
/// A cover that fails to transform leaves `cover` empty; an origin failure
/// is returned as an error.
pub async fn normalize(
    track: &Track,
    album: &Album,
    assets: &AssetCache,
) -> Result<PlaybackRecord, ResolveError> {
    let cover = assets.resolve_cover(&album.id, &album.name).await?;
    Ok(playback_record(track, album, cover))
}

#[derive(Clone)]
pub struct PlaybackService {
    catalog: Arc<dyn CatalogStore>,
    sampler: HistorySampler,
    assets: AssetCache,
}

impl PlaybackService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        sampler: HistorySampler,
        assets: AssetCache,
    ) -> Self {
        Self {
            catalog,
            sampler,
            assets,
        }
    }

    fn album_of(&self, track: &Track) -> Result<Album, PlaybackError> {
        self.catalog
            .get_album(&track.album_id)?
            .ok_or_else(|| PlaybackError::NotFound(format!("album {}", track.album_id)))
    }

    /// Next track for an anonymous client. The listen is recorded only once
    /// the record has been assembled, so a failed request does not consume
    /// a track from the client's cycle.
    pub async fn select_next(&self, client_id: &str) -> Result<PlaybackRecord, PlaybackError> {
        let track = self.sampler.pick(client_id)?;
        let album = self.album_of(&track)?;
        let record = normalize(&track, &album, &self.assets).await?;
        self.sampler.record(&track.id, client_id)?;
        debug!("Serving track {} to client {}", track.id, client_id);
        Ok(record)
    }

    pub async fn track_by_id(&self, track_id: &str) -> Result<PlaybackRecord, PlaybackError> {
        let track = self
            .catalog
            .get_track(track_id)?
            .ok_or_else(|| PlaybackError::NotFound(format!("track {}", track_id)))?;
        let album = self.album_of(&track)?;
        Ok(normalize(&track, &album, &self.assets).await?)
    }

    pub async fn album_with_tracks(&self, album_id: &str) -> Result<AlbumTracks, PlaybackError> {
        let album = self
            .catalog
            .get_album(album_id)?
            .ok_or_else(|| PlaybackError::NotFound(format!("album {}", album_id)))?;
        let tracks = self.catalog.get_album_tracks(album_id)?;
        let cover = self.assets.resolve_cover(&album.id, &album.name).await?;
        Ok(AlbumTracks {
            tracks,
            cover: encode_cover(cover),
        })
    }

    pub async fn artist_photo(&self, name: &str) -> Result<Vec<u8>, PlaybackError> {
        Ok(self.assets.resolve_artist_photo(name).await?)
    }
}
