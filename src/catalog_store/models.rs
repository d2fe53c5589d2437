use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub cover_extension: String,
}

/// A catalog track.
///
/// `info` is the tag document produced by the upload tooling (exiftool style
/// keys such as `Title`, `Artist`, `Album`, `Genre`, `Track`). The server
/// never interprets it beyond the handful of fields the playback record
/// needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub album_id: String,
    pub info: serde_json::Value,
    /// Seconds.
    pub total_duration: f64,
    pub vocal_waveform: Option<Vec<f64>>,
    pub instrumental_waveform: Vec<f64>,
    pub instrumental: bool,
    pub tempo: f64,
    pub key: String,
    pub vocal_folder_path: Option<String>,
    pub instrumental_folder_path: String,
}

/// Row of an album's track listing.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackSummary {
    pub id: String,
    pub title: String,
    pub duration: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ArtistAlbum {
    pub artist: String,
    pub genre: Option<String>,
    pub album_id: String,
    pub album_name: String,
    pub track_count: usize,
}

/// One element of an upload payload, as produced by the upload tooling.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackUpload {
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub key: String,
    pub tempo: f64,
    pub length: f64,
    pub instrumental_folder_path: String,
    #[serde(default)]
    pub instrumental: bool,
    pub vocal_folder_path: Option<String>,
    #[serde(rename = "waveform", default)]
    pub instrumental_waveform: Vec<f64>,
    #[serde(default)]
    pub vocal_waveform: Option<Vec<f64>>,
}

impl TrackUpload {
    pub fn album_name(&self) -> Option<&str> {
        self.metadata
            .get("Album")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}
