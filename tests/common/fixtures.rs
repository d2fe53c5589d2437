//! Test catalog payloads
//!
//! Payloads have the shape the upload tooling produces, so they go through
//! the same import path as the `cli-import` binary.

use super::constants::*;
use dj_server::catalog_store::TrackUpload;
use serde_json::json;

fn upload(
    title: &str,
    artist: &str,
    album: &str,
    track_no: u32,
    instrumental: bool,
) -> TrackUpload {
    let folder = format!("{}/{}", album, title);
    serde_json::from_value(json!({
        "metadata": {
            "Title": title,
            "Artist": artist,
            "Album": album,
            "Genre": GENRE_1,
            "Track": track_no.to_string(),
        },
        "key": "Am",
        "tempo": 120.0,
        "length": 180.0 + track_no as f64,
        "instrumentalFolderPath": format!("{}/instrumental", folder),
        "instrumental": instrumental,
        "vocalFolderPath": if instrumental { None } else { Some(format!("{}/vocal", folder)) },
        "waveform": [0.1, 0.4, 0.2],
        "vocalWaveform": if instrumental { None } else { Some(vec![0.3, 0.6]) },
    }))
    .expect("Invalid test upload")
}

/// Three-track demo album only.
pub fn single_album_catalog() -> Vec<TrackUpload> {
    DEMO_TRACK_TITLES
        .iter()
        .enumerate()
        .map(|(i, title)| upload(title, ARTIST_1_NAME, DEMO_ALBUM_NAME, i as u32 + 1, false))
        .collect()
}

/// Demo album plus a one-track instrumental album by a second artist.
pub fn demo_catalog() -> Vec<TrackUpload> {
    let mut uploads = single_album_catalog();
    uploads.push(upload(NIGHT_TRACK_TITLE, ARTIST_2_NAME, NIGHT_ALBUM_NAME, 1, true));
    uploads
}
