//! SQLite-backed catalog store.

use super::models::*;
use super::schema::CATALOG_VERSIONED_SCHEMAS;
use super::{page_offset, CatalogStore};
use crate::sqlite_persistence::open_versioned_db;
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

pub(super) const TRACK_COLUMNS: &str = "id, album_id, info, total_duration, vocal_waveform, \
     instrumental_waveform, instrumental, tempo, key, vocal_folder_path, instrumental_folder_path";

/// Orders tracks by the numeric prefix of their `Track` tag ("3/12" -> 3).
const TRACK_NUMBER_ORDER: &str =
    "CAST(json_extract(info, '$.Track') AS INTEGER), json_extract(info, '$.Track')";

#[derive(Clone)]
pub struct SqliteCatalogStore {
    pub(super) conn: Arc<Mutex<Connection>>,
}

fn json_column<T: DeserializeOwned>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn opt_json_column<T: DeserializeOwned>(
    row: &rusqlite::Row,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        }),
    }
}

/// Maps a row selected with [`TRACK_COLUMNS`].
pub(super) fn row_to_track(row: &rusqlite::Row) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get(0)?,
        album_id: row.get(1)?,
        info: json_column(row, 2)?,
        total_duration: row.get(3)?,
        vocal_waveform: opt_json_column(row, 4)?,
        instrumental_waveform: json_column(row, 5)?,
        instrumental: row.get::<_, i64>(6)? != 0,
        tempo: row.get(7)?,
        key: row.get(8)?,
        vocal_folder_path: row.get(9)?,
        instrumental_folder_path: row.get(10)?,
    })
}

fn row_to_album(row: &rusqlite::Row) -> rusqlite::Result<Album> {
    Ok(Album {
        id: row.get(0)?,
        name: row.get(1)?,
        cover_extension: row.get(2)?,
    })
}

fn row_to_artist_album(row: &rusqlite::Row) -> rusqlite::Result<ArtistAlbum> {
    let track_count: i64 = row.get(4)?;
    Ok(ArtistAlbum {
        artist: row.get(0)?,
        genre: row.get(1)?,
        album_id: row.get(2)?,
        album_name: row.get(3)?,
        track_count: track_count as usize,
    })
}

fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Distinct (artist, genre, album) rows plus how many tracks carry the
/// artist tag across the whole catalog. `{filter}` and `{limit}` are spliced
/// in by the callers.
const ARTISTS_ALBUMS_SQL: &str = "
    WITH artist_albums AS (
        SELECT DISTINCT
            COALESCE(CAST(json_extract(t.info, '$.Artist') AS TEXT), '') AS artist,
            CAST(json_extract(t.info, '$.Genre') AS TEXT) AS genre,
            a.id AS album_id,
            a.name AS album_name
        FROM albums a
        JOIN tracks t ON t.album_id = a.id
        {filter}
    )
    SELECT
        aa.artist,
        aa.genre,
        aa.album_id,
        aa.album_name,
        (SELECT COUNT(DISTINCT t2.id) FROM tracks t2
         WHERE COALESCE(CAST(json_extract(t2.info, '$.Artist') AS TEXT), '') = aa.artist)
    FROM artist_albums aa
    ORDER BY aa.artist, aa.album_name
    {limit}";

impl SqliteCatalogStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned_db(db_path.as_ref(), CATALOG_VERSIONED_SCHEMAS)
            .context("Failed to open catalog database")?;
        info!("Catalog database ready at {:?}", db_path.as_ref());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn count(&self, table: &str) -> usize {
        let conn = self.conn.lock().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| {
            r.get::<_, i64>(0)
        })
        .map(|c| c as usize)
        .unwrap_or(0)
    }
}

impl CatalogStore for SqliteCatalogStore {
    fn get_album(&self, id: &str) -> Result<Option<Album>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT id, name, cover_extension FROM albums WHERE id = ?1",
                params![id],
                row_to_album,
            )
            .optional()?)
    }

    fn get_track(&self, id: &str) -> Result<Option<Track>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM tracks WHERE id = ?1", TRACK_COLUMNS),
                params![id],
                row_to_track,
            )
            .optional()?)
    }

    fn list_albums(&self, page: usize, limit: usize) -> Result<(Vec<Album>, usize)> {
        let offset = page_offset(page, limit)
            .with_context(|| format!("Page {} of {} albums is out of range", page, limit))?;
        let conn = self.conn.lock().unwrap();
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM albums", [], |r| r.get(0))?;
        let mut stmt = conn.prepare_cached(
            "SELECT id, name, cover_extension FROM albums ORDER BY name LIMIT ?1 OFFSET ?2",
        )?;
        let albums = stmt
            .query_map(params![limit as i64, offset], row_to_album)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok((albums, total as usize))
    }

    fn get_album_tracks(&self, album_id: &str) -> Result<Vec<TrackSummary>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT id, COALESCE(CAST(json_extract(info, '$.Title') AS TEXT), ''), total_duration
             FROM tracks WHERE album_id = ?1
             ORDER BY {}",
            TRACK_NUMBER_ORDER
        ))?;
        let tracks = stmt
            .query_map(params![album_id], |row| {
                Ok(TrackSummary {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    duration: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tracks)
    }

    fn search_album_ids(&self, query: &str) -> Result<Vec<String>> {
        let pattern = escape_like(query);
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT DISTINCT album_id FROM tracks
             WHERE json_extract(info, '$.Title') LIKE ?1 ESCAPE '\\'
                OR json_extract(info, '$.Artist') LIKE ?1 ESCAPE '\\'
                OR json_extract(info, '$.Album') LIKE ?1 ESCAPE '\\'
                OR json_extract(info, '$.Genre') LIKE ?1 ESCAPE '\\'
             ORDER BY album_id",
        )?;
        let ids = stmt
            .query_map(params![pattern], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn get_artists_albums_page(&self, page: usize, per_page: usize) -> Result<Vec<ArtistAlbum>> {
        let offset = page_offset(page, per_page)
            .with_context(|| format!("Page {} of {} artists is out of range", page, per_page))?;
        let sql = ARTISTS_ALBUMS_SQL
            .replace("{filter}", "")
            .replace("{limit}", "LIMIT ?1 OFFSET ?2");
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map(params![per_page as i64, offset], row_to_artist_album)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_artists_albums_for(&self, album_ids: &[String]) -> Result<Vec<ArtistAlbum>> {
        let ids = serde_json::to_string(album_ids)?;
        let sql = ARTISTS_ALBUMS_SQL
            .replace("{filter}", "WHERE a.id IN (SELECT value FROM json_each(?1))")
            .replace("{limit}", "");
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map(params![ids], row_to_artist_album)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn import_tracks(&self, uploads: &[TrackUpload]) -> Result<Vec<Track>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut imported = Vec::with_capacity(uploads.len());

        for upload in uploads {
            let album_name = match upload.album_name() {
                Some(name) => name,
                None => bail!(
                    "Album name not found for metadata {}",
                    serde_json::Value::Object(upload.metadata.clone())
                ),
            };

            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM albums WHERE name = ?1",
                    params![album_name],
                    |r| r.get(0),
                )
                .optional()?;
            let album_id = match existing {
                Some(id) => id,
                None => {
                    let id = uuid::Uuid::new_v4().to_string();
                    tx.execute(
                        "INSERT INTO albums (id, name, cover_extension) VALUES (?1, ?2, 'jpg')",
                        params![id, album_name],
                    )?;
                    info!("Created album {} ({})", album_name, id);
                    id
                }
            };

            let track = Track {
                id: uuid::Uuid::new_v4().to_string(),
                album_id,
                info: serde_json::Value::Object(upload.metadata.clone()),
                total_duration: upload.length,
                vocal_waveform: upload.vocal_waveform.clone(),
                instrumental_waveform: upload.instrumental_waveform.clone(),
                instrumental: upload.instrumental,
                tempo: upload.tempo,
                key: upload.key.clone(),
                vocal_folder_path: upload.vocal_folder_path.clone(),
                instrumental_folder_path: upload.instrumental_folder_path.clone(),
            };
            insert_track(&tx, &track)?;
            imported.push(track);
        }

        tx.commit()?;
        Ok(imported)
    }

    fn get_albums_count(&self) -> usize {
        self.count("albums")
    }

    fn get_tracks_count(&self) -> usize {
        self.count("tracks")
    }
}

fn insert_track(conn: &Connection, track: &Track) -> Result<()> {
    let vocal_waveform = track
        .vocal_waveform
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        &format!(
            "INSERT INTO tracks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            TRACK_COLUMNS
        ),
        params![
            track.id,
            track.album_id,
            serde_json::to_string(&track.info)?,
            track.total_duration,
            vocal_waveform,
            serde_json::to_string(&track.instrumental_waveform)?,
            track.instrumental,
            track.tempo,
            track.key,
            track.vocal_folder_path,
            track.instrumental_folder_path,
        ],
    )?;
    Ok(())
}
