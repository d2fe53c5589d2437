use super::store::{row_to_track, SqliteCatalogStore, TRACK_COLUMNS};
use crate::catalog_store::Track;
use crate::sampler::ListeningHistoryStore;
use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension};
use std::collections::HashSet;

impl ListeningHistoryStore for SqliteCatalogStore {
    fn list_excluded(&self, client_id: &str) -> Result<HashSet<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT DISTINCT track_id FROM listening_histories WHERE anon_id = ?1",
        )?;
        let ids = stmt
            .query_map(params![client_id], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    fn delete_all(&self, client_id: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        Ok(conn.execute(
            "DELETE FROM listening_histories WHERE anon_id = ?1",
            params![client_id],
        )?)
    }

    fn insert_listening(
        &self,
        track_id: &str,
        client_id: &str,
        listened_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO listening_histories (track_id, anon_id, listened_at) VALUES (?1, ?2, ?3)",
            params![
                track_id,
                client_id,
                listened_at.to_rfc3339_opts(SecondsFormat::Millis, true)
            ],
        )?;
        Ok(())
    }

    fn random_track(&self, excluding: &HashSet<String>) -> Result<Option<Track>> {
        let excluding = serde_json::to_string(excluding)?;
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {} FROM tracks
                     WHERE id NOT IN (SELECT value FROM json_each(?1))
                     ORDER BY RANDOM() LIMIT 1",
                    TRACK_COLUMNS
                ),
                params![excluding],
                row_to_track,
            )
            .optional()?)
    }
}
