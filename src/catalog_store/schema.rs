//! SQLite schema for the catalog database.
//!
//! Albums and tracks are written by the importer and read-only to the
//! server; listening histories are appended and reset by the sampler.

use crate::sqlite_column;
use crate::sqlite_persistence::{ForeignKey, SqlType, Table, VersionedSchema};

const ALBUMS_TABLE_V1: Table = Table {
    name: "albums",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!(
            "cover_extension",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
    ],
    indices: &[],
    unique_constraints: &[&["name"]],
};

const ALBUM_FK: ForeignKey = ForeignKey {
    foreign_table: "albums",
    foreign_column: "id",
};

/// `info` holds the raw tag document as JSON; waveforms are JSON arrays.
const TRACKS_TABLE_V1: Table = Table {
    name: "tracks",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!(
            "album_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ALBUM_FK)
        ),
        sqlite_column!("info", &SqlType::Text, non_null = true),
        sqlite_column!("total_duration", &SqlType::Real, non_null = true),
        sqlite_column!("vocal_waveform", &SqlType::Text),
        sqlite_column!("instrumental_waveform", &SqlType::Text, non_null = true),
        sqlite_column!("instrumental", &SqlType::Integer, non_null = true),
        sqlite_column!("tempo", &SqlType::Real, non_null = true),
        sqlite_column!("key", &SqlType::Text, non_null = true),
        sqlite_column!("vocal_folder_path", &SqlType::Text),
        sqlite_column!("instrumental_folder_path", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_tracks_album_id", "album_id")],
    unique_constraints: &[],
};

const TRACK_FK: ForeignKey = ForeignKey {
    foreign_table: "tracks",
    foreign_column: "id",
};

const LISTENING_HISTORIES_TABLE_V1: Table = Table {
    name: "listening_histories",
    columns: &[
        sqlite_column!(
            "track_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&TRACK_FK)
        ),
        sqlite_column!("anon_id", &SqlType::Text, non_null = true),
        sqlite_column!("listened_at", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_listening_histories_anon_id", "anon_id")],
    unique_constraints: &[],
};

pub const CATALOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[
        ALBUMS_TABLE_V1,
        TRACKS_TABLE_V1,
        LISTENING_HISTORIES_TABLE_V1,
    ],
    migration: None,
}];

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn latest_schema_creates_and_validates() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = CATALOG_VERSIONED_SCHEMAS.last().unwrap();
        schema.create(&conn).unwrap();
        schema.validate(&conn).unwrap();
    }

    #[test]
    fn deleting_track_cascades_to_listening_histories() {
        let conn = Connection::open_in_memory().unwrap();
        CATALOG_VERSIONED_SCHEMAS.last().unwrap().create(&conn).unwrap();

        conn.execute("INSERT INTO albums (id, name) VALUES ('a1', 'demo')", [])
            .unwrap();
        conn.execute(
            "INSERT INTO tracks (id, album_id, info, total_duration, instrumental_waveform,
                instrumental, tempo, key, instrumental_folder_path)
             VALUES ('t1', 'a1', '{}', 10.0, '[]', 0, 120.0, 'C', 'demo/t1')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO listening_histories (track_id, anon_id, listened_at)
             VALUES ('t1', 'x', '2024-01-01T00:00:00Z')",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM tracks WHERE id = 't1'", []).unwrap();
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM listening_histories", [], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
