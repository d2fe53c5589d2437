use super::{AssetEntry, AssetKind, AssetStore};
use crate::sqlite_column;
use crate::sqlite_persistence::{open_versioned_db, SqlType, Table, VersionedSchema};
use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

const ASSET_CACHE_TABLE_V1: Table = Table {
    name: "asset_cache",
    columns: &[
        sqlite_column!("kind", &SqlType::Text, non_null = true),
        sqlite_column!("subject_key", &SqlType::Text, non_null = true),
        sqlite_column!("encoded_bytes", &SqlType::Blob, non_null = true),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[&["kind", "subject_key"]],
};

pub const ASSET_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[ASSET_CACHE_TABLE_V1],
    migration: None,
}];

/// Persisted cache entries. Rows are never updated once written.
#[derive(Clone)]
pub struct SqliteAssetStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAssetStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_versioned_db(db_path.as_ref(), ASSET_VERSIONED_SCHEMAS)
            .context("Failed to open asset database")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn count(&self, kind: AssetKind) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM asset_cache WHERE kind = ?1",
            params![kind.as_str()],
            |r| r.get(0),
        )?;
        Ok(count as usize)
    }
}

impl AssetStore for SqliteAssetStore {
    fn get(&self, kind: AssetKind, subject_key: &str) -> Result<Option<AssetEntry>> {
        let conn = self.conn.lock().unwrap();
        let bytes: Option<Vec<u8>> = conn
            .query_row(
                "SELECT encoded_bytes FROM asset_cache WHERE kind = ?1 AND subject_key = ?2",
                params![kind.as_str(), subject_key],
                |r| r.get(0),
            )
            .optional()?;
        Ok(bytes.map(|encoded_bytes| AssetEntry {
            kind,
            subject_key: subject_key.to_string(),
            encoded_bytes,
        }))
    }

    fn put(&self, entry: &AssetEntry) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO asset_cache (kind, subject_key, encoded_bytes, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.kind.as_str(),
                entry.subject_key,
                entry.encoded_bytes,
                Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
            ],
        )?;
        if inserted == 0 {
            debug!(
                "{} entry for {} already present, keeping the first write",
                entry.kind.as_str(),
                entry.subject_key
            );
        }
        Ok(())
    }
}
