//! History-aware random track selection.
//!
//! Every client (identified by an anonymous id) walks the catalog without
//! repeats. Once every track has been presented, the client's history is
//! wiped and a new cycle starts. All state lives in the listening history
//! store; nothing is kept in memory between calls.

use crate::catalog_store::Track;
use crate::server::metrics;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

pub trait ListeningHistoryStore: Send + Sync {
    /// Track ids presented to `client_id` since its last reset.
    fn list_excluded(&self, client_id: &str) -> anyhow::Result<HashSet<String>>;

    /// Deletes every listening record of `client_id`, returns how many.
    fn delete_all(&self, client_id: &str) -> anyhow::Result<usize>;

    fn insert_listening(
        &self,
        track_id: &str,
        client_id: &str,
        listened_at: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    /// A uniformly random track whose id is not in `excluding`.
    fn random_track(&self, excluding: &HashSet<String>) -> anyhow::Result<Option<Track>>;
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("No tracks found")]
    CatalogExhausted,

    #[error("listening history store failure: {0}")]
    Store(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct HistorySampler {
    store: Arc<dyn ListeningHistoryStore>,
}

impl HistorySampler {
    pub fn new(store: Arc<dyn ListeningHistoryStore>) -> Self {
        Self { store }
    }

    /// Picks the next track for `client_id` without recording it.
    ///
    /// Resets the client's history when it already covers the whole
    /// catalog. The reset and the following selection are separate store
    /// calls, a concurrent pick for the same client may observe the wiped
    /// history in between.
    pub fn pick(&self, client_id: &str) -> Result<Track, SampleError> {
        let excluded = self.store.list_excluded(client_id)?;
        if let Some(track) = self.store.random_track(&excluded)? {
            debug!(
                "Picked track {} for client {} ({} excluded)",
                track.id,
                client_id,
                excluded.len()
            );
            return Ok(track);
        }

        if excluded.is_empty() {
            return Err(SampleError::CatalogExhausted);
        }

        let deleted = self.store.delete_all(client_id)?;
        metrics::record_history_reset();
        info!(
            "Client {} exhausted the catalog, reset {} listening records",
            client_id, deleted
        );

        self.store
            .random_track(&HashSet::new())?
            .ok_or(SampleError::CatalogExhausted)
    }

    /// Adds `track_id` to the client's exclusion set.
    pub fn record(&self, track_id: &str, client_id: &str) -> Result<(), SampleError> {
        self.store.insert_listening(track_id, client_id, Utc::now())?;
        Ok(())
    }
}
