mod listening;
mod models;
mod schema;
mod store;

pub use models::*;
pub use schema::CATALOG_VERSIONED_SCHEMAS;
pub use store::SqliteCatalogStore;

use anyhow::Result;

/// Largest page the paging queries serve.
pub const MAX_PAGE_SIZE: usize = 500;

/// Row offset of the 1-based `page` of `per_page` rows. `None` when either
/// value is out of range or the offset does not fit an SQLite integer.
pub fn page_offset(page: usize, per_page: usize) -> Option<i64> {
    if page == 0 || per_page == 0 || per_page > MAX_PAGE_SIZE {
        return None;
    }
    (page - 1)
        .checked_mul(per_page)
        .and_then(|offset| i64::try_from(offset).ok())
}

/// Read access to the catalog plus the importer's write path.
pub trait CatalogStore: Send + Sync {
    fn get_album(&self, id: &str) -> Result<Option<Album>>;

    fn get_track(&self, id: &str) -> Result<Option<Track>>;

    /// Albums ordered by name, `page` is 1-based. Returns the page and the
    /// total number of albums.
    fn list_albums(&self, page: usize, limit: usize) -> Result<(Vec<Album>, usize)>;

    /// Tracks of an album ordered by their `Track` tag.
    fn get_album_tracks(&self, album_id: &str) -> Result<Vec<TrackSummary>>;

    /// Distinct ids of albums having a track whose title, artist, album or
    /// genre tag contains `query`.
    fn search_album_ids(&self, query: &str) -> Result<Vec<String>>;

    fn get_artists_albums_page(&self, page: usize, per_page: usize) -> Result<Vec<ArtistAlbum>>;

    fn get_artists_albums_for(&self, album_ids: &[String]) -> Result<Vec<ArtistAlbum>>;

    /// Inserts uploaded tracks, creating albums by name as needed.
    fn import_tracks(&self, uploads: &[TrackUpload]) -> Result<Vec<Track>>;

    fn get_albums_count(&self) -> usize;

    fn get_tracks_count(&self) -> usize;
}
