//! Lazy cache of album covers and artist photos.
//!
//! Entries are populated on first request from the blob origin (covers) or
//! the artist image provider (photos), normalized through the image
//! transformer, then stored forever. There is no locking: two concurrent
//! misses for the same key both populate, and the store keeps whichever
//! write lands first.

mod artist_images;
mod origin;
mod store;
mod transform;

pub use artist_images::{
    ArtistImageProvider, ArtistImagesSettings, WebPlayerArtistImages, DEFAULT_SEARCH_URL,
    DEFAULT_TOKEN_URL, DEFAULT_USER_AGENT,
};
pub use origin::{BlobOrigin, DirectoryOrigin, HttpOrigin};
pub use store::{SqliteAssetStore, ASSET_VERSIONED_SCHEMAS};
pub use transform::{
    ConvertTransformer, Geometry, ImageTransformer, TransformError, TransformSpec,
};

use crate::server::metrics;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Cover,
    ArtistPhoto,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Cover => "cover",
            AssetKind::ArtistPhoto => "artist_photo",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AssetEntry {
    pub kind: AssetKind,
    /// Album id for covers, artist display name for photos.
    pub subject_key: String,
    pub encoded_bytes: Vec<u8>,
}

pub trait AssetStore: Send + Sync {
    fn get(&self, kind: AssetKind, subject_key: &str) -> anyhow::Result<Option<AssetEntry>>;

    /// Must succeed when an entry for the same kind and key already exists.
    fn put(&self, entry: &AssetEntry) -> anyhow::Result<()>;
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("image transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("asset store failure: {0}")]
    Store(#[from] anyhow::Error),
}

/// Object key of an album's original cover in the blob origin.
pub fn cover_object_key(album_name: &str) -> String {
    format!("{}/cover.jpg", album_name)
}

#[derive(Clone, Debug)]
pub struct AssetSpecs {
    pub cover: TransformSpec,
    pub artist_photo: TransformSpec,
}

impl Default for AssetSpecs {
    fn default() -> Self {
        Self {
            cover: TransformSpec::cover(400, 85),
            artist_photo: TransformSpec::artist_photo(200),
        }
    }
}

#[derive(Clone)]
pub struct AssetCache {
    store: Arc<dyn AssetStore>,
    origin: Arc<dyn BlobOrigin>,
    artist_images: Arc<dyn ArtistImageProvider>,
    transformer: Arc<dyn ImageTransformer>,
    specs: AssetSpecs,
}

impl AssetCache {
    pub fn new(
        store: Arc<dyn AssetStore>,
        origin: Arc<dyn BlobOrigin>,
        artist_images: Arc<dyn ArtistImageProvider>,
        transformer: Arc<dyn ImageTransformer>,
        specs: AssetSpecs,
    ) -> Self {
        Self {
            store,
            origin,
            artist_images,
            transformer,
            specs,
        }
    }

    fn cached(&self, kind: AssetKind, subject_key: &str) -> Result<Option<Vec<u8>>, ResolveError> {
        let entry = self.store.get(kind, subject_key)?;
        if entry.is_some() {
            debug!("{} cache hit for {}", kind.as_str(), subject_key);
            metrics::record_asset_resolution(kind.as_str(), "hit");
        }
        Ok(entry.map(|e| e.encoded_bytes))
    }

    async fn transform(
        &self,
        kind: AssetKind,
        raw: &[u8],
        spec: &TransformSpec,
    ) -> Result<Vec<u8>, TransformError> {
        let started = Instant::now();
        let result = self.transformer.transform(raw, spec).await;
        metrics::record_asset_transform(kind.as_str(), started.elapsed());
        result
    }

    fn populate(
        &self,
        kind: AssetKind,
        subject_key: &str,
        encoded_bytes: Vec<u8>,
    ) -> Result<Vec<u8>, ResolveError> {
        let entry = AssetEntry {
            kind,
            subject_key: subject_key.to_string(),
            encoded_bytes,
        };
        self.store.put(&entry)?;
        info!(
            "Cached {} for {} ({} bytes)",
            kind.as_str(),
            subject_key,
            entry.encoded_bytes.len()
        );
        metrics::record_asset_resolution(kind.as_str(), "populated");
        Ok(entry.encoded_bytes)
    }

    /// Cover art of an album, keyed by album id.
    ///
    /// `Ok(None)` means the origin image could not be transformed; nothing
    /// is stored and the next call starts over.
    pub async fn resolve_cover(
        &self,
        album_id: &str,
        album_name: &str,
    ) -> Result<Option<Vec<u8>>, ResolveError> {
        let kind = AssetKind::Cover;
        if let Some(bytes) = self.cached(kind, album_id)? {
            return Ok(Some(bytes));
        }

        let object_key = cover_object_key(album_name);
        let raw = match self.origin.get(&object_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                metrics::record_asset_resolution(kind.as_str(), "failed");
                return Err(ResolveError::UpstreamUnavailable(format!(
                    "{} is missing from the origin",
                    object_key
                )));
            }
            Err(e) => {
                metrics::record_asset_resolution(kind.as_str(), "failed");
                return Err(ResolveError::UpstreamUnavailable(format!(
                    "{}: {:#}",
                    object_key, e
                )));
            }
        };

        match self.transform(kind, &raw, &self.specs.cover).await {
            Ok(bytes) => self.populate(kind, album_id, bytes).map(Some),
            Err(e) => {
                warn!("Serving album {} without cover: {}", album_id, e);
                metrics::record_asset_resolution(kind.as_str(), "degraded");
                Ok(None)
            }
        }
    }

    /// Photo of an artist, keyed by display name. Every failure is fatal.
    pub async fn resolve_artist_photo(&self, name: &str) -> Result<Vec<u8>, ResolveError> {
        let kind = AssetKind::ArtistPhoto;
        if let Some(bytes) = self.cached(kind, name)? {
            return Ok(bytes);
        }

        let raw = self
            .artist_images
            .fetch_artist_image(name)
            .await
            .inspect_err(|_| metrics::record_asset_resolution(kind.as_str(), "failed"))?;

        let bytes = self
            .transform(kind, &raw, &self.specs.artist_photo)
            .await
            .inspect_err(|e| {
                warn!("Failed to transform photo of artist {}: {}", name, e);
                metrics::record_asset_resolution(kind.as_str(), "failed");
            })?;

        self.populate(kind, name, bytes)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::sync::atomic::Ordering;

    /// Baseline JPEG of a 10x10 gray square.
    const TINY_JPEG: &[u8] = &[
        0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00, 0x00,
        0x01, 0x00, 0x01, 0x00, 0x00, 0xFF, 0xC0, 0x00, 0x0B, 0x08, 0x00, 0x0A, 0x00, 0x0A, 0x01,
        0x01, 0x11, 0x00, 0xFF, 0xD9,
    ];

    #[tokio::test]
    async fn demo_cover_is_populated_once_then_served_from_cache() {
        let fakes = Fakes::new(
            FakeOrigin::with_object("demo/cover.jpg", TINY_JPEG),
            FakeTransformer::default(),
        );
        let cache = fakes.cache();

        let first = cache.resolve_cover("album-1", "demo").await.unwrap().unwrap();
        let mut expected = b"resized:".to_vec();
        expected.extend_from_slice(TINY_JPEG);
        assert_eq!(first, expected);
        assert_eq!(
            fakes.store.get(AssetKind::Cover, "album-1").unwrap().unwrap().encoded_bytes,
            expected
        );
        assert_eq!(
            fakes.transformer.specs.lock().unwrap()[0].geometry,
            Geometry::MaxWidth(400)
        );

        let second = cache.resolve_cover("album-1", "demo").await.unwrap().unwrap();
        assert_eq!(second, first);
        assert_eq!(fakes.origin.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fakes.transformer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transform_failure_degrades_without_poisoning_the_key() {
        let fakes = Fakes::new(
            FakeOrigin::with_object("demo/cover.jpg", TINY_JPEG),
            FakeTransformer::failing(),
        );
        let cache = fakes.cache();

        assert_eq!(cache.resolve_cover("album-1", "demo").await.unwrap(), None);
        assert_eq!(fakes.store.len(), 0);
        assert_eq!(fakes.store.puts.load(Ordering::SeqCst), 0);

        fakes.transformer.failing.store(false, Ordering::SeqCst);
        let bytes = cache.resolve_cover("album-1", "demo").await.unwrap();
        assert!(bytes.is_some());
        assert_eq!(fakes.store.len(), 1);
        assert_eq!(fakes.origin.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn origin_failure_is_fatal_and_not_cached() {
        let fakes = Fakes::new(FakeOrigin::default(), FakeTransformer::default());
        fakes.origin.broken.store(true, Ordering::SeqCst);
        let cache = fakes.cache();

        assert!(matches!(
            cache.resolve_cover("album-1", "demo").await,
            Err(ResolveError::UpstreamUnavailable(_))
        ));
        assert_eq!(fakes.transformer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(fakes.store.len(), 0);
    }

    #[tokio::test]
    async fn missing_origin_object_is_upstream_unavailable() {
        let fakes = Fakes::new(FakeOrigin::default(), FakeTransformer::default());
        let cache = fakes.cache();

        let err = cache.resolve_cover("album-1", "demo").await.unwrap_err();
        assert!(
            matches!(err, ResolveError::UpstreamUnavailable(ref m) if m.contains("demo/cover.jpg"))
        );
    }

    #[tokio::test]
    async fn concurrent_misses_settle_on_one_entry() {
        let fakes = Fakes::new(
            FakeOrigin::with_object("demo/cover.jpg", TINY_JPEG),
            FakeTransformer::default(),
        );
        let cache = fakes.cache();

        let (a, b) = tokio::join!(
            cache.resolve_cover("album-1", "demo"),
            cache.resolve_cover("album-1", "demo")
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(fakes.store.len(), 1);
    }

    #[tokio::test]
    async fn artist_photo_is_fetched_once_and_resized_square() {
        let fakes = Fakes::new(FakeOrigin::default(), FakeTransformer::default());
        fakes
            .artist_images
            .images
            .lock()
            .unwrap()
            .insert("Band".to_string(), b"raw".to_vec());
        let cache = fakes.cache();

        let first = cache.resolve_artist_photo("Band").await.unwrap();
        let second = cache.resolve_artist_photo("Band").await.unwrap();
        assert_eq!(first, b"resized:raw");
        assert_eq!(first, second);
        assert_eq!(fakes.artist_images.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            fakes.transformer.specs.lock().unwrap()[0].geometry,
            Geometry::Square(200)
        );
    }

    #[tokio::test]
    async fn artist_photo_failures_are_fatal() {
        let fakes = Fakes::new(FakeOrigin::default(), FakeTransformer::failing());
        fakes
            .artist_images
            .images
            .lock()
            .unwrap()
            .insert("Band".to_string(), b"raw".to_vec());
        let cache = fakes.cache();

        assert!(matches!(
            cache.resolve_artist_photo("Nobody").await,
            Err(ResolveError::NotFound(_))
        ));
        assert!(matches!(
            cache.resolve_artist_photo("Band").await,
            Err(ResolveError::Transform(_))
        ));
        assert_eq!(fakes.store.len(), 0);
    }

    #[tokio::test]
    async fn cache_works_over_sqlite_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(SqliteAssetStore::new(dir.path().join("assets.db")).unwrap());
        let fakes = Fakes::new(
            FakeOrigin::with_object("demo/cover.jpg", TINY_JPEG),
            FakeTransformer::default(),
        );
        let cache = AssetCache::new(
            store.clone(),
            fakes.origin.clone(),
            fakes.artist_images.clone(),
            fakes.transformer.clone(),
            AssetSpecs::default(),
        );

        let first = cache.resolve_cover("album-1", "demo").await.unwrap();
        let second = cache.resolve_cover("album-1", "demo").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.count(AssetKind::Cover).unwrap(), 1);
        assert_eq!(fakes.origin.calls.load(Ordering::SeqCst), 1);
    }
}
