//! Shared constants for end-to-end tests

// ============================================================================
// Test Catalog
// ============================================================================

/// Album with three tracks, all by `ARTIST_1_NAME`.
pub const DEMO_ALBUM_NAME: &str = "Demo Album";

/// Album with a single instrumental track by `ARTIST_2_NAME`.
pub const NIGHT_ALBUM_NAME: &str = "Night Drive";

pub const ARTIST_1_NAME: &str = "The Test Band";

pub const ARTIST_2_NAME: &str = "Jazz Ensemble";

pub const GENRE_1: &str = "House";

/// Titles of the demo album tracks, in track number order.
pub const DEMO_TRACK_TITLES: [&str; 3] = ["Intro", "Groove", "Outro"];

pub const NIGHT_TRACK_TITLE: &str = "Midnight";

// ============================================================================
// Test Assets
// ============================================================================

/// Original cover bytes served by the test origin for every album.
pub const COVER_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

/// Picture returned by the fake artist image provider.
pub const ARTIST_PHOTO_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

// ============================================================================
// Timeouts
// ============================================================================

pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

pub const REQUEST_TIMEOUT_SECS: u64 = 10;
