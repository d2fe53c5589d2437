//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestClient, DEMO_ALBUM_NAME};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_get_album_tracks() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let album_id = server.album_id(DEMO_ALBUM_NAME);
//!     let response = client.get_album_tracks(&album_id).await;
//!     assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

mod client;
mod constants;
mod fixtures;
mod server;

pub use client::TestClient;
pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::{demo_catalog, single_album_catalog};
pub use server::TestServer;
