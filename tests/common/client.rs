//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per server endpoint. When API routes or
//! request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::json;
use std::time::Duration;

pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("Request failed")
    }

    // ========================================================================
    // Content Endpoints
    // ========================================================================

    pub async fn get_albums(&self, page: usize, limit: usize) -> Response {
        self.get(&format!("/albums?page={}&limit={}", page, limit))
            .await
    }

    pub async fn get_albums_raw(&self, query: &str) -> Response {
        self.get(&format!("/albums{}", query)).await
    }

    pub async fn get_album_tracks(&self, album_id: &str) -> Response {
        self.get(&format!("/track/album/{}", album_id)).await
    }

    pub async fn get_track(&self, track_id: &str) -> Response {
        self.get(&format!("/track/{}", track_id)).await
    }

    pub async fn get_artist_photo(&self, name: &str) -> Response {
        self.get(&format!("/artist/photo?name={}", urlencoding::encode(name)))
            .await
    }

    // ========================================================================
    // API Endpoints
    // ========================================================================

    pub async fn random_track(&self, anon_id: &str) -> Response {
        self.client
            .post(format!("{}/track/random", self.base_url))
            .json(&json!({ "anonId": anon_id }))
            .send()
            .await
            .expect("Random track request failed")
    }

    pub async fn search(&self, query: &str) -> Response {
        self.get(&format!("/search?q={}", urlencoding::encode(query)))
            .await
    }

    pub async fn artists_albums_page(&self, page: usize, per_page: usize) -> Response {
        self.client
            .post(format!(
                "{}/artists-albums?paged=true&page={}&per_page={}",
                self.base_url, page, per_page
            ))
            .send()
            .await
            .expect("Artists albums request failed")
    }

    pub async fn artists_albums_for(&self, album_ids: &[String]) -> Response {
        self.client
            .post(format!("{}/artists-albums?paged=false", self.base_url))
            .json(&album_ids)
            .send()
            .await
            .expect("Artists albums request failed")
    }

    pub async fn artists_albums_raw(&self, query: &str) -> Response {
        self.client
            .post(format!("{}/artists-albums{}", self.base_url, query))
            .send()
            .await
            .expect("Artists albums request failed")
    }

    // ========================================================================
    // Service Endpoints
    // ========================================================================

    pub async fn health(&self) -> Response {
        self.get("/health").await
    }
}
