//! Artist imagery from the public web player API.
//!
//! Three unauthenticated steps: an anonymous access token, an artist search
//! returning image URLs, and a plain fetch of the chosen image.

use super::ResolveError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_TOKEN_URL: &str =
    "https://open.spotify.com/get_access_token?reason=transport&productType=web_player";
pub const DEFAULT_SEARCH_URL: &str = "https://api.spotify.com/v1/search";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

#[async_trait]
pub trait ArtistImageProvider: Send + Sync {
    /// Raw bytes of the artist's picture, before any transform.
    async fn fetch_artist_image(&self, name: &str) -> Result<Vec<u8>, ResolveError>;
}

#[derive(Clone, Debug)]
pub struct ArtistImagesSettings {
    pub token_url: String,
    pub search_url: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for ArtistImagesSettings {
    fn default() -> Self {
        Self {
            token_url: DEFAULT_TOKEN_URL.to_string(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    artists: Option<ArtistPage>,
}

#[derive(Deserialize)]
struct ArtistPage {
    #[serde(default)]
    items: Vec<SearchArtist>,
}

#[derive(Deserialize)]
struct SearchArtist {
    #[serde(default)]
    images: Vec<SearchImage>,
}

#[derive(Deserialize)]
struct SearchImage {
    url: String,
}

/// Images come largest first; the second one is the mid-sized variant.
fn pick_image_url(response: SearchResponse, name: &str) -> Result<String, ResolveError> {
    let artist = response
        .artists
        .and_then(|page| page.items.into_iter().next())
        .ok_or_else(|| ResolveError::NotFound(format!("artist {}", name)))?;
    let mut images = artist.images.into_iter();
    let first = images.next();
    images
        .next()
        .or(first)
        .map(|image| image.url)
        .ok_or_else(|| ResolveError::NotFound(format!("image for artist {}", name)))
}

fn upstream(step: &str, err: impl std::fmt::Display) -> ResolveError {
    ResolveError::UpstreamUnavailable(format!("{}: {}", step, err))
}

pub struct WebPlayerArtistImages {
    client: Client,
    settings: ArtistImagesSettings,
}

impl WebPlayerArtistImages {
    pub fn new(settings: ArtistImagesSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self { client, settings })
    }

    async fn access_token(&self) -> Result<String, ResolveError> {
        let response = self
            .client
            .get(&self.settings.token_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| upstream("access token", e))?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| upstream("access token", e))?;
        Ok(token.access_token)
    }

    async fn search_image_url(&self, token: &str, name: &str) -> Result<String, ResolveError> {
        let query = name.replace(' ', "-");
        let response = self
            .client
            .get(&self.settings.search_url)
            .query(&[
                ("type", "artist"),
                ("q", query.as_str()),
                ("decorate_restrictions", "false"),
                ("best_match", "true"),
                ("include_external", "audio"),
                ("limit", "1"),
            ])
            .bearer_auth(token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| upstream("artist search", e))?;
        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| upstream("artist search", e))?;
        pick_image_url(body, name)
    }
}

#[async_trait]
impl ArtistImageProvider for WebPlayerArtistImages {
    async fn fetch_artist_image(&self, name: &str) -> Result<Vec<u8>, ResolveError> {
        let token = self.access_token().await?;
        let url = self.search_image_url(&token, name).await?;
        debug!("Fetching image of artist {} from {}", name, url);

        let bytes = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| upstream("artist image", e))?
            .bytes()
            .await
            .map_err(|e| upstream("artist image", e))?;
        Ok(bytes.to_vec())
    }
}
