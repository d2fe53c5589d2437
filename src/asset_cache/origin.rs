//! Authoritative sources of raw asset bytes.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Read-only blob store addressed by `/`-separated object keys.
#[async_trait]
pub trait BlobOrigin: Send + Sync {
    /// `Ok(None)` when the object does not exist.
    async fn get(&self, object_key: &str) -> Result<Option<Vec<u8>>>;
}

/// Blob origin backed by a local directory, object keys are relative paths.
pub struct DirectoryOrigin {
    root: PathBuf,
}

impl DirectoryOrigin {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, object_key: &str) -> Result<PathBuf> {
        let relative = Path::new(object_key);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            bail!("Invalid object key {:?}", object_key);
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobOrigin for DirectoryOrigin {
    async fn get(&self, object_key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resolve(object_key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", path)),
        }
    }
}

/// Blob origin reachable over plain HTTP, such as a public bucket endpoint.
pub struct HttpOrigin {
    client: Client,
    base_url: String,
}

impl HttpOrigin {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn object_url(&self, object_key: &str) -> String {
        let encoded: Vec<String> = object_key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.base_url, encoded.join("/"))
    }
}

#[async_trait]
impl BlobOrigin for HttpOrigin {
    async fn get(&self, object_key: &str) -> Result<Option<Vec<u8>>> {
        let url = self.object_url(object_key);
        debug!("Fetching origin object {}", url);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            status if status.is_success() => Ok(Some(response.bytes().await?.to_vec())),
            StatusCode::NOT_FOUND => Ok(None),
            status => bail!("Origin request for {} failed with status {}", url, status),
        }
    }
}
