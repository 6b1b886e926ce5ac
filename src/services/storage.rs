use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::StorageConfig;

/// Remote object storage for post attachments. The provider owns the bytes;
/// this crate only ever holds URLs.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload an object and return its public URL.
    async fn put(&self, key: &str, content_type: &str, bytes: Vec<u8>) -> Result<String>;

    /// Delete an object by the URL previously returned from `put`.
    async fn delete(&self, url: &str) -> Result<()>;
}

/// HTTP-backed provider: PUT/DELETE against a storage gateway.
pub struct HttpObjectStorage {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpObjectStorage {
    #[must_use]
    pub fn new(client: reqwest::Client, config: &StorageConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn put(&self, key: &str, content_type: &str, bytes: Vec<u8>) -> Result<String> {
        let url = format!("{}/{}", self.base_url, key);

        let response = self
            .authorized(self.client.put(&url))
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await
            .context("Storage upload request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Storage upload rejected with status {}", response.status());
        }

        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<()> {
        let response = self
            .authorized(self.client.delete(url))
            .send()
            .await
            .context("Storage delete request failed")?;

        // A missing object is fine: the row it backed is gone either way.
        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            anyhow::bail!("Storage delete rejected with status {}", response.status());
        }

        debug!(url, "Deleted remote object");
        Ok(())
    }
}

/// In-process storage used by tests and local development.
#[derive(Default)]
pub struct MemoryObjectStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.objects.lock().await.contains_key(url)
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn put(&self, key: &str, _content_type: &str, bytes: Vec<u8>) -> Result<String> {
        let url = format!("memory://{key}");
        self.objects.lock().await.insert(url.clone(), bytes);
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<()> {
        self.objects.lock().await.remove(url);
        Ok(())
    }
}
