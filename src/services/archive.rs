use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::config::ArchiveConfig;
use crate::providers::ProviderError;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive storage is not configured")]
    NotConfigured,

    #[error("Archived object '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Blob-style object store for exported insight files
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Store `body` under `key`, replacing any previous object; returns the
    /// object's URL (without credentials).
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<String, ArchiveError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, ArchiveError>;
}

/// Azure Blob container addressed by URL and authorized with a SAS token
pub struct AzureBlobStore {
    http: reqwest::Client,
    container_url: String,
    sas_token: String,
}

impl AzureBlobStore {
    pub fn new(http: reqwest::Client, container_url: impl Into<String>, sas_token: impl Into<String>) -> Self {
        Self {
            http,
            container_url: container_url.into(),
            sas_token: sas_token.into(),
        }
    }

    pub fn from_config(http: reqwest::Client, config: &ArchiveConfig) -> Option<Self> {
        let container_url = config.container_url.clone()?;
        Some(Self::new(http, container_url, config.sas_token.clone().unwrap_or_default()))
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.container_url, key)
    }

    fn signed_url(&self, key: &str) -> String {
        if self.sas_token.is_empty() {
            self.object_url(key)
        } else {
            format!("{}?{}", self.object_url(key), self.sas_token)
        }
    }
}

async fn status_error(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    ProviderError::Status {
        status,
        body: serde_json::Value::String(text),
    }
}

#[async_trait]
impl ArchiveStore for AzureBlobStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<String, ArchiveError> {
        debug!("Uploading {} bytes to blob {}", body.len(), key);
        let response = self
            .http
            .put(self.signed_url(key))
            .header("x-ms-blob-type", "BlockBlob")
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(ProviderError::from)?;

        if !response.status().is_success() {
            let err = status_error(response).await;
            error!("Blob upload for {} failed: {}", key, err);
            return Err(err.into());
        }
        Ok(self.object_url(key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, ArchiveError> {
        let response = self
            .http
            .get(self.signed_url(key))
            .send()
            .await
            .map_err(ProviderError::from)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ArchiveError::NotFound(key.to_string()));
        }
        if !response.status().is_success() {
            return Err(status_error(response).await.into());
        }
        let bytes = response.bytes().await.map_err(ProviderError::from)?;
        Ok(bytes.to_vec())
    }
}

/// Archive kept in process memory (development and tests)
#[derive(Default)]
pub struct MemoryArchiveStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryArchiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ArchiveStore for MemoryArchiveStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<String, ArchiveError> {
        self.objects.write().await.insert(key.to_string(), body);
        Ok(format!("memory://archive/{}", key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, ArchiveError> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| ArchiveError::NotFound(key.to_string()))
    }
}

/// Stand-in used when no container is configured; every call fails
pub struct DisabledArchiveStore;

#[async_trait]
impl ArchiveStore for DisabledArchiveStore {
    async fn put(&self, _key: &str, _body: Vec<u8>) -> Result<String, ArchiveError> {
        Err(ArchiveError::NotConfigured)
    }

    async fn get(&self, _key: &str) -> Result<Vec<u8>, ArchiveError> {
        Err(ArchiveError::NotConfigured)
    }
}
