//! Documents stored in an object-storage bucket behind an HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use super::DocumentStore;
use crate::error::FetchError;
use crate::models::DocumentStoreConfig;
use crate::utils::is_safe_relative_path;

/// Reads objects from `{url}/storage/v1/object/{bucket}/{path}`.
#[derive(Debug, Clone)]
pub struct HttpDocumentStore {
    client: Client,
    base_url: String,
    bucket: String,
    api_key: Option<String>,
    max_size: u64,
}

impl HttpDocumentStore {
    pub fn new(config: &DocumentStoreConfig) -> Result<Self, FetchError> {
        let url = config.url.as_deref().ok_or_else(|| {
            FetchError::InvalidPath("documents.url is required for the http driver".to_string())
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            api_key: config.api_key.clone(),
            max_size: config.max_document_size,
        })
    }

    pub fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        if !is_safe_relative_path(path) {
            return Err(FetchError::InvalidPath(path.to_string()));
        }

        let mut request = self.client.get(self.object_url(path));
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key).header("apikey", key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Request(e)
            }
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Server(format!("status {}: {}", status, body)));
        }

        if let Some(size) = response.content_length()
            && size > self.max_size
        {
            return Err(FetchError::TooLarge {
                size,
                max: self.max_size,
            });
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Request(e)
            }
        })?;
        if bytes.len() as u64 > self.max_size {
            return Err(FetchError::TooLarge {
                size: bytes.len() as u64,
                max: self.max_size,
            });
        }

        tracing::debug!(path, bytes = bytes.len(), bucket = %self.bucket, "downloaded document");
        Ok(bytes.to_vec())
    }

    fn name(&self) -> &str {
        "http"
    }
}
