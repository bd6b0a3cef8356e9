//! Document store backends.
//!
//! The ingestion pipeline only needs `fetch(path) -> bytes`. Uploaded files
//! live either under a local directory or in an object-storage bucket served
//! over HTTP.

mod http;
mod local;

pub use http::HttpDocumentStore;
pub use local::LocalDocumentStore;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::models::{DocumentDriver, DocumentStoreConfig};

/// Source of raw uploaded document bytes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the full contents of the document at `path`.
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError>;

    /// Human-readable name.
    fn name(&self) -> &str;
}

pub type SharedDocumentStore = Arc<dyn DocumentStore>;

/// Build the document store selected by configuration.
pub fn create_document_store(
    config: &DocumentStoreConfig,
) -> Result<SharedDocumentStore, FetchError> {
    match config.driver {
        DocumentDriver::Local => Ok(Arc::new(LocalDocumentStore::new(
            config.root.clone(),
            config.max_document_size,
        ))),
        DocumentDriver::Http => Ok(Arc::new(HttpDocumentStore::new(config)?)),
    }
}
