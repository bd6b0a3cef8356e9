//! Documents stored under a local directory.

use std::path::PathBuf;

use async_trait::async_trait;

use super::DocumentStore;
use crate::error::FetchError;
use crate::utils::is_safe_relative_path;

#[derive(Debug, Clone)]
pub struct LocalDocumentStore {
    /// Directory that document paths are resolved against
    root: PathBuf,

    /// Maximum document size in bytes
    max_size: u64,
}

impl LocalDocumentStore {
    pub fn new(root: PathBuf, max_size: u64) -> Self {
        Self { root, max_size }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, FetchError> {
        if !is_safe_relative_path(path) {
            return Err(FetchError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let full_path = self.resolve(path)?;

        let metadata = match tokio::fs::metadata(&full_path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FetchError::NotFound(path.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Err(FetchError::NotFound(path.to_string()));
        }
        if metadata.len() > self.max_size {
            return Err(FetchError::TooLarge {
                size: metadata.len(),
                max: self.max_size,
            });
        }

        let bytes = tokio::fs::read(&full_path).await?;
        tracing::debug!(path, bytes = bytes.len(), "read local document");
        Ok(bytes)
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fetch_existing_document() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("alice")).unwrap();
        std::fs::write(dir.path().join("alice/cc.md"), "# Intro\nA").unwrap();

        let store = LocalDocumentStore::new(dir.path().to_path_buf(), 1024);
        let bytes = store.fetch("alice/cc.md").await.unwrap();
        assert_eq!(bytes, b"# Intro\nA");
    }

    #[tokio::test]
    async fn test_fetch_missing_document() {
        let dir = TempDir::new().unwrap();
        let store = LocalDocumentStore::new(dir.path().to_path_buf(), 1024);
        assert!(matches!(
            store.fetch("alice/none.md").await,
            Err(FetchError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let store = LocalDocumentStore::new(dir.path().to_path_buf(), 1024);
        assert!(matches!(
            store.fetch("../etc/passwd").await,
            Err(FetchError::InvalidPath(_))
        ));
        assert!(matches!(
            store.fetch("/etc/passwd").await,
            Err(FetchError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_rejects_oversized_document() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("big.txt"), vec![b'a'; 64]).unwrap();

        let store = LocalDocumentStore::new(dir.path().to_path_buf(), 16);
        assert!(matches!(
            store.fetch("big.txt").await,
            Err(FetchError::TooLarge { size: 64, max: 16 })
        ));
    }
}
