//! Persistent similarity index shared by every owner.
//!
//! The store is a handle over two files on disk. Every operation starts from
//! a fresh load. Writers hold an exclusive lock across load, mutate and
//! persist so concurrent ingestions cannot clobber each other; readers share
//! the lock and only ever see files that were atomically renamed into place.

mod flat;
mod snapshot;

pub use flat::FlatIndex;
pub use snapshot::{IndexFiles, Snapshot};

use std::collections::HashSet;
use std::sync::Arc;

use ndarray::Array2;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::VectorStoreError;
use crate::models::{Chunk, DocumentRef, IndexConfig, ScoredChunk};
use crate::utils::l2_normalize;

/// Result of a write against the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppendReport {
    pub added: usize,
    pub removed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub entries: usize,
    pub dimension: usize,
    pub owners: usize,
    pub documents: usize,
    pub generation: u64,
}

pub struct VectorIndexStore {
    files: IndexFiles,
    dimension: usize,
    lock: Arc<RwLock<()>>,
}

impl VectorIndexStore {
    /// Create a store handle. Nothing is read until the first operation.
    pub fn open(config: &IndexConfig, dimension: usize) -> Self {
        Self::with_files(IndexFiles::from_config(config), dimension)
    }

    pub fn with_files(files: IndexFiles, dimension: usize) -> Self {
        Self {
            files,
            dimension,
            lock: Arc::new(RwLock::new(())),
        }
    }

    pub fn files(&self) -> &IndexFiles {
        &self.files
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Read the current index and its metadata.
    pub async fn load(&self) -> Result<Snapshot, VectorStoreError> {
        let _guard = self.lock.read().await;
        let files = self.files.clone();
        let dimension = self.dimension;
        run_blocking(move || files.load(dimension)).await
    }

    /// Append one document's chunks with their embeddings.
    ///
    /// An empty batch succeeds without touching the files. Vectors are
    /// normalized to unit length, and records get `chunk_index` 0..n in
    /// chunk order.
    pub async fn append(
        &self,
        document: &DocumentRef,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<AppendReport, VectorStoreError> {
        self.write(document, chunks, vectors, false).await
    }

    /// Drop every entry for `(owner, doc_path)` and append the new batch in
    /// the same critical section.
    pub async fn replace_document(
        &self,
        document: &DocumentRef,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<AppendReport, VectorStoreError> {
        self.write(document, chunks, vectors, true).await
    }

    /// Delete every entry for `(owner, doc_path)`; returns how many were removed.
    pub async fn remove_document(
        &self,
        owner: &str,
        doc_path: &str,
    ) -> Result<usize, VectorStoreError> {
        let _guard = self.lock.write().await;
        let files = self.files.clone();
        let dimension = self.dimension;
        let owner = owner.to_string();
        let doc_path = doc_path.to_string();

        run_blocking(move || {
            let mut snapshot = files.load(dimension)?;
            let removed = snapshot.remove_where(|r| r.belongs_to(&owner, &doc_path));
            if removed == 0 {
                return Err(VectorStoreError::NotFound(format!(
                    "no entries for {owner}:{doc_path}"
                )));
            }
            files.save(&mut snapshot)?;
            tracing::info!(%owner, %doc_path, removed, total = snapshot.len(), "removed document");
            Ok(removed)
        })
        .await
    }

    /// The `top_k` entries most similar to `query`, best first, across all owners.
    pub async fn search(
        &self,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let _guard = self.lock.read().await;
        let files = self.files.clone();
        let dimension = self.dimension;
        let query = query.to_vec();

        run_blocking(move || files.load(dimension)?.nearest(&query, top_k)).await
    }

    pub async fn stats(&self) -> Result<IndexStats, VectorStoreError> {
        let snapshot = self.load().await?;
        let owners: HashSet<&str> = snapshot.records.iter().map(|r| r.owner.as_str()).collect();
        let documents: HashSet<(&str, &str)> = snapshot
            .records
            .iter()
            .map(|r| (r.owner.as_str(), r.doc_path.as_str()))
            .collect();

        Ok(IndexStats {
            entries: snapshot.len(),
            dimension: snapshot.index.dimension(),
            owners: owners.len(),
            documents: documents.len(),
            generation: snapshot.generation,
        })
    }

    async fn write(
        &self,
        document: &DocumentRef,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
        replace: bool,
    ) -> Result<AppendReport, VectorStoreError> {
        validate_batch(document, chunks, vectors)?;
        if chunks.is_empty() && !replace {
            return Ok(AppendReport {
                added: 0,
                removed: 0,
                total: self.load().await?.len(),
            });
        }
        let matrix = to_unit_matrix(vectors, self.dimension)?;

        let _guard = self.lock.write().await;
        let files = self.files.clone();
        let dimension = self.dimension;
        let document = document.clone();
        let chunks = chunks.to_vec();

        run_blocking(move || {
            let mut snapshot = files.load(dimension)?;
            let removed = if replace {
                snapshot.remove_where(|r| r.belongs_to(&document.owner, &document.doc_path))
            } else {
                0
            };
            let added = snapshot.append(&document, &chunks, &matrix)?;

            if added > 0 || removed > 0 {
                files.save(&mut snapshot)?;
            }
            tracing::debug!(
                owner = %document.owner,
                doc_path = %document.doc_path,
                added,
                removed,
                total = snapshot.len(),
                generation = snapshot.generation,
                "index updated"
            );
            Ok(AppendReport {
                added,
                removed,
                total: snapshot.len(),
            })
        })
        .await
    }
}

fn validate_batch(
    document: &DocumentRef,
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
) -> Result<(), VectorStoreError> {
    if document.owner.trim().is_empty() {
        return Err(VectorStoreError::InvalidInput("owner is empty".to_string()));
    }
    if document.doc_path.trim().is_empty() {
        return Err(VectorStoreError::InvalidInput(
            "document path is empty".to_string(),
        ));
    }
    if chunks.len() != vectors.len() {
        return Err(VectorStoreError::InvalidInput(format!(
            "{} chunks but {} vectors",
            chunks.len(),
            vectors.len()
        )));
    }
    if let Some(i) = chunks.iter().position(|c| c.content.trim().is_empty()) {
        return Err(VectorStoreError::InvalidInput(format!(
            "chunk {i} has empty content"
        )));
    }
    Ok(())
}

/// Stack rows into a matrix, normalizing each to unit length.
fn to_unit_matrix(vectors: &[Vec<f32>], dimension: usize) -> Result<Array2<f32>, VectorStoreError> {
    let width = vectors.first().map_or(dimension, Vec::len);
    let mut data = Vec::with_capacity(vectors.len() * width);
    for vector in vectors {
        if vector.len() != width {
            return Err(VectorStoreError::DimensionMismatch {
                expected: width,
                actual: vector.len(),
            });
        }
        let start = data.len();
        data.extend_from_slice(vector);
        l2_normalize(&mut data[start..]);
    }
    Array2::from_shape_vec((vectors.len(), width), data)
        .map_err(|e| VectorStoreError::InvalidInput(e.to_string()))
}

async fn run_blocking<T, F>(f: F) -> Result<T, VectorStoreError>
where
    F: FnOnce() -> Result<T, VectorStoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| VectorStoreError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir, dimension: usize) -> VectorIndexStore {
        VectorIndexStore::with_files(
            IndexFiles::new(dir.path().join("index.bin"), dir.path().join("meta.json")),
            dimension,
        )
    }

    fn doc(owner: &str, path: &str) -> DocumentRef {
        DocumentRef::new(owner, "Cloud Computing", path)
    }

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| Chunk::new("Intro", format!("chunk {i}")))
            .collect()
    }

    #[tokio::test]
    async fn test_load_without_files_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 3);

        let snapshot = store.load().await.unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.index.dimension(), 3);
        assert!(store.search(&[1.0, 0.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_then_search_finds_same_vector() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 3);
        let vectors = vec![vec![3.0, 0.0, 4.0], vec![0.0, 2.0, 0.0]];

        store
            .append(&doc("alice", "alice/cc.md"), &chunks(2), &vectors)
            .await
            .unwrap();

        let reopened = store_in(&dir, 3);
        let hits = reopened.search(&vectors[0], 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.content, "chunk 0");
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_append_assigns_contiguous_chunk_indexes() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 2);
        let batch = vec![Chunk::new("Intro", "A"), Chunk::new("Intro", "B")];

        let report = store
            .append(&doc("alice", "alice/cc.md"), &batch, &[vec![1.0, 0.0], vec![0.0, 1.0]])
            .await
            .unwrap();
        assert_eq!(report, AppendReport { added: 2, removed: 0, total: 2 });

        let snapshot = store.load().await.unwrap();
        let indexes: Vec<u32> = snapshot.records.iter().map(|r| r.chunk_index).collect();
        assert_eq!(indexes, vec![0, 1]);
        assert!(snapshot.records.iter().all(|r| r.section_title == "Intro"));
        assert!(snapshot.records.iter().all(|r| r.folder_title == "Cloud Computing"));
        assert_ne!(snapshot.records[0].id, snapshot.records[1].id);
    }

    #[tokio::test]
    async fn test_stored_vectors_are_unit_length() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 2);
        store
            .append(&doc("alice", "a.md"), &chunks(1), &[vec![3.0, 4.0]])
            .await
            .unwrap();

        let raw = store.load().await.unwrap().index.to_raw();
        assert!((raw[0] - 0.6).abs() < 1e-6);
        assert!((raw[1] - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 2);

        let report = store.append(&doc("alice", "a.md"), &[], &[]).await.unwrap();
        assert_eq!(report.added, 0);
        assert!(!store.files().exists());
    }

    #[tokio::test]
    async fn test_mismatched_batch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 2);

        let err = store
            .append(&doc("alice", "a.md"), &chunks(2), &[vec![1.0, 0.0]])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::InvalidInput(_)));
        assert!(!store.files().exists());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_with_stored_index() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 2);
        store
            .append(&doc("alice", "a.md"), &chunks(1), &[vec![1.0, 0.0]])
            .await
            .unwrap();

        let err = store
            .append(&doc("alice", "b.md"), &chunks(1), &[vec![1.0, 0.0, 0.0]])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::DimensionMismatch { expected: 2, actual: 3 }
        ));
        assert_eq!(store.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_load_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 2);
        store
            .append(&doc("alice", "a.md"), &chunks(3), &[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]])
            .await
            .unwrap();

        let first = store.load().await.unwrap();
        let second = store.load().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_concurrent_appends_keep_every_write() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(store_in(&dir, 2));

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let path = format!("doc{i}.md");
                store
                    .append(&doc("alice", &path), &chunks(3), &vec![vec![1.0, i as f32]; 3])
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let snapshot = store.load().await.unwrap();
        assert_eq!(snapshot.len(), 24);
        assert_eq!(snapshot.index.len(), 24);

        // Each call's records stay contiguous and ordered.
        for window in snapshot.records.chunks(3) {
            assert!(window.iter().all(|r| r.doc_path == window[0].doc_path));
            let indexes: Vec<u32> = window.iter().map(|r| r.chunk_index).collect();
            assert_eq!(indexes, vec![0, 1, 2]);
        }
    }

    #[tokio::test]
    async fn test_replace_document_drops_stale_chunks() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 2);
        let alice = doc("alice", "alice/cc.md");
        store
            .append(&alice, &chunks(3), &[vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]])
            .await
            .unwrap();
        store
            .append(&doc("bob", "alice/cc.md"), &chunks(1), &[vec![1.0, 0.0]])
            .await
            .unwrap();

        let report = store
            .replace_document(&alice, &[Chunk::new("Intro", "fresh")], &[vec![0.0, 1.0]])
            .await
            .unwrap();
        assert_eq!(report, AppendReport { added: 1, removed: 3, total: 2 });

        let snapshot = store.load().await.unwrap();
        let alice_records: Vec<_> = snapshot.records.iter().filter(|r| r.owner == "alice").collect();
        assert_eq!(alice_records.len(), 1);
        assert_eq!(alice_records[0].content, "fresh");
        assert_eq!(alice_records[0].chunk_index, 0);
    }

    #[tokio::test]
    async fn test_remove_document() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 2);
        store
            .append(&doc("alice", "a.md"), &chunks(2), &[vec![1.0, 0.0], vec![0.0, 1.0]])
            .await
            .unwrap();
        store
            .append(&doc("alice", "b.md"), &chunks(1), &[vec![1.0, 0.0]])
            .await
            .unwrap();

        assert_eq!(store.remove_document("alice", "a.md").await.unwrap(), 2);
        assert!(matches!(
            store.remove_document("alice", "a.md").await,
            Err(VectorStoreError::NotFound(_))
        ));

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.documents, 1);
    }

    #[tokio::test]
    async fn test_stats_counts_owners_and_documents() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 2);
        store
            .append(&doc("alice", "a.md"), &chunks(2), &[vec![1.0, 0.0], vec![0.0, 1.0]])
            .await
            .unwrap();
        store
            .append(&doc("bob", "b.md"), &chunks(1), &[vec![1.0, 0.0]])
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(
            stats,
            IndexStats {
                entries: 3,
                dimension: 2,
                owners: 2,
                documents: 2,
                generation: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_corrupt_index_surfaces_on_search() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, 2);
        store
            .append(&doc("alice", "a.md"), &chunks(1), &[vec![1.0, 0.0]])
            .await
            .unwrap();
        std::fs::remove_file(store.files().metadata_path()).unwrap();

        assert!(matches!(
            store.search(&[1.0, 0.0], 1).await,
            Err(VectorStoreError::CorruptIndex(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_partial_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("blocker"), b"").unwrap();
        let store = VectorIndexStore::with_files(
            IndexFiles::new(dir.path().join("index.bin"), dir.path().join("blocker/meta.json")),
            2,
        );

        let result = store
            .append(&doc("alice", "a.md"), &chunks(1), &[vec![1.0, 0.0]])
            .await;
        assert!(matches!(result, Err(VectorStoreError::Io(_))));
        assert!(!store.files().vectors_path().exists());
        assert!(store.load().await.unwrap().is_empty());
    }
}
