use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::chunk::Chunk;

/// Identifies which document a batch of chunks belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub owner: String,
    pub folder_title: String,
    pub doc_path: String,
}

impl DocumentRef {
    pub fn new(
        owner: impl Into<String>,
        folder_title: impl Into<String>,
        doc_path: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            folder_title: folder_title.into(),
            doc_path: doc_path.into(),
        }
    }
}

/// Metadata persisted alongside each vector in the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedVector {
    pub id: Uuid,
    pub owner: String,
    pub folder_title: String,
    pub doc_path: String,
    pub section_title: String,
    pub chunk_index: u32,
    pub content: String,
}

impl IndexedVector {
    pub fn new(document: &DocumentRef, chunk: &Chunk, chunk_index: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: document.owner.clone(),
            folder_title: document.folder_title.clone(),
            doc_path: document.doc_path.clone(),
            section_title: chunk.section_title.clone(),
            chunk_index,
            content: chunk.content.clone(),
        }
    }

    pub fn belongs_to(&self, owner: &str, doc_path: &str) -> bool {
        self.owner == owner && self.doc_path == doc_path
    }
}

/// An index entry paired with its cosine similarity to a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    #[serde(flatten)]
    pub record: IndexedVector,

    /// Cosine similarity in [-1, 1]
    pub score: f32,
}
