use serde::{Deserialize, Serialize};
use std::fmt;

use super::record::DocumentRef;

/// Stages of the ingestion pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStage {
    Fetch,
    Parse,
    Embed,
    Index,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestStage::Fetch => write!(f, "fetch"),
            IngestStage::Parse => write!(f, "parse"),
            IngestStage::Embed => write!(f, "embed"),
            IngestStage::Index => write!(f, "index"),
        }
    }
}

/// One uploaded document to index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRequest {
    pub owner: String,
    pub folder_title: String,
    /// Path of the document inside the document store.
    pub doc_path: String,
}

impl IngestRequest {
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

    pub fn document_ref(&self) -> DocumentRef {
        DocumentRef::new(&self.owner, &self.folder_title, &self.doc_path)
    }
}

/// Result of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    /// Chunks were embedded and written to the index.
    Indexed {
        chunks: usize,
        /// Entries of an earlier upload of the same document that were dropped.
        replaced: usize,
    },
    /// The document yielded no chunks. With replacement on, entries of an
    /// earlier upload are still dropped.
    NothingToIndex { removed: usize },
}
