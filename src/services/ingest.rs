//! Fetch, parse, chunk, embed and index one uploaded document.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::chunker::{chunk, estimate_tokens};
use super::embedding::{SharedEmbedder, embed_checked};
use super::partition::partition;
use super::vector_store::VectorIndexStore;
use crate::error::IngestError;
use crate::models::{Config, IngestOutcome, IngestRequest, IngestStage};
use crate::sources::SharedDocumentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    pub fetch_timeout: Duration,
    pub embed_timeout: Duration,
    /// Drop earlier entries of the same `(owner, doc_path)` when indexing.
    pub replace_existing: bool,
}

impl IngestOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fetch_timeout: Duration::from_secs(config.documents.timeout_secs),
            embed_timeout: Duration::from_secs(config.embedding.timeout_secs),
            replace_existing: config.ingestion.replace_existing,
        }
    }
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(60),
            embed_timeout: Duration::from_secs(120),
            replace_existing: true,
        }
    }
}

pub struct IngestionPipeline {
    documents: SharedDocumentStore,
    embedder: SharedEmbedder,
    index: Arc<VectorIndexStore>,
    options: IngestOptions,
}

impl IngestionPipeline {
    pub fn new(
        documents: SharedDocumentStore,
        embedder: SharedEmbedder,
        index: Arc<VectorIndexStore>,
        options: IngestOptions,
    ) -> Self {
        Self {
            documents,
            embedder,
            index,
            options,
        }
    }

    pub fn index(&self) -> &Arc<VectorIndexStore> {
        &self.index
    }

    /// Index one document. The index is only written after every earlier
    /// stage succeeded, so a failure never disturbs existing entries.
    pub async fn ingest(&self, request: &IngestRequest) -> Result<IngestOutcome, IngestError> {
        let start = Instant::now();
        let result = self.run(request).await;

        match &result {
            Ok(outcome) => tracing::info!(
                owner = %request.owner,
                doc_path = %request.doc_path,
                ?outcome,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "ingested document"
            ),
            Err(e) => tracing::warn!(
                owner = %request.owner,
                doc_path = %request.doc_path,
                stage = %e.stage(),
                error = %e,
                "ingestion failed"
            ),
        }
        result
    }

    async fn run(&self, request: &IngestRequest) -> Result<IngestOutcome, IngestError> {
        let bytes = with_timeout(
            IngestStage::Fetch,
            self.options.fetch_timeout,
            self.documents.fetch(&request.doc_path),
        )
        .await??;

        let elements = partition(&bytes, &request.doc_path)?;
        let chunks = chunk(&elements, &request.folder_title);
        tracing::debug!(
            doc_path = %request.doc_path,
            bytes = bytes.len(),
            elements = elements.len(),
            chunks = chunks.len(),
            tokens = chunks.iter().map(|c| estimate_tokens(&c.content)).sum::<usize>(),
            "parsed document"
        );

        let document = request.document_ref();
        if chunks.is_empty() {
            let removed = if self.options.replace_existing {
                self.index.replace_document(&document, &[], &[]).await?.removed
            } else {
                0
            };
            return Ok(IngestOutcome::NothingToIndex { removed });
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = with_timeout(
            IngestStage::Embed,
            self.options.embed_timeout,
            embed_checked(self.embedder.as_ref(), &texts),
        )
        .await??;

        let report = if self.options.replace_existing {
            self.index
                .replace_document(&document, &chunks, &vectors)
                .await?
        } else {
            self.index.append(&document, &chunks, &vectors).await?
        };

        Ok(IngestOutcome::Indexed {
            chunks: report.added,
            replaced: report.removed,
        })
    }
}

async fn with_timeout<T>(
    stage: IngestStage,
    limit: Duration,
    fut: impl Future<Output = T>,
) -> Result<T, IngestError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| IngestError::Timeout {
            stage,
            secs: limit.as_secs(),
        })
}
