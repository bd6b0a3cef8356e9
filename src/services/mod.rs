pub mod chunker;
pub mod embedding;
pub mod ingest;
pub mod jobs;
pub mod partition;
pub mod retrieval;
pub mod vector_store;

#[cfg(test)]
pub(crate) mod testing;

pub use chunker::{chunk, estimate_tokens};
pub use embedding::{
    Embedder, HttpEmbedder, OnnxEmbedder, SharedEmbedder, create_embedder, embed_checked,
    embed_query,
};
pub use ingest::{IngestOptions, IngestionPipeline};
pub use jobs::{IngestQueue, JobId, JobStatus};
pub use partition::partition;
pub use retrieval::{RetrievalService, render_context};
pub use vector_store::{AppendReport, IndexFiles, IndexStats, VectorIndexStore};
