mod chunk;
mod config;
mod ingest;
mod record;
mod search;

pub use chunk::{Chunk, Element, ElementCategory};
pub use config::{
    Config, DEFAULT_BUCKET, DEFAULT_EMBEDDING_DIMENSION, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_EMBEDDING_URL, DEFAULT_METADATA_FILE, DEFAULT_VECTORS_FILE, DocumentDriver,
    DocumentStoreConfig, EmbeddingConfig, EmbeddingProvider, IndexConfig, IngestionConfig,
    OutputConfig, RetrievalConfig,
};
pub use ingest::{IngestOutcome, IngestRequest, IngestStage};
pub use record::{DocumentRef, IndexedVector, ScoredChunk};
pub use search::{OutputFormat, RetrievalQuery, RetrievalResults};
