//! Error types for the study RAG backend.

use thiserror::Error;

use crate::models::IngestStage;

/// Errors raised by the document store collaborator.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("invalid document path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("document request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("document store error: {0}")]
    Server(String),

    #[error("document exceeds maximum size: {size} > {max}")]
    TooLarge { size: u64, max: u64 },

    #[error("document fetch timeout")]
    Timeout,
}

/// Errors raised while turning document bytes into elements.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("document is not valid UTF-8: {0}")]
    InvalidEncoding(String),

    #[error("invalid element list: {0}")]
    InvalidElements(String),

    #[error("cannot extract text from {format}: {message}")]
    Extraction { format: String, message: String },
}

/// Errors raised by the local ONNX embedding model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model not found: {0}")]
    NotFound(String),

    #[error("failed to load model: {0}")]
    LoadError(String),

    #[error("tokenizer error: {0}")]
    TokenizerError(String),

    #[error("inference error: {0}")]
    InferenceError(String),
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding server: {0}")]
    ConnectionError(String),

    #[error("embedding server error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding timeout")]
    Timeout,

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding count mismatch: expected {expected}, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("embedding model error: {0}")]
    Model(#[from] ModelError),
}

/// Errors related to the persisted vector index.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("vector dimension mismatch: index has {expected}, batch has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("background task failed: {0}")]
    Task(String),
}

/// Errors from one document ingestion, tagged with the stage that failed.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("embedding failed: {0}")]
    Embed(#[from] EmbeddingError),

    #[error("indexing failed: {0}")]
    Index(#[from] VectorStoreError),

    #[error("{stage} stage timed out after {secs}s")]
    Timeout { stage: IngestStage, secs: u64 },
}

impl IngestError {
    /// The pipeline stage this error came from.
    pub fn stage(&self) -> IngestStage {
        match self {
            IngestError::Fetch(_) => IngestStage::Fetch,
            IngestError::Parse(_) => IngestStage::Parse,
            IngestError::Embed(_) => IngestStage::Embed,
            IngestError::Index(_) => IngestStage::Index,
            IngestError::Timeout { stage, .. } => *stage,
        }
    }
}

/// Errors from the background ingestion queue.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("ingest queue is closed")]
    Closed,
}

/// Errors related to retrieval.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("document store error: {0}")]
    Fetch(#[from] FetchError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("{0}")]
    Other(String),
}
