//! Text embedding providers.
//!
//! The core only relies on the [`Embedder`] trait: a deterministic mapping from
//! text to fixed-dimension vectors. Two providers are available, a local ONNX
//! sentence-transformer and a remote `/embed` HTTP endpoint.

mod http;
mod onnx;

pub use http::{HealthResponse, HttpEmbedder};
pub use onnx::OnnxEmbedder;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{EmbeddingError, ModelError};
use crate::models::{EmbeddingConfig, EmbeddingProvider};

/// Converts texts into fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input, in input order.
    /// An empty batch returns an empty result.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Dimension of every vector this embedder produces.
    fn dimension(&self) -> usize;

    /// Identifier of the underlying model.
    fn model_id(&self) -> &str;
}

pub type SharedEmbedder = Arc<dyn Embedder>;

/// Embed `texts` and verify the provider returned one vector of the expected
/// dimension per input.
pub async fn embed_checked(
    embedder: &dyn Embedder,
    texts: &[String],
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let vectors = embedder.embed(texts).await?;
    if vectors.len() != texts.len() {
        return Err(EmbeddingError::CountMismatch {
            expected: texts.len(),
            actual: vectors.len(),
        });
    }

    let expected = embedder.dimension();
    if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: bad.len(),
        });
    }

    Ok(vectors)
}

/// Embed a single query string.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    embed_checked(embedder, &[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding response".to_string()))
}

/// Build the embedder selected by configuration.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<SharedEmbedder, EmbeddingError> {
    match config.provider {
        EmbeddingProvider::Http => Ok(Arc::new(HttpEmbedder::new(config)?)),
        EmbeddingProvider::Onnx => {
            let dir = config.resolved_model_dir().ok_or_else(|| {
                ModelError::NotFound("could not determine models directory".to_string())
            })?;
            Ok(Arc::new(OnnxEmbedder::load(config, &dir)?))
        }
    }
}
