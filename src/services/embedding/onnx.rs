use std::borrow::Cow;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ort::session::{Session, SessionInputValue, builder::GraphOptimizationLevel};
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tokenizers::{PaddingParams, PaddingStrategy, TruncationParams, TruncationStrategy};

use super::Embedder;
use crate::error::{EmbeddingError, ModelError};
use crate::models::EmbeddingConfig;
use crate::utils::l2_normalize;

/// Local sentence-transformer running on ONNX Runtime.
///
/// Inference is CPU-bound and runs on tokio's blocking pool.
pub struct OnnxEmbedder {
    model: Arc<OnnxModel>,
    model_id: String,
    batch_size: usize,
}

struct OnnxModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dimension: usize,
    wants_token_types: bool,
}

impl OnnxEmbedder {
    /// Load `model.onnx` and `tokenizer.json` from `model_dir`.
    pub fn load(config: &EmbeddingConfig, model_dir: &Path) -> Result<Self, ModelError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");

        if !model_path.exists() {
            return Err(ModelError::NotFound(format!(
                "model not found: {}",
                model_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e: ort::Error| ModelError::LoadError(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e: ort::Error| ModelError::LoadError(e.to_string()))?
            .with_intra_threads(num_cpus())
            .map_err(|e: ort::Error| ModelError::LoadError(e.to_string()))?
            .commit_from_file(&model_path)
            .map_err(|e: ort::Error| ModelError::LoadError(e.to_string()))?;

        let wants_token_types = session
            .inputs
            .iter()
            .any(|input| input.name == "token_type_ids");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| ModelError::TokenizerError(e.to_string()))?;

        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_tokens as usize,
                strategy: TruncationStrategy::LongestFirst,
                ..Default::default()
            }))
            .map_err(|e| ModelError::TokenizerError(e.to_string()))?;

        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        tracing::info!(
            model = %config.model_id,
            path = %model_path.display(),
            dimension = config.dimension,
            "loaded embedding model"
        );

        Ok(Self {
            model: Arc::new(OnnxModel {
                session: Mutex::new(session),
                tokenizer,
                dimension: config.dimension as usize,
                wants_token_types,
            }),
            model_id: config.model_id.clone(),
            batch_size: (config.batch_size as usize).max(1),
        })
    }
}

#[async_trait]
impl Embedder for OnnxEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        let batch_size = self.batch_size;

        let embeddings = tokio::task::spawn_blocking(move || {
            let mut out = Vec::with_capacity(texts.len());
            for batch in texts.chunks(batch_size) {
                out.extend(model.embed_batch(batch)?);
            }
            Ok::<_, ModelError>(out)
        })
        .await
        .map_err(|e| ModelError::InferenceError(format!("inference task failed: {e}")))??;

        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.model.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

impl OnnxModel {
    /// Mean-pool token embeddings over the attention mask, then L2-normalize.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| ModelError::TokenizerError(e.to_string()))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);
        let batch_size = encodings.len();

        let mut input_ids = vec![0i64; batch_size * max_len];
        let mut attention_mask = vec![0i64; batch_size * max_len];
        let mut token_type_ids = vec![0i64; batch_size * max_len];

        for (i, encoding) in encodings.iter().enumerate() {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let types = encoding.get_type_ids();
            for j in 0..ids.len() {
                input_ids[i * max_len + j] = i64::from(ids[j]);
                attention_mask[i * max_len + j] = i64::from(mask[j]);
                token_type_ids[i * max_len + j] = i64::from(types[j]);
            }
        }

        let input_ids_tensor = Tensor::from_array(([batch_size, max_len], input_ids))
            .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;
        let attention_mask_tensor =
            Tensor::from_array(([batch_size, max_len], attention_mask.clone()))
                .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;

        let mut inputs: Vec<(Cow<'_, str>, SessionInputValue<'_>)> = ort::inputs![
            "input_ids" => input_ids_tensor,
            "attention_mask" => attention_mask_tensor,
        ];
        if self.wants_token_types {
            let token_type_tensor = Tensor::from_array(([batch_size, max_len], token_type_ids))
                .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;
            inputs.push((Cow::Borrowed("token_type_ids"), token_type_tensor.into()));
        }

        let mut session = self
            .session
            .lock()
            .map_err(|_| ModelError::InferenceError("session lock poisoned".to_string()))?;

        let outputs = session
            .run(inputs)
            .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;

        let output_array = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e: ort::Error| ModelError::InferenceError(e.to_string()))?;

        let shape = output_array.shape().to_vec();

        let embeddings: Vec<Vec<f32>> = match shape.as_slice() {
            // Token embeddings: [batch, seq, hidden]
            [_, seq_len, hidden] => (0..batch_size)
                .map(|i| {
                    let mut pooled = vec![0f32; *hidden];
                    let mut count = 0f32;
                    for j in 0..*seq_len {
                        if attention_mask[i * max_len + j] == 0 {
                            continue;
                        }
                        count += 1.0;
                        for (d, slot) in pooled.iter_mut().enumerate() {
                            *slot += output_array[[i, j, d]];
                        }
                    }
                    if count > 0.0 {
                        pooled.iter_mut().for_each(|x| *x /= count);
                    }
                    l2_normalize(&mut pooled);
                    pooled
                })
                .collect(),
            // Already pooled: [batch, hidden]
            [_, hidden] => (0..batch_size)
                .map(|i| {
                    let mut embedding: Vec<f32> =
                        (0..*hidden).map(|d| output_array[[i, d]]).collect();
                    l2_normalize(&mut embedding);
                    embedding
                })
                .collect(),
            _ => {
                return Err(ModelError::InferenceError(format!(
                    "unexpected output shape: {:?}",
                    shape
                )));
            }
        };

        Ok(embeddings)
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_requires_model_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = OnnxEmbedder::load(&EmbeddingConfig::default(), dir.path());
        assert!(matches!(result, Err(ModelError::NotFound(_))));
    }
}
