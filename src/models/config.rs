use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::search::OutputFormat;
use crate::error::ConfigError;

pub const DEFAULT_EMBEDDING_URL: &str = "http://localhost:11411";
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 384;
pub const DEFAULT_VECTORS_FILE: &str = "faiss_index.bin";
pub const DEFAULT_METADATA_FILE: &str = "faiss_meta.json";
pub const DEFAULT_BUCKET: &str = "user-resources";

const APP_DIR: &str = "study-rag";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub documents: DocumentStoreConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub ingestion: IngestionConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join("config.toml"))
    }

    pub fn models_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join(APP_DIR).join("models"))
    }

    /// Load the config file (or defaults) and apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)?;
                toml::from_str(&content)?
            }
            _ => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("STUDYRAG_DOCUMENTS_API_KEY") {
            self.documents.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("STUDYRAG_DOCUMENTS_URL") {
            self.documents.url = Some(url);
        }
        if let Ok(url) = std::env::var("STUDYRAG_EMBEDDING_URL") {
            self.embedding.url = url;
        }
        if let Ok(dir) = std::env::var("STUDYRAG_INDEX_DIR") {
            self.index.dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.dimension == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimension must be greater than 0".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.batch_size must be greater than 0".to_string(),
            ));
        }
        if self.retrieval.overfetch_factor == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.overfetch_factor must be greater than 0".to_string(),
            ));
        }
        if self.documents.driver == DocumentDriver::Http && self.documents.url.is_none() {
            return Err(ConfigError::ValidationError(
                "documents.url is required for the http driver".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local ONNX sentence-transformer
    #[default]
    Onnx,
    /// Remote `/embed` endpoint
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    #[serde(default = "default_embedding_model")]
    pub model_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,

    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default = "default_dimension")]
    pub dimension: u32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_max_tokens() -> u32 {
    256
}

fn default_batch_size() -> u32 {
    32
}

fn default_embedding_timeout() -> u64 {
    120
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model_id: default_embedding_model(),
            model_path: None,
            url: default_embedding_url(),
            dimension: default_dimension(),
            max_tokens: default_max_tokens(),
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl EmbeddingConfig {
    /// Directory holding `model.onnx` and `tokenizer.json`.
    pub fn resolved_model_dir(&self) -> Option<PathBuf> {
        self.model_path.clone().or_else(|| {
            Config::models_dir().map(|dir| dir.join(self.model_id.replace('/', "--")))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_vectors_file")]
    pub vectors_file: String,

    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,
}

fn default_index_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join(APP_DIR).join("index"))
        .unwrap_or_else(|| PathBuf::from("index"))
}

fn default_vectors_file() -> String {
    DEFAULT_VECTORS_FILE.to_string()
}

fn default_metadata_file() -> String {
    DEFAULT_METADATA_FILE.to_string()
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
            vectors_file: default_vectors_file(),
            metadata_file: default_metadata_file(),
        }
    }
}

impl IndexConfig {
    pub fn vectors_path(&self) -> PathBuf {
        self.dir.join(&self.vectors_file)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(&self.metadata_file)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentDriver {
    #[default]
    Local,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStoreConfig {
    #[serde(default)]
    pub driver: DocumentDriver,

    /// Root directory for the local driver.
    #[serde(default = "default_documents_root")]
    pub root: PathBuf,

    /// Object storage base URL for the http driver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_bucket")]
    pub bucket: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_document_size")]
    pub max_document_size: u64,
}

fn default_documents_root() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join(APP_DIR).join("documents"))
        .unwrap_or_else(|| PathBuf::from("documents"))
}

fn default_bucket() -> String {
    DEFAULT_BUCKET.to_string()
}

fn default_fetch_timeout() -> u64 {
    60
}

fn default_max_document_size() -> u64 {
    50 * 1024 * 1024
}

impl Default for DocumentStoreConfig {
    fn default() -> Self {
        Self {
            driver: DocumentDriver::default(),
            root: default_documents_root(),
            url: None,
            bucket: default_bucket(),
            api_key: None,
            timeout_secs: default_fetch_timeout(),
            max_document_size: default_max_document_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub default_top_k: u32,

    /// Raw neighbors fetched per requested result before owner filtering.
    #[serde(default = "default_overfetch_factor")]
    pub overfetch_factor: u32,

    /// Lower bound on raw neighbors fetched, regardless of `top_k`.
    #[serde(default = "default_min_candidates")]
    pub min_candidates: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,
}

fn default_top_k() -> u32 {
    5
}

fn default_overfetch_factor() -> u32 {
    10
}

fn default_min_candidates() -> u32 {
    100
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            overfetch_factor: default_overfetch_factor(),
            min_candidates: default_min_candidates(),
            min_score: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Drop a document's previous chunks before indexing a new upload of it.
    #[serde(default = "default_replace_existing")]
    pub replace_existing: bool,
}

fn default_replace_existing() -> bool {
    true
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            replace_existing: default_replace_existing(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub default_format: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.embedding.model_id, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.index.vectors_file, DEFAULT_VECTORS_FILE);
        assert_eq!(config.documents.bucket, DEFAULT_BUCKET);
        assert_eq!(config.retrieval.default_top_k, 5);
        assert!(config.ingestion.replace_existing);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [embedding]
            provider = "http"
            dimension = 768

            [retrieval]
            default_top_k = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.embedding.provider, EmbeddingProvider::Http);
        assert_eq!(config.embedding.dimension, 768);
        assert_eq!(config.embedding.batch_size, 32);
        assert_eq!(config.retrieval.default_top_k, 8);
        assert_eq!(config.retrieval.overfetch_factor, 10);
        assert_eq!(config.documents.driver, DocumentDriver::Local);
    }

    #[test]
    fn test_validate_rejects_zero_dimension() {
        let mut config = Config::default();
        config.embedding.dimension = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_requires_url_for_http_documents() {
        let mut config = Config::default();
        config.documents.driver = DocumentDriver::Http;
        assert!(config.validate().is_err());

        config.documents.url = Some("https://example.supabase.co".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_index_paths() {
        let config = IndexConfig {
            dir: PathBuf::from("/tmp/idx"),
            ..Default::default()
        };
        assert_eq!(
            config.vectors_path(),
            PathBuf::from("/tmp/idx/faiss_index.bin")
        );
        assert_eq!(
            config.metadata_path(),
            PathBuf::from("/tmp/idx/faiss_meta.json")
        );
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.embedding.dimension, config.embedding.dimension);
        assert_eq!(parsed.index.dir, config.index.dir);
    }
}
