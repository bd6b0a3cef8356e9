use anyhow::Result;
use chrono::{DateTime, Local};

use super::open_store;
use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{Config, DocumentDriver, EmbeddingProvider, OutputFormat};
use crate::services::HttpEmbedder;

pub async fn handle_status(format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let store = open_store(&config);

    let (index, index_error) = match store.stats().await {
        Ok(stats) => (Some(stats), None),
        Err(e) => (None, Some(e.to_string())),
    };

    let last_modified = std::fs::metadata(store.files().metadata_path())
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Local>::from);

    let embedding_reachable = match config.embedding.provider {
        EmbeddingProvider::Http => match HttpEmbedder::new(&config.embedding) {
            Ok(client) => Some(client.health_check().await.is_ok()),
            Err(_) => Some(false),
        },
        EmbeddingProvider::Onnx => None,
    };

    let (embedding_provider, embedding_location) = match config.embedding.provider {
        EmbeddingProvider::Onnx => ("onnx", config.embedding.model_id.clone()),
        EmbeddingProvider::Http => (
            "http",
            format!("{} @ {}", config.embedding.model_id, config.embedding.url),
        ),
    };
    let (documents_driver, documents_location) = match config.documents.driver {
        DocumentDriver::Local => ("local", config.documents.root.display().to_string()),
        DocumentDriver::Http => (
            "http",
            format!(
                "{}/{}",
                config.documents.url.as_deref().unwrap_or("<unset>"),
                config.documents.bucket
            ),
        ),
    };

    let status = StatusInfo {
        embedding_provider: embedding_provider.to_string(),
        embedding_model: embedding_location,
        embedding_reachable,
        dimension: config.embedding.dimension,
        documents_driver: documents_driver.to_string(),
        documents_location,
        vectors_path: store.files().vectors_path().to_path_buf(),
        metadata_path: store.files().metadata_path().to_path_buf(),
        last_modified,
        index,
        index_error,
    };

    print!("{}", formatter.format_status(&status));

    if let Some(ref error) = status.index_error {
        anyhow::bail!("index is unusable: {error}");
    }
    if status.embedding_reachable == Some(false) {
        eprintln!();
        eprintln!("Warning: embedding server not reachable at {}", config.embedding.url);
    }
    if status.index.as_ref().is_some_and(|s| s.entries == 0) {
        eprintln!();
        eprintln!("Hint: index is empty. Add a document with: studyrag ingest --owner <user> --folder <title> <path>");
    }

    Ok(())
}
