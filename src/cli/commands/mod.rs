mod config;
mod ingest;
mod remove;
mod search;
mod status;

pub use config::ConfigCommand;
pub use ingest::IngestArgs;
pub use remove::RemoveArgs;
pub use search::SearchArgs;

pub use config::handle_config;
pub use ingest::handle_ingest;
pub use remove::handle_remove;
pub use search::handle_search;
pub use status::handle_status;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::models::Config;
use crate::services::{IngestOptions, IngestionPipeline, RetrievalService, VectorIndexStore, create_embedder};
use crate::sources::create_document_store;

fn open_store(config: &Config) -> Arc<VectorIndexStore> {
    Arc::new(VectorIndexStore::open(
        &config.index,
        config.embedding.dimension as usize,
    ))
}

fn build_pipeline(config: &Config) -> Result<IngestionPipeline> {
    let documents =
        create_document_store(&config.documents).context("failed to open document store")?;
    let embedder = create_embedder(&config.embedding).context("failed to load embedder")?;

    Ok(IngestionPipeline::new(
        documents,
        embedder,
        open_store(config),
        IngestOptions::from_config(config),
    ))
}

fn build_retrieval(config: &Config) -> Result<RetrievalService> {
    let embedder = create_embedder(&config.embedding).context("failed to load embedder")?;
    Ok(RetrievalService::new(
        open_store(config),
        embedder,
        &config.retrieval,
    ))
}
