//! Owner-scoped retrieval over the shared index.

use std::sync::Arc;
use std::time::Instant;

use super::embedding::{SharedEmbedder, embed_query};
use super::vector_store::{Snapshot, VectorIndexStore};
use crate::error::RetrievalError;
use crate::models::{RetrievalConfig, RetrievalQuery, RetrievalResults, ScoredChunk};

/// Embeds queries and returns the best-matching chunks of one owner.
///
/// The index holds every owner's entries side by side, so a plain `top_k`
/// search could be filled entirely by other owners. Retrieval fetches
/// `max(top_k * overfetch_factor, min_candidates)` raw neighbors, filters them,
/// and widens the window over the same loaded snapshot until `top_k` matches
/// are found or the index is exhausted.
pub struct RetrievalService {
    store: Arc<VectorIndexStore>,
    embedder: SharedEmbedder,
    overfetch_factor: usize,
    min_candidates: usize,
}

impl RetrievalService {
    pub fn new(
        store: Arc<VectorIndexStore>,
        embedder: SharedEmbedder,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            overfetch_factor: (config.overfetch_factor as usize).max(1),
            min_candidates: config.min_candidates as usize,
        }
    }

    pub fn store(&self) -> &Arc<VectorIndexStore> {
        &self.store
    }

    /// Up to `top_k` entries owned by `owner`, best first. Fewer are returned
    /// when the owner has fewer entries.
    pub async fn retrieve(
        &self,
        owner: &str,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        self.retrieve_query(&RetrievalQuery::new(owner, top_k), query_vector)
            .await
    }

    /// Like [`retrieve`](Self::retrieve), with the optional folder and score filters.
    pub async fn retrieve_query(
        &self,
        query: &RetrievalQuery,
        query_vector: &[f32],
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        validate(query, query_vector)?;
        if query.top_k == 0 {
            return Ok(Vec::new());
        }
        let snapshot = self.store.load().await?;
        self.retrieve_from(&snapshot, query, query_vector)
    }

    /// Run `query` against an already loaded snapshot. Every widening pass
    /// searches this same snapshot.
    pub fn retrieve_from(
        &self,
        snapshot: &Snapshot,
        query: &RetrievalQuery,
        query_vector: &[f32],
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        validate(query, query_vector)?;
        if query.top_k == 0 {
            return Ok(Vec::new());
        }

        let mut fetch_k = query
            .top_k
            .saturating_mul(self.overfetch_factor)
            .max(self.min_candidates)
            .max(query.top_k);

        loop {
            let candidates = snapshot.nearest(query_vector, fetch_k)?;
            let exhausted = candidates.len() < fetch_k;
            let raw = candidates.len();

            let mut matched: Vec<ScoredChunk> = candidates
                .into_iter()
                .filter(|c| query.accepts(c))
                .collect();

            if matched.len() >= query.top_k || exhausted {
                matched.truncate(query.top_k);
                tracing::debug!(
                    owner = %query.owner,
                    fetched = raw,
                    returned = matched.len(),
                    "retrieved chunks"
                );
                return Ok(matched);
            }

            fetch_k = fetch_k.saturating_mul(2);
        }
    }

    /// Embed `text` and retrieve for `query`.
    pub async fn search_text(
        &self,
        text: &str,
        query: &RetrievalQuery,
    ) -> Result<RetrievalResults, RetrievalError> {
        if text.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery("query text is empty".to_string()));
        }

        let start = Instant::now();
        let vector = embed_query(self.embedder.as_ref(), text).await?;
        let results = self.retrieve_query(query, &vector).await?;

        Ok(RetrievalResults {
            query: text.to_string(),
            owner: query.owner.clone(),
            results,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

fn validate(query: &RetrievalQuery, query_vector: &[f32]) -> Result<(), RetrievalError> {
    if query.owner.trim().is_empty() {
        return Err(RetrievalError::InvalidQuery("owner is empty".to_string()));
    }
    if query_vector.is_empty() {
        return Err(RetrievalError::InvalidQuery(
            "query vector is empty".to_string(),
        ));
    }
    Ok(())
}

/// Render ranked chunks as context blocks for a chat model:
/// `[folder_title / section_title] content`, separated by blank lines.
pub fn render_context(results: &[ScoredChunk]) -> String {
    results
        .iter()
        .map(|c| {
            format!(
                "[{} / {}] {}",
                c.record.folder_title, c.record.section_title, c.record.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
