//! Retrieval-related models for queries and results.

use serde::{Deserialize, Serialize};

use super::record::ScoredChunk;

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// A user's retrieval request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalQuery {
    /// Only entries owned by this user are returned
    pub owner: String,

    /// Restrict to one folder
    pub folder_title: Option<String>,

    /// Maximum results to return
    pub top_k: usize,

    /// Minimum cosine similarity
    pub min_score: Option<f32>,
}

impl RetrievalQuery {
    pub fn new(owner: impl Into<String>, top_k: usize) -> Self {
        Self {
            owner: owner.into(),
            folder_title: None,
            top_k,
            min_score: None,
        }
    }

    pub fn with_folder(mut self, folder_title: impl Into<String>) -> Self {
        self.folder_title = Some(folder_title.into());
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    /// Whether an owner-matching entry passes the optional filters.
    pub fn accepts(&self, chunk: &ScoredChunk) -> bool {
        if chunk.record.owner != self.owner {
            return false;
        }
        if let Some(ref folder) = self.folder_title
            && &chunk.record.folder_title != folder
        {
            return false;
        }
        if let Some(min) = self.min_score
            && chunk.score < min
        {
            return false;
        }
        true
    }
}

/// Ranked retrieval output for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResults {
    pub query: String,
    pub owner: String,
    pub results: Vec<ScoredChunk>,
    pub duration_ms: u64,
}

impl RetrievalResults {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}
