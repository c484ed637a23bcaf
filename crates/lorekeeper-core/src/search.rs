//! Chapter-filtered similarity search.
//!
//! The core search operates entirely through the [`Store`] and
//! [`EmbeddingProvider`] traits, with no database or configuration
//! dependencies. The query text is embedded, the store returns its
//! nearest chunks, and results are ranked by descending cosine
//! similarity (ties broken by ingestion order) and cut to `k`.

use anyhow::anyhow;
use serde::Deserialize;

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::KnowledgeError;
use crate::models::ScoredChunk;
use crate::store::{rank, Store};

/// Number of chunks retrieved per query unless configured otherwise.
pub const DEFAULT_K: usize = 5;

/// Bundles all inputs for a single search invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    /// Search query text.
    pub query: String,
    /// Maximum number of results. Must be at least 1.
    #[serde(default = "default_k")]
    pub k: usize,
    /// Only return chunks tagged with this chapter name.
    #[serde(default)]
    pub chapter: Option<String>,
}

fn default_k() -> usize {
    DEFAULT_K
}

impl SearchRequest {
    pub fn new(query: &str, k: usize) -> Self {
        Self {
            query: query.to_string(),
            k,
            chapter: None,
        }
    }

    pub fn in_chapter(mut self, chapter: Option<&str>) -> Self {
        self.chapter = chapter.map(str::to_string);
        self
    }
}

/// Run a similarity search against a [`Store`] backend.
///
/// A blank query returns no results without calling the embedder.
/// Embedding or store failures are reported as
/// [`KnowledgeError::Retrieval`].
pub async fn search(
    store: &dyn Store,
    embedder: &dyn EmbeddingProvider,
    req: &SearchRequest,
) -> Result<Vec<ScoredChunk>, KnowledgeError> {
    if req.k == 0 {
        return Err(KnowledgeError::Retrieval(anyhow!("k must be a positive integer")));
    }
    if req.query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let query_vec = embed_query(embedder, &req.query)
        .await
        .map_err(|e| KnowledgeError::Retrieval(e.context("embedding the query")))?;
    if query_vec.len() != embedder.dims() {
        return Err(KnowledgeError::Retrieval(anyhow!(
            "query embedding has {} dimensions, expected {}",
            query_vec.len(),
            embedder.dims()
        )));
    }

    let mut results = store
        .vector_search(&query_vec, req.k, req.chapter.as_deref())
        .await
        .map_err(KnowledgeError::Retrieval)?;

    rank(&mut results);
    results.truncate(req.k);
    Ok(results)
}
