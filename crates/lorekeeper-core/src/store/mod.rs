//! Storage abstraction for the chunk index.
//!
//! The [`Store`] trait defines the operations the search and query
//! pipeline needs from an index of embedded chunks, enabling pluggable
//! backends (the persisted SQLite index in the app crate, and the
//! in-memory store used in tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! Search is read-only: concurrent searches on one store are always safe.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::{Chunk, ScoredChunk};

/// Number of indexed chunks for one chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterCount {
    pub chapter: String,
    pub chunks: usize,
}

/// Abstract storage backend for embedded chunks.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`replace_all`](Store::replace_all) | Replace the whole index contents |
/// | [`vector_search`](Store::vector_search) | Cosine similarity search, optionally chapter-filtered |
/// | [`chunk_count`](Store::chunk_count) | Total number of chunks |
/// | [`chapter_counts`](Store::chapter_counts) | Chunks per chapter |
/// | [`chunks`](Store::chunks) | All chunks in ingestion order |
#[async_trait]
pub trait Store: Send + Sync {
    /// Replace every stored chunk. `vectors[i]` is the embedding of
    /// `chunks[i]`; the two slices must have equal length.
    async fn replace_all(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()>;

    /// Return up to `limit` chunks ordered by descending cosine
    /// similarity to `query_vec` (ties broken by ascending ordinal).
    /// When `chapter` is set, only chunks whose chapter name equals it
    /// are considered.
    async fn vector_search(
        &self,
        query_vec: &[f32],
        limit: usize,
        chapter: Option<&str>,
    ) -> Result<Vec<ScoredChunk>>;

    async fn chunk_count(&self) -> Result<usize>;

    /// Chunk counts grouped by chapter name, in first-ordinal order.
    async fn chapter_counts(&self) -> Result<Vec<ChapterCount>>;

    /// Every chunk, ordered by ordinal.
    async fn chunks(&self) -> Result<Vec<Chunk>>;
}

/// Sort scored chunks by descending score, then ascending ordinal.
pub fn rank(results: &mut [ScoredChunk]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.chunk.ordinal.cmp(&b.chunk.ordinal))
    });
}
