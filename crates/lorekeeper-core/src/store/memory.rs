//! In-memory [`Store`] implementation for tests and ephemeral indexes.
//!
//! Uses a `Vec` behind `std::sync::RwLock` for thread safety. Vector
//! search is brute-force cosine similarity over all stored vectors.

use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{Chunk, ScoredChunk};

use super::{rank, ChapterCount, Store};

struct StoredChunk {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// In-memory chunk index.
pub struct InMemoryStore {
    entries: RwLock<Vec<StoredChunk>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl Store for InMemoryStore {
    async fn replace_all(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != vectors.len() {
            bail!(
                "chunk/vector count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            );
        }
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.clear();
        for (chunk, vector) in chunks.iter().zip(vectors) {
            entries.push(StoredChunk {
                chunk: chunk.clone(),
                vector: vector.clone(),
            });
        }
        entries.sort_by_key(|e| e.chunk.ordinal);
        Ok(())
    }

    async fn vector_search(
        &self,
        query_vec: &[f32],
        limit: usize,
        chapter: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        let entries = self.entries.read().map_err(poisoned)?;
        let mut results: Vec<ScoredChunk> = entries
            .iter()
            .filter(|e| chapter.map_or(true, |c| e.chunk.chapter == c))
            .map(|e| ScoredChunk {
                chunk: e.chunk.clone(),
                score: cosine_similarity(query_vec, &e.vector) as f64,
            })
            .collect();
        rank(&mut results);
        results.truncate(limit);
        Ok(results)
    }

    async fn chunk_count(&self) -> Result<usize> {
        Ok(self.entries.read().map_err(poisoned)?.len())
    }

    async fn chapter_counts(&self) -> Result<Vec<ChapterCount>> {
        let entries = self.entries.read().map_err(poisoned)?;
        let mut counts: Vec<ChapterCount> = Vec::new();
        for e in entries.iter() {
            match counts.iter_mut().find(|c| c.chapter == e.chunk.chapter) {
                Some(c) => c.chunks += 1,
                None => counts.push(ChapterCount {
                    chapter: e.chunk.chapter.clone(),
                    chunks: 1,
                }),
            }
        }
        Ok(counts)
    }

    async fn chunks(&self) -> Result<Vec<Chunk>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.iter().map(|e| e.chunk.clone()).collect())
    }
}
