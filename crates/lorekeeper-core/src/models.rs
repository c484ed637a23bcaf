//! Core data models used throughout Lorekeeper.
//!
//! These types represent the pages, chunks, and query results that flow
//! through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// One page of the source document, as produced by extraction.
///
/// Page numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub text: String,
}

impl Page {
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }
}

/// A chunk of one page's text, tagged with the chapter it belongs to.
///
/// Chunks are created once during ingestion and never mutated. `ordinal`
/// is the chunk's position in the ingestion sequence and is used as the
/// stable tie-break when two chunks score equally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub ordinal: i64,
    pub page: u32,
    pub chapter: String,
    pub chapter_id: String,
    pub text: String,
    pub hash: String,
}

/// A chunk returned from similarity search with its cosine similarity.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    pub score: f64,
}

/// Token accounting for one knowledge query.
///
/// Diagnostic numbers only; nothing in the pipeline branches on them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    /// Tokens in the raw query text.
    pub input: usize,
    /// Tokens across the retrieved chunks.
    pub context: usize,
    /// Tokens in the generated answer.
    pub output: usize,
    pub total: usize,
}

impl TokenUsage {
    pub fn new(input: usize, context: usize, output: usize) -> Self {
        Self {
            input,
            context,
            output,
            total: input + context + output,
        }
    }
}

/// The result of a knowledge query: answer, sources, and token counts.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub answer: String,
    /// Chapter the router scoped the search to, if any.
    pub chapter: Option<String>,
    pub sources: Vec<ScoredChunk>,
    pub tokens: TokenUsage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_usage_total_is_sum() {
        let usage = TokenUsage::new(12, 900, 150);
        assert_eq!(usage.total, 1062);
    }

    #[test]
    fn scored_chunk_serializes_flat() {
        let scored = ScoredChunk {
            chunk: Chunk {
                id: "c1".to_string(),
                ordinal: 0,
                page: 18,
                chapter: "Raças".to_string(),
                chapter_id: "races".to_string(),
                text: "Elfos".to_string(),
                hash: "h".to_string(),
            },
            score: 0.5,
        };
        let json = serde_json::to_value(&scored).unwrap();
        assert_eq!(json["chapter"], "Raças");
        assert_eq!(json["page"], 18);
        assert_eq!(json["score"], 0.5);
    }
}
