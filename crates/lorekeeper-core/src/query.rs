//! Knowledge query service.
//!
//! [`KnowledgeBase::query`] is the single entry point used by the agents,
//! the CLI, and the HTTP server:
//!
//! 1. Route the query to a chapter by keyword (or no filter).
//! 2. Retrieve the top-`k` chunks, restricted to that chapter.
//! 3. Stuff every retrieved chunk, in similarity order, into one prompt.
//! 4. Generate the answer.
//! 5. Count tokens for the query, each retrieved chunk, and the answer.
//!
//! Failures are never turned into an empty answer: retrieval problems
//! surface as [`KnowledgeError::Retrieval`] and model failures as
//! [`KnowledgeError::Generation`].

use anyhow::anyhow;
use std::sync::Arc;

use crate::chapters::{Chapter, ChapterTable};
use crate::embedding::EmbeddingProvider;
use crate::error::KnowledgeError;
use crate::generation::{TextGenerator, TokenCounter};
use crate::models::{QueryResult, ScoredChunk, TokenUsage};
use crate::router;
use crate::search::{self, SearchRequest, DEFAULT_K};
use crate::store::Store;

/// Build the "stuffed" question-answering prompt.
///
/// Chunks are joined with a blank line in the order given.
pub fn build_prompt(question: &str, sources: &[ScoredChunk]) -> String {
    let context = sources
        .iter()
        .map(|s| s.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Use the following pieces of context to answer the question at the end. \
         If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\n\
         {}\n\nQuestion: {}\nHelpful Answer:",
        context, question
    )
}

/// A loaded index plus the models needed to answer questions from it.
///
/// Cheap to clone; every component is shared behind an `Arc`. All
/// methods take `&self` and never mutate the index, so one instance can
/// serve concurrent queries.
#[derive(Clone)]
pub struct KnowledgeBase {
    table: Arc<ChapterTable>,
    store: Arc<dyn Store>,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn TextGenerator>,
    tokens: Arc<dyn TokenCounter>,
    k: usize,
}

impl KnowledgeBase {
    pub fn new(
        table: Arc<ChapterTable>,
        store: Arc<dyn Store>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn TextGenerator>,
        tokens: Arc<dyn TokenCounter>,
    ) -> Self {
        Self {
            table,
            store,
            embedder,
            generator,
            tokens,
            k: DEFAULT_K,
        }
    }

    /// Override the number of chunks retrieved per query.
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn table(&self) -> &ChapterTable {
        &self.table
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Shared handle to the generation model, for callers that prompt it
    /// directly (the storytelling and illustration agents).
    pub fn generator(&self) -> &Arc<dyn TextGenerator> {
        &self.generator
    }

    pub fn tokens(&self) -> &dyn TokenCounter {
        self.tokens.as_ref()
    }

    /// Which chapter a query would be scoped to.
    pub fn route(&self, query: &str) -> Option<&Chapter> {
        router::route(&self.table, query)
    }

    /// Similarity search without generation.
    pub async fn search(&self, req: &SearchRequest) -> Result<Vec<ScoredChunk>, KnowledgeError> {
        search::search(self.store.as_ref(), self.embedder.as_ref(), req).await
    }

    /// Answer `query` from the routed chapter's chunks.
    pub async fn query(&self, query: &str) -> Result<QueryResult, KnowledgeError> {
        if query.trim().is_empty() {
            return Err(KnowledgeError::Retrieval(anyhow!("query must not be empty")));
        }

        let chapter = self.route(query).map(|c| c.name.clone());
        let req = SearchRequest::new(query, self.k).in_chapter(chapter.as_deref());
        let sources = self.search(&req).await?;

        let prompt = build_prompt(query, &sources);
        let answer = self
            .generator
            .generate(&prompt)
            .await
            .map_err(KnowledgeError::Generation)?;

        let input = self.tokens.count(query);
        let context = sources.iter().map(|s| self.tokens.count(&s.chunk.text)).sum();
        let output = self.tokens.count(&answer);

        Ok(QueryResult {
            answer,
            chapter,
            sources,
            tokens: TokenUsage::new(input, context, output),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapters::{Chapter, KeywordGroup};
    use crate::generation::WordCounter;
    use crate::models::Chunk;
    use crate::store::memory::InMemoryStore;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct AxisEmbedder;

    #[async_trait]
    impl EmbeddingProvider for AxisEmbedder {
        fn model_name(&self) -> &str {
            "axis"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        t.matches("elf").count() as f32 + 0.1,
                        t.matches("espada").count() as f32 + 0.1,
                    ]
                })
                .collect())
        }
    }

    /// Records the last prompt and echoes a fixed answer.
    struct RecordingGenerator {
        last_prompt: Mutex<Option<String>>,
        fail: bool,
    }

    #[async_trait]
    impl TextGenerator for RecordingGenerator {
        fn model_name(&self) -> &str {
            "recording"
        }
        async fn generate(&self, prompt: &str) -> Result<String> {
            *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
            if self.fail {
                bail!("rate limited");
            }
            Ok("Elfos são graciosos".to_string())
        }
    }

    fn table() -> ChapterTable {
        ChapterTable::new(
            vec![
                Chapter::new("races", "Raças", 1, 1),
                Chapter::new("equipment", "Equipamento", 2, 2),
            ],
            vec![
                KeywordGroup::new("races", &["elfo"]),
                KeywordGroup::new("equipment", &["espada"]),
            ],
        )
        .unwrap()
    }

    fn chunk(ordinal: i64, chapter: &str, chapter_id: &str, text: &str) -> Chunk {
        Chunk {
            id: format!("c{}", ordinal),
            ordinal,
            page: ordinal as u32 + 1,
            chapter: chapter.to_string(),
            chapter_id: chapter_id.to_string(),
            text: text.to_string(),
            hash: String::new(),
        }
    }

    async fn knowledge_base(fail: bool) -> (KnowledgeBase, Arc<RecordingGenerator>) {
        let chunks = vec![
            chunk(0, "Raças", "races", "Elfos vivem séculos"),
            chunk(1, "Equipamento", "equipment", "Elfos preferem espada longa"),
            chunk(2, "Raças", "races", "Anões mineram"),
        ];
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = AxisEmbedder.embed(&texts).await.unwrap();
        let store = InMemoryStore::new();
        store.replace_all(&chunks, &vectors).await.unwrap();

        let generator = Arc::new(RecordingGenerator {
            last_prompt: Mutex::new(None),
            fail,
        });
        let kb = KnowledgeBase::new(
            Arc::new(table()),
            Arc::new(store),
            Arc::new(AxisEmbedder),
            generator.clone(),
            Arc::new(WordCounter),
        );
        (kb, generator)
    }

    #[tokio::test]
    async fn routed_query_uses_only_that_chapter() {
        let (kb, generator) = knowledge_base(false).await;
        let result = kb.query("Descreva a raça Elfo").await.unwrap();
        assert_eq!(result.chapter.as_deref(), Some("Raças"));
        assert_eq!(result.sources.len(), 2);
        assert!(result.sources.iter().all(|s| s.chunk.chapter == "Raças"));
        assert_eq!(result.answer, "Elfos são graciosos");

        let prompt = generator.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("Elfos vivem séculos"));
        assert!(!prompt.contains("espada longa"));
        assert!(prompt.ends_with("Question: Descreva a raça Elfo\nHelpful Answer:"));
    }

    #[tokio::test]
    async fn unrouted_query_searches_everything() {
        let (kb, _) = knowledge_base(false).await;
        let result = kb.query("Quem vive mais?").await.unwrap();
        assert_eq!(result.chapter, None);
        assert_eq!(result.sources.len(), 3);
    }

    #[tokio::test]
    async fn token_accounting() {
        let (kb, _) = knowledge_base(false).await;
        let result = kb.query("Descreva a raça Elfo").await.unwrap();
        // WordCounter: 4 query words, 3 + 2 context words, 3 answer words.
        assert_eq!(result.tokens, TokenUsage::new(4, 5, 3));
        assert_eq!(result.tokens.total, 12);
    }

    #[tokio::test]
    async fn k_limits_sources() {
        let (kb, _) = knowledge_base(false).await;
        let kb = kb.with_k(1);
        let result = kb.query("Quem vive mais?").await.unwrap();
        assert_eq!(result.sources.len(), 1);
    }

    #[tokio::test]
    async fn generation_failure_is_surfaced() {
        let (kb, _) = knowledge_base(true).await;
        let err = kb.query("Descreva a raça Elfo").await.unwrap_err();
        assert!(matches!(err, KnowledgeError::Generation(_)));
        assert_eq!(err.user_message(), "Erro ao buscar informações: rate limited");
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let (kb, generator) = knowledge_base(false).await;
        assert!(kb.query("  ").await.is_err());
        assert!(generator.last_prompt.lock().unwrap().is_none());
    }

    #[test]
    fn prompt_stuffs_chunks_in_order() {
        let sources = vec![
            ScoredChunk {
                chunk: chunk(0, "Raças", "races", "primeiro"),
                score: 0.9,
            },
            ScoredChunk {
                chunk: chunk(1, "Raças", "races", "segundo"),
                score: 0.8,
            },
        ];
        let prompt = build_prompt("pergunta?", &sources);
        assert!(prompt.contains("primeiro\n\nsegundo\n\nQuestion: pergunta?"));
        assert!(prompt.starts_with("Use the following pieces of context"));
    }
}
