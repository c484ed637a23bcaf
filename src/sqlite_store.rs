//! SQLite-backed [`Store`] implementation.
//!
//! Chunks live in `chunks`, their embeddings in `chunk_vectors`, and the
//! build parameters in `index_meta`. Similarity is computed in Rust over
//! every stored vector (optionally narrowed to one chapter in SQL).

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;

use lorekeeper_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use lorekeeper_core::models::{Chunk, ScoredChunk};
use lorekeeper_core::store::{rank, ChapterCount, Store};

/// SQLite implementation of the [`Store`] trait.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Write (or overwrite) index metadata entries in one transaction.
    pub async fn write_meta(&self, entries: &[(&str, String)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in entries {
            sqlx::query(
                r#"
                INSERT INTO index_meta (key, value) VALUES (?, ?)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                "#,
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// All metadata entries, sorted by key.
    pub async fn read_meta(&self) -> Result<BTreeMap<String, String>> {
        let rows = sqlx::query("SELECT key, value FROM index_meta")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| (row.get("key"), row.get("value")))
            .collect())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Chunk {
    let page: i64 = row.get("page");
    Chunk {
        id: row.get("id"),
        ordinal: row.get("ordinal"),
        page: page as u32,
        chapter: row.get("chapter"),
        chapter_id: row.get("chapter_id"),
        text: row.get("text"),
        hash: row.get("hash"),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn replace_all(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != vectors.len() {
            bail!(
                "chunk/vector count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            );
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunk_vectors")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;

        for (chunk, vector) in chunks.iter().zip(vectors) {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, ordinal, page, chapter, chapter_id, text, hash)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(chunk.ordinal)
            .bind(chunk.page as i64)
            .bind(&chunk.chapter)
            .bind(&chunk.chapter_id)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO chunk_vectors (chunk_id, embedding) VALUES (?, ?)")
                .bind(&chunk.id)
                .bind(vec_to_blob(vector))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn vector_search(
        &self,
        query_vec: &[f32],
        limit: usize,
        chapter: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.ordinal, c.page, c.chapter, c.chapter_id, c.text, c.hash,
                   cv.embedding
            FROM chunk_vectors cv
            JOIN chunks c ON c.id = cv.chunk_id
            WHERE (?1 IS NULL OR c.chapter = ?1)
            "#,
        )
        .bind(chapter)
        .fetch_all(&self.pool)
        .await?;

        let mut results: Vec<ScoredChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                ScoredChunk {
                    chunk: row_to_chunk(row),
                    score: cosine_similarity(query_vec, &vec) as f64,
                }
            })
            .collect();

        rank(&mut results);
        results.truncate(limit);
        Ok(results)
    }

    async fn chunk_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn chapter_counts(&self) -> Result<Vec<ChapterCount>> {
        let rows = sqlx::query(
            r#"
            SELECT chapter, COUNT(*) AS chunks, MIN(ordinal) AS first
            FROM chunks
            GROUP BY chapter
            ORDER BY first ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let chunks: i64 = row.get("chunks");
                ChapterCount {
                    chapter: row.get("chapter"),
                    chunks: chunks as usize,
                }
            })
            .collect())
    }

    async fn chunks(&self) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT id, ordinal, page, chapter, chapter_id, text, hash FROM chunks ORDER BY ordinal ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_chunk).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};

    fn chunk(ordinal: i64, chapter: &str, text: &str) -> Chunk {
        Chunk {
            id: format!("c{}", ordinal),
            ordinal,
            page: 10 + ordinal as u32,
            chapter: chapter.to_string(),
            chapter_id: chapter.to_lowercase(),
            text: text.to_string(),
            hash: format!("h{}", ordinal),
        }
    }

    async fn store(dir: &tempfile::TempDir) -> SqliteStore {
        let pool = db::connect(&dir.path().join("index.sqlite")).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    async fn seeded(dir: &tempfile::TempDir) -> SqliteStore {
        let store = store(dir).await;
        let chunks = vec![
            chunk(0, "Raças", "a"),
            chunk(1, "Classes", "b"),
            chunk(2, "Raças", "c"),
        ];
        let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]];
        store.replace_all(&chunks, &vectors).await.unwrap();
        store
    }

    #[tokio::test]
    async fn roundtrips_chunks_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded(&dir).await;
        let chunks = store.chunks().await.unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].chapter, "Classes");
        assert_eq!(chunks[2].page, 12);
        assert_eq!(store.chunk_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn search_filters_and_ties_by_ordinal() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded(&dir).await;

        let all = store.vector_search(&[1.0, 0.0], 10, None).await.unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.chunk.id.as_str()).collect();
        assert_eq!(ids, ["c0", "c2", "c1"]);

        let classes = store
            .vector_search(&[1.0, 0.0], 10, Some("Classes"))
            .await
            .unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].chunk.id, "c1");

        let limited = store.vector_search(&[1.0, 0.0], 1, None).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn chapter_counts_in_first_seen_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded(&dir).await;
        let counts = store.chapter_counts().await.unwrap();
        assert_eq!(
            counts,
            vec![
                ChapterCount {
                    chapter: "Raças".to_string(),
                    chunks: 2
                },
                ChapterCount {
                    chapter: "Classes".to_string(),
                    chunks: 1
                },
            ]
        );
    }

    #[tokio::test]
    async fn replace_all_drops_previous_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded(&dir).await;
        store
            .replace_all(&[chunk(0, "Magias", "z")], &[vec![0.5, 0.5]])
            .await
            .unwrap();
        assert_eq!(store.chunk_count().await.unwrap(), 1);
        let results = store.vector_search(&[0.5, 0.5], 5, None).await.unwrap();
        assert_eq!(results[0].chunk.chapter, "Magias");
    }

    #[tokio::test]
    async fn meta_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        store
            .write_meta(&[("embedding_model", "a".to_string())])
            .await
            .unwrap();
        store
            .write_meta(&[("embedding_model", "b".to_string()), ("chunk_count", "3".to_string())])
            .await
            .unwrap();
        let meta = store.read_meta().await.unwrap();
        assert_eq!(meta.get("embedding_model").map(String::as_str), Some("b"));
        assert_eq!(meta.len(), 2);
    }
}
