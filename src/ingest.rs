//! Document ingestion: source document → pages → chapter-tagged chunks.
//!
//! Nothing is persisted here; [`crate::index::build_index`] embeds and
//! stores the result. Any failure to read the document is fatal and
//! reported as [`KnowledgeError::Ingestion`].

use anyhow::Context;
use std::path::Path;

use lorekeeper_core::chapters::ChapterTable;
use lorekeeper_core::chunk::{chunk_chapters, TextSplitter};
use lorekeeper_core::error::KnowledgeError;
use lorekeeper_core::models::{Chunk, Page};

use crate::extract;
use crate::progress::{IngestEvent, ProgressReporter};

/// Read the document's pages on the blocking pool (PDF parsing is CPU bound).
pub async fn load_document(path: &Path) -> Result<Vec<Page>, KnowledgeError> {
    let owned = path.to_path_buf();
    let pages = tokio::task::spawn_blocking(move || extract::load_pages(&owned))
        .await
        .context("page extraction task failed")
        .map_err(KnowledgeError::Ingestion)?
        .with_context(|| format!("reading {}", path.display()))
        .map_err(KnowledgeError::Ingestion)?;
    Ok(pages)
}

/// Split pages into chunks, chapter by chapter, reporting per-chapter counts.
pub fn chunk_pages(
    pages: &[Page],
    table: &ChapterTable,
    splitter: &TextSplitter,
    progress: &dyn ProgressReporter,
) -> Vec<Chunk> {
    let chunks = chunk_chapters(pages, table, splitter);

    for chapter in table.chapters() {
        let count = chunks.iter().filter(|c| c.chapter_id == chapter.id).count();
        if count == 0 {
            tracing::warn!(
                chapter = %chapter.id,
                start = chapter.start,
                end = chapter.end,
                "chapter selected no text; it will have no chunks"
            );
        }
        progress.report(IngestEvent::Chunked {
            chapter: chapter.name.clone(),
            chunks: count as u64,
        });
    }

    chunks
}

/// Load `document` and chunk it according to `table`.
pub async fn ingest(
    document: &Path,
    table: &ChapterTable,
    splitter: &TextSplitter,
    progress: &dyn ProgressReporter,
) -> Result<Vec<Chunk>, KnowledgeError> {
    progress.report(IngestEvent::Loading {
        document: document.display().to_string(),
    });
    let pages = load_document(document).await?;
    tracing::info!(pages = pages.len(), document = %document.display(), "document loaded");

    let chunks = chunk_pages(&pages, table, splitter, progress);
    tracing::info!(chunks = chunks.len(), "document chunked");
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use lorekeeper_core::chapters::{Chapter, KeywordGroup};

    fn table() -> ChapterTable {
        ChapterTable::new(
            vec![
                Chapter::new("races", "Raças", 1, 2),
                Chapter::new("classes", "Classes", 3, 3),
                Chapter::new("appendix", "Apêndice", 90, 99),
            ],
            vec![KeywordGroup::new("races", &["elfo"])],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn text_document_is_chunked_per_chapter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.txt");
        std::fs::write(&path, "Elfos.\x0cAnões.\x0cMagos estudam.").unwrap();

        let chunks = ingest(&path, &table(), &TextSplitter::default(), &NoProgress)
            .await
            .unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chapter, "Raças");
        assert_eq!(chunks[1].page, 2);
        assert_eq!(chunks[2].chapter_id, "classes");
        assert!(chunks.iter().all(|c| c.chapter_id != "appendix"));
    }

    #[tokio::test]
    async fn missing_document_is_ingestion_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ingest(
            &dir.path().join("absent.pdf"),
            &table(),
            &TextSplitter::default(),
            &NoProgress,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "ingestion_error");
        assert!(err.to_string().contains("absent.pdf"));
    }
}
