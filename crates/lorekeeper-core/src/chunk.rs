//! Layered-separator text splitter and chapter chunking.
//!
//! Splits page text into [`Chunk`]s of at most `chunk_size` characters,
//! with roughly `chunk_overlap` characters shared between consecutive
//! chunks of the same page. All lengths are measured in Unicode scalar
//! values (`char`s), never bytes and never tokens.
//!
//! # Algorithm
//!
//! 1. Pick the first separator (in preference order) that occurs in the
//!    text. The empty separator means "split between every character".
//! 2. Split on it, keeping the separator at the start of the following
//!    piece, and drop empty pieces.
//! 3. Pieces shorter than `chunk_size` are queued for merging. A piece
//!    that is too long flushes the queue and is split recursively with
//!    the remaining, finer separators.
//! 4. Merging concatenates queued pieces into windows. When the next
//!    piece would overflow the window, the window is emitted and pieces
//!    are dropped from its front until at most `chunk_overlap` characters
//!    remain (and the next piece fits). Emitted windows are trimmed, and
//!    windows that are only whitespace are discarded.
//!
//! Because every queued piece is shorter than `chunk_size` and the window
//! never grows past it, no chunk ever exceeds `chunk_size` characters.
//!
//! # Example
//!
//! ```rust
//! use lorekeeper_core::chunk::TextSplitter;
//!
//! let splitter = TextSplitter::new(20, 5).unwrap();
//! let pieces = splitter.split_text("Primeiro parágrafo.\n\nSegundo parágrafo.");
//! assert_eq!(pieces, vec!["Primeiro parágrafo.", "Segundo parágrafo."]);
//! ```

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use uuid::Uuid;

use crate::chapters::ChapterTable;
use crate::models::{Chunk, Page};

/// Default target chunk size, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 2000;

/// Default overlap between consecutive chunks, in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Separators in preference order: section breaks, paragraph breaks,
/// line breaks, sentence ends, any space, then a hard character cut.
pub const DEFAULT_SEPARATORS: [&str; 6] = ["\n\n\n", "\n\n", "\n", ". ", " ", ""];

/// Recursive splitter with a layered separator policy.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    /// Create a splitter with the default separators.
    ///
    /// Fails if `chunk_size` is zero or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            bail!("chunk_size must be greater than zero");
        }
        if chunk_overlap >= chunk_size {
            bail!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap,
                chunk_size
            );
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Replace the separator list. The last entry acts as the fallback.
    pub fn with_separators<S: Into<String>>(mut self, separators: impl IntoIterator<Item = S>) -> Self {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into trimmed, non-empty windows.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut finer: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut out = Vec::new();
        let mut queued: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                queued.push(piece);
                continue;
            }
            if !queued.is_empty() {
                out.extend(self.merge(&queued));
                queued.clear();
            }
            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
            } else {
                out.extend(self.split_recursive(piece, finer));
            }
        }
        if !queued.is_empty() {
            out.extend(self.merge(&queued));
        }
        out
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                if let Some(doc) = join_window(&window) {
                    docs.push(doc);
                }
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }
            window.push_back((piece, len));
            total += len;
        }

        if let Some(doc) = join_window(&window) {
            docs.push(doc);
        }
        docs
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split on `separator`, attaching each separator occurrence to the start
/// of the piece that follows it. Empty pieces are dropped.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        pieces.push(&text[start..idx]);
        start = idx;
    }
    pieces.push(&text[start..]);
    pieces.retain(|p| !p.is_empty());
    pieces
}

fn join_window(window: &VecDeque<(&str, usize)>) -> Option<String> {
    let joined: String = window.iter().map(|(p, _)| *p).collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Chunk every chapter's pages, in chapter declaration order.
///
/// Pages are selected per chapter by inclusive page range and split one
/// page at a time, so a chunk never spans two pages (and therefore never
/// spans two chapters). A chapter whose range selects no pages simply
/// contributes no chunks. Ordinals are assigned sequentially across the
/// whole output.
pub fn chunk_chapters(pages: &[Page], table: &ChapterTable, splitter: &TextSplitter) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut ordinal: i64 = 0;
    for chapter in table.chapters() {
        for page in pages.iter().filter(|p| chapter.contains_page(p.number)) {
            for text in splitter.split_text(&page.text) {
                chunks.push(Chunk {
                    id: Uuid::new_v4().to_string(),
                    ordinal,
                    page: page.number,
                    chapter: chapter.name.clone(),
                    chapter_id: chapter.id.clone(),
                    hash: content_hash(&text),
                    text,
                });
                ordinal += 1;
            }
        }
    }
    chunks
}

/// SHA-256 of a chunk's text, hex encoded.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapters::{Chapter, KeywordGroup};

    fn words(n: usize) -> String {
        (0..n)
            .map(|i| format!("palavra{:04}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(100, 100).is_err());
        assert!(TextSplitter::new(100, 150).is_err());
        assert!(TextSplitter::new(100, 99).is_ok());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let splitter = TextSplitter::default();
        assert_eq!(splitter.split_text("  Olá, aventureiro!  "), vec!["Olá, aventureiro!"]);
    }

    #[test]
    fn blank_text_yields_nothing() {
        let splitter = TextSplitter::default();
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text(" \n\n \n").is_empty());
    }

    #[test]
    fn separator_is_kept_at_start_of_next_piece() {
        assert_eq!(split_keeping_separator("a. b. c", ". "), vec!["a", ". b", ". c"]);
        assert_eq!(split_keeping_separator("\n\nx", "\n\n"), vec!["\n\nx"]);
        assert_eq!(split_keeping_separator("ãé", ""), vec!["ã", "é"]);
    }

    #[test]
    fn prefers_paragraph_breaks() {
        let splitter = TextSplitter::new(30, 0).unwrap();
        let text = "Os elfos vivem muito.\n\nOs anões são teimosos.";
        assert_eq!(
            splitter.split_text(text),
            vec!["Os elfos vivem muito.", "Os anões são teimosos."]
        );
    }

    #[test]
    fn chunks_never_exceed_size() {
        let splitter = TextSplitter::new(200, 40).unwrap();
        let text = format!(
            "{}\n\n{}\n{}. {}",
            words(60),
            words(10),
            "x".repeat(450),
            words(25)
        );
        let chunks = splitter.split_text(&text);
        assert!(chunks.len() > 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 200, "chunk too long: {}", chunk.len());
            assert!(!chunk.is_empty());
        }
    }

    #[test]
    fn size_is_measured_in_chars_not_bytes() {
        let splitter = TextSplitter::new(10, 0).unwrap();
        let chunks = splitter.split_text("ção ção ção ção");
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 10);
        }
        assert_eq!(chunks, vec!["ção ção", "ção ção"]);
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let splitter = TextSplitter::default();
        let text = words(1000);
        let chunks = splitter.split_text(&text);
        assert!(chunks.len() >= 5);
        for pair in chunks.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            // Find the longest suffix of `a` that is a prefix of `b`.
            let overlap = (1..=a.len().min(b.len()))
                .rev()
                .filter(|&n| a.is_char_boundary(a.len() - n) && b.is_char_boundary(n))
                .find(|&n| a[a.len() - n..] == b[..n])
                .unwrap_or(0);
            assert!(
                (150..=200).contains(&overlap),
                "overlap {} outside expected band",
                overlap
            );
        }
    }

    #[test]
    fn hard_cut_when_no_separator() {
        let splitter = TextSplitter::new(100, 10).unwrap();
        let text = "z".repeat(250);
        let chunks = splitter.split_text(&text);
        assert!(chunks.iter().all(|c| c.len() <= 100));
        assert!(chunks.len() >= 3);
    }

    #[test]
    fn custom_separators() {
        let splitter = TextSplitter::new(5, 0).unwrap().with_separators(["|"]);
        // No finer separator: oversized pieces pass through whole.
        assert_eq!(splitter.split_text("ab|cdefgh"), vec!["ab", "|cdefgh"]);
    }

    fn table() -> ChapterTable {
        ChapterTable::new(
            vec![
                Chapter::new("races", "Raças", 2, 3),
                Chapter::new("classes", "Classes", 4, 4),
                Chapter::new("empty", "Vazio", 50, 60),
            ],
            vec![KeywordGroup::new("races", &["elfo"])],
        )
        .unwrap()
    }

    #[test]
    fn chunk_chapters_tags_and_orders() {
        let pages = vec![
            Page::new(1, "Introdução"),
            Page::new(2, "Elfos são graciosos."),
            Page::new(3, "Anões são resistentes."),
            Page::new(4, "Magos estudam."),
        ];
        let chunks = chunk_chapters(&pages, &table(), &TextSplitter::default());
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| (c.page, c.chapter_id.as_str())).collect::<Vec<_>>(),
            vec![(2, "races"), (3, "races"), (4, "classes")]
        );
        assert_eq!(chunks[0].chapter, "Raças");
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.ordinal, i as i64);
            assert_eq!(c.hash, content_hash(&c.text));
        }
    }

    #[test]
    fn empty_range_contributes_nothing() {
        let pages = vec![Page::new(2, "Elfos."), Page::new(4, "Magos.")];
        let chunks = chunk_chapters(&pages, &table(), &TextSplitter::default());
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.chapter_id != "empty"));
    }

    #[test]
    fn chunks_do_not_span_pages() {
        let pages = vec![Page::new(2, "fim da página dois"), Page::new(3, "início da três")];
        let chunks = chunk_chapters(&pages, &table(), &TextSplitter::default());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "fim da página dois");
        assert_eq!(chunks[1].text, "início da três");
    }
}
