//! Page extraction for the source document.
//!
//! Ingestion needs the document as ordered, 1-based pages so chapters can
//! select their page ranges. PDFs are split by the PDF page tree; plain
//! text and Markdown files are split on form-feed characters (`\x0c`),
//! which is also how most `pdftotext` dumps mark page breaks.

use std::path::Path;

use lorekeeper_core::models::Page;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";

/// Page separator in plain-text dumps.
const FORM_FEED: char = '\x0c';

/// Extraction error. Never panics; the caller decides whether it is fatal.
#[derive(Debug)]
pub enum ExtractError {
    UnsupportedContentType(String),
    Pdf(String),
    Io(String),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::UnsupportedContentType(ct) => {
                write!(f, "unsupported content-type: {}", ct)
            }
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Io(e) => write!(f, "cannot read document: {}", e),
        }
    }
}

impl std::error::Error for ExtractError {}

/// Guess the content type from the file extension.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "txt" => Some(MIME_TEXT),
        "md" | "markdown" => Some(MIME_MARKDOWN),
        _ => None,
    }
}

/// Split document bytes into pages.
pub fn extract_pages(bytes: &[u8], content_type: &str) -> Result<Vec<Page>, ExtractError> {
    match content_type {
        MIME_PDF => extract_pdf_pages(bytes),
        MIME_TEXT | MIME_MARKDOWN => {
            let text = String::from_utf8_lossy(bytes);
            Ok(split_text_pages(&text))
        }
        _ => Err(ExtractError::UnsupportedContentType(
            content_type.to_string(),
        )),
    }
}

/// Read a document from disk and split it into pages.
pub fn load_pages(path: &Path) -> Result<Vec<Page>, ExtractError> {
    let content_type = content_type_for(path).ok_or_else(|| {
        ExtractError::UnsupportedContentType(format!("{} (unknown extension)", path.display()))
    })?;
    let bytes =
        std::fs::read(path).map_err(|e| ExtractError::Io(format!("{}: {}", path.display(), e)))?;
    extract_pages(&bytes, content_type)
}

fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<Page>, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| Page::new(i as u32 + 1, text))
        .collect())
}

fn split_text_pages(text: &str) -> Vec<Page> {
    let mut parts: Vec<&str> = text.split(FORM_FEED).collect();
    // A trailing form feed closes the last page rather than opening a new one.
    if text.ends_with(FORM_FEED) {
        parts.pop();
    }
    parts
        .into_iter()
        .enumerate()
        .map(|(i, part)| Page::new(i as u32 + 1, part))
        .collect()
}
