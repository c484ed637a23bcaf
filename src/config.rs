//! TOML configuration.
//!
//! Loaded once at startup by [`load_config`], validated, and then shared
//! read-only. The chapter table is resolved during loading (built-in
//! Player's Handbook map unless `[[chapters]]` / `[[keywords]]` override
//! it) and frozen behind an `Arc`.
//!
//! API keys are never read from the file; providers take them from the
//! environment (`OPENAI_API_KEY`).

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lorekeeper_core::chapters::{Chapter, ChapterTable, KeywordGroup};
use lorekeeper_core::chunk::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use lorekeeper_core::search::DEFAULT_K;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    chapters: Vec<ChapterEntry>,
    #[serde(default)]
    keywords: Vec<KeywordEntry>,
    #[serde(skip)]
    table: Arc<ChapterTable>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Source document consumed during ingestion (PDF or plain text).
    #[serde(default = "default_document")]
    pub document: PathBuf,
    /// Persisted index file.
    #[serde(default = "default_index")]
    pub index: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            document: default_document(),
            index: default_index(),
        }
    }
}

fn default_document() -> PathBuf {
    PathBuf::from("player-book.pdf")
}
fn default_index() -> PathBuf {
    PathBuf::from("data/knowledge_base.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: DEFAULT_K }
    }
}

fn default_k() -> usize {
    DEFAULT_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    /// Base URL override (Ollama host, or an OpenAI-compatible endpoint).
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_embedding_retries(),
            timeout_secs: default_embedding_timeout(),
            url: None,
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_disabled() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_retries() -> u32 {
    5
}
fn default_embedding_timeout() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_disabled")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_generation_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_disabled(),
            model: default_generation_model(),
            temperature: default_temperature(),
            max_tokens: None,
            max_retries: default_generation_retries(),
            timeout_secs: default_generation_timeout(),
            url: None,
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_generation_retries() -> u32 {
    3
}
fn default_generation_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

/// `[[chapters]]` entry.
#[derive(Debug, Deserialize, Clone)]
struct ChapterEntry {
    id: String,
    name: String,
    start: u32,
    end: u32,
}

/// `[[keywords]]` entry. Entry order is routing order.
#[derive(Debug, Deserialize, Clone)]
struct KeywordEntry {
    chapter: String,
    terms: Vec<String>,
}

impl Config {
    /// Defaults for every section, built-in chapter table. Used by
    /// commands that can run without a config file.
    pub fn minimal() -> Self {
        Self {
            paths: PathsConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            server: ServerConfig::default(),
            chapters: Vec::new(),
            keywords: Vec::new(),
            table: Arc::new(ChapterTable::players_handbook()),
        }
    }

    /// The frozen chapter table.
    pub fn chapter_table(&self) -> Arc<ChapterTable> {
        self.table.clone()
    }

    /// Parse and validate a configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(content).with_context(|| "Failed to parse config file")?;
        config.table = Arc::new(resolve_table(&config.chapters, &config.keywords)?);
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }

        if self.retrieval.k < 1 {
            bail!("retrieval.k must be >= 1");
        }

        match self.embedding.provider.as_str() {
            "disabled" | "openai" | "ollama" | "local" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
                other
            ),
        }
        if self.embedding.provider == "ollama" {
            if self.embedding.model.is_none() {
                bail!("embedding.model must be specified when provider is 'ollama'");
            }
            if self.embedding.dims.unwrap_or(0) == 0 {
                bail!("embedding.dims must be > 0 when provider is 'ollama'");
            }
        }
        if self.embedding.dims == Some(0) {
            bail!("embedding.dims must be > 0");
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be > 0");
        }

        match self.generation.provider.as_str() {
            "disabled" | "openai" | "ollama" => {}
            other => bail!(
                "Unknown generation provider: '{}'. Must be disabled, openai, or ollama.",
                other
            ),
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            bail!("generation.temperature must be in [0.0, 2.0]");
        }

        Ok(())
    }
}

fn resolve_table(chapters: &[ChapterEntry], keywords: &[KeywordEntry]) -> Result<ChapterTable> {
    let builtin = ChapterTable::players_handbook();

    let chapter_list = if chapters.is_empty() {
        builtin.chapters().to_vec()
    } else {
        chapters
            .iter()
            .map(|c| Chapter::new(&c.id, &c.name, c.start, c.end))
            .collect()
    };

    let keyword_list = if !keywords.is_empty() {
        keywords
            .iter()
            .map(|k| KeywordGroup {
                chapter_id: k.chapter.clone(),
                keywords: k.terms.clone(),
            })
            .collect()
    } else if chapters.is_empty() {
        builtin.keyword_groups().to_vec()
    } else {
        Vec::new()
    };

    ChapterTable::new(chapter_list, keyword_list).with_context(|| "Invalid chapter configuration")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    Config::from_toml(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg.chunking.chunk_size, 2000);
        assert_eq!(cfg.chunking.chunk_overlap, 200);
        assert_eq!(cfg.retrieval.k, 5);
        assert_eq!(cfg.paths.index, PathBuf::from("data/knowledge_base.sqlite"));
        assert_eq!(cfg.generation.model, "gpt-4o-mini");
        assert!(!cfg.embedding.is_enabled());
        assert_eq!(*cfg.chapter_table(), ChapterTable::players_handbook());
    }

    #[test]
    fn minimal_matches_empty_file() {
        let cfg = Config::minimal();
        assert_eq!(cfg.server.bind, "127.0.0.1:7341");
        assert_eq!(cfg.chapter_table().chapters().len(), 11);
    }

    #[test]
    fn chapter_override_with_keywords() {
        let cfg = Config::from_toml(
            r#"
            [[chapters]]
            id = "monsters"
            name = "Monstros"
            start = 1
            end = 40

            [[chapters]]
            id = "treasure"
            name = "Tesouro"
            start = 41
            end = 60

            [[keywords]]
            chapter = "treasure"
            terms = ["Ouro", "gema"]

            [[keywords]]
            chapter = "monsters"
            terms = ["dragão"]
            "#,
        )
        .unwrap();
        let table = cfg.chapter_table();
        assert_eq!(table.chapters().len(), 2);
        assert_eq!(table.keyword_groups()[0].chapter_id, "treasure");
        assert_eq!(table.keywords_for("treasure"), &["ouro".to_string(), "gema".to_string()]);
    }

    #[test]
    fn chapters_without_keywords_never_route() {
        let cfg = Config::from_toml(
            r#"
            [[chapters]]
            id = "all"
            name = "Tudo"
            start = 1
            end = 10
            "#,
        )
        .unwrap();
        assert!(cfg.chapter_table().keyword_groups().is_empty());
    }

    #[test]
    fn keywords_alone_reuse_builtin_chapters() {
        let cfg = Config::from_toml(
            r#"
            [[keywords]]
            chapter = "combat"
            terms = ["iniciativa"]
            "#,
        )
        .unwrap();
        let table = cfg.chapter_table();
        assert_eq!(table.chapters().len(), 11);
        assert_eq!(table.keyword_groups().len(), 1);
    }

    #[test]
    fn rejects_bad_chapter_table() {
        let err = Config::from_toml(
            r#"
            [[chapters]]
            id = "a"
            name = "A"
            start = 10
            end = 2
            "#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("start page 10 is after end page 2"));

        let err = Config::from_toml(
            r#"
            [[keywords]]
            chapter = "nope"
            terms = ["x"]
            "#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("unknown chapter"));
    }

    #[test]
    fn rejects_bad_chunking_and_k() {
        assert!(Config::from_toml("[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").is_err());
        assert!(Config::from_toml("[chunking]\nchunk_size = 0\n").is_err());
        assert!(Config::from_toml("[retrieval]\nk = 0\n").is_err());
    }

    #[test]
    fn rejects_unknown_providers() {
        let err = Config::from_toml("[embedding]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
        let err = Config::from_toml("[generation]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown generation provider"));
    }

    #[test]
    fn ollama_embedding_requires_model_and_dims() {
        assert!(Config::from_toml("[embedding]\nprovider = \"ollama\"\n").is_err());
        let cfg = Config::from_toml(
            "[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\ndims = 768\n",
        )
        .unwrap();
        assert!(cfg.embedding.is_enabled());
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
