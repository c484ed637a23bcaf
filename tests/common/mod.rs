//! Deterministic providers and a small handbook for integration tests.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

use lorekeeper::config::Config;
use lorekeeper_core::embedding::EmbeddingProvider;
use lorekeeper_core::generation::TextGenerator;

pub const DIMS: usize = 256;

/// Five pages; page 5 belongs to no chapter.
pub const PAGES: [&str; 5] = [
    "Elfos vivem séculos e possuem visão no escuro. Elfos são graciosos.",
    "Anões são robustos e resistentes a veneno.",
    "O mago estuda grimórios e prepara feitiços arcanos.",
    "Bola de fogo é uma magia de terceiro nível que causa dano de fogo.",
    "Texto de página fora de qualquer capítulo.",
];

/// Bag-of-words embedder: each lower-cased word adds 1.0 to a hashed slot.
pub struct HashEmbedder {
    model: String,
    pub calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

fn slot(word: &str) -> usize {
    // FNV-1a
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in word.bytes() {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash % DIMS as u64) as usize
}

pub fn embed_text(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; DIMS];
    for word in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        v[slot(word)] += 1.0;
    }
    v
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }
}

/// Always fails, like a provider that is down.
pub struct BrokenEmbedder;

#[async_trait]
impl EmbeddingProvider for BrokenEmbedder {
    fn model_name(&self) -> &str {
        "hash-v1"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("embedding service unavailable")
    }
}

/// Records prompts and answers with a numbered reply.
#[derive(Default)]
pub struct RecordingGenerator {
    pub prompts: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingGenerator {
    pub fn failing() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording"
    }
    async fn generate(&self, prompt: &str) -> Result<String> {
        if self.fail {
            bail!("model overloaded");
        }
        let mut prompts = self.prompts.lock().unwrap();
        prompts.push(prompt.to_string());
        Ok(format!("resposta {}", prompts.len()))
    }
}

/// A temp directory holding `book.txt` and a config pointing at it.
pub struct Handbook {
    pub dir: TempDir,
    pub config: Config,
}

impl Handbook {
    pub fn document(&self) -> PathBuf {
        self.dir.path().join("book.txt")
    }

    pub fn index(&self) -> PathBuf {
        self.dir.path().join("data").join("kb.sqlite")
    }

    /// Same directory, different chunking: the persisted index becomes stale.
    pub fn with_chunk_size(&self, chunk_size: usize) -> Config {
        Config::from_toml(&config_toml(self.dir.path(), chunk_size)).unwrap()
    }
}

pub fn config_toml(root: &std::path::Path, chunk_size: usize) -> String {
    format!(
        r#"[paths]
document = "{root}/book.txt"
index = "{root}/data/kb.sqlite"

[chunking]
chunk_size = {chunk_size}
chunk_overlap = 20

[retrieval]
k = 3

[[chapters]]
id = "races"
name = "Raças"
start = 1
end = 2

[[chapters]]
id = "classes"
name = "Classes"
start = 3
end = 3

[[chapters]]
id = "spells"
name = "Magias"
start = 4
end = 4

[[chapters]]
id = "appendix"
name = "Apêndice"
start = 9
end = 9

[[keywords]]
chapter = "races"
terms = ["raça", "elfo", "anão"]

[[keywords]]
chapter = "classes"
terms = ["classe", "mago"]

[[keywords]]
chapter = "spells"
terms = ["magia"]
"#,
        root = root.display().to_string().replace('\\', "/"),
        chunk_size = chunk_size
    )
}

pub fn handbook() -> Handbook {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("book.txt"), PAGES.join("\x0c")).unwrap();
    let config = Config::from_toml(&config_toml(dir.path(), 200)).unwrap();
    Handbook { dir, config }
}
