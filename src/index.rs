//! Persisted vector index lifecycle: build, load, and the load → build
//! fallback.
//!
//! # Build
//!
//! 1. Take the exclusive `<index>.lock` file (a second concurrent build
//!    fails fast).
//! 2. Ingest the source document into chapter-tagged chunks.
//! 3. Embed every chunk.
//! 4. Write chunks, vectors and metadata into `<index>.building`, then
//!    check the row count.
//! 5. Rename `<index>.building` over `<index>`.
//!
//! Any failure leaves the previous index untouched.
//!
//! # Load
//!
//! Opens the file read-only and checks the recorded schema version,
//! embedding model, vector dimensions, and chapter fingerprint against
//! the running configuration. Any mismatch is a
//! [`KnowledgeError::Load`], which callers recover from by rebuilding.

use anyhow::{anyhow, bail, Context};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lorekeeper_core::chapters::ChapterTable;
use lorekeeper_core::chunk::TextSplitter;
use lorekeeper_core::embedding::EmbeddingProvider;
use lorekeeper_core::error::KnowledgeError;
use lorekeeper_core::models::Chunk;
use lorekeeper_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::ingest;
use crate::migrate::{self, SCHEMA_VERSION};
use crate::progress::{IngestEvent, ProgressReporter};
use crate::sqlite_store::SqliteStore;

/// Chunks embedded per provider call when building, so progress can be
/// reported between calls.
const EMBED_STEP: usize = 64;

pub const META_SCHEMA_VERSION: &str = "schema_version";
pub const META_EMBEDDING_MODEL: &str = "embedding_model";
pub const META_EMBEDDING_DIMS: &str = "embedding_dims";
pub const META_FINGERPRINT: &str = "chapters_fingerprint";
pub const META_CHUNK_COUNT: &str = "chunk_count";
pub const META_BUILT_AT: &str = "built_at";

/// Everything that determines the contents of an index.
#[derive(Debug, Clone)]
pub struct IndexPlan {
    pub index_path: PathBuf,
    pub document: PathBuf,
    pub table: Arc<ChapterTable>,
    pub splitter: TextSplitter,
}

impl IndexPlan {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            index_path: config.paths.index.clone(),
            document: config.paths.document.clone(),
            table: config.chapter_table(),
            splitter: TextSplitter::new(
                config.chunking.chunk_size,
                config.chunking.chunk_overlap,
            )?,
        })
    }

    /// SHA-256 over the chapter table and the chunking parameters. Any
    /// change to either makes a persisted index stale.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.table.fingerprint().as_bytes());
        hasher.update(
            format!(
                "|{}|{}",
                self.splitter.chunk_size(),
                self.splitter.chunk_overlap()
            )
            .as_bytes(),
        );
        format!("{:x}", hasher.finalize())
    }

    fn building_path(&self) -> PathBuf {
        with_suffix(&self.index_path, ".building")
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Exclusive build guard. The lock file is removed when dropped.
#[derive(Debug)]
pub struct IndexLock {
    path: PathBuf,
}

impl IndexLock {
    pub fn acquire(index_path: &Path) -> anyhow::Result<Self> {
        let path = with_suffix(index_path, ".lock");
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => bail!(
                "another index build is in progress (lock file {} exists)",
                path.display()
            ),
            Err(e) => {
                Err(anyhow!(e).context(format!("cannot create lock file {}", path.display())))
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Rebuild the index from the source document, replacing any previous one.
pub async fn build_index(
    plan: &IndexPlan,
    embedder: &dyn EmbeddingProvider,
    progress: &dyn ProgressReporter,
) -> Result<SqliteStore, KnowledgeError> {
    let _lock = IndexLock::acquire(&plan.index_path).map_err(KnowledgeError::Ingestion)?;

    let chunks = ingest::ingest(&plan.document, &plan.table, &plan.splitter, progress).await?;
    if chunks.is_empty() {
        tracing::warn!(document = %plan.document.display(), "no chunks were produced");
    }

    let vectors = embed_chunks(&chunks, embedder, progress)
        .await
        .map_err(KnowledgeError::Ingestion)?;

    progress.report(IngestEvent::Persisting {
        chunks: chunks.len() as u64,
    });
    let building = plan.building_path();
    if let Err(e) = write_index(&building, plan, embedder, &chunks, &vectors).await {
        let _ = std::fs::remove_file(&building);
        return Err(KnowledgeError::Ingestion(e));
    }

    std::fs::rename(&building, &plan.index_path)
        .with_context(|| {
            format!(
                "moving {} to {}",
                building.display(),
                plan.index_path.display()
            )
        })
        .map_err(KnowledgeError::Ingestion)?;

    tracing::info!(
        chunks = chunks.len(),
        index = %plan.index_path.display(),
        model = embedder.model_name(),
        "index built"
    );

    load_index(plan, embedder).await
}

async fn embed_chunks(
    chunks: &[Chunk],
    embedder: &dyn EmbeddingProvider,
    progress: &dyn ProgressReporter,
) -> anyhow::Result<Vec<Vec<f32>>> {
    let total = chunks.len() as u64;
    let mut vectors = Vec::with_capacity(chunks.len());

    for batch in chunks.chunks(EMBED_STEP) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embedded = embedder
            .embed(&texts)
            .await
            .with_context(|| format!("embedding chunks with {}", embedder.model_name()))?;
        if embedded.len() != texts.len() {
            bail!(
                "embedding provider returned {} vectors for {} chunks",
                embedded.len(),
                texts.len()
            );
        }
        if let Some(bad) = embedded.iter().find(|v| v.len() != embedder.dims()) {
            bail!(
                "embedding has {} dimensions, expected {}",
                bad.len(),
                embedder.dims()
            );
        }
        vectors.extend(embedded);
        progress.report(IngestEvent::Embedding {
            n: vectors.len() as u64,
            total,
        });
    }

    Ok(vectors)
}

async fn write_index(
    path: &Path,
    plan: &IndexPlan,
    embedder: &dyn EmbeddingProvider,
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
) -> anyhow::Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("removing stale {}", path.display()))?;
    }

    let pool = db::connect(path).await?;
    migrate::run_migrations(&pool).await?;
    let store = SqliteStore::new(pool);

    store.replace_all(chunks, vectors).await?;
    store
        .write_meta(&[
            (META_SCHEMA_VERSION, SCHEMA_VERSION.to_string()),
            (META_EMBEDDING_MODEL, embedder.model_name().to_string()),
            (META_EMBEDDING_DIMS, embedder.dims().to_string()),
            (META_FINGERPRINT, plan.fingerprint()),
            (META_CHUNK_COUNT, chunks.len().to_string()),
            (META_BUILT_AT, chrono::Utc::now().to_rfc3339()),
        ])
        .await?;

    let stored = store.chunk_count().await?;
    store.close().await;
    if stored != chunks.len() {
        bail!("wrote {} chunks but {} are stored", chunks.len(), stored);
    }
    Ok(())
}

/// Open an existing index read-only and check it matches the running
/// configuration.
pub async fn load_index(
    plan: &IndexPlan,
    embedder: &dyn EmbeddingProvider,
) -> Result<SqliteStore, KnowledgeError> {
    let path = &plan.index_path;
    let fail = |reason: String| KnowledgeError::load(path.display().to_string(), reason);

    if !path.is_file() {
        return Err(fail("index file not found".to_string()));
    }

    let pool = db::connect_read_only(path)
        .await
        .map_err(|e| fail(format!("cannot open: {:#}", e)))?;
    let store = SqliteStore::new(pool);

    let meta = match store.read_meta().await {
        Ok(meta) => meta,
        Err(e) => {
            store.close().await;
            return Err(fail(format!("not a valid index: {:#}", e)));
        }
    };

    let expected_dims = embedder.dims().to_string();
    let expected_fingerprint = plan.fingerprint();
    let checks = [
        (META_SCHEMA_VERSION, SCHEMA_VERSION, "schema version"),
        (META_EMBEDDING_MODEL, embedder.model_name(), "embedding model"),
        (META_EMBEDDING_DIMS, expected_dims.as_str(), "embedding dimensions"),
        (META_FINGERPRINT, expected_fingerprint.as_str(), "chapter configuration"),
    ];
    for (key, expected, what) in checks {
        if let Err(reason) = check_meta(&meta, key, expected, what) {
            store.close().await;
            return Err(fail(reason));
        }
    }

    let recorded = meta
        .get(META_CHUNK_COUNT)
        .and_then(|v| v.parse::<usize>().ok());
    let actual = match store.chunk_count().await {
        Ok(n) => n,
        Err(e) => {
            store.close().await;
            return Err(fail(format!("not a valid index: {:#}", e)));
        }
    };
    if recorded != Some(actual) {
        store.close().await;
        return Err(fail(format!(
            "corrupt index: metadata records {:?} chunks, found {}",
            recorded, actual
        )));
    }

    tracing::debug!(index = %path.display(), chunks = actual, "index loaded");
    Ok(store)
}

fn check_meta(
    meta: &BTreeMap<String, String>,
    key: &str,
    expected: &str,
    what: &str,
) -> Result<(), String> {
    match meta.get(key) {
        Some(found) if found == expected => Ok(()),
        Some(found) => Err(format!(
            "{} changed (index has '{}', configured '{}'); rebuild required",
            what, found, expected
        )),
        None => Err(format!("not a valid index: missing {}", key)),
    }
}

/// Load the index, or build it if it is absent or stale.
pub async fn open_or_build(
    plan: &IndexPlan,
    embedder: &dyn EmbeddingProvider,
    progress: &dyn ProgressReporter,
) -> Result<SqliteStore, KnowledgeError> {
    match load_index(plan, embedder).await {
        Ok(store) => {
            tracing::info!(index = %plan.index_path.display(), "using existing index");
            Ok(store)
        }
        Err(KnowledgeError::Load { reason, .. }) => {
            tracing::warn!(index = %plan.index_path.display(), %reason, "building index");
            build_index(plan, embedder, progress).await
        }
        Err(other) => Err(other),
    }
}

/// `lore index build`: force a full rebuild.
pub async fn run_build(config: &Config, progress: &dyn ProgressReporter) -> anyhow::Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Building the index requires embeddings. Set [embedding] provider in config.");
    }
    let embedder = crate::embedding::create_provider(&config.embedding)?;
    let plan = IndexPlan::from_config(config)?;

    let store = build_index(&plan, embedder.as_ref(), progress).await?;
    let counts = store.chapter_counts().await?;
    let total = store.chunk_count().await?;
    store.close().await;

    println!(
        "Index built: {} chunks → {}",
        total,
        plan.index_path.display()
    );
    for count in counts {
        println!("  {:<28} {:>6}", count.chapter, count.chunks);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_paths() {
        let p = Path::new("data/kb.sqlite");
        assert_eq!(with_suffix(p, ".lock"), PathBuf::from("data/kb.sqlite.lock"));
        assert_eq!(
            with_suffix(p, ".building"),
            PathBuf::from("data/kb.sqlite.building")
        );
    }

    #[test]
    fn lock_is_exclusive_and_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("kb.sqlite");

        let lock = IndexLock::acquire(&index).unwrap();
        assert!(lock.path().exists());
        let err = IndexLock::acquire(&index).unwrap_err();
        assert!(err.to_string().contains("in progress"));

        let lock_path = lock.path().to_path_buf();
        drop(lock);
        assert!(!lock_path.exists());
        assert!(IndexLock::acquire(&index).is_ok());
    }

    #[test]
    fn fingerprint_tracks_chunking() {
        let plan = IndexPlan {
            index_path: PathBuf::from("kb.sqlite"),
            document: PathBuf::from("book.pdf"),
            table: Arc::new(ChapterTable::players_handbook()),
            splitter: TextSplitter::default(),
        };
        let mut other = plan.clone();
        other.splitter = TextSplitter::new(1000, 100).unwrap();
        assert_ne!(plan.fingerprint(), other.fingerprint());
        assert_eq!(plan.fingerprint(), plan.clone().fingerprint());
    }

    #[test]
    fn meta_check_reports_change() {
        let mut meta = BTreeMap::new();
        meta.insert("embedding_model".to_string(), "a".to_string());
        assert!(check_meta(&meta, "embedding_model", "a", "embedding model").is_ok());
        let err = check_meta(&meta, "embedding_model", "b", "embedding model").unwrap_err();
        assert!(err.contains("embedding model changed"));
        let err = check_meta(&meta, "embedding_dims", "3", "embedding dimensions").unwrap_err();
        assert!(err.contains("missing embedding_dims"));
    }
}
