//! Wiring: configuration → providers + index → [`KnowledgeBase`].

use anyhow::{bail, Result};
use std::sync::Arc;

use lorekeeper_core::query::KnowledgeBase;
use lorekeeper_core::store::Store;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::generation::create_generator;
use crate::index::{self, IndexPlan};
use crate::progress::ProgressReporter;
use crate::tokens;

/// Open the knowledge base described by `config`, building the index
/// first if it is absent or stale.
///
/// Both providers are checked before any embedding work starts.
pub async fn open(config: &Config, progress: &dyn ProgressReporter) -> Result<KnowledgeBase> {
    require_embeddings(config)?;
    require_generation(config)?;
    open_for_search(config, progress).await
}

/// Like [`open`], but without a generation provider. Only retrieval is
/// usable on the result; `query` fails with a generation error.
pub async fn open_for_search(
    config: &Config,
    progress: &dyn ProgressReporter,
) -> Result<KnowledgeBase> {
    require_embeddings(config)?;
    let embedder = create_provider(&config.embedding)?;
    let generator = create_generator(&config.generation)?;
    let counter = tokens::counter_for(&config.generation.model);

    let plan = IndexPlan::from_config(config)?;
    let store: Arc<dyn Store> =
        Arc::new(index::open_or_build(&plan, embedder.as_ref(), progress).await?);

    Ok(
        KnowledgeBase::new(plan.table.clone(), store, embedder, generator, counter)
            .with_k(config.retrieval.k),
    )
}

/// Open an existing index without ever building one. Used by read-only
/// surfaces (`lore search`) where a silent rebuild would be surprising.
pub async fn open_existing(config: &Config) -> Result<KnowledgeBase> {
    require_embeddings(config)?;
    let embedder = create_provider(&config.embedding)?;
    let generator = create_generator(&config.generation)?;
    let counter = tokens::counter_for(&config.generation.model);

    let plan = IndexPlan::from_config(config)?;
    let store: Arc<dyn Store> = Arc::new(index::load_index(&plan, embedder.as_ref()).await?);

    Ok(
        KnowledgeBase::new(plan.table.clone(), store, embedder, generator, counter)
            .with_k(config.retrieval.k),
    )
}

fn require_embeddings(config: &Config) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("The knowledge base requires embeddings. Set [embedding] provider in config.");
    }
    Ok(())
}

fn require_generation(config: &Config) -> Result<()> {
    if !config.generation.is_enabled() {
        bail!(
            "Answering questions requires a generation provider. Set [generation] provider in config."
        );
    }
    Ok(())
}
