//! Index status overview for `lore index status`.
//!
//! Shows what the persisted index was built with and how many chunks
//! each chapter contributed, so a chapter with a bad page range (zero
//! chunks) is easy to spot.

use anyhow::Result;

use lorekeeper_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::index::{
    IndexPlan, META_BUILT_AT, META_CHUNK_COUNT, META_EMBEDDING_DIMS, META_EMBEDDING_MODEL,
    META_FINGERPRINT, META_SCHEMA_VERSION,
};
use crate::progress::format_number;
use crate::sqlite_store::SqliteStore;

pub async fn run_status(config: &Config) -> Result<()> {
    let plan = IndexPlan::from_config(config)?;
    let path = &plan.index_path;

    println!("Lorekeeper — Index Status");
    println!("=========================");
    println!();
    println!("  Index:       {}", path.display());
    println!("  Document:    {}", plan.document.display());

    if !path.is_file() {
        println!("  Status:      not built (run `lore index build`)");
        println!();
        return Ok(());
    }

    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    println!("  Size:        {}", format_bytes(size));

    let store = SqliteStore::new(db::connect_read_only(path).await?);
    let meta = store.read_meta().await?;
    let get = |key: &str| meta.get(key).map(String::as_str).unwrap_or("?");

    println!("  Schema:      {}", get(META_SCHEMA_VERSION));
    println!(
        "  Embeddings:  {} ({} dims)",
        get(META_EMBEDDING_MODEL),
        get(META_EMBEDDING_DIMS)
    );
    println!("  Built:       {}", get(META_BUILT_AT));
    let fresh = meta.get(META_FINGERPRINT) == Some(&plan.fingerprint());
    println!(
        "  Chapters:    {}",
        if fresh {
            "current"
        } else {
            "stale (chapter map or chunking changed; rebuild required)"
        }
    );

    let total = store.chunk_count().await?;
    println!(
        "  Chunks:      {} (recorded {})",
        format_number(total as u64),
        get(META_CHUNK_COUNT)
    );

    let counts = store.chapter_counts().await?;
    println!();
    println!("  By chapter:");
    println!("  {:<28} {:>8}", "CHAPTER", "CHUNKS");
    println!("  {}", "-".repeat(37));
    let table = config.chapter_table();
    for chapter in table.chapters() {
        let n = counts
            .iter()
            .find(|c| c.chapter == chapter.name)
            .map(|c| c.chunks)
            .unwrap_or(0);
        println!("  {:<28} {:>8}", chapter.name, format_number(n as u64));
    }
    println!();

    store.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
