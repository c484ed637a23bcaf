use anyhow::Result;
use sqlx::SqlitePool;

/// Current on-disk layout. Bumped whenever a table changes shape; an index
/// with a different version is treated as stale and rebuilt.
pub const SCHEMA_VERSION: &str = "1";

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            ordinal INTEGER NOT NULL UNIQUE,
            page INTEGER NOT NULL,
            chapter TEXT NOT NULL,
            chapter_id TEXT NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_vectors (
            chunk_id TEXT PRIMARY KEY,
            embedding BLOB NOT NULL,
            FOREIGN KEY (chunk_id) REFERENCES chunks(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS index_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_chapter ON chunks(chapter)")
        .execute(pool)
        .await?;

    Ok(())
}
