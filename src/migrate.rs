use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table the sync core needs. Safe to run repeatedly.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Durable markers (fingerprint, fast-path flag, poster count, resync)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS markers (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Poster blobs keyed by rating key
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS posters (
            rating_key TEXT PRIMARY KEY,
            content_type TEXT NOT NULL,
            bytes BLOB NOT NULL,
            fetched_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Snapshot of the in-memory cache store
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cache_entries (
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posters_fetched_at ON posters(fetched_at DESC)")
        .execute(pool)
        .await?;

    Ok(())
}
