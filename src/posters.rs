//! Poster storage.
//!
//! [`SqlitePosterCache`] keeps poster blobs in the `posters` table so they
//! survive restarts; its `stats()` is the probe the fast-path evaluator
//! trusts. [`MemoryPosterCache`] is the test double.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::models::{PosterImage, PosterStats};
use crate::upstream::{poster_ref, PosterCache};

pub struct SqlitePosterCache {
    pool: SqlitePool,
}

impl SqlitePosterCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load a stored poster, if any.
    pub async fn get(&self, rating_key: &str) -> Result<Option<PosterImage>> {
        let row: Option<(String, Vec<u8>)> =
            sqlx::query_as("SELECT content_type, bytes FROM posters WHERE rating_key = ?")
                .bind(rating_key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(content_type, bytes)| PosterImage {
            bytes,
            content_type,
        }))
    }
}

#[async_trait]
impl PosterCache for SqlitePosterCache {
    async fn put(&self, rating_key: &str, image: &PosterImage) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO posters (rating_key, content_type, bytes, fetched_at) VALUES (?, ?, ?, ?)
            ON CONFLICT(rating_key) DO UPDATE SET
                content_type = excluded.content_type,
                bytes = excluded.bytes,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(rating_key)
        .bind(&image.content_type)
        .bind(&image.bytes)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(poster_ref(rating_key))
    }

    async fn stats(&self) -> Result<PosterStats> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posters")
            .fetch_one(&self.pool)
            .await?;
        Ok(PosterStats { count })
    }
}

/// In-memory poster cache for tests and embedders without a database.
///
/// `fail_stats` makes the size probe error, to exercise the evaluator's
/// fallback path.
#[derive(Default)]
pub struct MemoryPosterCache {
    posters: RwLock<HashMap<String, PosterImage>>,
    fail_stats: bool,
}

impl MemoryPosterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failing_stats() -> Self {
        Self {
            posters: RwLock::new(HashMap::new()),
            fail_stats: true,
        }
    }

    pub fn contains(&self, rating_key: &str) -> bool {
        self.posters
            .read()
            .map(|p| p.contains_key(rating_key))
            .unwrap_or(false)
    }
}

#[async_trait]
impl PosterCache for MemoryPosterCache {
    async fn put(&self, rating_key: &str, image: &PosterImage) -> Result<String> {
        let mut posters = self
            .posters
            .write()
            .map_err(|_| anyhow!("poster cache lock poisoned"))?;
        posters.insert(rating_key.to_string(), image.clone());
        Ok(poster_ref(rating_key))
    }

    async fn stats(&self) -> Result<PosterStats> {
        if self.fail_stats {
            anyhow::bail!("poster stats unavailable");
        }
        let posters = self
            .posters
            .read()
            .map_err(|_| anyhow!("poster cache lock poisoned"))?;
        Ok(PosterStats {
            count: posters.len() as i64,
        })
    }
}
