//! Persistent marker store.
//!
//! A tiny durable key-value store that survives restarts. It answers one
//! question for the evaluator: did a full preload complete for the current
//! connection settings, and is anything asking us to redo it?
//!
//! | Key | Value |
//! |-----|-------|
//! | `configFingerprint` | hex SHA-256 of the connection settings |
//! | `fastPathReady` | `"true"` / `"false"` |
//! | `lastPostersCount` | poster count as a decimal string |
//! | `forceFullResync` | RFC 3339 timestamp; one-shot, consumed on read |

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::models::Marker;

pub const KEY_FINGERPRINT: &str = "configFingerprint";
pub const KEY_FAST_PATH_READY: &str = "fastPathReady";
pub const KEY_LAST_POSTERS: &str = "lastPostersCount";
pub const KEY_FORCE_RESYNC: &str = "forceFullResync";

/// Raw string storage. Typed access goes through the provided methods.
#[async_trait]
pub trait MarkerStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;

    /// Read every marker, consuming the one-shot force-resync flag.
    async fn load(&self) -> Result<Marker> {
        let force_full_resync = self.get(KEY_FORCE_RESYNC).await?.is_some();
        if force_full_resync {
            self.remove(KEY_FORCE_RESYNC).await?;
        }
        Ok(Marker {
            fast_path_ready: self.get(KEY_FAST_PATH_READY).await?.as_deref() == Some("true"),
            last_poster_count: self
                .get(KEY_LAST_POSTERS)
                .await?
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            config_fingerprint: self.get(KEY_FINGERPRINT).await?,
            force_full_resync,
        })
    }

    /// Record a completed full preload.
    async fn record_full_preload(&self, fingerprint: &str, poster_count: i64) -> Result<()> {
        self.set(KEY_LAST_POSTERS, &poster_count.to_string()).await?;
        self.set(KEY_FINGERPRINT, fingerprint).await?;
        self.set(KEY_FAST_PATH_READY, "true").await
    }

    /// Ask the next orchestrator run to rebuild everything.
    async fn request_full_resync(&self) -> Result<()> {
        self.set(KEY_FORCE_RESYNC, &chrono::Utc::now().to_rfc3339())
            .await
    }
}

pub struct SqliteMarkerStore {
    pool: SqlitePool,
}

impl SqliteMarkerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MarkerStore for SqliteMarkerStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM markers WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO markers (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM markers WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryMarkerStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MarkerStore for MemoryMarkerStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().map_err(|_| anyhow!("marker lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| anyhow!("marker lock poisoned"))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| anyhow!("marker lock poisoned"))?;
        values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::{db, migrate};
    use tempfile::TempDir;

    #[tokio::test]
    async fn empty_store_is_not_ready() {
        let store = MemoryMarkerStore::new();
        let marker = store.load().await.unwrap();
        assert_eq!(marker, Marker::default());
    }

    #[tokio::test]
    async fn force_resync_is_one_shot() {
        let store = MemoryMarkerStore::new();
        store.request_full_resync().await.unwrap();
        assert!(store.load().await.unwrap().force_full_resync);
        assert!(!store.load().await.unwrap().force_full_resync);
    }

    #[tokio::test]
    async fn sqlite_round_trip_survives_reconnect() {
        let tmp = TempDir::new().unwrap();
        let config = Config::minimal(tmp.path().join("markers.sqlite"));

        {
            let pool = db::connect(&config).await.unwrap();
            migrate::apply(&pool).await.unwrap();
            let store = SqliteMarkerStore::new(pool.clone());
            store.record_full_preload("abc123", 17).await.unwrap();
            pool.close().await;
        }

        let pool = db::connect(&config).await.unwrap();
        let store = SqliteMarkerStore::new(pool);
        let marker = store.load().await.unwrap();
        assert!(marker.fast_path_ready);
        assert_eq!(marker.last_poster_count, 17);
        assert_eq!(marker.config_fingerprint.as_deref(), Some("abc123"));
        assert_eq!(
            store.get(KEY_FAST_PATH_READY).await.unwrap().as_deref(),
            Some("true")
        );
    }
}
