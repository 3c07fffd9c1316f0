//! The bundle of collaborators every pipeline and the monitor run against.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;

use crate::cache::CacheStore;
use crate::config::{Config, MonitorConfig, PreloadConfig};
use crate::events::{LogNotifier, Notifier, SyncEvents};
use crate::fingerprint::config_fingerprint;
use crate::markers::MarkerStore;
use crate::state::SyncState;
use crate::upstream::{PosterCache, Upstream};

/// Shared handles for one process. Cheap to clone.
#[derive(Clone)]
pub struct SyncContext {
    pub upstream: Arc<dyn Upstream>,
    pub posters: Arc<dyn PosterCache>,
    pub markers: Arc<dyn MarkerStore>,
    pub cache: Arc<CacheStore>,
    pub state: Arc<SyncState>,
    pub events: SyncEvents,
    pub notifier: Arc<dyn Notifier>,
    pub preload: PreloadConfig,
    pub monitor: MonitorConfig,
    pub request_timeout: Duration,
    /// Fingerprint of the connection settings this process runs with.
    pub fingerprint: String,
    /// Where cache snapshots are persisted, if anywhere.
    pub snapshot_pool: Option<SqlitePool>,
}

impl SyncContext {
    pub fn new(
        config: &Config,
        upstream: Arc<dyn Upstream>,
        posters: Arc<dyn PosterCache>,
        markers: Arc<dyn MarkerStore>,
    ) -> Self {
        Self {
            upstream,
            posters,
            markers,
            cache: Arc::new(CacheStore::new()),
            state: Arc::new(SyncState::new(config.monitor.processed_capacity)),
            events: SyncEvents::new(),
            notifier: Arc::new(LogNotifier),
            preload: config.preload.clone(),
            monitor: config.monitor.clone(),
            request_timeout: config.upstream.request_timeout(),
            fingerprint: config_fingerprint(&config.upstream),
            snapshot_pool: None,
        }
    }

    pub fn with_snapshot_pool(mut self, pool: SqlitePool) -> Self {
        self.snapshot_pool = Some(pool);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Persist the cache if a snapshot pool is configured. Failures are
    /// logged; the in-memory cache stays authoritative.
    pub async fn persist_cache(&self) {
        let Some(pool) = &self.snapshot_pool else {
            return;
        };
        match self.cache.save_snapshot(pool).await {
            Ok(n) => tracing::debug!("Cache snapshot saved ({} entries)", n),
            Err(e) => tracing::warn!("Failed to save cache snapshot: {:#}", e),
        }
    }
}
