//! Shared fakes for the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use mediadash_sync::config::Config;
use mediadash_sync::context::SyncContext;
use mediadash_sync::events::Notifier;
use mediadash_sync::markers::MemoryMarkerStore;
use mediadash_sync::models::{MediaItem, MediaKind, PosterImage, Section};
use mediadash_sync::posters::MemoryPosterCache;
use mediadash_sync::upstream::Upstream;

// ─── Fake media server ──────────────────────────────────────────────

/// An in-memory media server. Items are stored enriched; list calls hand
/// out stubs derived from them.
#[derive(Default)]
pub struct FakeUpstream {
    sections: Mutex<Vec<Section>>,
    items: Mutex<HashMap<String, Vec<MediaItem>>>,
    failing_metadata: Mutex<HashSet<String>>,
    failing_recent: Mutex<HashSet<String>>,
    pub fail_sections: AtomicBool,
    pub fail_activity: AtomicBool,
    recent_delay: Mutex<Option<Duration>>,
    pub sections_calls: AtomicUsize,
    pub recent_calls: AtomicUsize,
    pub metadata_calls: AtomicUsize,
    pub poster_calls: AtomicUsize,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_section(&self, id: &str, name: &str) {
        self.sections.lock().unwrap().push(Section {
            id: id.to_string(),
            name: name.to_string(),
            media_kind: MediaKind::Movie,
            item_count: 0,
        });
    }

    /// Add an item to `section_id`, added `minute` minutes after a fixed epoch.
    pub fn add_item(&self, section_id: &str, rating_key: &str, minute: i64) {
        let item = MediaItem {
            rating_key: rating_key.to_string(),
            title: format!("Title {}", rating_key),
            subtitle: Some(format!("Subtitle {}", rating_key)),
            media_type: "movie".to_string(),
            section_id: section_id.to_string(),
            added_at: at_minute(minute),
            metadata_complete: true,
            poster_ref: None,
            thumb: Some(format!("/library/metadata/{}/thumb", rating_key)),
            summary: Some(format!("Summary of {}", rating_key)),
            year: Some(2020),
            duration_ms: Some(90 * 60 * 1000),
        };
        let mut items = self.items.lock().unwrap();
        items.entry(section_id.to_string()).or_default().push(item);
        let mut sections = self.sections.lock().unwrap();
        if let Some(section) = sections.iter_mut().find(|s| s.id == section_id) {
            section.item_count += 1;
        }
    }

    pub fn fail_metadata_for(&self, rating_key: &str) {
        self.failing_metadata
            .lock()
            .unwrap()
            .insert(rating_key.to_string());
    }

    pub fn heal_metadata_for(&self, rating_key: &str) {
        self.failing_metadata.lock().unwrap().remove(rating_key);
    }

    pub fn fail_recent_for(&self, section_id: &str) {
        self.failing_recent
            .lock()
            .unwrap()
            .insert(section_id.to_string());
    }

    pub fn heal_recent_for(&self, section_id: &str) {
        self.failing_recent.lock().unwrap().remove(section_id);
    }

    pub fn delay_recent(&self, delay: Duration) {
        *self.recent_delay.lock().unwrap() = Some(delay);
    }

    pub fn recent_calls(&self) -> usize {
        self.recent_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn sections(&self) -> Result<Vec<Section>> {
        self.sections_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sections.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        Ok(self.sections.lock().unwrap().clone())
    }

    async fn library_summary(&self) -> Result<Value> {
        let sections = self.sections.lock().unwrap().clone();
        Ok(json!({ "libraries": sections.len() }))
    }

    async fn activity(&self) -> Result<Value> {
        if self.fail_activity.load(Ordering::SeqCst) {
            anyhow::bail!("activity endpoint down");
        }
        Ok(json!({ "sessions": [] }))
    }

    async fn recently_added(&self, section_id: &str, count: usize) -> Result<Vec<MediaItem>> {
        self.recent_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.recent_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_recent.lock().unwrap().contains(section_id) {
            anyhow::bail!("section {} unavailable", section_id);
        }
        let mut items = self
            .items
            .lock()
            .unwrap()
            .get(section_id)
            .cloned()
            .unwrap_or_default();
        items.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        items.truncate(count);
        Ok(items.into_iter().map(stub_of).collect())
    }

    async fn metadata(&self, rating_key: &str) -> Result<MediaItem> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_metadata.lock().unwrap().contains(rating_key) {
            anyhow::bail!("metadata for {} unavailable", rating_key);
        }
        let items = self.items.lock().unwrap();
        items
            .values()
            .flatten()
            .find(|i| i.rating_key == rating_key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown rating key {}", rating_key))
    }

    async fn poster(&self, item: &MediaItem) -> Result<PosterImage> {
        self.poster_calls.fetch_add(1, Ordering::SeqCst);
        Ok(PosterImage {
            bytes: item.rating_key.as_bytes().to_vec(),
            content_type: "image/jpeg".to_string(),
        })
    }
}

fn stub_of(item: MediaItem) -> MediaItem {
    MediaItem {
        subtitle: None,
        metadata_complete: false,
        poster_ref: None,
        summary: None,
        year: None,
        duration_ms: None,
        ..item
    }
}

pub fn at_minute(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(minute)
}

// ─── Recording notifier ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

// ─── Harness ────────────────────────────────────────────────────────

pub struct Harness {
    pub upstream: Arc<FakeUpstream>,
    pub posters: Arc<MemoryPosterCache>,
    pub markers: Arc<MemoryMarkerStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub config: Config,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_posters(MemoryPosterCache::new())
    }

    pub fn with_posters(posters: MemoryPosterCache) -> Self {
        Self {
            upstream: Arc::new(FakeUpstream::new()),
            posters: Arc::new(posters),
            markers: Arc::new(MemoryMarkerStore::new()),
            notifier: Arc::new(RecordingNotifier::default()),
            config: test_config(),
        }
    }

    /// A fresh process: new cache and session state over the same
    /// persistent collaborators.
    pub fn context(&self) -> SyncContext {
        SyncContext::new(
            &self.config,
            self.upstream.clone(),
            self.posters.clone(),
            self.markers.clone(),
        )
        .with_notifier(self.notifier.clone())
    }
}

pub fn test_config() -> Config {
    let mut config = Config::minimal("unused.sqlite".into());
    config.preload.batch_pause_ms = 0;
    config.preload.error_grace_ms = 0;
    config
}
