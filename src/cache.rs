//! The process-wide cache store.
//!
//! A synchronous key→value map holding everything the dashboard renders
//! from: the section list, one [`SectionCache`] per section, enriched item
//! metadata and the whole activity and library-summary payloads. There is no
//! expiry; entries are only added or replaced.
//!
//! Locks are held only for the duration of a single call, never across an
//! `.await`, so a read-modify-write done inside one method (see
//! [`CacheStore::merge_into_section`]) is never interleaved with another
//! writer.
//!
//! The store can be snapshotted to and restored from the `cache_entries`
//! table so a restarted process can take the fast path.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use crate::models::{MediaItem, Section, SectionCache};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Sections,
    SectionMedia(String),
    Metadata(String),
    Activity,
    LibrarySummary,
}

impl CacheKey {
    pub fn storage_key(&self) -> String {
        match self {
            CacheKey::Sections => "sections".to_string(),
            CacheKey::SectionMedia(id) => format!("section:{}", id),
            CacheKey::Metadata(key) => format!("metadata:{}", key),
            CacheKey::Activity => "activity".to_string(),
            CacheKey::LibrarySummary => "libraries".to_string(),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "sections" => Some(CacheKey::Sections),
            "activity" => Some(CacheKey::Activity),
            "libraries" => Some(CacheKey::LibrarySummary),
            _ => {
                if let Some(id) = raw.strip_prefix("section:") {
                    Some(CacheKey::SectionMedia(id.to_string()))
                } else {
                    raw.strip_prefix("metadata:")
                        .map(|key| CacheKey::Metadata(key.to_string()))
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CacheEntry {
    Sections(Vec<Section>),
    SectionMedia(SectionCache),
    Metadata(MediaItem),
    Activity(Value),
    LibrarySummary(Value),
}

#[derive(Default)]
pub struct CacheStore {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.read().get(key).cloned()
    }

    pub fn sections(&self) -> Option<Vec<Section>> {
        match self.read().get(&CacheKey::Sections) {
            Some(CacheEntry::Sections(sections)) => Some(sections.clone()),
            _ => None,
        }
    }

    pub fn set_sections(&self, sections: Vec<Section>) {
        self.write()
            .insert(CacheKey::Sections, CacheEntry::Sections(sections));
    }

    pub fn section_cache(&self, section_id: &str) -> Option<SectionCache> {
        match self
            .read()
            .get(&CacheKey::SectionMedia(section_id.to_string()))
        {
            Some(CacheEntry::SectionMedia(cache)) => Some(cache.clone()),
            _ => None,
        }
    }

    pub fn set_section_cache(&self, cache: SectionCache) {
        let mut entries = self.write();
        entries.insert(
            CacheKey::SectionMedia(cache.section_id.clone()),
            CacheEntry::SectionMedia(cache.clone()),
        );
        sync_metadata(&mut entries, &cache);
    }

    /// Splice `items` into the front of a section's cached media in one
    /// locked step, creating the section cache if it does not exist yet.
    /// Returns the resulting cached length.
    pub fn merge_into_section(&self, section: &Section, items: Vec<MediaItem>) -> usize {
        let key = CacheKey::SectionMedia(section.id.clone());
        let mut entries = self.write();
        let mut cache = match entries.remove(&key) {
            Some(CacheEntry::SectionMedia(mut existing)) => {
                existing.section = section.clone();
                existing
            }
            _ => SectionCache::new(section.clone(), Vec::new()),
        };
        cache.splice_front(items);
        let len = cache.media.len();
        entries.insert(key, CacheEntry::SectionMedia(cache.clone()));
        sync_metadata(&mut entries, &cache);
        len
    }

    /// Drop the section list, every section cache and all item metadata.
    /// Activity and the library summary are kept; they are replaced
    /// wholesale on every refresh anyway.
    pub fn clear_library(&self) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|key, _| matches!(key, CacheKey::Activity | CacheKey::LibrarySummary));
        before - entries.len()
    }

    pub fn metadata(&self, rating_key: &str) -> Option<MediaItem> {
        match self.read().get(&CacheKey::Metadata(rating_key.to_string())) {
            Some(CacheEntry::Metadata(item)) => Some(item.clone()),
            _ => None,
        }
    }

    pub fn activity(&self) -> Option<Value> {
        match self.read().get(&CacheKey::Activity) {
            Some(CacheEntry::Activity(v)) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn set_activity(&self, value: Value) {
        self.write()
            .insert(CacheKey::Activity, CacheEntry::Activity(value));
    }

    pub fn library_summary(&self) -> Option<Value> {
        match self.read().get(&CacheKey::LibrarySummary) {
            Some(CacheEntry::LibrarySummary(v)) => Some(v.clone()),
            _ => None,
        }
    }

    pub fn set_library_summary(&self, value: Value) {
        self.write()
            .insert(CacheKey::LibrarySummary, CacheEntry::LibrarySummary(value));
    }

    /// Write every entry to `cache_entries`, replacing the previous snapshot.
    pub async fn save_snapshot(&self, pool: &SqlitePool) -> Result<usize> {
        let rows: Vec<(String, String)> = {
            let entries = self.read();
            entries
                .iter()
                .map(|(key, entry)| Ok((key.storage_key(), serde_json::to_string(entry)?)))
                .collect::<Result<_>>()?
        };

        let now = chrono::Utc::now().timestamp();
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM cache_entries")
            .execute(&mut *tx)
            .await?;
        for (key, value_json) in &rows {
            sqlx::query("INSERT INTO cache_entries (key, value_json, updated_at) VALUES (?, ?, ?)")
                .bind(key)
                .bind(value_json)
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(rows.len())
    }

    /// Load a snapshot written by [`save_snapshot`](Self::save_snapshot).
    /// Unreadable rows are skipped.
    pub async fn load_snapshot(&self, pool: &SqlitePool) -> Result<usize> {
        let rows = sqlx::query("SELECT key, value_json FROM cache_entries")
            .fetch_all(pool)
            .await?;

        let mut loaded = HashMap::new();
        for row in &rows {
            let raw_key: String = row.get("key");
            let value_json: String = row.get("value_json");
            let Some(key) = CacheKey::parse(&raw_key) else {
                tracing::warn!("Ignoring unknown cache key '{}'", raw_key);
                continue;
            };
            match serde_json::from_str::<CacheEntry>(&value_json) {
                Ok(entry) => {
                    loaded.insert(key, entry);
                }
                Err(e) => tracing::warn!("Ignoring unreadable cache entry '{}': {}", raw_key, e),
            }
        }

        let count = loaded.len();
        *self.write() = loaded;
        Ok(count)
    }
}

/// Keep item metadata in step with the section caches: upsert the enriched
/// items of `changed` and drop metadata no section cache references any
/// more (truncated out, or never enriched).
fn sync_metadata(entries: &mut HashMap<CacheKey, CacheEntry>, changed: &SectionCache) {
    for item in changed.media.iter().filter(|m| m.metadata_complete) {
        entries.insert(
            CacheKey::Metadata(item.rating_key.clone()),
            CacheEntry::Metadata(item.clone()),
        );
    }

    let live: HashSet<String> = entries
        .values()
        .filter_map(|entry| match entry {
            CacheEntry::SectionMedia(cache) => Some(cache),
            _ => None,
        })
        .flat_map(|cache| cache.media.iter())
        .filter(|m| m.metadata_complete)
        .map(|m| m.rating_key.clone())
        .collect();
    entries.retain(|key, _| match key {
        CacheKey::Metadata(rating_key) => live.contains(rating_key),
        _ => true,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{MediaKind, MAX_SECTION_ITEMS};
    use crate::{db, migrate};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn section(id: &str) -> Section {
        Section {
            id: id.to_string(),
            name: format!("Section {}", id),
            media_kind: MediaKind::Show,
            item_count: 0,
        }
    }

    fn item(key: &str, ts: i64) -> MediaItem {
        MediaItem {
            rating_key: key.to_string(),
            title: key.to_string(),
            subtitle: None,
            media_type: "episode".to_string(),
            section_id: "1".to_string(),
            added_at: Utc.timestamp_opt(ts, 0).unwrap(),
            metadata_complete: true,
            poster_ref: None,
            thumb: None,
            summary: None,
            year: None,
            duration_ms: None,
        }
    }

    #[test]
    fn storage_keys_parse_back() {
        for key in [
            CacheKey::Sections,
            CacheKey::SectionMedia("3".to_string()),
            CacheKey::Metadata("abc".to_string()),
            CacheKey::Activity,
            CacheKey::LibrarySummary,
        ] {
            assert_eq!(CacheKey::parse(&key.storage_key()), Some(key));
        }
        assert_eq!(CacheKey::parse("bogus"), None);
    }

    #[test]
    fn merge_creates_missing_section() {
        let store = CacheStore::new();
        let len = store.merge_into_section(&section("1"), vec![item("a", 1)]);
        assert_eq!(len, 1);
        assert!(store.section_cache("1").unwrap().contains("a"));
    }

    #[test]
    fn merge_keeps_cap() {
        let store = CacheStore::new();
        let items: Vec<MediaItem> = (0..MAX_SECTION_ITEMS as i64)
            .map(|i| item(&format!("k{}", i), 100 + i))
            .collect();
        store.set_section_cache(SectionCache::new(section("1"), items));
        let len = store.merge_into_section(&section("1"), vec![item("fresh", 1_000)]);
        assert_eq!(len, MAX_SECTION_ITEMS);
        let cache = store.section_cache("1").unwrap();
        assert_eq!(cache.media[0].rating_key, "fresh");
        assert!(!cache.contains("k0"));
    }

    fn metadata_rows(store: &CacheStore) -> usize {
        store
            .read()
            .keys()
            .filter(|k| matches!(k, CacheKey::Metadata(_)))
            .count()
    }

    #[test]
    fn truncated_items_lose_their_metadata() {
        let store = CacheStore::new();
        for i in 0..30 {
            store.merge_into_section(&section("1"), vec![item(&format!("k{}", i), 100 + i)]);
        }
        assert_eq!(store.section_cache("1").unwrap().media.len(), MAX_SECTION_ITEMS);
        assert_eq!(metadata_rows(&store), MAX_SECTION_ITEMS);
        assert!(store.metadata("k0").is_none());
        assert!(store.metadata("k29").is_some());
        assert_eq!(store.len(), 1 + MAX_SECTION_ITEMS);
    }

    #[test]
    fn stubs_have_no_metadata_entry() {
        let store = CacheStore::new();
        let mut stub = item("s", 1);
        stub.metadata_complete = false;
        store.set_section_cache(SectionCache::new(section("1"), vec![stub, item("e", 2)]));
        assert!(store.metadata("s").is_none());
        assert!(store.metadata("e").is_some());
    }

    #[test]
    fn clear_library_keeps_activity() {
        let store = CacheStore::new();
        store.set_sections(vec![section("9")]);
        store.set_section_cache(SectionCache::new(section("9"), vec![item("old", 1)]));
        store.set_activity(serde_json::json!({ "sessions": [] }));
        store.set_library_summary(serde_json::json!({ "libraries": 1 }));

        assert_eq!(store.clear_library(), 3);
        assert!(store.sections().is_none());
        assert!(store.section_cache("9").is_none());
        assert!(store.metadata("old").is_none());
        assert!(store.activity().is_some());
        assert!(store.library_summary().is_some());
    }

    #[tokio::test]
    async fn snapshot_round_trip() {
        let tmp = TempDir::new().unwrap();
        let config = Config::minimal(tmp.path().join("cache.sqlite"));
        let pool = db::connect(&config).await.unwrap();
        migrate::apply(&pool).await.unwrap();

        let store = CacheStore::new();
        store.set_sections(vec![section("1")]);
        store.set_section_cache(SectionCache::new(section("1"), vec![item("a", 5)]));
        store.set_activity(serde_json::json!({ "downloads": [] }));
        assert_eq!(store.save_snapshot(&pool).await.unwrap(), 4);

        let restored = CacheStore::new();
        assert_eq!(restored.load_snapshot(&pool).await.unwrap(), 4);
        assert_eq!(restored.sections().unwrap(), vec![section("1")]);
        assert_eq!(restored.section_cache("1"), store.section_cache("1"));
        assert_eq!(restored.metadata("a"), store.metadata("a"));
        assert!(restored.library_summary().is_none());
    }
}
