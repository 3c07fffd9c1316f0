//! Core data models used throughout the sync core.
//!
//! These types are the normalized shapes that flow from the upstream
//! collaborators into the cache. Upstream payloads are mapped into them by
//! [`crate::normalize`]; nothing past that boundary inspects raw JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of media items kept per section, newest first.
pub const MAX_SECTION_ITEMS: usize = 10;

/// The kind of media a library section holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Show,
    Artist,
    Unknown,
}

impl MediaKind {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "movie" | "movies" => MediaKind::Movie,
            "show" | "shows" | "tv" => MediaKind::Show,
            "artist" | "music" => MediaKind::Artist,
            _ => MediaKind::Unknown,
        }
    }
}

/// A logical media library on the media server (e.g. one "Movies" collection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub name: String,
    pub media_kind: MediaKind,
    pub item_count: i64,
}

/// A single media item.
///
/// Starts life as a *stub* (from a list endpoint, `metadata_complete =
/// false`) and is upgraded in place to an *enriched* item once full metadata
/// has been fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub rating_key: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub media_type: String,
    pub section_id: String,
    pub added_at: DateTime<Utc>,
    pub metadata_complete: bool,
    /// Reference into the poster cache, set once a poster has been stored.
    pub poster_ref: Option<String>,
    /// Upstream image path used to fetch the poster.
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
}

impl MediaItem {
    /// Merge an enriched record into this stub.
    ///
    /// `rating_key`, `section_id` and `added_at` always stay the stub's, so
    /// list ordering is never disturbed by enrichment.
    pub fn enrich_with(&mut self, full: MediaItem) {
        self.title = full.title;
        if full.subtitle.is_some() {
            self.subtitle = full.subtitle;
        }
        if !full.media_type.is_empty() {
            self.media_type = full.media_type;
        }
        if full.thumb.is_some() {
            self.thumb = full.thumb;
        }
        self.summary = full.summary;
        self.year = full.year;
        self.duration_ms = full.duration_ms;
        self.metadata_complete = true;
    }
}

/// The cached, capped view of one section's most recent media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionCache {
    pub section_id: String,
    pub section: Section,
    pub media: Vec<MediaItem>,
}

impl SectionCache {
    /// Build a section cache, enforcing order and the length cap.
    pub fn new(section: Section, media: Vec<MediaItem>) -> Self {
        let mut cache = Self {
            section_id: section.id.clone(),
            section,
            media,
        };
        cache.normalize();
        cache
    }

    /// Put `items` in front of the existing media, then restore the
    /// newest-first order and the cap. Existing entries with the same
    /// `rating_key` are replaced by the incoming ones.
    pub fn splice_front(&mut self, items: Vec<MediaItem>) {
        let mut merged = items;
        merged.append(&mut self.media);
        self.media = merged;
        self.normalize();
    }

    /// Sort newest-first, drop duplicate keys (first occurrence wins) and
    /// truncate to [`MAX_SECTION_ITEMS`], dropping the oldest.
    fn normalize(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.media.retain(|item| seen.insert(item.rating_key.clone()));
        self.media.sort_by(|a, b| {
            b.added_at
                .cmp(&a.added_at)
                .then_with(|| a.rating_key.cmp(&b.rating_key))
        });
        self.media.truncate(MAX_SECTION_ITEMS);
    }

    pub fn contains(&self, rating_key: &str) -> bool {
        self.media.iter().any(|m| m.rating_key == rating_key)
    }
}

/// A poster image as returned by the upstream image endpoint.
#[derive(Debug, Clone)]
pub struct PosterImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Result of the poster-cache size probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosterStats {
    pub count: i64,
}

/// Durable markers that decide whether the fast path may be taken.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Marker {
    pub fast_path_ready: bool,
    pub last_poster_count: i64,
    pub config_fingerprint: Option<String>,
    pub force_full_resync: bool,
}
