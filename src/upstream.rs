//! Boundary traits for the upstream collaborators.
//!
//! The preload pipelines and the content monitor only ever talk to the media
//! server, the analytics service and the poster store through these traits.
//! [`crate::http::HttpUpstream`] is the network implementation; tests plug in
//! in-memory fakes.
//!
//! ```text
//! ┌──────────────┐  normalize   ┌──────────────┐
//! │ media server │─────────────▶│              │
//! │  analytics   │─────────────▶│   Upstream   │──▶ pipelines / monitor
//! └──────────────┘              └──────────────┘
//!                               ┌──────────────┐
//!                               │ PosterCache  │◀── poster bytes by rating key
//!                               └──────────────┘
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::models::{MediaItem, PosterImage, PosterStats, Section};

/// The media server plus its analytics companion, already normalized.
///
/// Implementations return the fixed [`Section`]/[`MediaItem`] schema; any
/// payload shape differences are resolved before data crosses this trait.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// All library sections.
    async fn sections(&self) -> Result<Vec<Section>>;

    /// Aggregate per-section counts, cached whole for display.
    async fn library_summary(&self) -> Result<Value>;

    /// Ephemeral activity (active downloads, transcodes), cached whole.
    async fn activity(&self) -> Result<Value>;

    /// Up to `count` stub items of a section, newest first.
    async fn recently_added(&self, section_id: &str, count: usize) -> Result<Vec<MediaItem>>;

    /// The full record for one item.
    async fn metadata(&self, rating_key: &str) -> Result<MediaItem>;

    /// Download the poster image for an item.
    async fn poster(&self, item: &MediaItem) -> Result<PosterImage>;
}

/// Durable poster storage keyed by `rating_key`.
#[async_trait]
pub trait PosterCache: Send + Sync {
    /// Store (or replace) the poster for `rating_key`. Returns the reference
    /// recorded on the item as `poster_ref`.
    async fn put(&self, rating_key: &str, image: &PosterImage) -> Result<String>;

    /// Size probe used by the fast-path evaluator.
    async fn stats(&self) -> Result<PosterStats>;
}

/// Reference string recorded on an item once its poster is cached.
pub fn poster_ref(rating_key: &str) -> String {
    format!("poster:{}", rating_key)
}
