//! Preload pipelines.
//!
//! A pipeline brings the cache into a renderable state. There are two:
//!
//! | Pipeline | Touches items/posters | Used when |
//! |----------|-----------------------|-----------|
//! | [`FastPreload`] | no | markers, fingerprint and poster probe all check out |
//! | [`FullPreload`] | yes | anything else, or the fast path failed |
//!
//! The orchestrator tries an ordered list of [`PreloadStrategy`] values and
//! the first one that returns `Ok` wins.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use crate::context::SyncContext;
use crate::enrich::EnrichStats;
use crate::error::SyncError;
use crate::progress::ProgressTracker;

mod fast;
mod full;

pub use fast::FastPreload;
pub use full::FullPreload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    Fast,
    Full,
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineKind::Fast => f.write_str("fast"),
            PipelineKind::Full => f.write_str("full"),
        }
    }
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreloadReport {
    pub pipeline: PipelineKind,
    pub sections: usize,
    pub sections_skipped: usize,
    pub items_enriched: usize,
    pub stubs_kept: usize,
    pub posters_cached: usize,
    pub posters_failed: usize,
}

impl PreloadReport {
    pub fn new(pipeline: PipelineKind) -> Self {
        Self {
            pipeline,
            sections: 0,
            sections_skipped: 0,
            items_enriched: 0,
            stubs_kept: 0,
            posters_cached: 0,
            posters_failed: 0,
        }
    }

    pub(crate) fn add(&mut self, stats: EnrichStats) {
        self.items_enriched += stats.enriched;
        self.stubs_kept += stats.stubs_kept;
        self.posters_cached += stats.posters_cached;
        self.posters_failed += stats.posters_failed;
    }
}

#[async_trait]
pub trait PreloadStrategy: Send + Sync {
    fn kind(&self) -> PipelineKind;

    async fn run(&self, ctx: &SyncContext, progress: &ProgressTracker<'_>) -> Result<PreloadReport, SyncError>;
}

/// Refresh the activity feed and library summary. Failures are returned
/// to the caller, which decides whether they matter.
pub(crate) async fn refresh_extras(ctx: &SyncContext) -> (Result<(), SyncError>, Result<(), SyncError>) {
    let timeout = ctx.request_timeout;
    let (activity, summary) = tokio::join!(
        crate::error::with_timeout("activity", timeout, ctx.upstream.activity()),
        crate::error::with_timeout("library summary", timeout, ctx.upstream.library_summary()),
    );
    let activity = activity.map(|value| ctx.cache.set_activity(value));
    let summary = summary.map(|value| ctx.cache.set_library_summary(value));
    (activity, summary)
}
