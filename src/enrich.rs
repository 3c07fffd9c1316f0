//! Stub → enriched item upgrade, shared by the full pipeline and the monitor.
//!
//! Each item gets its metadata fetched and, only if that worked, a
//! best-effort poster download. A failed metadata call leaves the stub
//! untouched; a failed poster leaves the item enriched without a poster.

use crate::context::SyncContext;
use crate::error::with_timeout;
use crate::models::MediaItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosterOutcome {
    Cached,
    Failed,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct Enriched {
    pub item: MediaItem,
    pub metadata_ok: bool,
    pub poster: PosterOutcome,
}

/// Counters accumulated over a set of enrichments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichStats {
    pub enriched: usize,
    pub stubs_kept: usize,
    pub posters_cached: usize,
    pub posters_failed: usize,
}

impl EnrichStats {
    pub fn record(&mut self, outcome: &Enriched) {
        if outcome.metadata_ok {
            self.enriched += 1;
        } else {
            self.stubs_kept += 1;
        }
        match outcome.poster {
            PosterOutcome::Cached => self.posters_cached += 1,
            PosterOutcome::Failed => self.posters_failed += 1,
            PosterOutcome::Skipped => {}
        }
    }

    pub fn add(&mut self, other: EnrichStats) {
        self.enriched += other.enriched;
        self.stubs_kept += other.stubs_kept;
        self.posters_cached += other.posters_cached;
        self.posters_failed += other.posters_failed;
    }
}

pub async fn enrich_item(ctx: &SyncContext, stub: MediaItem) -> Enriched {
    let timeout = ctx.request_timeout;
    let fetched = with_timeout("metadata", timeout, ctx.upstream.metadata(&stub.rating_key)).await;
    let full = match fetched {
        Ok(full) => full,
        Err(e) => {
            tracing::warn!("Keeping stub for {}: {}", stub.rating_key, e);
            return Enriched {
                item: stub,
                metadata_ok: false,
                poster: PosterOutcome::Skipped,
            };
        }
    };

    let mut item = stub;
    item.enrich_with(full);

    let poster = match with_timeout("poster", timeout, ctx.upstream.poster(&item)).await {
        Ok(image) => match ctx.posters.put(&item.rating_key, &image).await {
            Ok(reference) => {
                item.poster_ref = Some(reference);
                PosterOutcome::Cached
            }
            Err(e) => {
                tracing::warn!("Failed to store poster for {}: {:#}", item.rating_key, e);
                PosterOutcome::Failed
            }
        },
        Err(e) => {
            tracing::debug!("No poster for {}: {}", item.rating_key, e);
            PosterOutcome::Failed
        }
    };

    Enriched {
        item,
        metadata_ok: true,
        poster,
    }
}

/// Enrich `stubs` in batches of `preload.batch_size`, running each batch
/// concurrently and pausing between batches. Output order matches input.
pub async fn enrich_in_batches(ctx: &SyncContext, stubs: Vec<MediaItem>) -> Vec<Enriched> {
    let batch_size = ctx.preload.batch_size.max(1);
    let pause = ctx.preload.batch_pause();
    let total_batches = stubs.len().div_ceil(batch_size);

    let mut out = Vec::with_capacity(stubs.len());
    let mut remaining = stubs.into_iter().peekable();
    let mut batch_no = 0;
    while remaining.peek().is_some() {
        let batch: Vec<MediaItem> = remaining.by_ref().take(batch_size).collect();
        let results = futures::future::join_all(batch.into_iter().map(|stub| enrich_item(ctx, stub))).await;
        out.extend(results);
        batch_no += 1;
        if batch_no < total_batches && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
    out
}
