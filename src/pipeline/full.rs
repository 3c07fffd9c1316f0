use async_trait::async_trait;
use chrono::Utc;

use super::{refresh_extras, PipelineKind, PreloadReport, PreloadStrategy};
use crate::context::SyncContext;
use crate::enrich::{enrich_in_batches, EnrichStats};
use crate::error::{with_timeout, SyncError};
use crate::models::SectionCache;
use crate::progress::{band, ProgressTracker};

/// Rebuild every section cache from upstream, fetch posters and record the
/// markers that let the next boot take the fast path.
pub struct FullPreload;

#[async_trait]
impl PreloadStrategy for FullPreload {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Full
    }

    async fn run(&self, ctx: &SyncContext, progress: &ProgressTracker<'_>) -> Result<PreloadReport, SyncError> {
        let mut report = PreloadReport::new(PipelineKind::Full);
        progress.update(0, "Connecting to media server");

        // Nothing cached before this run is trusted, whatever happens next.
        let dropped = ctx.cache.clear_library();
        if dropped > 0 {
            tracing::debug!("Cleared {} cached library entries", dropped);
        }

        let sections = with_timeout("sections", ctx.request_timeout, ctx.upstream.sections())
            .await
            .map_err(|e| SyncError::SectionsUnavailable(e.to_string()))?;

        if sections.is_empty() {
            tracing::info!("No library sections, nothing to preload");
            ctx.cache.set_sections(Vec::new());
            progress.update(100, "Library is empty");
            return Ok(report);
        }

        ctx.cache.set_sections(sections.clone());
        let total = sections.len();
        progress.update(5, format!("Found {} libraries", total));

        for (i, section) in sections.iter().enumerate() {
            progress.update(
                band(5, 85, i, total),
                format!("Loading {} ({} / {})", section.name, i + 1, total),
            );

            let stubs = match with_timeout(
                "recently added",
                ctx.request_timeout,
                ctx.upstream.recently_added(&section.id, ctx.preload.items_per_section),
            )
            .await
            {
                Ok(stubs) => stubs,
                Err(e) => {
                    tracing::warn!("Skipping section {} ({}): {}", section.id, section.name, e);
                    report.sections_skipped += 1;
                    continue;
                }
            };

            let enriched = enrich_in_batches(ctx, stubs).await;
            let mut stats = EnrichStats::default();
            for outcome in &enriched {
                stats.record(outcome);
            }
            report.add(stats);

            let media = enriched.into_iter().map(|e| e.item).collect();
            ctx.cache.set_section_cache(SectionCache::new(section.clone(), media));
            report.sections += 1;
            tracing::debug!(
                "Section {} cached: {} enriched, {} stubs",
                section.id,
                stats.enriched,
                stats.stubs_kept
            );
        }

        progress.update(85, "Loading activity");
        let (activity, summary) = refresh_extras(ctx).await;
        if let Err(e) = activity {
            tracing::warn!("Activity unavailable: {}", e);
        }
        if let Err(e) = summary {
            tracing::warn!("Library summary unavailable: {}", e);
        }

        ctx.state
            .mark_checked(sections.iter().map(|s| s.id.as_str()), Utc::now());

        progress.update(95, "Saving");
        let poster_count = match ctx.posters.stats().await {
            Ok(stats) => stats.count,
            Err(e) => {
                tracing::warn!("Poster count unavailable: {:#}", e);
                report.posters_cached as i64
            }
        };
        if let Err(e) = ctx.markers.record_full_preload(&ctx.fingerprint, poster_count).await {
            tracing::warn!("Failed to write preload markers: {:#}", e);
        }

        progress.update(100, "Ready");
        Ok(report)
    }
}
