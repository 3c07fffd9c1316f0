use async_trait::async_trait;
use chrono::Utc;

use super::{refresh_extras, PipelineKind, PreloadReport, PreloadStrategy};
use crate::context::SyncContext;
use crate::error::{with_timeout, SyncError};
use crate::progress::ProgressTracker;

/// Refresh only the cheap, fast-changing data and trust the cached items.
///
/// Any failure here is returned so the orchestrator falls through to the
/// full pipeline.
pub struct FastPreload;

#[async_trait]
impl PreloadStrategy for FastPreload {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Fast
    }

    async fn run(&self, ctx: &SyncContext, progress: &ProgressTracker<'_>) -> Result<PreloadReport, SyncError> {
        progress.update(0, "Checking libraries");
        let sections = with_timeout("sections", ctx.request_timeout, ctx.upstream.sections()).await?;
        if sections.is_empty() {
            return Err(SyncError::EmptyLibrary);
        }

        progress.update(40, "Refreshing activity");
        let (activity, summary) = refresh_extras(ctx).await;
        activity?;
        summary?;

        ctx.state
            .mark_checked(sections.iter().map(|s| s.id.as_str()), Utc::now());
        let mut report = PreloadReport::new(PipelineKind::Fast);
        report.sections = sections.len();
        ctx.cache.set_sections(sections);

        progress.update(100, "Ready");
        Ok(report)
    }
}
