//! Background detection of newly added media.
//!
//! Each pass walks the cached sections, skipping any checked within the
//! cooldown, and asks upstream for its most recent items. Anything not
//! already cached and not already claimed this session is enriched and
//! spliced into the front of the section cache. Items cached as stubs
//! (their metadata fetch failed earlier) are retried the same way but are
//! not reported as new.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::context::SyncContext;
use crate::enrich::enrich_in_batches;
use crate::error::with_timeout;
use crate::events::SyncEvent;
use crate::models::MediaItem;
use crate::scheduler::ScheduledJob;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonitorReport {
    pub sections_checked: usize,
    pub sections_failed: usize,
    /// Sections skipped because they were checked within the cooldown.
    pub sections_cooling: usize,
    pub new_items: usize,
    /// Cached stubs whose metadata was fetched on this pass.
    pub stubs_upgraded: usize,
    pub per_section: Vec<(String, usize)>,
}

pub struct ContentMonitor {
    ctx: SyncContext,
}

impl ContentMonitor {
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    pub async fn run_once(&self) -> MonitorReport {
        self.run_at(Utc::now()).await
    }

    /// One pass with an explicit clock, for the cooldown check and the
    /// last-checked stamps.
    pub async fn run_at(&self, now: DateTime<Utc>) -> MonitorReport {
        let ctx = &self.ctx;
        let mut report = MonitorReport::default();

        let Some(sections) = ctx.cache.sections() else {
            tracing::debug!("No cached sections yet, nothing to monitor");
            return report;
        };

        let cooldown = ctx.monitor.section_cooldown();
        let mut checked = Vec::new();

        for section in sections {
            if !ctx.state.is_due(&section.id, now, cooldown) {
                report.sections_cooling += 1;
                continue;
            }

            let stubs = match with_timeout(
                "recently added",
                ctx.request_timeout,
                ctx.upstream.recently_added(&section.id, ctx.preload.items_per_section),
            )
            .await
            {
                Ok(stubs) => stubs,
                Err(e) => {
                    tracing::warn!("Monitor could not check section {}: {}", section.id, e);
                    report.sections_failed += 1;
                    continue;
                }
            };
            report.sections_checked += 1;
            checked.push(section.id.clone());

            let candidates = self.claim_candidates(&section.id, stubs);
            if candidates.is_empty() {
                continue;
            }

            let (fresh, retries): (Vec<_>, Vec<_>) = candidates.into_iter().partition(|c| c.is_new);
            let count = fresh.len();
            let stubs = fresh.into_iter().chain(retries).map(|c| c.stub).collect();

            let mut items = Vec::new();
            // Output order matches input: the first `count` are new keys.
            for (i, outcome) in enrich_in_batches(ctx, stubs).await.into_iter().enumerate() {
                if !outcome.metadata_ok {
                    // Let a later pass try this one again.
                    ctx.state.release(&outcome.item.rating_key);
                } else if i >= count {
                    report.stubs_upgraded += 1;
                }
                items.push(outcome.item);
            }
            ctx.cache.merge_into_section(&section, items);

            if count > 0 {
                tracing::debug!("Merged {} new item(s) into section {}", count, section.id);
                report.new_items += count;
                report.per_section.push((section.id.clone(), count));
            }
        }

        ctx.state.mark_checked(checked.iter().map(String::as_str), now);

        if report.new_items > 0 {
            ctx.notifier.notify(&new_media_message(&report));
            ctx.events.emit(SyncEvent::NewMedia {
                total: report.new_items,
                per_section: report.per_section.clone(),
            });
        }
        if report.new_items > 0 || report.stubs_upgraded > 0 {
            ctx.persist_cache().await;
        }

        report
    }

    /// Keep the stubs that are either not cached or cached without full
    /// metadata, and that no other pass has claimed. No await happens
    /// between the check and the claim.
    fn claim_candidates(&self, section_id: &str, stubs: Vec<MediaItem>) -> Vec<Candidate> {
        let cached = self.ctx.cache.section_cache(section_id);
        stubs
            .into_iter()
            .filter_map(|stub| {
                let existing = cached
                    .as_ref()
                    .and_then(|c| c.media.iter().find(|m| m.rating_key == stub.rating_key));
                match existing {
                    Some(item) if item.metadata_complete => None,
                    existing => Some(Candidate {
                        is_new: existing.is_none(),
                        stub,
                    }),
                }
            })
            .filter(|c| self.ctx.state.claim(&c.stub.rating_key))
            .collect()
    }
}

struct Candidate {
    stub: MediaItem,
    /// Not in the section cache at all, as opposed to a cached stub.
    is_new: bool,
}

fn new_media_message(report: &MonitorReport) -> String {
    if report.new_items == 1 {
        "1 new item added to your library".to_string()
    } else {
        format!("{} new items added to your library", report.new_items)
    }
}

#[async_trait]
impl ScheduledJob for ContentMonitor {
    fn name(&self) -> &'static str {
        "content-monitor"
    }

    async fn execute(&self) -> Result<()> {
        let report = self.run_once().await;
        tracing::debug!(
            "Monitor pass: {} checked, {} failed, {} new",
            report.sections_checked,
            report.sections_failed,
            report.new_items
        );
        Ok(())
    }
}
