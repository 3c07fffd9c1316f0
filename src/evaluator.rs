//! Decides whether the cached state from a previous run can be trusted.
//!
//! The evaluator only reads: markers, the in-process force signal and the
//! poster cache's stats. The one side effect is that reading the markers
//! consumes the persistent one-shot force-resync flag.

use std::fmt;

use crate::context::SyncContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    /// Everything checked out and posters are present.
    Warm,
    /// Posters could not be counted; the last recorded count was non-zero.
    WarmByLastCount,
    ForceResync,
    NeverPreloaded,
    FingerprintChanged,
    NoPosters,
    ProbeInconclusive,
    MarkersUnreadable,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DecisionReason::Warm => "cache is warm",
            DecisionReason::WarmByLastCount => "poster probe failed, last run cached posters",
            DecisionReason::ForceResync => "full resync requested",
            DecisionReason::NeverPreloaded => "no completed full preload",
            DecisionReason::FingerprintChanged => "connection settings changed",
            DecisionReason::NoPosters => "poster cache is empty",
            DecisionReason::ProbeInconclusive => "poster probe failed and no posters recorded",
            DecisionReason::MarkersUnreadable => "markers could not be read",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub use_fast_path: bool,
    pub reason: DecisionReason,
}

impl Decision {
    fn fast(reason: DecisionReason) -> Self {
        Self {
            use_fast_path: true,
            reason,
        }
    }

    fn full(reason: DecisionReason) -> Self {
        Self {
            use_fast_path: false,
            reason,
        }
    }
}

pub async fn evaluate(ctx: &SyncContext) -> Decision {
    // Both force sources are consumed here, whatever the outcome.
    let forced_in_process = ctx.state.take_force_resync();
    let marker = match ctx.markers.load().await {
        Ok(marker) => marker,
        Err(e) => {
            tracing::warn!("Failed to read markers: {:#}", e);
            return Decision::full(DecisionReason::MarkersUnreadable);
        }
    };

    if forced_in_process || marker.force_full_resync {
        return Decision::full(DecisionReason::ForceResync);
    }
    if !marker.fast_path_ready {
        return Decision::full(DecisionReason::NeverPreloaded);
    }
    if marker.config_fingerprint.as_deref() != Some(ctx.fingerprint.as_str()) {
        return Decision::full(DecisionReason::FingerprintChanged);
    }

    match ctx.posters.stats().await {
        Ok(stats) if stats.count > 0 => Decision::fast(DecisionReason::Warm),
        Ok(_) => Decision::full(DecisionReason::NoPosters),
        Err(e) => {
            tracing::debug!("Poster probe failed: {:#}", e);
            if marker.last_poster_count > 0 {
                Decision::fast(DecisionReason::WarmByLastCount)
            } else {
                Decision::full(DecisionReason::ProbeInconclusive)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;
    use crate::config::Config;
    use crate::markers::{MarkerStore, MemoryMarkerStore};
    use crate::models::{MediaItem, PosterImage, Section};
    use crate::posters::MemoryPosterCache;
    use crate::upstream::{PosterCache, Upstream};

    struct NoUpstream;

    #[async_trait]
    impl Upstream for NoUpstream {
        async fn sections(&self) -> Result<Vec<Section>> {
            anyhow::bail!("offline")
        }
        async fn library_summary(&self) -> Result<Value> {
            anyhow::bail!("offline")
        }
        async fn activity(&self) -> Result<Value> {
            anyhow::bail!("offline")
        }
        async fn recently_added(&self, _: &str, _: usize) -> Result<Vec<MediaItem>> {
            anyhow::bail!("offline")
        }
        async fn metadata(&self, _: &str) -> Result<MediaItem> {
            anyhow::bail!("offline")
        }
        async fn poster(&self, _: &MediaItem) -> Result<PosterImage> {
            anyhow::bail!("offline")
        }
    }

    fn context(posters: MemoryPosterCache) -> (SyncContext, Arc<MemoryMarkerStore>) {
        let markers = Arc::new(MemoryMarkerStore::new());
        let config = Config::minimal("unused.sqlite".into());
        let ctx = SyncContext::new(&config, Arc::new(NoUpstream), Arc::new(posters), markers.clone());
        (ctx, markers)
    }

    async fn with_poster(posters: &MemoryPosterCache) {
        let image = PosterImage {
            bytes: vec![1, 2, 3],
            content_type: "image/jpeg".into(),
        };
        posters.put("1", &image).await.unwrap();
    }

    #[tokio::test]
    async fn fresh_install_goes_full() {
        let (ctx, _) = context(MemoryPosterCache::new());
        let decision = evaluate(&ctx).await;
        assert_eq!(decision, Decision::full(DecisionReason::NeverPreloaded));
    }

    #[tokio::test]
    async fn warm_cache_goes_fast() {
        let posters = MemoryPosterCache::new();
        with_poster(&posters).await;
        let (ctx, markers) = context(posters);
        markers.record_full_preload(&ctx.fingerprint, 1).await.unwrap();
        assert!(evaluate(&ctx).await.use_fast_path);
    }

    #[tokio::test]
    async fn empty_poster_cache_goes_full() {
        let (ctx, markers) = context(MemoryPosterCache::new());
        markers.record_full_preload(&ctx.fingerprint, 12).await.unwrap();
        assert_eq!(evaluate(&ctx).await.reason, DecisionReason::NoPosters);
    }

    #[tokio::test]
    async fn poster_count_error_falls_back_to_last_count() {
        let (ctx, markers) = context(MemoryPosterCache::with_failing_stats());
        markers.record_full_preload(&ctx.fingerprint, 3).await.unwrap();
        assert_eq!(evaluate(&ctx).await, Decision::fast(DecisionReason::WarmByLastCount));

        let (ctx, markers) = context(MemoryPosterCache::with_failing_stats());
        markers.record_full_preload(&ctx.fingerprint, 0).await.unwrap();
        assert_eq!(evaluate(&ctx).await, Decision::full(DecisionReason::ProbeInconclusive));
    }

    #[tokio::test]
    async fn fingerprint_mismatch_goes_full() {
        let posters = MemoryPosterCache::new();
        with_poster(&posters).await;
        let (ctx, markers) = context(posters);
        markers.record_full_preload("something-else", 1).await.unwrap();
        assert_eq!(evaluate(&ctx).await.reason, DecisionReason::FingerprintChanged);
    }

    #[tokio::test]
    async fn force_markers_are_one_shot() {
        let posters = MemoryPosterCache::new();
        with_poster(&posters).await;
        let (ctx, markers) = context(posters);
        markers.record_full_preload(&ctx.fingerprint, 1).await.unwrap();

        markers.request_full_resync().await.unwrap();
        assert_eq!(evaluate(&ctx).await.reason, DecisionReason::ForceResync);
        assert!(evaluate(&ctx).await.use_fast_path);

        ctx.state.signal_force_resync();
        assert_eq!(evaluate(&ctx).await.reason, DecisionReason::ForceResync);
        assert!(evaluate(&ctx).await.use_fast_path);
    }
}
