//! Drives a process from boot to "ready".
//!
//! The orchestrator asks the evaluator which pipeline to use, then tries an
//! ordered list of strategies until one succeeds. If they all fail it waits
//! a short grace period and still reports ready, with a message explaining
//! why the dashboard may be incomplete. State changes are published on a
//! `watch` channel.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{watch, Mutex};

use crate::context::SyncContext;
use crate::evaluator::{evaluate, Decision};
use crate::events::SyncEvent;
use crate::pipeline::{FastPreload, FullPreload, PreloadReport, PreloadStrategy};
use crate::progress::{PreloadProgressReporter, ProgressTracker};

pub use crate::pipeline::PipelineKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreloadState {
    Idle,
    Deciding,
    Running(PipelineKind),
    /// Ready to render. `message` is set when every strategy failed.
    Ready { message: Option<String> },
    /// Reserved. Pipeline errors end in a degraded `Ready` instead.
    Failed(String),
}

impl PreloadState {
    pub fn is_ready(&self) -> bool {
        matches!(self, PreloadState::Ready { .. })
    }
}

#[derive(Debug, Clone)]
pub struct PreloadOutcome {
    pub decision: Decision,
    /// The report of the strategy that succeeded, if any did.
    pub report: Option<PreloadReport>,
    pub message: Option<String>,
}

pub struct PreloadOrchestrator {
    ctx: SyncContext,
    state: watch::Sender<PreloadState>,
    started: AtomicBool,
    running: Mutex<()>,
}

impl PreloadOrchestrator {
    pub fn new(ctx: SyncContext) -> Self {
        let (state, _) = watch::channel(PreloadState::Idle);
        Self {
            ctx,
            state,
            started: AtomicBool::new(false),
            running: Mutex::new(()),
        }
    }

    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    pub fn state(&self) -> PreloadState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PreloadState> {
        self.state.subscribe()
    }

    /// Run the preload once for this process. Later calls return `None`
    /// without doing anything.
    pub async fn run(&self, reporter: &dyn PreloadProgressReporter) -> Option<PreloadOutcome> {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!("Preload already ran in this process");
            return None;
        }
        Some(self.execute(reporter).await)
    }

    /// Force a full rebuild now, regardless of whether a run already
    /// happened.
    pub async fn request_resync(&self, reporter: &dyn PreloadProgressReporter) -> PreloadOutcome {
        self.ctx.state.signal_force_resync();
        self.started.store(true, Ordering::SeqCst);
        self.execute(reporter).await
    }

    async fn execute(&self, reporter: &dyn PreloadProgressReporter) -> PreloadOutcome {
        let _guard = self.running.lock().await;
        self.state.send_replace(PreloadState::Deciding);

        let decision = evaluate(&self.ctx).await;
        tracing::info!(
            "Preload decision: {} path ({})",
            if decision.use_fast_path { "fast" } else { "full" },
            decision.reason
        );

        let tracker = ProgressTracker::new(reporter);
        let mut last_error = None;
        for strategy in strategies_for(decision) {
            let kind = strategy.kind();
            self.state.send_replace(PreloadState::Running(kind));
            match strategy.run(&self.ctx, &tracker).await {
                Ok(report) => {
                    tracing::info!("Preload finished via {} pipeline", kind);
                    self.ctx.persist_cache().await;
                    self.state.send_replace(PreloadState::Ready { message: None });
                    self.ctx.events.emit(SyncEvent::PreloadCompleted { pipeline: kind });
                    return PreloadOutcome {
                        decision,
                        report: Some(report),
                        message: None,
                    };
                }
                Err(e) => {
                    tracing::warn!("{} preload failed: {}", kind, e);
                    last_error = Some(e);
                }
            }
        }

        tokio::time::sleep(self.ctx.preload.error_grace()).await;
        let message = match last_error {
            Some(e) => format!("Could not load your library: {}", e),
            None => "Could not load your library".to_string(),
        };
        tracing::error!("{}", message);
        self.state.send_replace(PreloadState::Ready {
            message: Some(message.clone()),
        });
        PreloadOutcome {
            decision,
            report: None,
            message: Some(message),
        }
    }
}

fn strategies_for(decision: Decision) -> Vec<Box<dyn PreloadStrategy>> {
    if decision.use_fast_path {
        vec![Box::new(FastPreload), Box::new(FullPreload)]
    } else {
        vec![Box::new(FullPreload)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::DecisionReason;

    #[test]
    fn fast_decision_falls_back_to_full() {
        let fast = Decision {
            use_fast_path: true,
            reason: DecisionReason::Warm,
        };
        let kinds: Vec<_> = strategies_for(fast).iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec![PipelineKind::Fast, PipelineKind::Full]);

        let full = Decision {
            use_fast_path: false,
            reason: DecisionReason::NoPosters,
        };
        let kinds: Vec<_> = strategies_for(full).iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec![PipelineKind::Full]);
    }
}
