//! Internal signals and user-facing notifications.
//!
//! Presentation code subscribes to [`SyncEvents`] to re-render when the
//! cache changes instead of polling the cache itself. [`Notifier`] is the
//! separate, user-visible channel (a toast in the dashboard, a log line in
//! the CLI).

use tokio::sync::broadcast;

use crate::orchestrator::PipelineKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A preload pipeline finished and the cache is ready to render from.
    PreloadCompleted { pipeline: PipelineKind },
    /// The content monitor merged new items into the cache.
    NewMedia {
        total: usize,
        per_section: Vec<(String, usize)>,
    },
}

/// Broadcast bus for [`SyncEvent`]s. Sending never blocks and never fails
/// when nobody is listening.
#[derive(Clone)]
pub struct SyncEvents {
    sender: broadcast::Sender<SyncEvent>,
}

impl SyncEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: SyncEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for SyncEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Shows a message to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Writes notifications to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        tracing::info!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_events() {
        let events = SyncEvents::new();
        let mut rx = events.subscribe();
        events.emit(SyncEvent::NewMedia {
            total: 1,
            per_section: vec![("3".to_string(), 1)],
        });
        match rx.recv().await.unwrap() {
            SyncEvent::NewMedia { total, .. } => assert_eq!(total, 1),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn emit_without_subscribers_is_fine() {
        let events = SyncEvents::new();
        events.emit(SyncEvent::PreloadCompleted {
            pipeline: PipelineKind::Fast,
        });
    }
}
