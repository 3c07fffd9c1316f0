//! A cancellable periodic task with a built-in running guard.
//!
//! [`ScheduledTask::spawn`] waits an initial delay, then executes the job on
//! a fixed interval. A tick that lands while the previous execution is still
//! running is skipped, as is a manual [`TaskHandle::trigger`]. Missed ticks
//! are not replayed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::task::JoinHandle;

#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self) -> Result<()>;
}

pub struct ScheduledTask;

impl ScheduledTask {
    pub fn spawn(job: Arc<dyn ScheduledJob>, initial_delay: Duration, interval: Duration) -> TaskHandle {
        let running = Arc::new(AtomicBool::new(false));
        let loop_job = Arc::clone(&job);
        let loop_running = Arc::clone(&running);

        let task = tokio::spawn(async move {
            if !initial_delay.is_zero() {
                tokio::time::sleep(initial_delay).await;
            }
            let mut timer = tokio::time::interval(interval.max(Duration::from_millis(1)));
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                timer.tick().await;
                let job = Arc::clone(&loop_job);
                let running = Arc::clone(&loop_running);
                // Detached so a slow run doesn't hold up the timer; the guard
                // makes overlapping ticks no-ops.
                tokio::spawn(async move {
                    run_guarded(job.as_ref(), &running).await;
                });
            }
        });

        tracing::info!(
            "Scheduled '{}' every {}s after {}s",
            job.name(),
            interval.as_secs(),
            initial_delay.as_secs()
        );

        TaskHandle { job, running, task }
    }
}

pub struct TaskHandle {
    job: Arc<dyn ScheduledJob>,
    running: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl TaskHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Execute the job now. Returns `false` if a run was already in flight.
    pub async fn trigger(&self) -> bool {
        run_guarded(self.job.as_ref(), &self.running).await
    }

    /// Stop scheduling further runs. A run already in flight finishes.
    pub fn cancel(&self) {
        self.task.abort();
        tracing::debug!("Cancelled '{}'", self.job.name());
    }

    pub fn is_cancelled(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_guarded(job: &dyn ScheduledJob, running: &AtomicBool) -> bool {
    if running
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        tracing::debug!("Job '{}' is already running, skipping this trigger", job.name());
        return false;
    }

    let result = job.execute().await;
    running.store(false, Ordering::SeqCst);

    match result {
        Ok(()) => tracing::debug!("Job '{}' completed successfully", job.name()),
        Err(e) => tracing::error!("Job '{}' failed: {:#}", job.name(), e),
    }
    true
}
