//! Periodic sync timer with explicit lifecycle.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::engine::SyncEngine;
use super::types::{SyncError, SyncOutcome};

/// Smallest period the timer accepts.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

struct ScheduledTask {
    interval: Duration,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Runs [`SyncEngine::run_once`] on a fixed interval.
///
/// The first cycle fires one interval after arming. Calling
/// [`schedule`](Self::schedule) again cancels the current timer before
/// installing the new one, so at most one timer exists per scheduler.
/// Cancellation never interrupts a cycle already in flight.
#[derive(Default)]
pub struct SyncScheduler {
    task: Mutex<Option<ScheduledTask>>,
}

impl std::fmt::Debug for SyncScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScheduler")
            .field("interval", &self.interval())
            .field("running", &self.is_running())
            .finish()
    }
}

impl SyncScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the timer. Must be called from within a tokio runtime.
    pub fn schedule(&self, engine: Arc<SyncEngine>, interval: Duration) {
        let interval = interval.max(MIN_INTERVAL);
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(previous) = task.take() {
            debug!(interval = ?previous.interval, "Replacing existing sync timer");
            previous.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_timer(engine, interval, cancel.clone()));
        info!(interval_secs = interval.as_secs_f64(), "Sync scheduler armed");

        *task = Some(ScheduledTask {
            interval,
            cancel,
            handle,
        });
    }

    /// Disarm the timer. Returns whether one was armed.
    pub fn stop(&self) -> bool {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        match task.take() {
            Some(previous) => {
                previous.cancel.cancel();
                info!("Sync scheduler stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.cancel.is_cancelled() && !t.handle.is_finished())
    }

    /// Period of the armed timer, if any.
    pub fn interval(&self) -> Option<Duration> {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|t| t.interval)
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        let task = self.task.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = task.take() {
            task.cancel.cancel();
        }
    }
}

async fn run_timer(engine: Arc<SyncEngine>, period: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Sync timer cancelled");
                break;
            }
            _ = ticker.tick() => {
                run_tick(&engine).await;
            }
        }
    }
}

async fn run_tick(engine: &SyncEngine) {
    match engine.run_once().await {
        Ok(SyncOutcome::Succeeded(stats)) => {
            debug!(
                fetched = stats.fetched_count,
                total = stats.merged_count,
                "Scheduled sync finished"
            );
        }
        Ok(SyncOutcome::Skipped { reason, .. }) => {
            info!(reason = %reason, "Scheduled sync skipped");
        }
        Err(SyncError::AlreadyRunning) => {
            info!("Sync already in progress, skipping scheduled tick");
        }
        Err(e) => {
            warn!(error = %e, kind = %e.kind(), "Scheduled sync failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::snapshot::SnapshotStore;
    use crate::sync::SyncOptions;
    use crate::sync::test_support::{FakeSource, rec};

    fn engine(dir: &TempDir) -> (Arc<SyncEngine>, Arc<FakeSource>) {
        let source = Arc::new(FakeSource::new(vec![rec(1, "2024-01-01")]));
        let engine = SyncEngine::new(
            Arc::clone(&source) as Arc<dyn crate::platform::RepoSource>,
            SnapshotStore::new(dir.path().join("repos.json")),
            SyncOptions::default(),
        );
        (Arc::new(engine), source)
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_fires_after_one_interval() {
        let dir = TempDir::new().unwrap();
        let (engine, source) = engine(&dir);
        let scheduler = SyncScheduler::new();

        scheduler.schedule(engine, Duration::from_secs(60));
        assert!(scheduler.is_running());
        assert_eq!(scheduler.interval(), Some(Duration::from_secs(60)));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.quota_checks(), 0);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(source.quota_checks(), 1);
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_the_previous_timer() {
        let dir = TempDir::new().unwrap();
        let (engine, source) = engine(&dir);
        let scheduler = SyncScheduler::new();

        scheduler.schedule(Arc::clone(&engine), Duration::from_secs(10));
        scheduler.schedule(engine, Duration::from_secs(3600));
        assert!(scheduler.is_running());
        assert_eq!(scheduler.interval(), Some(Duration::from_secs(3600)));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(source.quota_checks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_disarms_the_timer() {
        let dir = TempDir::new().unwrap();
        let (engine, source) = engine(&dir);
        let scheduler = SyncScheduler::new();

        assert!(!scheduler.stop());
        scheduler.schedule(engine, Duration::from_secs(10));
        assert!(scheduler.stop());
        assert!(!scheduler.is_running());
        assert!(scheduler.interval().is_none());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.quota_checks(), 0);
    }
}
