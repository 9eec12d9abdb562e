//! Progress reporting for sync cycles.
//!
//! Every [`SyncProgress`] event becomes a structured `tracing` event, so the
//! same output works for the long-running server and for one-off commands.

use repocache::sync::{ProgressCallback, SyncProgress};

/// Logging reporter using tracing for structured output.
#[derive(Debug, Default)]
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::CheckingQuota { namespace } => {
                tracing::debug!(namespace = %namespace, "Checking rate limit");
            }

            SyncProgress::Skipped { reason, rate } => {
                tracing::info!(
                    reason = %reason,
                    remaining = rate.map(|r| r.remaining),
                    limit = rate.map(|r| r.limit),
                    "Sync skipped"
                );
            }

            SyncProgress::SnapshotCorrupt { error } => {
                tracing::warn!(error = %error, "Snapshot unreadable, rebuilding");
            }

            SyncProgress::FetchingRepos {
                namespace,
                known,
                watermark,
            } => {
                tracing::info!(
                    namespace = %namespace,
                    known,
                    watermark = ?watermark,
                    "Fetching repositories"
                );
            }

            SyncProgress::FetchedPage {
                page,
                count,
                total_so_far,
            } => {
                tracing::debug!(page, count, total_so_far, "Fetched page");
            }

            SyncProgress::ReachedWatermark { page, watermark } => {
                tracing::debug!(page, watermark = %watermark, "Reached known records");
            }

            SyncProgress::PageLimitReached { max_pages } => {
                tracing::warn!(max_pages, "Stopped at page limit");
            }

            SyncProgress::FetchComplete { total, pages } => {
                tracing::info!(total, pages, "Fetch complete");
            }

            SyncProgress::Merged {
                fetched,
                merged,
                strategy,
            } => {
                tracing::info!(fetched, merged, strategy = ?strategy, "Merged into snapshot");
            }

            SyncProgress::Persisted { total_count } => {
                tracing::info!(total_count, "Snapshot saved");
            }

            SyncProgress::Warning { message } => {
                tracing::warn!(message = %message, "Warning");
            }

            _ => {}
        }
    }

    /// Convert into a [`ProgressCallback`] for the library.
    pub fn into_callback(self) -> ProgressCallback {
        Box::new(move |event| self.handle(event))
    }
}
