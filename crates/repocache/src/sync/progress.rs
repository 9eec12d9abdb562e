//! Progress reporting types for sync cycles.
//!
//! The engine emits one event per state transition so front ends can log or
//! render a cycle without inspecting its internals.

use chrono::{DateTime, Utc};

use super::merge::MergeStrategy;
use crate::platform::RateLimitInfo;

/// Progress events emitted during a sync cycle.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// Querying the quota endpoint.
    CheckingQuota {
        /// The collection being synced.
        namespace: String,
    },

    /// Quota headroom was below the buffer; the cycle ends here.
    Skipped {
        reason: String,
        rate: Option<RateLimitInfo>,
    },

    /// The prior snapshot was unreadable and is treated as absent.
    SnapshotCorrupt {
        /// Error message.
        error: String,
    },

    /// Starting to paginate.
    FetchingRepos {
        /// The collection being synced.
        namespace: String,
        /// Records already known (from the prior snapshot).
        known: usize,
        /// Pagination stops once a page ends before this instant.
        watermark: Option<DateTime<Utc>>,
    },

    /// Fetched a page of repositories.
    FetchedPage {
        /// Page number (1-indexed).
        page: u32,
        /// Number of records on this page.
        count: usize,
        /// Running total of records fetched so far.
        total_so_far: usize,
    },

    /// A page ended with a record older than the watermark.
    ReachedWatermark {
        /// Page on which pagination stopped.
        page: u32,
        watermark: DateTime<Utc>,
    },

    /// Pagination stopped at the configured page bound.
    PageLimitReached {
        max_pages: u32,
    },

    /// Finished paginating.
    FetchComplete {
        /// Total number of records fetched.
        total: usize,
        /// Number of pages requested.
        pages: u32,
    },

    /// Fetched records were reconciled with the prior snapshot.
    Merged {
        fetched: usize,
        merged: usize,
        strategy: MergeStrategy,
    },

    /// The new snapshot was written.
    Persisted {
        /// Records in the written snapshot.
        total_count: usize,
    },

    /// Warning message (non-fatal).
    Warning {
        /// Warning message.
        message: String,
    },
}

/// Callback for progress updates during sync operations.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
///
/// # Example
///
/// ```ignore
/// use repocache::sync::{emit, SyncProgress, ProgressCallback};
///
/// fn report(on_progress: Option<&ProgressCallback>) {
///     emit(on_progress, SyncProgress::FetchComplete { total: 42, pages: 1 });
/// }
/// ```
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
