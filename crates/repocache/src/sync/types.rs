//! Sync options, outcomes and errors.

use serde::Serialize;
use thiserror::Error;

use super::merge::MergeStrategy;
use crate::platform::{PlatformError, RateLimitInfo, rate_limits};
use crate::snapshot::SnapshotError;

/// Default number of records requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Largest page size the remote API honours.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Options for one sync cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOptions {
    /// Records requested per page. Fixed for the whole cycle.
    pub page_size: u32,
    /// Minimum `remaining / limit` fraction required to start a cycle.
    pub rate_limit_buffer: f64,
    /// Allow a full replace to drop records the prior snapshot held.
    pub allow_shrink: bool,
    /// Give up on a cycle that needs more than this many pages. `Some(0)`
    /// is treated as unbounded.
    pub max_pages: Option<u32>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            rate_limit_buffer: rate_limits::DEFAULT_RATE_LIMIT_BUFFER,
            allow_shrink: false,
            max_pages: None,
        }
    }
}

impl SyncOptions {
    /// Page size clamped to what the API accepts.
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    /// Page bound, with zero meaning unbounded.
    pub fn effective_max_pages(&self) -> Option<u32> {
        self.max_pages.filter(|&pages| pages > 0)
    }
}

/// Counters reported by a successful cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Records fetched from the remote this cycle.
    pub fetched_count: usize,
    /// Records in the snapshot that was written.
    pub merged_count: usize,
    /// Pages requested.
    pub pages: u32,
    /// Pagination stopped because it reached already-known records.
    pub stopped_early: bool,
    /// The prior snapshot was unreadable and was treated as absent.
    pub recovered_from_corrupt: bool,
    /// How fetched records were reconciled with the prior snapshot.
    pub strategy: MergeStrategy,
}

/// Result of a cycle that did not fail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Quota headroom was below the buffer. Nothing was fetched or written.
    Skipped {
        reason: String,
        rate: Option<RateLimitInfo>,
    },
    /// A new snapshot was written.
    Succeeded(SyncStats),
}

impl SyncOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    pub fn stats(&self) -> Option<&SyncStats> {
        match self {
            Self::Succeeded(stats) => Some(stats),
            Self::Skipped { .. } => None,
        }
    }
}

/// Coarse failure category, stable for branching and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    Transport,
    Persist,
    PageLimit,
    AlreadyRunning,
}

impl SyncErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Persist => "persist",
            Self::PageLimit => "page_limit",
            Self::AlreadyRunning => "already_running",
        }
    }
}

impl std::fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cycle that aborted. The persisted snapshot is left as it was.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A remote call failed while paginating.
    #[error("failed to fetch page {page}: {source}")]
    Transport {
        page: u32,
        #[source]
        source: PlatformError,
    },

    /// The snapshot could not be read or written.
    #[error("snapshot storage failed: {0}")]
    Persist(#[source] SnapshotError),

    /// The page bound was reached before the listing ended or reached
    /// known records. A partial listing is never persisted: it would leave
    /// a gap below the next cycle's watermark.
    #[error("listing did not end within {max_pages} pages; raise max_pages or leave it unset")]
    PageLimit { max_pages: u32 },

    /// Another cycle holds the single-flight guard.
    #[error("a sync cycle is already running")]
    AlreadyRunning,
}

impl SyncError {
    pub fn kind(&self) -> SyncErrorKind {
        match self {
            Self::Transport { .. } => SyncErrorKind::Transport,
            Self::Persist(_) => SyncErrorKind::Persist,
            Self::PageLimit { .. } => SyncErrorKind::PageLimit,
            Self::AlreadyRunning => SyncErrorKind::AlreadyRunning,
        }
    }
}
