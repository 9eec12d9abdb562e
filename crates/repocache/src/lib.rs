//! Repocache - incremental GitHub repository snapshot sync.
//!
//! Keeps a local JSON snapshot of one user's repositories current while
//! staying inside the API's rate limits. Each cycle checks quota headroom,
//! pages through the repository listing in recency order until it reaches
//! records the snapshot already knows, merges the delta into the prior
//! snapshot and replaces the file atomically.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use repocache::github::GitHubClient;
//! use repocache::http::DEFAULT_TIMEOUT;
//! use repocache::snapshot::SnapshotStore;
//! use repocache::sync::{SyncEngine, SyncOptions};
//!
//! let client = GitHubClient::new("octocat", None, DEFAULT_TIMEOUT)?;
//! let store = SnapshotStore::new("repos.json");
//! let engine = SyncEngine::new(Arc::new(client), store, SyncOptions::default());
//!
//! match engine.run_once().await? {
//!     SyncOutcome::Skipped { reason, .. } => println!("skipped: {reason}"),
//!     SyncOutcome::Succeeded(stats) => println!("{} repositories", stats.merged_count),
//! }
//! ```

pub mod github;
pub mod http;
pub mod platform;
pub mod snapshot;
pub mod sync;

pub use platform::{ApiRateLimiter, PlatformError, RateLimitInfo, RepoSource, rate_limits};
pub use snapshot::{CacheInfo, Record, Snapshot, SnapshotError, SnapshotStore};
pub use sync::{SyncEngine, SyncError, SyncOptions, SyncOutcome, SyncScheduler};
