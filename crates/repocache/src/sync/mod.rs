//! Incremental snapshot sync.
//!
//! # Module Structure
//!
//! - [`types`] - Core types: `SyncOptions`, `SyncOutcome`, `SyncError`
//! - [`progress`] - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - [`merge`] - Delta reconciliation: `merge()`, `reconcile()`
//! - [`engine`] - The cycle itself: `sync_snapshot()` and the single-flight `SyncEngine`
//! - [`scheduler`] - Periodic timer: `SyncScheduler`
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use repocache::sync::{SyncEngine, SyncOptions, SyncScheduler};
//!
//! let engine = Arc::new(SyncEngine::new(Arc::new(client), store, SyncOptions::default()));
//! let outcome = engine.run_once().await?;
//!
//! let scheduler = SyncScheduler::new();
//! scheduler.schedule(Arc::clone(&engine), Duration::from_secs(3600));
//! ```

pub mod engine;
pub mod merge;
mod progress;
pub mod scheduler;
mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use types::{
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, SyncError, SyncErrorKind, SyncOptions, SyncOutcome,
    SyncStats,
};

pub use progress::{ProgressCallback, SyncProgress, emit};

pub use engine::{SyncEngine, sync_snapshot};
pub use merge::{MergeStrategy, merge, reconcile};
pub use scheduler::SyncScheduler;
