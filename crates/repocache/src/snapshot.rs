//! The persisted snapshot: normalized records, the snapshot document and the
//! file store that replaces it atomically.

mod model;
mod record;
mod store;

pub use model::{CacheInfo, Snapshot, derive_watermark};
pub use record::{Record, RecordId, Visibility, parse_timestamp};
pub use store::{SnapshotError, SnapshotStore};
