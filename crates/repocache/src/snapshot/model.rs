use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::Record;

/// The persisted set of records plus freshness metadata.
///
/// Constructors always derive `total_count` from the record set, so a
/// snapshot built in-process can never disagree with itself. Snapshots read
/// from disk are checked with [`Snapshot::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    repositories: Vec<Record>,
    last_updated: DateTime<Utc>,
    total_count: usize,
}

/// Freshness summary exposed by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub last_updated: DateTime<Utc>,
    pub total_count: usize,
}

impl Snapshot {
    /// Build a snapshot stamped with the current time.
    pub fn new(repositories: Vec<Record>) -> Self {
        Self::with_timestamp(repositories, Utc::now())
    }

    pub fn with_timestamp(repositories: Vec<Record>, last_updated: DateTime<Utc>) -> Self {
        let total_count = repositories.len();
        Self {
            repositories,
            last_updated,
            total_count,
        }
    }

    pub fn repositories(&self) -> &[Record] {
        &self.repositories
    }

    pub fn into_repositories(self) -> Vec<Record> {
        self.repositories
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    pub fn info(&self) -> CacheInfo {
        CacheInfo {
            last_updated: self.last_updated,
            total_count: self.total_count,
        }
    }

    /// Maximum activity timestamp across the records.
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        derive_watermark(&self.repositories)
    }

    /// Check the invariants of a snapshot that came from outside the process.
    pub fn validate(&self) -> Result<(), String> {
        if self.total_count != self.repositories.len() {
            return Err(format!(
                "total_count is {} but {} repositories are present",
                self.total_count,
                self.repositories.len()
            ));
        }

        let mut seen = HashSet::with_capacity(self.repositories.len());
        for record in &self.repositories {
            if !seen.insert(record.id) {
                return Err(format!("duplicate repository id {}", record.id));
            }
        }

        Ok(())
    }
}

/// Maximum activity timestamp across `records`.
///
/// `None` when there are no records or none of them has a parsable timestamp.
pub fn derive_watermark(records: &[Record]) -> Option<DateTime<Utc>> {
    records.iter().filter_map(Record::activity_at).max()
}
