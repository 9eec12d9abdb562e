use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::snapshot::Record;

use super::errors::Result;

/// Rate limit status as reported by the remote API.
///
/// Transient: it is reported to callers but never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    /// Maximum requests allowed per period.
    pub limit: u64,
    /// Remaining requests in current period.
    pub remaining: u64,
    /// Unix timestamp (seconds) when the quota resets.
    pub reset: i64,
}

impl RateLimitInfo {
    /// Get the reset time as a DateTime.
    pub fn reset_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.reset, 0).unwrap_or_else(Utc::now)
    }

    /// Fraction of the quota still available, or `None` when the ceiling is zero.
    pub fn headroom(&self) -> Option<f64> {
        if self.limit == 0 {
            None
        } else {
            Some(self.remaining as f64 / self.limit as f64)
        }
    }
}

/// The remote collection a snapshot is built from.
///
/// Implementors do not retry and do not paginate on their own: the sync engine
/// drives pages one at a time so it can stop as soon as it reaches records it
/// already knows about.
#[async_trait]
pub trait RepoSource: Send + Sync {
    /// Human readable name of the collection (used in logs and progress).
    fn namespace(&self) -> &str;

    /// Query the quota endpoint. This call must not consume quota.
    async fn get_rate_limit(&self) -> Result<RateLimitInfo>;

    /// Fetch one 1-indexed page, most recently updated first.
    async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Vec<Record>>;
}
