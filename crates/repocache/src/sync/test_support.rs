//! In-memory [`RepoSource`] used by the sync tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::platform::{self, PlatformError, RateLimitInfo, RepoSource};
use crate::snapshot::Record;

pub(crate) fn rec(id: u64, updated_at: &str) -> Record {
    Record::new(id, format!("repo-{id}"), Some(updated_at))
}

/// Serves a fixed listing, already in recency order, page by page.
pub(crate) struct FakeSource {
    listing: Vec<Record>,
    rate: Option<RateLimitInfo>,
    fail_on_page: Option<u32>,
    gate: Option<Arc<Notify>>,
    pages: Mutex<Vec<u32>>,
    quota_checks: AtomicUsize,
}

impl FakeSource {
    pub(crate) fn new(listing: Vec<Record>) -> Self {
        Self {
            listing,
            rate: Some(RateLimitInfo {
                limit: 5000,
                remaining: 5000,
                reset: 2_000_000_000,
            }),
            fail_on_page: None,
            gate: None,
            pages: Mutex::new(Vec::new()),
            quota_checks: AtomicUsize::new(0),
        }
    }

    /// `None` makes the quota query fail.
    pub(crate) fn with_rate(mut self, rate: Option<RateLimitInfo>) -> Self {
        self.rate = rate;
        self
    }

    pub(crate) fn failing_on_page(mut self, page: u32) -> Self {
        self.fail_on_page = Some(page);
        self
    }

    /// Every page fetch waits for one `notify_one` on the returned handle.
    pub(crate) fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub(crate) fn requested_pages(&self) -> Vec<u32> {
        self.pages.lock().unwrap().clone()
    }

    /// Number of cycles that reached the quota check.
    pub(crate) fn quota_checks(&self) -> usize {
        self.quota_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepoSource for FakeSource {
    fn namespace(&self) -> &str {
        "octo"
    }

    async fn get_rate_limit(&self) -> platform::Result<RateLimitInfo> {
        self.quota_checks.fetch_add(1, Ordering::SeqCst);
        self.rate
            .ok_or_else(|| PlatformError::network("rate limit endpoint unreachable"))
    }

    async fn fetch_page(&self, page: u32, per_page: u32) -> platform::Result<Vec<Record>> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.pages.lock().unwrap().push(page);

        if self.fail_on_page == Some(page) {
            return Err(PlatformError::api(502, "Bad Gateway"));
        }

        let per_page = per_page as usize;
        let start = (page as usize - 1) * per_page;
        Ok(self
            .listing
            .iter()
            .skip(start)
            .take(per_page)
            .cloned()
            .collect())
    }
}
