//! Sync engine: one quota-check, fetch, merge, persist cycle.
//!
//! # Rate Limiting
//!
//! Two separate mechanisms apply. The quota gate compares the remote quota
//! against [`SyncOptions::rate_limit_buffer`] once per cycle and skips the
//! cycle when headroom is too low. The optional [`ApiRateLimiter`] is awaited
//! before every remote call to pace requests.
//!
//! # Example
//!
//! ```ignore
//! use repocache::sync::{SyncOptions, sync_snapshot};
//! use repocache::platform::{ApiRateLimiter, rate_limits};
//!
//! let limiter = ApiRateLimiter::new(rate_limits::GITHUB_DEFAULT_RPS);
//! let outcome = sync_snapshot(&client, &store, &SyncOptions::default(), Some(&limiter), None).await?;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

use super::merge::{MergeStrategy, reconcile};
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{SyncError, SyncOptions, SyncOutcome, SyncStats};
use crate::platform::{
    ApiRateLimiter, QuotaDecision, RepoSource, check_quota, evaluate_quota, short_error_message,
};
use crate::snapshot::{Record, Snapshot, SnapshotStore};

/// Records gathered by one pagination run.
#[derive(Debug, Default)]
struct Fetched {
    records: Vec<Record>,
    pages: u32,
    stopped_early: bool,
}

async fn pace(rate_limiter: Option<&ApiRateLimiter>) {
    if let Some(limiter) = rate_limiter {
        limiter.wait().await;
    }
}

/// Fetch pages in recency order until reaching known records or running out.
///
/// Stops after a page whose last record is strictly older than `watermark`,
/// or after a short page. Pages are fetched one at a time. Needing more pages
/// than the configured bound fails with [`SyncError::PageLimit`].
async fn fetch_until_watermark<S: RepoSource + ?Sized>(
    source: &S,
    options: &SyncOptions,
    watermark: Option<chrono::DateTime<chrono::Utc>>,
    rate_limiter: Option<&ApiRateLimiter>,
    on_progress: Option<&ProgressCallback>,
) -> Result<Fetched, SyncError> {
    let per_page = options.effective_page_size();
    let mut fetched = Fetched::default();
    let mut page = 1u32;

    loop {
        if let Some(max_pages) = options.effective_max_pages()
            && fetched.pages >= max_pages
        {
            tracing::warn!(max_pages, "Page limit reached before end of listing");
            emit(on_progress, SyncProgress::PageLimitReached { max_pages });
            return Err(SyncError::PageLimit { max_pages });
        }

        pace(rate_limiter).await;
        let records = source
            .fetch_page(page, per_page)
            .await
            .map_err(|source| SyncError::Transport { page, source })?;

        fetched.pages = page;
        let count = records.len();
        let last_activity = records.last().and_then(Record::activity_at);
        fetched.records.extend(records);

        tracing::debug!(page, count, total = fetched.records.len(), "Fetched page");
        emit(
            on_progress,
            SyncProgress::FetchedPage {
                page,
                count,
                total_so_far: fetched.records.len(),
            },
        );

        if let (Some(watermark), Some(last)) = (watermark, last_activity)
            && last < watermark
        {
            tracing::debug!(page, %watermark, "Reached records older than the watermark");
            emit(on_progress, SyncProgress::ReachedWatermark { page, watermark });
            fetched.stopped_early = true;
            break;
        }

        if count < per_page as usize {
            break;
        }

        page += 1;
    }

    emit(
        on_progress,
        SyncProgress::FetchComplete {
            total: fetched.records.len(),
            pages: fetched.pages,
        },
    );

    Ok(fetched)
}

/// Run one sync cycle against `store`.
///
/// Returns [`SyncOutcome::Skipped`] when quota headroom is below the buffer,
/// without fetching anything. On any error the persisted snapshot is left
/// untouched.
///
/// # Arguments
///
/// * `source` - The remote collection
/// * `store` - Snapshot file to read the prior state from and write to
/// * `options` - Sync configuration options
/// * `rate_limiter` - Optional request pacer
/// * `on_progress` - Optional progress callback
#[tracing::instrument(skip_all, fields(namespace = %source.namespace()))]
pub async fn sync_snapshot<S: RepoSource + ?Sized>(
    source: &S,
    store: &SnapshotStore,
    options: &SyncOptions,
    rate_limiter: Option<&ApiRateLimiter>,
    on_progress: Option<&ProgressCallback>,
) -> Result<SyncOutcome, SyncError> {
    emit(
        on_progress,
        SyncProgress::CheckingQuota {
            namespace: source.namespace().to_string(),
        },
    );

    pace(rate_limiter).await;
    let rate = check_quota(source).await;
    match evaluate_quota(rate, options.rate_limit_buffer) {
        QuotaDecision::Insufficient(info) => {
            let reason = format!(
                "rate limit headroom {}/{} is below the {:.0}% buffer",
                info.remaining,
                info.limit,
                options.rate_limit_buffer * 100.0
            );
            tracing::info!(
                remaining = info.remaining,
                limit = info.limit,
                reset_at = %info.reset_at(),
                "Skipping sync, rate limit headroom too low"
            );
            emit(
                on_progress,
                SyncProgress::Skipped {
                    reason: reason.clone(),
                    rate: Some(info),
                },
            );
            return Ok(SyncOutcome::Skipped {
                reason,
                rate: Some(info),
            });
        }
        QuotaDecision::Proceed(info) => {
            tracing::debug!(remaining = info.remaining, limit = info.limit, "Quota sufficient");
        }
        QuotaDecision::Unknown => {
            tracing::debug!("Quota unknown, proceeding");
        }
    }

    let (prior, recovered_from_corrupt) = match store.read().await {
        Ok(prior) => (prior, false),
        Err(e) if e.is_corrupt() => {
            let error = short_error_message(&e);
            tracing::warn!(error = %error, "Prior snapshot is corrupt, rebuilding from remote");
            emit(on_progress, SyncProgress::SnapshotCorrupt { error });
            (None, true)
        }
        Err(e) => return Err(SyncError::Persist(e)),
    };

    let watermark = prior.as_ref().and_then(SnapshotStore::derive_watermark);
    let known = prior.as_ref().map_or(0, Snapshot::total_count);
    emit(
        on_progress,
        SyncProgress::FetchingRepos {
            namespace: source.namespace().to_string(),
            known,
            watermark,
        },
    );

    let fetched =
        fetch_until_watermark(source, options, watermark, rate_limiter, on_progress).await?;
    let fetched_count = fetched.records.len();

    let (records, strategy) = reconcile(
        prior.map(Snapshot::into_repositories),
        fetched.records,
        watermark,
        options.allow_shrink,
    );
    if strategy == MergeStrategy::ShrinkGuarded {
        emit(
            on_progress,
            SyncProgress::Warning {
                message: format!(
                    "full listing returned {fetched_count} records but the snapshot held \
                     {known}; kept the prior records"
                ),
            },
        );
    }
    emit(
        on_progress,
        SyncProgress::Merged {
            fetched: fetched_count,
            merged: records.len(),
            strategy,
        },
    );

    let snapshot = Snapshot::new(records);
    store.write(&snapshot).await.map_err(SyncError::Persist)?;
    emit(
        on_progress,
        SyncProgress::Persisted {
            total_count: snapshot.total_count(),
        },
    );

    tracing::info!(
        fetched = fetched_count,
        total = snapshot.total_count(),
        pages = fetched.pages,
        stopped_early = fetched.stopped_early,
        "Sync complete"
    );

    Ok(SyncOutcome::Succeeded(SyncStats {
        fetched_count,
        merged_count: snapshot.total_count(),
        pages: fetched.pages,
        stopped_early: fetched.stopped_early,
        recovered_from_corrupt,
        strategy,
    }))
}

/// A sync pipeline bound to one source and one snapshot file.
///
/// At most one cycle runs at a time; a trigger that arrives while a cycle is
/// in flight fails with [`SyncError::AlreadyRunning`] instead of queueing.
pub struct SyncEngine {
    source: Arc<dyn RepoSource>,
    store: SnapshotStore,
    options: SyncOptions,
    rate_limiter: Option<ApiRateLimiter>,
    on_progress: Option<ProgressCallback>,
    in_flight: Mutex<()>,
    syncing: AtomicBool,
}

/// Clears the syncing flag when a cycle ends, including when its future is
/// dropped mid-flight.
struct SyncingFlag<'a>(&'a AtomicBool);

impl<'a> SyncingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for SyncingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("namespace", &self.source.namespace())
            .field("store", &self.store)
            .field("options", &self.options)
            .field("syncing", &self.is_syncing())
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    pub fn new(source: Arc<dyn RepoSource>, store: SnapshotStore, options: SyncOptions) -> Self {
        Self {
            source,
            store,
            options,
            rate_limiter: None,
            on_progress: None,
            in_flight: Mutex::new(()),
            syncing: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: ApiRateLimiter) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub fn source(&self) -> &dyn RepoSource {
        self.source.as_ref()
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Whether a cycle is in flight. Observing this never contends with
    /// [`run_once`](Self::run_once).
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    /// Run one cycle, or fail fast if another is in flight.
    pub async fn run_once(&self) -> Result<SyncOutcome, SyncError> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| SyncError::AlreadyRunning)?;
        let _flag = SyncingFlag::raise(&self.syncing);

        sync_snapshot(
            self.source.as_ref(),
            &self.store,
            &self.options,
            self.rate_limiter.as_ref(),
            self.on_progress.as_ref(),
        )
        .await
    }
}
