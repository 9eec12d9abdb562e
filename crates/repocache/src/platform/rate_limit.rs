use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use super::errors::short_error_message;
use super::types::{RateLimitInfo, RepoSource};

/// Type alias for the governor rate limiter.
type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default rate limits.
pub mod rate_limits {
    /// GitHub: 5000 requests/hour = ~1.4/sec, we use 10/sec to allow bursts.
    pub const GITHUB_DEFAULT_RPS: u32 = 10;
    /// Minimum fraction of the quota that must remain before a sync runs.
    pub const DEFAULT_RATE_LIMIT_BUFFER: f64 = 0.2;
}

/// A proactive request pacer using the governor crate.
///
/// Awaited before each remote call of a sync cycle. It only delays, it never
/// rejects a request.
///
/// # Example
///
/// ```ignore
/// use repocache::platform::ApiRateLimiter;
///
/// let limiter = ApiRateLimiter::new(10); // 10 requests per second
///
/// limiter.wait().await;
/// source.fetch_page(1, 100).await?;
/// ```
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl ApiRateLimiter {
    /// Create a new rate limiter with the specified requests per second.
    ///
    /// A value of 0 is treated as 1.
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rps));

        Self {
            inner: Arc::new(rate_limiter),
        }
    }

    /// Wait until a request is allowed by the rate limiter.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter").finish_non_exhaustive()
    }
}

/// Outcome of comparing the remote quota against the configured buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuotaDecision {
    /// Enough headroom: the sync may proceed.
    Proceed(RateLimitInfo),
    /// Quota state is unknown (query failed or no ceiling reported): proceed.
    Unknown,
    /// Headroom is below the buffer: the sync must be skipped.
    Insufficient(RateLimitInfo),
}

impl QuotaDecision {
    pub fn may_proceed(&self) -> bool {
        !matches!(self, Self::Insufficient(_))
    }
}

/// Query the quota endpoint, mapping every failure to `None`.
///
/// A failed quota query is not fatal: the caller proceeds with caution.
pub async fn check_quota<S: RepoSource + ?Sized>(source: &S) -> Option<RateLimitInfo> {
    match source.get_rate_limit().await {
        Ok(info) => Some(info),
        Err(e) => {
            tracing::warn!(
                namespace = source.namespace(),
                error = %short_error_message(&e),
                "Rate limit status unavailable, proceeding without quota check"
            );
            None
        }
    }
}

/// Apply the buffer rule: proceed only if `remaining / limit >= buffer`.
pub fn evaluate_quota(info: Option<RateLimitInfo>, buffer_fraction: f64) -> QuotaDecision {
    let Some(info) = info else {
        return QuotaDecision::Unknown;
    };

    match info.headroom() {
        None => QuotaDecision::Unknown,
        Some(headroom) if headroom < buffer_fraction => QuotaDecision::Insufficient(info),
        Some(_) => QuotaDecision::Proceed(info),
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn info(limit: u64, remaining: u64) -> RateLimitInfo {
        RateLimitInfo {
            limit,
            remaining,
            reset: 1_700_000_000,
        }
    }

    #[test]
    fn proceeds_when_headroom_meets_buffer() {
        let decision = evaluate_quota(Some(info(5000, 1000)), 0.2);
        assert_eq!(decision, QuotaDecision::Proceed(info(5000, 1000)));
        assert!(decision.may_proceed());
    }

    #[test]
    fn skips_when_headroom_below_buffer() {
        let decision = evaluate_quota(Some(info(5000, 999)), 0.2);
        assert_eq!(decision, QuotaDecision::Insufficient(info(5000, 999)));
        assert!(!decision.may_proceed());
    }

    #[test]
    fn unknown_quota_proceeds() {
        assert_eq!(evaluate_quota(None, 0.2), QuotaDecision::Unknown);
        assert!(evaluate_quota(None, 0.2).may_proceed());
    }

    #[test]
    fn zero_ceiling_is_treated_as_unknown() {
        assert_eq!(evaluate_quota(Some(info(0, 0)), 0.2), QuotaDecision::Unknown);
    }

    #[test]
    fn zero_buffer_always_proceeds() {
        assert!(evaluate_quota(Some(info(60, 0)), 0.0).may_proceed());
    }

    #[tokio::test]
    async fn limiter_allows_burst_up_to_rate() {
        let limiter = ApiRateLimiter::new(50);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.wait().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn limiter_with_zero_rps_still_allows_requests() {
        let limiter = ApiRateLimiter::new(0);
        limiter.wait().await;
    }
}
