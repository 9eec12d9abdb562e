//! Remote API seam: quota checks, request pacing and the [`RepoSource`] trait.
//!
//! # Example
//!
//! ```ignore
//! use repocache::platform::{RepoSource, check_quota, evaluate_quota};
//!
//! async fn gate<S: RepoSource>(source: &S) -> bool {
//!     let rate = check_quota(source).await;
//!     evaluate_quota(rate, 0.2).may_proceed()
//! }
//! ```

mod errors;
mod rate_limit;
mod types;

pub use errors::{PlatformError, Result, short_error_message};
pub use rate_limit::{ApiRateLimiter, QuotaDecision, check_quota, evaluate_quota, rate_limits};
pub use types::{RateLimitInfo, RepoSource};
