//! GitHub API client for a user's repository collection.
//!
//! # Module Structure
//!
//! - [`types`] - Raw API payloads
//! - [`client`] - The client and its [`RepoSource`](crate::platform::RepoSource) impl
//! - [`convert`] - Normalization into snapshot records
//!
//! # Example
//!
//! ```ignore
//! use repocache::github::GitHubClient;
//! use repocache::http::DEFAULT_TIMEOUT;
//!
//! let client = GitHubClient::new("octocat", token.as_deref(), DEFAULT_TIMEOUT)?;
//! let rate = client.get_rate_limit().await?;
//! let first_page = client.list_user_repos_page(1, 100).await?;
//! ```

mod client;
mod convert;
mod types;

pub use client::{GITHUB_API_URL, GitHubClient, MAX_PER_PAGE, parse_rate_limit_headers};
pub use convert::to_record;
pub use types::{GitHubRateLimitResponse, GitHubRateLimits, GitHubRepo, RateLimitResource};
