//! GitHub API client: quota endpoint and paginated user repository listing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use serde::de::DeserializeOwned;

use super::convert::to_record;
use super::types::{GitHubErrorBody, GitHubRateLimitResponse, GitHubRepo};
use crate::http::{HttpHeaders, HttpRequest, HttpTransport, ReqwestTransport, header_get};
use crate::platform::{self, PlatformError, RateLimitInfo, RepoSource};
use crate::snapshot::Record;

/// Public GitHub REST API root.
pub const GITHUB_API_URL: &str = "https://api.github.com";

/// Largest page size GitHub accepts.
pub const MAX_PER_PAGE: u32 = 100;

const USER_AGENT: &str = "repocache";
const API_VERSION: &str = "2022-11-28";

/// Extract rate limit info from GitHub response headers.
///
/// Returns `None` unless all three `x-ratelimit-*` headers are present and
/// numeric.
pub fn parse_rate_limit_headers(headers: &HttpHeaders) -> Option<RateLimitInfo> {
    let limit = header_get(headers, "x-ratelimit-limit")?.parse::<u64>().ok()?;
    let remaining = header_get(headers, "x-ratelimit-remaining")?
        .parse::<u64>()
        .ok()?;
    let reset = header_get(headers, "x-ratelimit-reset")?.parse::<i64>().ok()?;
    Some(RateLimitInfo {
        limit,
        remaining,
        reset,
    })
}

/// GitHub API client for one user's repositories.
///
/// All I/O goes through an [`HttpTransport`]; the client itself neither
/// retries nor paginates.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    api_url: String,
    username: String,
    token: Option<Arc<String>>,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_url", &self.api_url)
            .field("username", &self.username)
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Create a client backed by reqwest with the given request timeout.
    pub fn new(
        username: impl Into<String>,
        token: Option<&str>,
        timeout: Duration,
    ) -> platform::Result<Self> {
        let transport = ReqwestTransport::with_timeout(timeout)?;
        Ok(Self::with_transport(Arc::new(transport), username, token))
    }

    /// Create a client over an arbitrary transport.
    pub fn with_transport(
        transport: Arc<dyn HttpTransport>,
        username: impl Into<String>,
        token: Option<&str>,
    ) -> Self {
        Self {
            transport,
            api_url: GITHUB_API_URL.to_string(),
            username: username.into(),
            token: token
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(|t| Arc::new(t.to_string())),
        }
    }

    /// Point the client at another API root (GitHub Enterprise, test servers).
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn rate_limit_url(&self) -> String {
        format!("{}/rate_limit", self.api_url)
    }

    /// URL of one page of the user's repositories, most recently updated first.
    pub fn repos_url(&self, page: u32, per_page: u32) -> String {
        format!(
            "{}/users/{}/repos?per_page={}&page={}&sort=updated&direction=desc",
            self.api_url,
            self.username,
            per_page.clamp(1, MAX_PER_PAGE),
            page.max(1)
        )
    }

    fn request(&self, url: String) -> HttpRequest {
        let request = HttpRequest::get(url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION);

        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token.as_str())),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> platform::Result<T> {
        let response = self.transport.send(self.request(url.clone())).await?;
        let rate = parse_rate_limit_headers(&response.headers);

        if let Some(ref rate) = rate {
            tracing::trace!(
                url = %url,
                status = response.status,
                remaining = rate.remaining,
                limit = rate.limit,
                "GitHub response"
            );
        }

        if response.is_success() {
            return serde_json::from_slice(&response.body)
                .map_err(|e| PlatformError::decode(format!("{url}: {e}")));
        }

        let message = serde_json::from_slice::<GitHubErrorBody>(&response.body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or_else(|| String::from_utf8_lossy(&response.body).trim().to_string());

        match response.status {
            403 | 429 if rate.as_ref().is_some_and(|r| r.remaining == 0) => {
                let reset_at = rate
                    .and_then(|r| DateTime::from_timestamp(r.reset, 0))
                    .unwrap_or_else(chrono::Utc::now);
                Err(PlatformError::RateLimited { reset_at })
            }
            404 => Err(PlatformError::not_found(url)),
            status => Err(PlatformError::api(status, message)),
        }
    }

    /// Get current rate limit status (core API).
    ///
    /// GitHub does not count this call against the quota.
    pub async fn get_rate_limit(&self) -> platform::Result<RateLimitInfo> {
        let response: GitHubRateLimitResponse = self.get_json(self.rate_limit_url()).await?;
        let core = response.resources.core;
        Ok(RateLimitInfo {
            limit: core.limit,
            remaining: core.remaining,
            reset: core.reset,
        })
    }

    /// Fetch one page of the user's repositories in raw GitHub form.
    pub async fn list_user_repos_page(
        &self,
        page: u32,
        per_page: u32,
    ) -> platform::Result<Vec<GitHubRepo>> {
        self.get_json(self.repos_url(page, per_page)).await
    }
}

#[async_trait]
impl RepoSource for GitHubClient {
    fn namespace(&self) -> &str {
        &self.username
    }

    async fn get_rate_limit(&self) -> platform::Result<RateLimitInfo> {
        GitHubClient::get_rate_limit(self).await
    }

    async fn fetch_page(&self, page: u32, per_page: u32) -> platform::Result<Vec<Record>> {
        let repos = self.list_user_repos_page(page, per_page).await?;
        Ok(repos.iter().map(to_record).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, MockTransport, header_get};

    const API: &str = "https://api.test";

    fn client(transport: &MockTransport, token: Option<&str>) -> GitHubClient {
        GitHubClient::with_transport(Arc::new(transport.clone()), "octo", token).with_api_url(API)
    }

    fn rate_headers(limit: u64, remaining: u64, reset: i64) -> HttpHeaders {
        vec![
            ("X-RateLimit-Limit".into(), limit.to_string()),
            ("X-RateLimit-Remaining".into(), remaining.to_string()),
            ("X-RateLimit-Reset".into(), reset.to_string()),
        ]
    }

    #[test]
    fn repos_url_uses_recency_order_and_clamps_page_size() {
        let transport = MockTransport::new();
        let c = client(&transport, None);
        assert_eq!(
            c.repos_url(2, 100),
            "https://api.test/users/octo/repos?per_page=100&page=2&sort=updated&direction=desc"
        );
        assert!(c.repos_url(0, 500).contains("per_page=100&page=1&"));
    }

    #[test]
    fn api_url_trailing_slash_is_trimmed() {
        let transport = MockTransport::new();
        let c = client(&transport, None).with_api_url("https://ghe.example.com/api/v3/");
        assert_eq!(c.rate_limit_url(), "https://ghe.example.com/api/v3/rate_limit");
    }

    #[test]
    fn parse_rate_limit_headers_requires_all_values() {
        let headers = rate_headers(60, 59, 1_700_000_000);
        let info = parse_rate_limit_headers(&headers).expect("complete headers");
        assert_eq!(info.limit, 60);
        assert_eq!(info.remaining, 59);

        let partial: HttpHeaders = headers.into_iter().take(2).collect();
        assert!(parse_rate_limit_headers(&partial).is_none());
    }

    #[tokio::test]
    async fn get_rate_limit_reads_core_resource() {
        let transport = MockTransport::new();
        transport.push_json(
            format!("{API}/rate_limit"),
            &serde_json::json!({
                "resources": {"core": {"limit": 5000, "used": 10, "remaining": 4990, "reset": 1_700_000_000}}
            }),
        );

        let info = client(&transport, None).get_rate_limit().await.expect("rate");
        assert_eq!(
            info,
            RateLimitInfo {
                limit: 5000,
                remaining: 4990,
                reset: 1_700_000_000
            }
        );
    }

    #[tokio::test]
    async fn requests_carry_auth_only_when_token_present() {
        let transport = MockTransport::new();
        let body = serde_json::json!([]);
        let url = format!("{API}/users/octo/repos?per_page=100&page=1&sort=updated&direction=desc");
        transport.push_json(url.clone(), &body);
        transport.push_json(url, &body);

        client(&transport, Some("ghp_secret"))
            .fetch_page(1, 100)
            .await
            .expect("authed");
        client(&transport, Some("  "))
            .fetch_page(1, 100)
            .await
            .expect("anonymous");

        let requests = transport.requests();
        assert_eq!(
            header_get(&requests[0].headers, "authorization"),
            Some("Bearer ghp_secret")
        );
        assert_eq!(header_get(&requests[1].headers, "authorization"), None);
        assert_eq!(header_get(&requests[1].headers, "user-agent"), Some("repocache"));
    }

    #[tokio::test]
    async fn fetch_page_normalizes_records_in_order() {
        let transport = MockTransport::new();
        transport.push_json(
            format!("{API}/users/octo/repos?per_page=2&page=1&sort=updated&direction=desc"),
            &serde_json::json!([
                {"id": 2, "name": "b", "full_name": "octo/b", "updated_at": "2024-02-01T00:00:00Z", "topics": ["x"]},
                {"id": 1, "name": "a", "full_name": "octo/a", "updated_at": "2024-01-01T00:00:00Z", "private": true}
            ]),
        );

        let records = client(&transport, None).fetch_page(1, 2).await.expect("page");
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(records[0].topics, vec!["x"]);
        assert!(records[1].private);
    }

    #[tokio::test]
    async fn exhausted_quota_maps_to_rate_limited() {
        let transport = MockTransport::new();
        transport.push_response(
            format!("{API}/users/octo/repos?per_page=100&page=1&sort=updated&direction=desc"),
            HttpResponse {
                status: 403,
                headers: rate_headers(60, 0, 2_000_000_000),
                body: br#"{"message": "API rate limit exceeded"}"#.to_vec(),
            },
        );

        let err = client(&transport, None)
            .fetch_page(1, 100)
            .await
            .expect_err("rate limited");
        match err {
            PlatformError::RateLimited { reset_at } => {
                assert_eq!(reset_at.timestamp(), 2_000_000_000)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn forbidden_with_quota_left_is_an_api_error() {
        let transport = MockTransport::new();
        transport.push_response(
            format!("{API}/rate_limit"),
            HttpResponse {
                status: 403,
                headers: rate_headers(60, 12, 2_000_000_000),
                body: br#"{"message": "Resource not accessible"}"#.to_vec(),
            },
        );

        let err = client(&transport, None)
            .get_rate_limit()
            .await
            .expect_err("forbidden");
        assert!(
            matches!(err, PlatformError::Api { status: 403, ref message } if message == "Resource not accessible")
        );
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let transport = MockTransport::new();
        transport.push_response(
            format!("{API}/users/octo/repos?per_page=100&page=1&sort=updated&direction=desc"),
            HttpResponse {
                status: 404,
                headers: Vec::new(),
                body: br#"{"message": "Not Found"}"#.to_vec(),
            },
        );

        let err = client(&transport, None)
            .fetch_page(1, 100)
            .await
            .expect_err("not found");
        assert!(matches!(err, PlatformError::NotFound { .. }));
    }

    #[tokio::test]
    async fn server_error_uses_raw_body_when_not_json() {
        let transport = MockTransport::new();
        transport.push_response(
            format!("{API}/rate_limit"),
            HttpResponse {
                status: 502,
                headers: Vec::new(),
                body: b"Bad Gateway\n".to_vec(),
            },
        );

        let err = client(&transport, None)
            .get_rate_limit()
            .await
            .expect_err("bad gateway");
        assert!(matches!(err, PlatformError::Api { status: 502, ref message } if message == "Bad Gateway"));
    }

    #[tokio::test]
    async fn undecodable_body_is_a_decode_error() {
        let transport = MockTransport::new();
        transport.push_response(
            format!("{API}/rate_limit"),
            HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: b"<html>".to_vec(),
            },
        );

        let err = client(&transport, None)
            .get_rate_limit()
            .await
            .expect_err("decode");
        assert!(matches!(err, PlatformError::Decode { .. }));
    }

    #[tokio::test]
    async fn transport_failure_is_a_network_error() {
        let transport = MockTransport::new();
        transport.push_failure(format!("{API}/rate_limit"), "connection reset");

        let err = client(&transport, None)
            .get_rate_limit()
            .await
            .expect_err("network");
        assert!(matches!(err, PlatformError::Network { .. }));
    }
}
