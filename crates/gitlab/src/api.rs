//! REST API client for the GitLab v4 endpoints.
//!
//! One [`GitLabApi`] is shared by the whole process. The instance URL and
//! access token are passed per call because every stored credential may point
//! at a different GitLab instance.

use std::time::Duration;

use mergedesk_core::intent::MergeRequestState;
use url::Url;

use crate::models::{GitLabUser, MergeRequest, MergeRequestChanges};

/// Header GitLab reads personal/project access tokens from.
pub const PRIVATE_TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// Default bound on every outbound GitLab request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Page size requested from list endpoints.
pub const LIST_PAGE_SIZE: u32 = 100;

/// Errors from the GitLab REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum GitLabApiError {
    /// The configured instance URL is not an absolute http(s) URL with a host.
    #[error("Invalid GitLab URL: {0}")]
    InvalidUrl(String),

    /// The HTTP request itself failed (network, DNS, TLS, timeout, decode).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// GitLab returned a non-2xx status code.
    #[error("GitLab API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl GitLabApiError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request(err) if err.is_timeout())
    }
}

/// HTTP client for GitLab instances.
#[derive(Debug, Clone)]
pub struct GitLabApi {
    client: reqwest::Client,
    timeout: Duration,
}

impl GitLabApi {
    /// Create a client whose requests are bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, GitLabApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve the user owning `token`.
    ///
    /// Sends `GET {base_url}/api/v4/user`.
    pub async fn current_user(
        &self,
        base_url: &str,
        token: &str,
    ) -> Result<GitLabUser, GitLabApiError> {
        let url = endpoint(base_url, &["user"])?;
        let response = self
            .client
            .get(url)
            .header(PRIVATE_TOKEN_HEADER, token)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// List merge requests of a project filtered by state.
    ///
    /// Sends `GET /projects/{project}/merge_requests?state=..&per_page=100`.
    /// `project` may be a numeric id or a `group/project` path.
    pub async fn list_merge_requests(
        &self,
        base_url: &str,
        token: &str,
        project: &str,
        state: MergeRequestState,
    ) -> Result<Vec<MergeRequest>, GitLabApiError> {
        let url = endpoint(base_url, &["projects", project, "merge_requests"])?;
        let per_page = LIST_PAGE_SIZE.to_string();
        let response = self
            .client
            .get(url)
            .header(PRIVATE_TOKEN_HEADER, token)
            .query(&[("state", state.as_str()), ("per_page", per_page.as_str())])
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch a single merge request by its project-scoped `iid`.
    pub async fn get_merge_request(
        &self,
        base_url: &str,
        token: &str,
        project: &str,
        iid: u64,
    ) -> Result<MergeRequest, GitLabApiError> {
        let iid = iid.to_string();
        let url = endpoint(base_url, &["projects", project, "merge_requests", &iid])?;
        let response = self
            .client
            .get(url)
            .header(PRIVATE_TOKEN_HEADER, token)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the file diffs of a merge request.
    pub async fn get_merge_request_changes(
        &self,
        base_url: &str,
        token: &str,
        project: &str,
        iid: u64,
    ) -> Result<MergeRequestChanges, GitLabApiError> {
        let iid = iid.to_string();
        let url = endpoint(
            base_url,
            &["projects", project, "merge_requests", &iid, "changes"],
        )?;
        let response = self
            .client
            .get(url)
            .header(PRIVATE_TOKEN_HEADER, token)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`GitLabApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, GitLabApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GitLabApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GitLabApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Normalise a user-supplied instance URL: trims whitespace and trailing `/`.
pub fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

/// Parse an instance URL, requiring an `http`/`https` scheme and a host.
pub fn parse_base_url(raw: &str) -> Result<Url, GitLabApiError> {
    let normalized = normalize_base_url(raw);
    let url = Url::parse(&normalized).map_err(|_| GitLabApiError::InvalidUrl(normalized.clone()))?;
    let has_host = url.host_str().is_some_and(|h| !h.is_empty());
    if !matches!(url.scheme(), "http" | "https") || !has_host {
        return Err(GitLabApiError::InvalidUrl(normalized));
    }
    Ok(url)
}

/// Build `{base_url}/api/v4/{segments..}`. Each segment is percent-encoded,
/// so a `group/project` path stays a single segment.
fn endpoint(base_url: &str, segments: &[&str]) -> Result<Url, GitLabApiError> {
    let mut url = parse_base_url(base_url)?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| GitLabApiError::InvalidUrl(base_url.to_string()))?;
        path.pop_if_empty().push("api").push("v4").extend(segments);
    }
    Ok(url)
}
