use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;

use crate::auth::Token;
use crate::error::{Result, StageWatchError};
use crate::http::{send_with_retry, RetryPolicy};
use crate::snapshot::{issue_key, RepoRef};

use super::types::{PullRequestResponse, RepositoryResponse};

/// GitHub REST client for best-effort enrichment.
///
/// Every public lookup degrades to `None` on failure; callers never see an error.
pub struct GitHubClient {
    /// HTTP client
    client: reqwest::Client,
    /// Base URL for GitHub API
    base_url: String,
    retry: RetryPolicy,
}

impl GitHubClient {
    /// Create a new GitHub API client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - GitHub API base URL (e.g., "https://api.github.com")
    /// * `token` - Optional GitHub personal access token
    /// * `retry` - Rate-limit retry policy
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value or the HTTP client cannot be built.
    pub fn new(base_url: &str, token: Option<Token>, retry: RetryPolicy) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("stagewatch/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );

        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
                .map_err(|e| StageWatchError::Config(format!("Invalid GitHub token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StageWatchError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    /// Fetch whether a pull request is a draft.
    ///
    /// Returns `None` when the status is unavailable for any reason.
    pub async fn fetch_draft_status(&self, repo: &RepoRef, number: u64) -> Option<bool> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{number}",
            self.base_url, repo.owner, repo.name
        );

        match self.get_json::<PullRequestResponse>(&url).await {
            Ok(pr) => {
                debug!("Draft status for {}: {:?}", issue_key(repo, pr.number), pr.draft);
                pr.draft
            }
            Err(e) => {
                warn!(
                    "Draft status unavailable for {} ({url}): {e}",
                    issue_key(repo, number)
                );
                None
            }
        }
    }

    /// Resolve the numeric id of a repository.
    ///
    /// Returns `None` when the repository cannot be resolved.
    pub async fn fetch_repository_id(&self, repo: &RepoRef) -> Option<u64> {
        let url = format!("{}/repos/{}/{}", self.base_url, repo.owner, repo.name);

        match self.get_json::<RepositoryResponse>(&url).await {
            Ok(response) => {
                debug!("Resolved {} to id {}", response.full_name, response.id);
                Some(response.id)
            }
            Err(e) => {
                warn!("Repository id unavailable for {repo} ({url}): {e}");
                None
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = send_with_retry(&self.retry, url, || self.client.get(url)).await?;
        Ok(response.json().await?)
    }
}
