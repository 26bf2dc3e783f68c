use serde::Deserialize;

/// Subset of the pull request resource used for enrichment.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestResponse {
    /// Pull request number
    pub number: u64,
    /// Whether the pull request is a draft (absent on older API versions)
    #[serde(default)]
    pub draft: Option<bool>,
}

/// Subset of the repository resource used to resolve numeric ids.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryResponse {
    /// Numeric repository id used by the tracker
    pub id: u64,
    /// Full name in `owner/name` format
    pub full_name: String,
}
