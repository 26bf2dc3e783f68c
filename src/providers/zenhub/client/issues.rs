use std::future::Future;

use chrono::{DateTime, Utc};
use graphql_client::QueryBody;
use log::debug;
use serde::{Deserialize, Serialize};

use super::core::{ZenHubClient, PAGE_SIZE};
use crate::error::{Result, StageWatchError};
use crate::providers::zenhub::types::TrackerIssue;
use crate::snapshot::{IssueState, RepoRef};

const ISSUES_QUERY: &str = include_str!("issues.graphql");

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkspaceIssuesVariables {
    workspace_id: String,
    first: i64,
    after: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryIssuesVariables {
    repository_gh_id: u64,
    first: i64,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorkspaceIssuesData {
    workspace: Option<IssueContainer>,
}

#[derive(Debug, Deserialize)]
struct RepositoryIssuesData {
    repository: Option<IssueContainer>,
}

#[derive(Debug, Deserialize)]
struct IssueContainer {
    issues: IssueConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueConnection {
    page_info: PageInfo,
    #[serde(default)]
    nodes: Vec<Option<IssueNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueNode {
    number: u64,
    title: String,
    state: IssueState,
    created_at: DateTime<Utc>,
    #[serde(default)]
    pull_request: bool,
    repository: RepositoryNode,
    #[serde(default)]
    assignees: Option<UserConnection>,
    pipeline_issue: Option<PipelineIssueNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    name: String,
    owner_name: String,
}

#[derive(Debug, Deserialize)]
struct UserConnection {
    #[serde(default)]
    nodes: Vec<Option<UserNode>>,
}

#[derive(Debug, Deserialize)]
struct UserNode {
    login: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PipelineIssueNode {
    latest_transfer_time: Option<String>,
    pipeline: Option<PipelineNode>,
}

#[derive(Debug, Deserialize)]
struct PipelineNode {
    name: String,
}

impl From<IssueNode> for TrackerIssue {
    fn from(node: IssueNode) -> Self {
        let (pipeline, latest_transfer_time) = node
            .pipeline_issue
            .map(|pi| (pi.pipeline.map(|p| p.name), pi.latest_transfer_time))
            .unwrap_or_default();

        Self {
            number: node.number,
            repo: RepoRef::new(node.repository.owner_name, node.repository.name),
            title: node.title,
            assignees: node
                .assignees
                .map(|conn| conn.nodes.into_iter().flatten().map(|u| u.login).collect())
                .unwrap_or_default(),
            pipeline,
            latest_transfer_time,
            created_at: node.created_at,
            state: node.state,
            is_pull_request: node.pull_request,
        }
    }
}

impl ZenHubClient {
    /// Fetch open items of a workspace using cursor-based pagination.
    ///
    /// # Arguments
    /// * `workspace_id` - Tracker workspace identifier
    /// * `limit` - Maximum number of items to return
    ///
    /// # Errors
    /// Returns an error if the query fails after retries or the workspace does not exist.
    pub async fn fetch_workspace_issues(
        &self,
        workspace_id: &str,
        limit: usize,
    ) -> Result<Vec<TrackerIssue>> {
        self.paginate(limit, |first, after| async move {
            let body = QueryBody {
                variables: WorkspaceIssuesVariables {
                    workspace_id: workspace_id.to_string(),
                    first,
                    after,
                },
                query: ISSUES_QUERY,
                operation_name: "WorkspaceIssues",
            };

            let data: WorkspaceIssuesData = self.execute_graphql_request(&body).await?;
            data.workspace
                .map(|w| w.issues)
                .ok_or_else(|| StageWatchError::WorkspaceNotFound(workspace_id.to_string()))
        })
        .await
    }

    /// Fetch open items of a single repository, identified by its source-control id.
    ///
    /// # Errors
    /// Returns an error if the query fails after retries or the repository is unknown to the tracker.
    pub async fn fetch_repository_issues(
        &self,
        repo: &RepoRef,
        repository_gh_id: u64,
        limit: usize,
    ) -> Result<Vec<TrackerIssue>> {
        self.paginate(limit, |first, after| async move {
            let body = QueryBody {
                variables: RepositoryIssuesVariables {
                    repository_gh_id,
                    first,
                    after,
                },
                query: ISSUES_QUERY,
                operation_name: "RepositoryIssues",
            };

            let data: RepositoryIssuesData = self.execute_graphql_request(&body).await?;
            data.repository
                .map(|r| r.issues)
                .ok_or_else(|| StageWatchError::RepositoryNotFound(repo.to_string()))
        })
        .await
    }

    async fn paginate<F, Fut>(&self, limit: usize, mut fetch_page: F) -> Result<Vec<TrackerIssue>>
    where
        F: FnMut(i64, Option<String>) -> Fut,
        Fut: Future<Output = Result<IssueConnection>>,
    {
        let mut all_issues = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let remaining = limit.saturating_sub(all_issues.len());
            if remaining == 0 {
                break;
            }

            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let first = remaining.min(PAGE_SIZE) as i64;

            let page = fetch_page(first, cursor.take()).await?;
            all_issues.extend(page.nodes.into_iter().flatten().map(TrackerIssue::from));
            debug!("Fetched page, {} items so far", all_issues.len());

            if !page.page_info.has_next_page || all_issues.len() >= limit {
                break;
            }

            cursor = page.page_info.end_cursor;

            // hasNextPage without a cursor would loop forever
            if cursor.is_none() {
                break;
            }
        }

        all_issues.truncate(limit);

        Ok(all_issues)
    }
}
