use graphql_client::QueryBody;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::core::ZenHubClient;
use crate::error::Result;
use crate::providers::zenhub::types::PipelineTransfer;
use crate::snapshot::{issue_key, RepoRef};

const TRANSFERS_QUERY: &str = include_str!("transfers.graphql");

/// Timeline key the tracker uses for pipeline moves.
const PIPELINE_CHANGE_KEY: &str = "issue.change_pipeline";

/// Upper bound on timeline pages read for one item.
const MAX_TIMELINE_PAGES: usize = 20;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IssueTransfersVariables {
    repository_owner: String,
    repository_name: String,
    issue_number: u64,
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IssueTransfersData {
    issue: Option<TimelineIssue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelineIssue {
    timeline_items: TimelineConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelineConnection {
    #[serde(default)]
    page_info: Option<TimelinePageInfo>,
    #[serde(default)]
    nodes: Vec<Option<TimelineNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelinePageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelineNode {
    key: String,
    created_at: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl TimelineNode {
    fn into_transfer(self) -> Option<PipelineTransfer> {
        if self.key != PIPELINE_CHANGE_KEY {
            return None;
        }
        let to_pipeline = self.data.get("to_pipeline")?.get("name")?.as_str()?;
        Some(PipelineTransfer {
            to_pipeline: to_pipeline.to_string(),
            occurred_at: self.created_at,
        })
    }
}

impl ZenHubClient {
    /// Fetch the pipeline transfer history of one item.
    ///
    /// Follows the timeline cursor for up to `MAX_TIMELINE_PAGES` pages.
    /// Events are returned in tracker order; callers must not assume sorting.
    /// An item unknown to the tracker yields an empty history.
    pub async fn fetch_transfer_history(
        &self,
        repo: &RepoRef,
        issue_number: u64,
    ) -> Result<Vec<PipelineTransfer>> {
        let mut transfers = Vec::new();
        let mut cursor: Option<String> = None;

        for page in 1..=MAX_TIMELINE_PAGES {
            let body = QueryBody {
                variables: IssueTransfersVariables {
                    repository_owner: repo.owner.clone(),
                    repository_name: repo.name.clone(),
                    issue_number,
                    after: cursor.take(),
                },
                query: TRANSFERS_QUERY,
                operation_name: "IssueTransfers",
            };

            let data: IssueTransfersData = self.execute_graphql_request(&body).await?;
            let Some(issue) = data.issue else {
                break;
            };

            let connection = issue.timeline_items;
            transfers.extend(
                connection
                    .nodes
                    .into_iter()
                    .flatten()
                    .filter_map(TimelineNode::into_transfer),
            );
            debug!(
                "Fetched timeline page {page} for {}, {} transfers so far",
                issue_key(repo, issue_number),
                transfers.len()
            );

            cursor = connection
                .page_info
                .filter(|info| info.has_next_page)
                .and_then(|info| info.end_cursor);
            if cursor.is_none() {
                return Ok(transfers);
            }
        }

        if cursor.is_some() {
            warn!(
                "Timeline of {} exceeds {MAX_TIMELINE_PAGES} pages, later transfers ignored",
                issue_key(repo, issue_number)
            );
        }

        Ok(transfers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Token;
    use crate::http::RetryPolicy;
    use mockito::Matcher;
    use serde_json::json;

    #[tokio::test]
    async fn test_fetch_transfer_history_keeps_pipeline_moves_only() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "data": {
                        "issue": {
                            "timelineItems": {
                                "nodes": [
                                    {
                                        "key": "issue.change_pipeline",
                                        "createdAt": "2025-01-02T09:00:00Z",
                                        "data": { "to_pipeline": { "name": "Review" } }
                                    },
                                    {
                                        "key": "issue.set_estimate",
                                        "createdAt": "2025-01-02T10:00:00Z",
                                        "data": { "estimate": 3 }
                                    },
                                    {
                                        "key": "issue.change_pipeline",
                                        "createdAt": "2025-01-03T09:00:00Z",
                                        "data": {}
                                    }
                                ]
                            }
                        }
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ZenHubClient::new(
            &format!("{}/graphql", server.url()),
            Token::from("zh-token"),
            RetryPolicy::default(),
        )
        .unwrap();

        let history = client
            .fetch_transfer_history(&RepoRef::new("acme", "api"), 7)
            .await
            .unwrap();

        assert_eq!(
            history,
            vec![PipelineTransfer {
                to_pipeline: "Review".to_string(),
                occurred_at: "2025-01-02T09:00:00Z".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_fetch_transfer_history_unknown_issue() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "data": { "issue": null } }).to_string())
            .create_async()
            .await;

        let client = ZenHubClient::new(
            &format!("{}/graphql", server.url()),
            Token::from("zh-token"),
            RetryPolicy::default(),
        )
        .unwrap();

        let history = client
            .fetch_transfer_history(&RepoRef::new("acme", "api"), 7)
            .await
            .unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_transfer_history_follows_timeline_cursor() {
        let mut server = mockito::Server::new_async().await;
        let first_page = server
            .mock("POST", "/graphql")
            .match_body(Matcher::Regex(r#""after":null"#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "data": {
                        "issue": {
                            "timelineItems": {
                                "pageInfo": { "hasNextPage": true, "endCursor": "tl-1" },
                                "nodes": [{
                                    "key": "issue.change_pipeline",
                                    "createdAt": "2025-01-02T09:00:00Z",
                                    "data": { "to_pipeline": { "name": "Review" } }
                                }]
                            }
                        }
                    }
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        let second_page = server
            .mock("POST", "/graphql")
            .match_body(Matcher::Regex(r#""after":"tl-1""#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "data": {
                        "issue": {
                            "timelineItems": {
                                "pageInfo": { "hasNextPage": false, "endCursor": null },
                                "nodes": [{
                                    "key": "issue.change_pipeline",
                                    "createdAt": "2025-01-06T09:00:00Z",
                                    "data": { "to_pipeline": { "name": "Review" } }
                                }]
                            }
                        }
                    }
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let client = ZenHubClient::new(
            &format!("{}/graphql", server.url()),
            Token::from("zh-token"),
            RetryPolicy::default(),
        )
        .unwrap();

        let history = client
            .fetch_transfer_history(&RepoRef::new("acme", "api"), 7)
            .await
            .unwrap();

        first_page.assert_async().await;
        second_page.assert_async().await;
        let times: Vec<&str> = history.iter().map(|t| t.occurred_at.as_str()).collect();
        assert_eq!(times, vec!["2025-01-02T09:00:00Z", "2025-01-06T09:00:00Z"]);
    }
}
