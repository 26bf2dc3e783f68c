use graphql_client::{QueryBody, Response as GraphQLResponse};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::auth::Token;
use crate::error::{Result, StageWatchError};
use crate::http::{send_with_retry, RetryPolicy};

pub(super) const PAGE_SIZE: usize = 50;

pub struct ZenHubClient {
    pub client: Client,
    pub graphql_url: Url,
    token: Token,
    retry: RetryPolicy,
}

impl ZenHubClient {
    pub fn new(graphql_url: &str, token: Token, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("stagewatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StageWatchError::Config(format!("Failed to create HTTP client: {e}")))?;

        let graphql_url = Url::parse(graphql_url)
            .map_err(|e| StageWatchError::Config(format!("Invalid GraphQL URL: {e}")))?;

        Ok(Self {
            client,
            graphql_url,
            token,
            retry,
        })
    }

    /// Execute a GraphQL request, retrying on rate limits only.
    /// Returns the data from the GraphQL response after checking for errors
    pub(super) async fn execute_graphql_request<V, T>(&self, body: &QueryBody<V>) -> Result<T>
    where
        V: Serialize,
        T: DeserializeOwned,
    {
        let response = send_with_retry(&self.retry, self.graphql_url.as_str(), || {
            self.client
                .post(self.graphql_url.clone())
                .bearer_auth(self.token.as_str())
                .json(body)
        })
        .await?;

        let response_body: GraphQLResponse<T> = response.json().await?;

        if let Some(errors) = response_body.errors {
            if !errors.is_empty() {
                return Err(StageWatchError::GraphQLError {
                    query: body.operation_name.to_string(),
                    errors: errors
                        .iter()
                        .map(|e| e.message.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
        }

        response_body.data.ok_or(StageWatchError::NoResponseData)
    }
}
