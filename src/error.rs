use thiserror::Error;

#[derive(Error, Debug)]
pub enum StageWatchError {
    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited (retry hint: {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("API request failed with status {status} after {retries} attempts")]
    ApiErrorAfterRetries { status: u16, retries: u32 },

    #[error("GraphQL query {query} returned errors: {errors}")]
    GraphQLError { query: String, errors: String },

    #[error("GraphQL response contained no data")]
    NoResponseData,

    #[error("Workspace '{0}' not found")]
    WorkspaceNotFound(String),

    #[error("Repository '{0}' not found")]
    RepositoryNotFound(String),

    #[error("None of the scan targets could be listed: {0}")]
    NoTargetsListed(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("State error: {0}")]
    State(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StageWatchError>;
