use chrono::{DateTime, Utc};

use crate::snapshot::{IssueState, RepoRef};

/// A raw item as returned by the tracker, before timestamp resolution.
///
/// Timestamps that feed pipeline-entry resolution are kept as the tracker's
/// original strings so the mapper can decide what to do with malformed values.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerIssue {
    pub number: u64,
    pub repo: RepoRef,
    pub title: String,
    /// Assignee logins in tracker order
    pub assignees: Vec<String>,
    /// Current pipeline name, if the item is on the board at all
    pub pipeline: Option<String>,
    /// Tracker-provided time of the last move into `pipeline`
    pub latest_transfer_time: Option<String>,
    pub created_at: DateTime<Utc>,
    pub state: IssueState,
    pub is_pull_request: bool,
}

/// One recorded move of an item between pipelines.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineTransfer {
    /// Destination pipeline name
    pub to_pipeline: String,
    /// When the move happened (raw tracker value)
    pub occurred_at: String,
}
