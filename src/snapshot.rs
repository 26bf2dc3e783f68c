use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StageWatchError;

/// A repository identified by owner and name (e.g. `acme/api`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = StageWatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split('/').collect::<Vec<_>>().as_slice() {
            [owner, name] if !owner.is_empty() && !name.is_empty() => Ok(Self::new(*owner, *name)),
            _ => Err(StageWatchError::Config(format!(
                "Repository '{s}' must be in format 'owner/name'"
            ))),
        }
    }
}

/// Cross-run identity of a tracked item: `owner/name#number`.
pub fn issue_key(repo: &RepoRef, issue_number: u64) -> String {
    format!("{repo}#{issue_number}")
}

/// Lifecycle state reported by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueState {
    Open,
    Closed,
    #[serde(other)]
    Other,
}

/// What kind of item sits in the pipeline.
///
/// `draft` is `None` when the source-control lookup was unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemKind {
    Issue,
    PullRequest {
        #[serde(default)]
        draft: Option<bool>,
    },
}

impl ItemKind {
    pub fn is_pull_request(self) -> bool {
        matches!(self, Self::PullRequest { .. })
    }

    pub fn type_label(self) -> &'static str {
        match self {
            Self::Issue => "Issue",
            Self::PullRequest { .. } => "Pull Request",
        }
    }

    pub fn draft_label(self) -> &'static str {
        match self {
            Self::Issue => "-",
            Self::PullRequest { draft: Some(true) } => "Draft",
            Self::PullRequest { draft: Some(false) } => "Ready",
            Self::PullRequest { draft: None } => "Unknown",
        }
    }
}

/// Which resolution rule produced `pipeline_entered_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    /// The tracker's own latest-transfer field
    Tracker,
    /// The most recent matching transfer event in the item's history
    History,
    /// Carried over from the previous run's snapshot
    Persisted,
    /// Unknown entry time, treated as just entered
    FallbackNow,
}

impl TimestampSource {
    /// Whether the timestamp came straight from upstream data.
    pub fn is_direct(self) -> bool {
        matches!(self, Self::Tracker | Self::History)
    }
}

/// Normalized, point-in-time record of one item's pipeline and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuePipelineSnapshot {
    pub issue_number: u64,
    pub repo: RepoRef,
    pub title: String,
    pub assignees: Vec<String>,
    pub pipeline: String,
    /// Best estimate of when the item entered `pipeline`
    pub pipeline_entered_at: DateTime<Utc>,
    /// Observation time of this snapshot
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub state: IssueState,
    #[serde(flatten)]
    pub kind: ItemKind,
    pub timestamp_source: TimestampSource,
}

impl IssuePipelineSnapshot {
    pub fn key(&self) -> String {
        issue_key(&self.repo, self.issue_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_ref_parse() {
        let repo: RepoRef = "acme/api".parse().unwrap();
        assert_eq!(repo, RepoRef::new("acme", "api"));
        assert_eq!(repo.to_string(), "acme/api");
    }

    #[test]
    fn test_repo_ref_parse_rejects_bad_paths() {
        assert!("acme".parse::<RepoRef>().is_err());
        assert!("acme/api/extra".parse::<RepoRef>().is_err());
        assert!("/api".parse::<RepoRef>().is_err());
    }

    #[test]
    fn test_issue_key_format() {
        assert_eq!(issue_key(&RepoRef::new("acme", "api"), 42), "acme/api#42");
    }

    #[test]
    fn test_item_kind_labels() {
        assert_eq!(ItemKind::Issue.type_label(), "Issue");
        assert_eq!(ItemKind::Issue.draft_label(), "-");
        let draft = ItemKind::PullRequest { draft: Some(true) };
        assert!(draft.is_pull_request());
        assert_eq!(draft.draft_label(), "Draft");
        assert_eq!(ItemKind::PullRequest { draft: None }.draft_label(), "Unknown");
    }

    #[test]
    fn test_issue_state_unknown_value() {
        let state: IssueState = serde_json::from_str("\"MERGED\"").unwrap();
        assert_eq!(state, IssueState::Other);
        let state: IssueState = serde_json::from_str("\"OPEN\"").unwrap();
        assert_eq!(state, IssueState::Open);
    }

    #[test]
    fn test_snapshot_kind_is_flattened() {
        let snapshot = IssuePipelineSnapshot {
            issue_number: 7,
            repo: RepoRef::new("acme", "api"),
            title: "Add retries".to_string(),
            assignees: vec!["octocat".to_string()],
            pipeline: "Review".to_string(),
            pipeline_entered_at: "2025-01-04T10:00:00Z".parse().unwrap(),
            updated_at: "2025-01-05T10:00:00Z".parse().unwrap(),
            created_at: "2025-01-01T10:00:00Z".parse().unwrap(),
            state: IssueState::Open,
            kind: ItemKind::PullRequest { draft: Some(false) },
            timestamp_source: TimestampSource::Tracker,
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["kind"], "pull_request");
        assert_eq!(value["draft"], false);

        let back: IssuePipelineSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(back, snapshot);
        assert_eq!(back.key(), "acme/api#7");
    }
}
