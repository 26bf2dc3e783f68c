use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::StageWatchError;
use crate::output::message::AlertPolicy;
use crate::snapshot::RepoRef;

/// Configuration file structure for stagewatch.
///
/// Loaded from the current directory or a given path; CLI flags and
/// environment variables are layered on top by the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Tracker access and scan targets
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Source-control enrichment
    #[serde(default)]
    pub github: GitHubConfig,

    /// Webhook alerting
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Persisted state between runs
    #[serde(default)]
    pub state: StateConfig,

    /// Output format preferences
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TrackerConfig {
    /// Tracker API token
    pub token: Option<String>,

    /// Tracker GraphQL endpoint
    #[serde(default = "default_graphql_url")]
    pub graphql_url: String,

    /// Whether to scan workspaces or repositories
    #[serde(default)]
    pub mode: TargetMode,

    /// Workspace ids scanned in `workspaces` mode
    #[serde(default)]
    pub workspace_ids: Vec<String>,

    /// Repositories (`owner/name`) scanned in `repositories` mode
    #[serde(default)]
    pub repositories: Vec<String>,

    /// Pipeline names to report on (exact, case-sensitive)
    #[serde(default)]
    pub pipelines: Vec<String>,

    /// Maximum number of items fetched across all targets
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Drop items whose pipeline entry time is not verified by the tracker
    #[serde(default)]
    pub strict_pipeline_timestamp: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetMode {
    #[default]
    Workspaces,
    Repositories,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitHubConfig {
    /// GitHub personal access token
    pub token: Option<String>,

    /// GitHub REST API base URL
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// GitHub web base URL, used for item links
    #[serde(default = "default_github_web_url")]
    pub web_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NotifyConfig {
    /// Chat webhook receiving the report
    pub webhook_url: Option<String>,

    /// Send an "all clear" message when nothing is overdue
    #[serde(default)]
    pub send_empty_report: bool,

    /// Days in pipeline after which an item is overdue
    #[serde(default = "default_review_days")]
    pub review_days: f64,

    /// Days after which an overdue item is flagged as a warning
    #[serde(default = "default_warning_days")]
    pub warning_days: f64,

    /// Days after which an overdue item is flagged as urgent
    #[serde(default = "default_urgent_days")]
    pub urgent_days: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StateConfig {
    /// Keep state between runs
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// State file location (platform data directory when unset)
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Default output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,

    /// Where the ranked dataset is written in summary format
    /// (next to the state file when unset)
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Summary,
    Json,
    Csv,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            token: None,
            graphql_url: default_graphql_url(),
            mode: TargetMode::default(),
            workspace_ids: Vec::new(),
            repositories: Vec::new(),
            pipelines: Vec::new(),
            max_items: default_max_items(),
            strict_pipeline_timestamp: false,
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_github_api_url(),
            web_url: default_github_web_url(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            send_empty_report: false,
            review_days: default_review_days(),
            warning_days: default_warning_days(),
            urgent_days: default_urgent_days(),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

fn default_graphql_url() -> String {
    "https://api.zenhub.com/public/graphql".to_string()
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_github_web_url() -> String {
    "https://github.com".to_string()
}

fn default_max_items() -> usize {
    100
}

fn default_review_days() -> f64 {
    1.0
}

fn default_warning_days() -> f64 {
    2.0
}

fn default_urgent_days() -> f64 {
    3.0
}

fn default_true() -> bool {
    true
}

impl NotifyConfig {
    pub fn alert_policy(&self) -> AlertPolicy {
        AlertPolicy {
            review_days: self.review_days,
            warning_days: self.warning_days,
            urgent_days: self.urgent_days,
            send_empty_report: self.send_empty_report,
        }
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./stagewatch.toml
    /// 3. ./stagewatch.json
    /// 4. ./stagewatch.yaml
    /// 5. ./stagewatch.yml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = [
            "stagewatch.toml",
            "stagewatch.json",
            "stagewatch.yaml",
            "stagewatch.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }

    /// Repositories parsed from `owner/name` strings.
    pub fn repositories(&self) -> std::result::Result<Vec<RepoRef>, StageWatchError> {
        self.tracker
            .repositories
            .iter()
            .map(|repo| repo.parse())
            .collect()
    }

    /// Rejects configurations a scan cannot run with.
    pub fn validate(&self) -> std::result::Result<(), StageWatchError> {
        let tracker = &self.tracker;

        if tracker.token.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return Err(StageWatchError::Config(
                "Tracker token is required (set ZENHUB_TOKEN or tracker.token)".into(),
            ));
        }

        match tracker.mode {
            TargetMode::Workspaces if tracker.workspace_ids.is_empty() => {
                return Err(StageWatchError::Config(
                    "At least one workspace id is required in workspaces mode".into(),
                ));
            }
            TargetMode::Repositories if tracker.repositories.is_empty() => {
                return Err(StageWatchError::Config(
                    "At least one repository is required in repositories mode".into(),
                ));
            }
            TargetMode::Repositories => {
                self.repositories()?;
            }
            TargetMode::Workspaces => {}
        }

        if tracker.pipelines.is_empty() {
            return Err(StageWatchError::Config(
                "At least one target pipeline is required".into(),
            ));
        }

        if tracker.max_items == 0 {
            return Err(StageWatchError::Config(
                "max-items must be greater than zero".into(),
            ));
        }

        let notify = &self.notify;
        if !(notify.review_days >= 0.0
            && notify.review_days <= notify.warning_days
            && notify.warning_days <= notify.urgent_days)
        {
            return Err(StageWatchError::Config(format!(
                "Thresholds must be non-negative with review ({}) <= warning ({}) <= urgent ({})",
                notify.review_days, notify.warning_days, notify.urgent_days
            )));
        }

        Ok(())
    }
}
