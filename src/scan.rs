//! One bounded scan: fetch, resolve, rank, report, remember.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::{debug, error, info, warn};

use crate::auth::Token;
use crate::config::{Config, TargetMode};
use crate::duration::{self, IssueDurationRecord};
use crate::error::{Result, StageWatchError};
use crate::http::RetryPolicy;
use crate::mapper::{MappingInput, SnapshotMapper};
use crate::notify::WebhookNotifier;
use crate::output::message::{compose_alert, AlertPolicy};
use crate::output::PhaseProgress;
use crate::providers::github::GitHubClient;
use crate::providers::zenhub::{TrackerIssue, ZenHubClient};
use crate::snapshot::{issue_key, IssuePipelineSnapshot, RepoRef};
use crate::state::{PersistedState, StateStore};

/// What a scan covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTargets {
    Workspaces(Vec<String>),
    Repositories(Vec<RepoRef>),
}

impl ScanTargets {
    fn labels(&self) -> Vec<String> {
        match self {
            Self::Workspaces(ids) => ids.iter().map(|id| format!("workspace {id}")).collect(),
            Self::Repositories(repos) => repos
                .iter()
                .map(|repo| format!("repository {repo}"))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub targets: ScanTargets,
    pub max_items: usize,
    pub web_url: String,
    pub alert: AlertPolicy,
}

/// Result of one scan.
#[derive(Debug)]
pub struct ScanOutcome {
    pub targets: Vec<String>,
    /// Raw items fetched before scope filtering
    pub scanned: usize,
    pub scanned_at: DateTime<Utc>,
    /// Ranked, longest-waiting first
    pub records: Vec<IssueDurationRecord>,
    /// Whether a webhook accepted a report
    pub notified: bool,
}

pub struct Scanner {
    tracker: ZenHubClient,
    github: GitHubClient,
    notifier: Option<WebhookNotifier>,
    mapper: SnapshotMapper,
    settings: ScanSettings,
}

impl Scanner {
    pub fn new(
        tracker: ZenHubClient,
        github: GitHubClient,
        notifier: Option<WebhookNotifier>,
        mapper: SnapshotMapper,
        settings: ScanSettings,
    ) -> Self {
        Self {
            tracker,
            github,
            notifier,
            mapper,
            settings,
        }
    }

    /// Builds a scanner from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid settings, URLs or tokens.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let token = config
            .tracker
            .token
            .as_deref()
            .map(Token::from)
            .ok_or_else(|| StageWatchError::Config("Tracker token is required".into()))?;

        let tracker = ZenHubClient::new(&config.tracker.graphql_url, token, RetryPolicy::default())?;
        let github = GitHubClient::new(
            &config.github.api_url,
            config.github.token.as_deref().map(Token::from),
            RetryPolicy::default(),
        )?;
        let notifier = config
            .notify
            .webhook_url
            .as_deref()
            .map(WebhookNotifier::new)
            .transpose()?;

        let targets = match config.tracker.mode {
            TargetMode::Workspaces => ScanTargets::Workspaces(config.tracker.workspace_ids.clone()),
            TargetMode::Repositories => ScanTargets::Repositories(config.repositories()?),
        };

        let mapper = SnapshotMapper::new(
            config.tracker.pipelines.iter().cloned(),
            config.tracker.strict_pipeline_timestamp,
        );

        Ok(Self::new(
            tracker,
            github,
            notifier,
            mapper,
            ScanSettings {
                targets,
                max_items: config.tracker.max_items,
                web_url: config.github.web_url.clone(),
                alert: config.notify.alert_policy(),
            },
        ))
    }

    /// Runs the scan as of `now`.
    ///
    /// Progress is displayed in three phases:
    /// 1. Fetching items from every target
    /// 2. Resolving pipeline entry times and durations
    /// 3. Notifying and saving state
    ///
    /// # Errors
    ///
    /// A failed item listing aborts the run, as does a repository scan in
    /// which no repository could be resolved. History, enrichment,
    /// notification and state failures are logged and degrade gracefully.
    pub async fn run(&self, store: &StateStore, now: DateTime<Utc>) -> Result<ScanOutcome> {
        info!(
            "Starting scan of {} for pipelines [{}]",
            self.settings.targets.labels().join(", "),
            self.mapper
                .target_pipelines()
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );

        let previous = store.load().unwrap_or_else(|e| {
            warn!("Failed to load persisted state, starting empty: {e}");
            PersistedState::default()
        });
        if let Some(last_run) = previous.last_run {
            info!("Previous run at {last_run}, {} items remembered", previous.issues.len());
        }

        // Phase 1: Fetching items
        let progress = PhaseProgress::start_phase_1(self.settings.max_items);

        let items = self.fetch_items().await?;
        if items.is_empty() {
            warn!("No items found for {}", self.settings.targets.labels().join(", "));
        }

        // Phase 2: Resolving durations
        let progress = progress.finish_phase_1_start_phase_2(items.len());

        let snapshots = self.build_snapshots(&items, &previous, now).await;
        let records = duration::resolve_all(
            snapshots.clone(),
            now,
            self.mapper.target_pipelines(),
            &self.settings.web_url,
        );

        // Phase 3: Reporting
        let progress = progress.finish_phase_2_start_phase_3(records.len());

        let notified = self.notify(&records).await;

        let next = previous.update(&snapshots, now);
        match (store.save(&next), store.path()) {
            (Err(e), _) => error!("Failed to save persisted state: {e}"),
            (Ok(()), Some(path)) => debug!("State saved to {}", path.display()),
            (Ok(()), None) => debug!("State disabled, nothing saved"),
        }

        progress.finish_phase_3();

        Ok(ScanOutcome {
            targets: self.settings.targets.labels(),
            scanned: items.len(),
            scanned_at: now,
            records,
            notified,
        })
    }

    /// Lists items across all targets, capped at `max_items`, first occurrence wins.
    async fn fetch_items(&self) -> Result<Vec<TrackerIssue>> {
        let mut items: IndexMap<String, TrackerIssue> = IndexMap::new();

        match &self.settings.targets {
            ScanTargets::Workspaces(ids) => {
                for id in ids {
                    let remaining = self.settings.max_items.saturating_sub(items.len());
                    if remaining == 0 {
                        break;
                    }
                    info!("Fetching up to {remaining} items from workspace {id}...");
                    let batch = self.tracker.fetch_workspace_issues(id, remaining).await?;
                    Self::collect_unique(&mut items, batch);
                }
            }
            ScanTargets::Repositories(repos) => {
                let mut listed = 0;
                for repo in repos {
                    let remaining = self.settings.max_items.saturating_sub(items.len());
                    if remaining == 0 {
                        break;
                    }
                    let Some(repository_gh_id) = self.github.fetch_repository_id(repo).await else {
                        error!("Skipping repository {repo}: its id could not be resolved");
                        continue;
                    };
                    info!("Fetching up to {remaining} items from repository {repo}...");
                    let batch = self
                        .tracker
                        .fetch_repository_issues(repo, repository_gh_id, remaining)
                        .await?;
                    listed += 1;
                    Self::collect_unique(&mut items, batch);
                }

                if listed == 0 {
                    return Err(StageWatchError::NoTargetsListed(
                        self.settings.targets.labels().join(", "),
                    ));
                }
            }
        }

        info!("Fetched {} items", items.len());
        Ok(items.into_values().collect())
    }

    fn collect_unique(items: &mut IndexMap<String, TrackerIssue>, batch: Vec<TrackerIssue>) {
        for item in batch {
            let key = issue_key(&item.repo, item.number);
            if items.contains_key(&key) {
                debug!("Skipping duplicate {key}");
                continue;
            }
            items.insert(key, item);
        }
    }

    async fn build_snapshots(
        &self,
        items: &[TrackerIssue],
        previous: &PersistedState,
        now: DateTime<Utc>,
    ) -> Vec<IssuePipelineSnapshot> {
        let mut snapshots = Vec::new();

        for raw in items {
            if !self.mapper.in_scope(raw) {
                continue;
            }

            let history = if SnapshotMapper::needs_history(raw) {
                match self.tracker.fetch_transfer_history(&raw.repo, raw.number).await {
                    Ok(history) => Some(history),
                    Err(e) => {
                        warn!(
                            "Transfer history unavailable for {}: {e}",
                            issue_key(&raw.repo, raw.number)
                        );
                        None
                    }
                }
            } else {
                None
            };

            let draft = if raw.is_pull_request {
                self.github.fetch_draft_status(&raw.repo, raw.number).await
            } else {
                None
            };

            let input = MappingInput {
                raw,
                history: history.as_deref(),
                draft,
                previous: previous.find_existing(&raw.repo, raw.number),
            };

            if let Some(snapshot) = self.mapper.map(input, now) {
                snapshots.push(snapshot);
            }
        }

        info!("Resolved {} items in target pipelines", snapshots.len());
        snapshots
    }

    async fn notify(&self, records: &[IssueDurationRecord]) -> bool {
        let Some(message) = compose_alert(records, &self.settings.alert) else {
            info!("Nothing past the review deadline, no report sent");
            return false;
        };

        match &self.notifier {
            Some(notifier) => notifier.send(&message).await,
            None => {
                debug!("No webhook configured, report not sent");
                false
            }
        }
    }
}
