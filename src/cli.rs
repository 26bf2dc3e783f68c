use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};

use crate::config::{Config, OutputFormat, TargetMode};
use crate::output::message::AlertPolicy;
use crate::output::{export_records, print_summary};
use crate::scan::{ScanOutcome, Scanner};
use crate::state::StateStore;

const DATASET_FILE_NAME: &str = "report.json";

#[derive(Parser)]
#[command(name = "stagewatch")]
#[command(
    author,
    version,
    about = "Reports how long tracker items have been waiting in a pipeline",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./stagewatch.{toml,json,yaml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write the ranked dataset to this file
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan target pipelines and report waiting items
    Scan(ScanArgs),

    /// Delete the persisted state file
    ResetState {
        /// State file location
        #[arg(long)]
        state_path: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct ScanArgs {
    #[arg(short, long, env = "ZENHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    #[arg(long, env = "STAGEWATCH_WEBHOOK_URL", hide_env_values = true)]
    webhook_url: Option<String>,

    /// Workspace ids to scan (repeatable)
    #[arg(short, long = "workspace", conflicts_with = "repositories")]
    workspaces: Vec<String>,

    /// Repositories to scan as owner/name (repeatable)
    #[arg(short, long = "repo")]
    repositories: Vec<String>,

    /// Target pipeline names (repeatable, case-sensitive)
    #[arg(short = 'P', long = "pipeline")]
    pipelines: Vec<String>,

    /// Maximum items fetched across all targets
    #[arg(short, long)]
    limit: Option<usize>,

    /// Drop items whose pipeline entry time cannot be verified
    #[arg(long)]
    strict: bool,

    /// Send an all-clear message when nothing is overdue
    #[arg(long)]
    send_empty_report: bool,

    #[arg(long)]
    review_days: Option<f64>,

    #[arg(long)]
    warning_days: Option<f64>,

    #[arg(long)]
    urgent_days: Option<f64>,

    /// Do not read or write persisted state
    #[arg(long)]
    no_state: bool,

    /// State file location
    #[arg(long)]
    state_path: Option<PathBuf>,
}

impl ScanArgs {
    /// Layers flags and environment values over the file configuration.
    fn apply(&self, config: &mut Config) {
        if let Some(token) = &self.token {
            config.tracker.token = Some(token.clone());
        }
        if let Some(token) = &self.github_token {
            config.github.token = Some(token.clone());
        }
        if let Some(url) = &self.webhook_url {
            config.notify.webhook_url = Some(url.clone());
        }
        if !self.workspaces.is_empty() {
            config.tracker.mode = TargetMode::Workspaces;
            config.tracker.workspace_ids.clone_from(&self.workspaces);
        }
        if !self.repositories.is_empty() {
            config.tracker.mode = TargetMode::Repositories;
            config.tracker.repositories.clone_from(&self.repositories);
        }
        if !self.pipelines.is_empty() {
            config.tracker.pipelines.clone_from(&self.pipelines);
        }
        if let Some(limit) = self.limit {
            config.tracker.max_items = limit;
        }
        if self.strict {
            config.tracker.strict_pipeline_timestamp = true;
        }
        if self.send_empty_report {
            config.notify.send_empty_report = true;
        }
        if let Some(days) = self.review_days {
            config.notify.review_days = days;
        }
        if let Some(days) = self.warning_days {
            config.notify.warning_days = days;
        }
        if let Some(days) = self.urgent_days {
            config.notify.urgent_days = days;
        }
        if self.no_state {
            config.state.enabled = false;
        }
        if let Some(path) = &self.state_path {
            config.state.path = Some(path.clone());
        }
    }
}

fn state_store(enabled: bool, path: Option<PathBuf>) -> Result<StateStore> {
    if !enabled {
        return Ok(StateStore::disabled());
    }
    let path = match path {
        Some(path) => path,
        None => StateStore::default_path()?,
    };
    Ok(StateStore::new(path))
}

/// Default dataset location: next to the state file.
fn dataset_path(config: &Config) -> PathBuf {
    if let Some(path) = &config.output.path {
        return path.clone();
    }

    let state_path = match &config.state.path {
        Some(path) => Some(path.clone()),
        None => StateStore::default_path().ok(),
    };

    state_path
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_default()
        .join(DATASET_FILE_NAME)
}

/// Prints the summary table in summary format and always writes the full
/// ranked dataset, to `destination` or stdout.
fn write_report(
    outcome: &ScanOutcome,
    format: &OutputFormat,
    pretty: bool,
    policy: &AlertPolicy,
    destination: Option<&Path>,
) -> Result<()> {
    if *format == OutputFormat::Summary {
        print_summary(outcome, policy);
    }

    match destination {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output directory: {}", parent.display())
                })?;
            }
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            export_records(&outcome.records, format, pretty, &mut file)?;
            info!(
                "Ranked dataset of {} items written to: {}",
                outcome.records.len(),
                path.display()
            );
        }
        None => export_records(&outcome.records, format, pretty, &mut std::io::stdout().lock())?,
    }

    Ok(())
}

impl Cli {
    async fn execute_scan(&self, args: &ScanArgs) -> Result<()> {
        let mut config = Config::load(self.config.as_deref())?;
        args.apply(&mut config);

        let scanner = Scanner::from_config(&config)?;
        let store = state_store(config.state.enabled, config.state.path.clone())?;

        let outcome = scanner.run(&store, Utc::now()).await?;
        info!(
            "Scan finished: {} items in target pipelines, report sent: {}",
            outcome.records.len(),
            outcome.notified
        );

        let format = self.format.clone().unwrap_or(config.output.format.clone());
        let pretty = self.pretty || config.output.pretty;

        let destination = match (&self.output, &format) {
            (Some(path), _) => Some(path.clone()),
            (None, OutputFormat::Summary) => Some(dataset_path(&config)),
            (None, _) => None,
        };

        write_report(
            &outcome,
            &format,
            pretty,
            &config.notify.alert_policy(),
            destination.as_deref(),
        )
    }

    fn execute_reset_state(&self, state_path: Option<&PathBuf>) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;
        let path = state_path.cloned().or(config.state.path);
        let store = state_store(true, path)?;
        store.clear()?;
        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Scan(args) => self.execute_scan(args).await,
            Commands::ResetState { state_path } => self.execute_reset_state(state_path.as_ref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::{rank, resolve};
    use crate::snapshot::{IssuePipelineSnapshot, IssueState, ItemKind, RepoRef, TimestampSource};
    use chrono::{DateTime, Duration};
    use tempfile::TempDir;

    fn outcome(count: usize) -> ScanOutcome {
        let now: DateTime<Utc> = "2025-01-10T00:00:00Z".parse().unwrap();
        let mut records: Vec<_> = (1..=count as u64)
            .map(|number| {
                let snapshot = IssuePipelineSnapshot {
                    issue_number: number,
                    repo: RepoRef::new("acme", "api"),
                    title: format!("Issue {number}"),
                    assignees: vec!["octocat".to_string()],
                    pipeline: "Review".to_string(),
                    pipeline_entered_at: now - Duration::hours(number as i64),
                    updated_at: now,
                    created_at: now - Duration::days(30),
                    state: IssueState::Open,
                    kind: ItemKind::Issue,
                    timestamp_source: TimestampSource::Tracker,
                };
                resolve(snapshot, now, "https://github.com")
            })
            .collect();
        rank(&mut records);

        ScanOutcome {
            targets: vec!["workspace ws-1".to_string()],
            scanned: count,
            scanned_at: now,
            records,
            notified: false,
        }
    }

    fn policy() -> AlertPolicy {
        AlertPolicy {
            review_days: 1.0,
            warning_days: 2.0,
            urgent_days: 3.0,
            send_empty_report: false,
        }
    }

    #[test]
    fn test_summary_format_writes_full_ranked_dataset() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("report.json");
        let outcome = outcome(25);

        write_report(&outcome, &OutputFormat::Summary, false, &policy(), Some(&path)).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let numbers: Vec<u64> = written
            .as_array()
            .unwrap()
            .iter()
            .map(|record| record["issue_number"].as_u64().unwrap())
            .collect();
        assert_eq!(numbers, (1..=25).rev().collect::<Vec<u64>>());
    }

    #[test]
    fn test_csv_format_writes_every_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.csv");

        write_report(&outcome(3), &OutputFormat::Csv, false, &policy(), Some(&path)).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 4);
    }

    #[test]
    fn test_dataset_path_defaults_next_to_state_file() {
        let mut config = Config::default();
        config.state.path = Some(PathBuf::from("/var/lib/stagewatch/state.json"));
        assert_eq!(
            dataset_path(&config),
            PathBuf::from("/var/lib/stagewatch/report.json")
        );

        config.output.path = Some(PathBuf::from("/tmp/ranked.json"));
        assert_eq!(dataset_path(&config), PathBuf::from("/tmp/ranked.json"));
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("stagewatch").chain(args.iter().copied())).unwrap()
    }

    fn scan_args(cli: Cli) -> ScanArgs {
        match cli.command {
            Commands::Scan(args) => args,
            Commands::ResetState { .. } => panic!("expected scan command"),
        }
    }

    #[test]
    fn test_flags_override_file_config() {
        let cli = parse(&[
            "scan",
            "--token",
            "zh",
            "--repo",
            "acme/api",
            "--pipeline",
            "Review",
            "--pipeline",
            "QA",
            "--limit",
            "25",
            "--strict",
            "--urgent-days",
            "5",
            "--no-state",
        ]);
        let mut config = Config::default();
        scan_args(cli).apply(&mut config);

        assert_eq!(config.tracker.token.as_deref(), Some("zh"));
        assert_eq!(config.tracker.mode, TargetMode::Repositories);
        assert_eq!(config.tracker.repositories, vec!["acme/api"]);
        assert_eq!(config.tracker.pipelines, vec!["Review", "QA"]);
        assert_eq!(config.tracker.max_items, 25);
        assert!(config.tracker.strict_pipeline_timestamp);
        assert!((config.notify.urgent_days - 5.0).abs() < f64::EPSILON);
        assert!(!config.state.enabled);
    }

    #[test]
    fn test_absent_flags_keep_file_config() {
        let cli = parse(&["scan"]);
        let mut config = Config::default();
        config.tracker.pipelines = vec!["Review".to_string()];
        config.tracker.max_items = 7;
        config.notify.send_empty_report = true;

        scan_args(cli).apply(&mut config);

        assert_eq!(config.tracker.pipelines, vec!["Review"]);
        assert_eq!(config.tracker.max_items, 7);
        assert!(config.notify.send_empty_report);
    }

    #[test]
    fn test_workspaces_and_repositories_conflict() {
        let result = Cli::try_parse_from([
            "stagewatch",
            "scan",
            "--workspace",
            "ws-1",
            "--repo",
            "acme/api",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_disabled_state_store_has_no_path() {
        let store = state_store(false, Some(PathBuf::from("/tmp/state.json"))).unwrap();
        assert!(store.path().is_none());
    }
}
