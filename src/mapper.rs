//! Converts raw tracker items into [`IssuePipelineSnapshot`]s.
//!
//! The pipeline entry time is resolved in priority order:
//! 1. the tracker's direct latest-transfer time, or the most recent transfer
//!    event into the current pipeline;
//! 2. the previous run's snapshot, if the item is still in the same pipeline;
//! 3. the scan time itself.
//!
//! In strict mode only rule 1 is accepted and unresolved items are dropped.

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use log::{debug, warn};

use crate::providers::zenhub::{PipelineTransfer, TrackerIssue};
use crate::snapshot::{issue_key, IssuePipelineSnapshot, ItemKind, TimestampSource};

/// Everything known about one item when building its snapshot.
#[derive(Debug, Clone, Copy)]
pub struct MappingInput<'a> {
    pub raw: &'a TrackerIssue,
    /// Transfer history, when it had to be fetched
    pub history: Option<&'a [PipelineTransfer]>,
    /// Draft status from source control (pull requests only)
    pub draft: Option<bool>,
    /// Snapshot of the same item from the previous run
    pub previous: Option<&'a IssuePipelineSnapshot>,
}

pub struct SnapshotMapper {
    target_pipelines: IndexSet<String>,
    strict: bool,
}

impl SnapshotMapper {
    pub fn new<I>(target_pipelines: I, strict: bool) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            target_pipelines: target_pipelines.into_iter().collect(),
            strict,
        }
    }

    pub fn target_pipelines(&self) -> &IndexSet<String> {
        &self.target_pipelines
    }

    /// Whether the item's current pipeline is one of the targets (exact match).
    pub fn in_scope(&self, raw: &TrackerIssue) -> bool {
        raw.pipeline
            .as_ref()
            .is_some_and(|pipeline| self.target_pipelines.contains(pipeline))
    }

    /// Whether the tracker's own field is insufficient and history is worth fetching.
    pub fn needs_history(raw: &TrackerIssue) -> bool {
        raw.latest_transfer_time
            .as_deref()
            .and_then(parse_timestamp)
            .is_none()
    }

    /// Resolves the entry time from upstream data only.
    pub fn direct_entry_time(
        raw: &TrackerIssue,
        history: Option<&[PipelineTransfer]>,
    ) -> Option<(DateTime<Utc>, TimestampSource)> {
        let key = issue_key(&raw.repo, raw.number);

        if let Some(value) = raw.latest_transfer_time.as_deref() {
            match parse_timestamp(value) {
                Some(ts) => return Some((ts, TimestampSource::Tracker)),
                None => warn!("Ignoring malformed transfer time '{value}' for {key}"),
            }
        }

        let current = raw.pipeline.as_deref()?;
        history?
            .iter()
            .filter(|transfer| transfer.to_pipeline == current)
            .filter_map(|transfer| {
                let parsed = parse_timestamp(&transfer.occurred_at);
                if parsed.is_none() {
                    warn!(
                        "Ignoring malformed transfer event time '{}' for {key}",
                        transfer.occurred_at
                    );
                }
                parsed
            })
            .max()
            .map(|ts| (ts, TimestampSource::History))
    }

    /// Builds the snapshot for one item, or `None` when it is out of scope or
    /// (in strict mode) has no directly verifiable entry time.
    pub fn map(&self, input: MappingInput<'_>, now: DateTime<Utc>) -> Option<IssuePipelineSnapshot> {
        let raw = input.raw;
        if !self.in_scope(raw) {
            return None;
        }
        let pipeline = raw.pipeline.clone()?;
        let key = issue_key(&raw.repo, raw.number);

        let (pipeline_entered_at, timestamp_source) =
            match Self::direct_entry_time(raw, input.history) {
                Some(resolved) => resolved,
                None if self.strict => {
                    debug!("Dropping {key}: no direct pipeline timestamp in strict mode");
                    return None;
                }
                None => match input.previous.filter(|prev| prev.pipeline == pipeline) {
                    Some(prev) => (prev.pipeline_entered_at, TimestampSource::Persisted),
                    None => (now, TimestampSource::FallbackNow),
                },
            };

        debug!("Resolved {key} entered '{pipeline}' at {pipeline_entered_at} ({timestamp_source:?})");

        let kind = if raw.is_pull_request {
            ItemKind::PullRequest { draft: input.draft }
        } else {
            ItemKind::Issue
        };

        Some(IssuePipelineSnapshot {
            issue_number: raw.number,
            repo: raw.repo.clone(),
            title: raw.title.clone(),
            assignees: raw.assignees.clone(),
            pipeline,
            pipeline_entered_at,
            updated_at: now,
            created_at: raw.created_at,
            state: raw.state,
            kind,
            timestamp_source,
        })
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
