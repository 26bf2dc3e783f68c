//! Elapsed time in the current pipeline for resolved snapshots.
//!
//! Durations are not clamped: a future entry time (clock skew) yields a
//! negative duration, which is kept and logged.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::providers::github::links::item_url;
use crate::snapshot::IssuePipelineSnapshot;

const MS_PER_MINUTE: i64 = 60_000;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// A snapshot plus everything derived from its elapsed time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueDurationRecord {
    #[serde(flatten)]
    pub snapshot: IssuePipelineSnapshot,
    pub duration_ms: i64,
    pub duration_minutes: i64,
    pub duration_hours: f64,
    pub duration_human: String,
    pub assignee_display: String,
    pub type_label: String,
    pub draft_label: String,
    pub url: String,
}

impl IssueDurationRecord {
    /// Elapsed time in days, used for deadline and severity checks.
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_days(&self) -> f64 {
        self.duration_ms as f64 / MS_PER_DAY as f64
    }
}

/// Derives the duration record of one snapshot.
pub fn resolve(snapshot: IssuePipelineSnapshot, now: DateTime<Utc>, web_url: &str) -> IssueDurationRecord {
    let duration_ms = (now - snapshot.pipeline_entered_at).num_milliseconds();
    if duration_ms < 0 {
        warn!(
            "{} entered '{}' after scan time ({}), duration is negative",
            snapshot.key(),
            snapshot.pipeline,
            snapshot.pipeline_entered_at
        );
    }

    let assignee_display = if snapshot.assignees.is_empty() {
        "Unassigned".to_string()
    } else {
        snapshot
            .assignees
            .iter()
            .map(|login| format!("@{login}"))
            .collect::<Vec<_>>()
            .join(", ")
    };

    IssueDurationRecord {
        duration_ms,
        duration_minutes: duration_ms.div_euclid(MS_PER_MINUTE),
        duration_hours: round_hours(duration_ms),
        duration_human: human_duration(duration_ms),
        assignee_display,
        type_label: snapshot.kind.type_label().to_string(),
        draft_label: snapshot.kind.draft_label().to_string(),
        url: item_url(web_url, &snapshot.repo, snapshot.issue_number, snapshot.kind),
        snapshot,
    }
}

/// Resolves every snapshot and ranks the result longest-waiting first.
pub fn resolve_all<'a, I>(
    snapshots: Vec<IssuePipelineSnapshot>,
    now: DateTime<Utc>,
    target_pipelines: I,
    web_url: &str,
) -> Vec<IssueDurationRecord>
where
    I: IntoIterator<Item = &'a String>,
{
    let targets = target_pipelines
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>();
    debug!(
        "Resolving {} snapshots in pipelines [{}]",
        snapshots.len(),
        targets.join(", ")
    );

    let mut records = snapshots
        .into_iter()
        .map(|snapshot| resolve(snapshot, now, web_url))
        .collect::<Vec<_>>();
    rank(&mut records);
    records
}

/// Stable sort by duration, descending. Ties keep encounter order.
pub fn rank(records: &mut [IssueDurationRecord]) {
    records.sort_by(|a, b| b.duration_ms.cmp(&a.duration_ms));
}

/// Formats milliseconds as `{d}d {h}h {m}m`, dropping leading zero units.
///
/// Minutes are always shown; negative input keeps its sign (`-5m`).
pub fn human_duration(ms: i64) -> String {
    if ms < 0 {
        return format!("-{}", human_duration(ms.saturating_neg()));
    }

    let days = ms / MS_PER_DAY;
    let hours = (ms % MS_PER_DAY) / MS_PER_HOUR;
    let minutes = (ms % MS_PER_HOUR) / MS_PER_MINUTE;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

#[allow(clippy::cast_precision_loss)]
fn round_hours(ms: i64) -> f64 {
    (ms as f64 / MS_PER_HOUR as f64 * 100.0).round() / 100.0
}
