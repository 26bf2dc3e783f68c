use std::fmt::Write;

use crate::duration::IssueDurationRecord;

pub const ALL_CLEAR_MARKER: &str = "All clear";

/// How far past the deadline an item is, least severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Normal,
    Warning,
    Urgent,
}

impl Severity {
    pub fn classify(days: f64, warning_days: f64, urgent_days: f64) -> Self {
        if days >= urgent_days {
            Self::Urgent
        } else if days >= warning_days {
            Self::Warning
        } else {
            Self::Normal
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            Self::Normal => "🟢",
            Self::Warning => "🟡",
            Self::Urgent => "🔴",
        }
    }
}

/// Thresholds and switches for the webhook alert.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertPolicy {
    pub review_days: f64,
    pub warning_days: f64,
    pub urgent_days: f64,
    pub send_empty_report: bool,
}

impl AlertPolicy {
    /// Assigned issues (not pull requests) past the review deadline.
    pub fn overdue<'a>(&self, records: &'a [IssueDurationRecord]) -> Vec<&'a IssueDurationRecord> {
        records
            .iter()
            .filter(|r| !r.snapshot.kind.is_pull_request())
            .filter(|r| !r.snapshot.assignees.is_empty())
            .filter(|r| r.duration_days() > self.review_days)
            .collect()
    }

    pub fn severity(&self, record: &IssueDurationRecord) -> Severity {
        Severity::classify(record.duration_days(), self.warning_days, self.urgent_days)
    }
}

/// Composes the alert text for ranked records.
///
/// Returns `None` when nothing is overdue and empty reports are disabled.
pub fn compose_alert(records: &[IssueDurationRecord], policy: &AlertPolicy) -> Option<String> {
    let overdue = policy.overdue(records);

    if overdue.is_empty() {
        return policy.send_empty_report.then(|| {
            format!(
                "✅ {ALL_CLEAR_MARKER}: no items waiting more than {} day(s) in review.",
                policy.review_days
            )
        });
    }

    let mut message = format!(
        "⏰ Review deadline report: {} item(s) waiting more than {} day(s)\n",
        overdue.len(),
        policy.review_days
    );

    for record in overdue {
        let snapshot = &record.snapshot;
        let _ = write!(
            message,
            "\n{} {} {}\n    {} in {} · {}\n    {}\n",
            policy.severity(record).marker(),
            snapshot.key(),
            snapshot.title,
            record.duration_human,
            snapshot.pipeline,
            record.assignee_display,
            record.url
        );
    }

    Some(message)
}
