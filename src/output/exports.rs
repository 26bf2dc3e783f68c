use anyhow::Result;
use std::io::Write;

use crate::config::OutputFormat;
use crate::duration::IssueDurationRecord;

/// Exports the ranked dataset.
///
/// - JSON: every record with all snapshot fields, for programmatic access
/// - CSV: one row per record, for spreadsheets
/// - Summary: rendered separately by [`super::print_summary`]
pub fn export_records(
    records: &[IssueDurationRecord],
    format: &OutputFormat,
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Summary | OutputFormat::Json => export_json(records, pretty, output),
        OutputFormat::Csv => export_csv(records, output),
    }
}

fn export_json(records: &[IssueDurationRecord], pretty: bool, output: &mut dyn Write) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(records)?
    } else {
        serde_json::to_string(records)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}

fn export_csv(records: &[IssueDurationRecord], output: &mut dyn Write) -> Result<()> {
    writeln!(
        output,
        "Key,Title,Pipeline,Entered At,Timestamp Source,Duration Hours,Duration,Assignees,Type,Draft,URL"
    )?;

    for record in records {
        let snapshot = &record.snapshot;
        writeln!(
            output,
            "{},{},{},{},{:?},{:.2},{},{},{},{},{}",
            csv_field(&snapshot.key()),
            csv_field(&snapshot.title),
            csv_field(&snapshot.pipeline),
            snapshot.pipeline_entered_at.to_rfc3339(),
            snapshot.timestamp_source,
            record.duration_hours,
            record.duration_human,
            csv_field(&record.assignee_display),
            record.type_label,
            record.draft_label,
            record.url
        )?;
    }

    Ok(())
}

fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::resolve;
    use crate::snapshot::{
        IssuePipelineSnapshot, IssueState, ItemKind, RepoRef, TimestampSource,
    };
    use chrono::{DateTime, Utc};

    fn record() -> IssueDurationRecord {
        let now: DateTime<Utc> = "2025-01-05T15:00:00Z".parse().unwrap();
        resolve(
            IssuePipelineSnapshot {
                issue_number: 12,
                repo: RepoRef::new("acme", "api"),
                title: "Fix \"quoted\" title".to_string(),
                assignees: vec!["octocat".to_string()],
                pipeline: "Review".to_string(),
                pipeline_entered_at: "2025-01-04T10:00:00Z".parse().unwrap(),
                updated_at: now,
                created_at: "2025-01-01T00:00:00Z".parse().unwrap(),
                state: IssueState::Open,
                kind: ItemKind::Issue,
                timestamp_source: TimestampSource::Tracker,
            },
            now,
            "https://github.com",
        )
    }

    #[test]
    fn test_export_json_is_array_of_records() {
        let mut buffer = Vec::new();
        export_records(&[record()], &OutputFormat::Json, false, &mut buffer).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value[0]["issue_number"], 12);
        assert_eq!(value[0]["duration_human"], "1d 5h 0m");
        assert_eq!(value[0]["kind"], "issue");
    }

    #[test]
    fn test_export_csv_escapes_quotes() {
        let mut buffer = Vec::new();
        export_records(&[record()], &OutputFormat::Csv, false, &mut buffer).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Key,Title"));
        assert!(lines[1].contains("\"Fix \"\"quoted\"\" title\""));
        assert!(lines[1].contains("29.00"));
    }
}
