use std::fmt::Write;

use comfy_table::{Cell, Color as TableColor};

use super::message::AlertPolicy;
use super::styling::{bright, bright_green, bright_yellow, cyan, dim, severity_colored};
use super::tables::{create_cyan_header, create_table, severity_coded_cell};
use crate::scan::ScanOutcome;

const MAX_ROWS: usize = 20;

/// Prints a human-readable summary of the scan to stdout.
///
/// Displays:
/// - Overview: targets, item counts, overdue count, scan time
/// - Waiting Items: ranked items with time in pipeline, color-coded by severity
///
/// Color coding follows the alert thresholds:
/// - Green: below the warning threshold
/// - Yellow: between warning and urgent
/// - Red: at or above urgent
pub fn print_summary(outcome: &ScanOutcome, policy: &AlertPolicy) {
    println!("{}", render_summary(outcome, policy));
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

fn render_summary(outcome: &ScanOutcome, policy: &AlertPolicy) -> String {
    let mut output = String::new();
    let overdue_records = policy.overdue(&outcome.records);
    let overdue = overdue_records.len();
    let verified = outcome
        .records
        .iter()
        .filter(|r| r.snapshot.timestamp_source.is_direct())
        .count();

    add_section_header(&mut output, "📊", "Overview");

    let overdue_display = match overdue_records.iter().map(|r| policy.severity(r)).max() {
        Some(worst) => severity_colored(overdue, worst),
        None => bright_green(overdue),
    };

    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n",
        dim("Targets:"),
        cyan(outcome.targets.join(", ")),
        dim("Items scanned:"),
        bright_yellow(outcome.scanned),
        dim("Items in target pipelines:"),
        bright_yellow(outcome.records.len()),
        dim("Past review deadline:"),
        overdue_display,
        dim("Verified entry times:"),
        bright_yellow(format!("{verified}/{}", outcome.records.len())),
        dim("Scan date:"),
        dim(outcome.scanned_at.format("%Y-%m-%d %H:%M UTC"))
    );

    if outcome.records.is_empty() {
        let _ = writeln!(output, "{}", bright_yellow("No items found in target pipelines."));
        return output;
    }

    add_section_header(&mut output, "⏳", "Waiting Items");

    let mut table = create_table();
    table.set_header(create_cyan_header(&[
        "Item", "Title", "Pipeline", "Waiting", "Assignees", "Type", "Source",
    ]));

    for record in outcome.records.iter().take(MAX_ROWS) {
        let snapshot = &record.snapshot;
        table.add_row(vec![
            Cell::new(snapshot.key()),
            Cell::new(&snapshot.title),
            Cell::new(&snapshot.pipeline),
            severity_coded_cell(&record.duration_human, policy.severity(record)),
            Cell::new(&record.assignee_display),
            Cell::new(format!("{} ({})", record.type_label, record.draft_label)),
            Cell::new(format!("{:?}", snapshot.timestamp_source)).fg(TableColor::DarkGrey),
        ]);
    }

    if outcome.records.len() > MAX_ROWS {
        let mut row = vec![Cell::new(format!(
            "... and {} more",
            outcome.records.len() - MAX_ROWS
        ))
        .fg(TableColor::DarkGrey)];
        row.extend(vec![Cell::new(""); 6]);
        table.add_row(row);
    }

    let _ = writeln!(output, "{table}");

    output
}
