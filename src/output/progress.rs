use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright, bright_green, bright_yellow};

/// Progress tracking for the three scan phases
pub struct PhaseProgress {
    pb: ProgressBar,
}

impl PhaseProgress {
    pub fn start_phase_1(limit: usize) -> Self {
        eprintln!("{}  {}", bright("⚙️"), bright("Phases").underlined());
        let pb = create_spinner(
            bright_yellow(format!("Phase 1/3: Fetching items (limit: {limit})")).to_string(),
        );
        Self { pb }
    }

    pub fn finish_phase_1_start_phase_2(self, item_count: usize) -> Self {
        self.pb.finish_with_message(
            bright_green(format!("Phase 1/3: Fetched {item_count} items ✓")).to_string(),
        );
        let pb = create_spinner(
            bright_yellow("Phase 2/3: Resolving pipeline durations").to_string(),
        );
        Self { pb }
    }

    pub fn finish_phase_2_start_phase_3(self, record_count: usize) -> Self {
        self.pb.finish_with_message(
            bright_green(format!("Phase 2/3: Resolved {record_count} items in target pipelines ✓"))
                .to_string(),
        );
        let pb = create_spinner(bright_yellow("Phase 3/3: Reporting").to_string());
        Self { pb }
    }

    pub fn finish_phase_3(self) {
        self.pb
            .finish_with_message(bright_green("Phase 3/3: Report complete ✓").to_string());
        eprintln!();
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    if let Ok(style) = ProgressStyle::default_spinner().template("  {msg} {spinner}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
