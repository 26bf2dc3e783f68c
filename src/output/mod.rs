mod exports;
pub mod message;
mod progress;
mod styling;
mod summary;
mod tables;

pub use exports::export_records;
pub use progress::PhaseProgress;
pub use styling::{dim, magenta_bold};
pub use summary::print_summary;

/// Prints the `stagewatch` banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("⏳ stagewatch"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Review pipeline deadline reporter")
    );
}
