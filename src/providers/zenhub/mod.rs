mod client;
mod types;

pub use client::ZenHubClient;
pub use types::{PipelineTransfer, TrackerIssue};
