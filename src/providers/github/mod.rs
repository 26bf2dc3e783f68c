mod client;
pub mod links;
mod types;


pub use client::GitHubClient;
