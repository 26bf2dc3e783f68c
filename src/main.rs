mod auth;
mod cli;
mod config;
mod duration;
mod error;
mod http;
mod mapper;
mod notify;
mod output;
mod providers;
mod scan;
mod snapshot;
mod state;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting stagewatch - pipeline deadline reporter");
    cli.execute().await?;

    Ok(())
}
