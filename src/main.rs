//! packrat CLI entrypoint

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use packrat::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("packrat=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    Cli::parse().execute().await
}
