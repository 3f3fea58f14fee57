mod camelot;
mod candidates;
mod cli;
mod config;
mod db;
mod error;
mod genre;
mod index;
mod normalize;
mod ranking;
mod scoring;
mod session;
mod store;
mod tags;
mod tools;
mod types;

use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "MIXWHEEL_LOG";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the MCP transport; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV)
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    cli::main().await
}
