//! Tunesync - cross-service playlist synchronization.
//!
//! Keeps playlists mirrored across streaming services by maintaining a
//! canonical copy in SQLite and reconciling it against each linked service's
//! current state. All functionality is exposed via CLI subcommands.

pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod links;
pub mod model;
pub mod resolver;
pub mod services;
pub mod sync;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("tunesync=info".parse()?))
        .init();

    cli::run_command(args).await
}
