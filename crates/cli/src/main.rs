//! `knigi`: bookstore inventory command line.
//!
//! Wires configuration, logging and the SQLite repository, then runs one
//! command against it.

use anyhow::{Context, Result};
use clap::Parser;

use knigi_infra::{AppConfig, SqliteRepository};

mod commands;

use commands::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(url) = cli.database_url.clone() {
        config.database_url = url;
    }

    knigi_observability::init(config.log_format);

    let repo = SqliteRepository::connect(&config.database_url)
        .with_context(|| format!("failed to open database at {}", config.database_url))?;

    let stdout = std::io::stdout();
    commands::run(cli.command, &repo, &mut stdout.lock())
}
