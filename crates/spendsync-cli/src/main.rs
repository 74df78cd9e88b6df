//! Spendsync CLI - record expenses offline and reconcile them later
//!
//! Every command opens the local queue, routes through the sync engine and
//! exits.

mod cli;
mod commands;
mod error;


use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::categories::run_categories;
use crate::commands::common::AppPaths;
use crate::commands::offline::run_offline;
use crate::commands::pending::run_pending;
use crate::commands::add::run_add;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "spendsync=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let paths = AppPaths::resolve(cli.db_path, cli.config)?;

    match cli.command {
        Some(Commands::Status { json }) => run_status(json, &paths).await?,
        Some(Commands::Add {
            name,
            amount,
            category,
            date,
            public,
        }) => {
            run_add(&name, &amount, &category, date.as_deref(), public, &paths).await?;
        }
        Some(Commands::Pending { json }) => run_pending(json, &paths).await?,
        Some(Commands::Sync { json }) => run_sync(json, &paths).await?,
        Some(Commands::Categories { command }) => run_categories(command, &paths).await?,
        Some(Commands::Offline { mode }) => run_offline(mode, &paths).await?,
        Some(Commands::Auth { command }) => run_auth(command, &paths).await?,
        None => {
            Cli::command().print_help().map_err(CliError::Io)?;
            println!();
        }
    }

    Ok(())
}
