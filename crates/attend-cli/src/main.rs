//! Attend CLI - headless kiosk runner and operator commands

mod cli;
mod commands;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::clock::{run_clock_in, run_clock_off};
use crate::commands::common::load_config;
use crate::commands::config::run_config;
use crate::commands::roster::run_roster;
use crate::commands::run::run_kiosk;
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

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("attend=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    if let Commands::Config { command } = cli.command {
        return run_config(command, cli.config.as_deref());
    }

    let config = load_config(cli.config.as_deref(), cli.db_path)?;
    match cli.command {
        Commands::Run => run_kiosk(&config).await,
        Commands::Sync { json } => run_sync(&config, json).await,
        Commands::Roster { date, json } => run_roster(&config, date.as_deref(), json).await,
        Commands::ClockIn { staff_id } => run_clock_in(&config, &staff_id).await,
        Commands::ClockOff { staff_id } => run_clock_off(&config, &staff_id).await,
        Commands::Config { .. } => Ok(()),
    }
}
