use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "attend")]
#[command(about = "Staff attendance kiosk with a self-correcting clock")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the kiosk configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Optional path to the local attendance database
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the kiosk loop until interrupted
    Run,
    /// Sync the clock and the remote staff/schedule data once
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the attendance table for a date
    Roster {
        /// Date as YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record a clock-in
    ClockIn {
        /// Staff ID
        staff_id: String,
    },
    /// Record a clock-off
    ClockOff {
        /// Staff ID
        staff_id: String,
    },
    /// Manage the kiosk configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}
