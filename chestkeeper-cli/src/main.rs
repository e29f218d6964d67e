//! Chestkeeper: retention daemon for rotating `chest_*_*.log` files.
//!
//! # Usage
//!
//! ```text
//! chestkeeper run [--config <file>] [--dir <path>] [--interval <secs>]
//!                 [--lower <n>] [--upper <n>] [--archive <path>] [--cadence parity|single]
//! chestkeeper stop
//! chestkeeper cleanup
//! chestkeeper status [--json]
//! chestkeeper config [overrides…]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config::ConfigArgs, run::RunArgs, status::StatusArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "chestkeeper",
    version,
    about = "Keep a directory of rotating chest logs within bounds",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the retention daemon in the foreground until stopped.
    Run(RunArgs),

    /// Ask a running daemon to finish (terminal sweep, then exit).
    Stop,

    /// Ask a running daemon to empty the watched directory at its next tick.
    Cleanup,

    /// Show the state of a running daemon.
    Status(StatusArgs),

    /// Print the effective, validated configuration as YAML.
    Config(ConfigArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Stop => commands::control::stop(),
        Commands::Cleanup => commands::control::cleanup(),
        Commands::Status(args) => args.run(),
        Commands::Config(args) => args.run(),
    }
}
