//! SyncWarden: supervise a Syncthing daemon and report what matters.
//!
//! # Usage
//!
//! ```text
//! syncwarden run [--program P] [--events FILE|-] [--auto-confirm-kill] [--json] [-- ARGS...]
//! syncwarden replay <FILE|-> [--notify KIND,...] [--json]
//! syncwarden config show|init|path
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config::ConfigCommand, replay::ReplayArgs, run::RunArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "syncwarden",
    version,
    about = "Supervise a Syncthing daemon and turn its events into notifications",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Launch the daemon in the foreground and print notifications.
    Run(RunArgs),

    /// Feed a recorded event stream through the notifier and print the result.
    Replay(ReplayArgs),

    /// Inspect or create ~/.syncwarden/config.yaml.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => args.run(),
        Commands::Replay(args) => args.run(),
        Commands::Config { command } => commands::config::run(command),
    }
}
