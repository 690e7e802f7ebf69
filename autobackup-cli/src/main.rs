//! Autobackup — workspace backup daemon CLI.
//!
//! # Usage
//!
//! ```text
//! autobackup daemon run
//! autobackup daemon stop
//! autobackup status [--json]
//! autobackup runs [--page N] [--page-size N] [--json]
//! autobackup trigger
//! ```
//!
//! Every command except `daemon run` talks to a running daemon over its Unix
//! socket; the socket path comes from the same environment configuration the
//! daemon reads (`AUTOBACKUP_SOCKET`, defaulting next to `DATABASE_URL`).

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{daemon::DaemonCommand, runs::RunsArgs, status::StatusArgs, trigger::TriggerArgs};

#[derive(Parser, Debug)]
#[command(
    name = "autobackup",
    version,
    about = "Mirror agent workspaces into a git-backed backup repository",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage the backup daemon process.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },

    /// Show guard state, last run, and workspace modification times.
    Status(StatusArgs),

    /// List recorded backup runs, most recent first.
    Runs(RunsArgs),

    /// Ask the daemon to start a backup run now.
    Trigger(TriggerArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Daemon { command } => commands::daemon::run(command),
        Commands::Status(args) => args.run(),
        Commands::Runs(args) => args.run(),
        Commands::Trigger(args) => args.run(),
    }
}
