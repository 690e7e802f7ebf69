//! `autobackup daemon` — daemon process lifecycle.

use anyhow::{Context, Result};
use clap::Subcommand;

use autobackup_core::Config;
use autobackup_daemon::{protocol, runtime, DaemonError};

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground (scheduler + socket server).
    Run,
    /// Request graceful daemon shutdown over the Unix socket.
    Stop,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let config = Config::from_env();

    match command {
        DaemonCommand::Run => {
            runtime::start_blocking(config).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match protocol::request_stop(&config.socket_path) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
    }

    Ok(())
}
