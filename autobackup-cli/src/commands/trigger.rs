//! `autobackup trigger` — request an on-demand backup run.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use autobackup_core::Config;
use autobackup_daemon::{protocol, DaemonError};

/// Arguments for `autobackup trigger`.
#[derive(Args, Debug)]
pub struct TriggerArgs {}

impl TriggerArgs {
    pub fn run(self) -> Result<()> {
        let config = Config::from_env();

        match protocol::request_trigger(&config.socket_path) {
            Ok(_) => {
                println!("{}", "backup run accepted".green());
                println!("outcome will appear in `autobackup runs` when the run finishes");
                Ok(())
            }
            // A conflict is an expected answer, not a failure of this command.
            Err(DaemonError::Protocol(message)) if message.contains("already running") => {
                println!("{}", "backup is already running".yellow());
                Ok(())
            }
            Err(err @ DaemonError::DaemonNotRunning { .. }) => {
                Err(err).context("cannot trigger a backup")
            }
            Err(err) => Err(err).context("trigger request failed"),
        }
    }
}
