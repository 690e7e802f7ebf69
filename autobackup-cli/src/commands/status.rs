//! `autobackup status` — guard state, last run, workspace freshness.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use autobackup_core::Config;
use autobackup_daemon::{protocol, DaemonError};

/// Arguments for `autobackup status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let config = Config::from_env();

        let status = match protocol::request_status(&config.socket_path) {
            Ok(status) => status,
            Err(DaemonError::DaemonNotRunning { socket }) => {
                if self.json {
                    println!(
                        "{}",
                        serde_json::json!({
                            "daemon_running": false,
                            "socket": socket.display().to_string(),
                        })
                    );
                } else {
                    println!("{} (socket: {})", "daemon is not running".red(), socket.display());
                }
                return Ok(());
            }
            Err(err) => return Err(err).context("failed to query daemon status"),
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&status).context("failed to render status JSON")?
            );
            return Ok(());
        }

        print_human(&status);
        Ok(())
    }
}

fn print_human(status: &serde_json::Value) {
    if status["is_running"].as_bool().unwrap_or(false) {
        println!("backup: {}", "running".yellow());
    } else {
        println!("backup: {}", "idle".green());
    }

    match &status["last_run"] {
        serde_json::Value::Null => println!("last run: none recorded"),
        run => {
            let state = run["status"].as_str().unwrap_or("?");
            let colored_state = match state {
                "success" => state.green(),
                "failed" => state.red(),
                _ => state.yellow(),
            };
            println!(
                "last run: {} at {} ({} files, {} ms)",
                colored_state,
                run["started_at"].as_str().unwrap_or("?"),
                run["files_changed"],
                run["duration_ms"],
            );
            if state == "failed" {
                if let Some(message) = run["error_message"].as_str() {
                    println!("  error: {message}");
                }
            }
        }
    }

    if let Some(workspaces) = status["workspaces"].as_object() {
        if workspaces.is_empty() {
            println!("workspaces: none configured");
        }
        for (name, entry) in workspaces {
            let mod_time = entry["mod_time"].as_str().unwrap_or("never");
            println!(
                "workspace {}: {} (last modified {})",
                name.bold(),
                entry["path"].as_str().unwrap_or("?"),
                mod_time,
            );
        }
    }
}
