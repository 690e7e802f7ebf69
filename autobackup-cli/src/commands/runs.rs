//! `autobackup runs` — paged run history.

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use autobackup_core::Config;
use autobackup_daemon::protocol;

/// Arguments for `autobackup runs`.
#[derive(Args, Debug)]
pub struct RunsArgs {
    /// Page number, starting at 1.
    #[arg(long)]
    pub page: Option<u64>,

    /// Rows per page (server clamps to 1..=100).
    #[arg(long)]
    pub page_size: Option<u64>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct RunRow {
    #[tabled(rename = "started")]
    started: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "files")]
    files: u64,
    #[tabled(rename = "commit")]
    commit: String,
    #[tabled(rename = "duration")]
    duration: String,
    #[tabled(rename = "detail")]
    detail: String,
}

impl RunsArgs {
    pub fn run(self) -> Result<()> {
        let config = Config::from_env();
        let payload = protocol::request_runs(&config.socket_path, self.page, self.page_size)
            .context("failed to query run history")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to render runs JSON")?
            );
            return Ok(());
        }

        let runs = payload["runs"].as_array().cloned().unwrap_or_default();
        if runs.is_empty() {
            println!("no runs recorded");
            return Ok(());
        }

        let rows: Vec<RunRow> = runs.iter().map(to_row).collect();
        let mut table = Table::new(rows);
        table.with(Style::sharp());
        println!("{table}");
        println!(
            "page {} of {} total runs",
            payload["page"], payload["total"]
        );
        Ok(())
    }
}

fn to_row(run: &serde_json::Value) -> RunRow {
    let status = run["status"].as_str().unwrap_or("?").to_owned();
    let detail = if status == "failed" {
        run["error_message"].as_str().unwrap_or("").to_owned()
    } else {
        run["commit_message"].as_str().unwrap_or("").to_owned()
    };
    let commit = run["commit_hash"].as_str().unwrap_or("");
    let commit = if commit.len() > 7 { &commit[..7] } else { commit };

    RunRow {
        started: run["started_at"].as_str().unwrap_or("?").to_owned(),
        status,
        files: run["files_changed"].as_u64().unwrap_or(0),
        commit: commit.to_owned(),
        duration: format!("{} ms", run["duration_ms"].as_u64().unwrap_or(0)),
        detail,
    }
}
