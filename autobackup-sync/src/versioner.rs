//! Repository versioning — the commit-and-push pipeline.
//!
//! Stages run in order: status, add, commit, rev-parse, push. The first
//! failing stage aborts the rest; a commit that lands locally but fails to
//! push stays in place, with only the push stage reported as failed.

use std::path::Path;
use std::process::Command;

use chrono::Local;

use crate::error::SyncError;
use crate::mirror::combined_output;

/// Result of one versioning pass over the backup repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionOutcome {
    /// Number of lines in `git status --porcelain` output. A line count, not
    /// an exact file count: renames and other multi-entry statuses can count
    /// more than once. Kept as-is; the record is informational.
    pub files_changed: u64,
    /// Full hash of the pushed commit; empty when nothing changed.
    pub commit_hash: String,
    /// Commit message, or `"No changes"` on the clean path.
    pub commit_message: String,
}

impl VersionOutcome {
    fn no_changes() -> Self {
        Self {
            files_changed: 0,
            commit_hash: String::new(),
            commit_message: "No changes".to_owned(),
        }
    }
}

/// Detect, commit, and push uncommitted changes in `repo`.
///
/// A clean working tree is a success path: returns [`VersionOutcome`] with
/// zero files and no commit, and never touches the remote.
///
/// The push authenticates with `ssh_key` and accepts the remote host key
/// without prompting (`StrictHostKeyChecking=no`). That is a deliberate
/// trust decision so unattended runs never hang on confirmation, not a
/// security recommendation.
pub fn commit_and_push(repo: &Path, ssh_key: Option<&Path>) -> Result<VersionOutcome, SyncError> {
    // Refuse before touching any git state.
    let ssh_key = ssh_key.ok_or(SyncError::MissingSshKey)?;

    let status = run_git(repo, "status", &["status", "--porcelain"], None)?;
    let changes = status.trim();
    if changes.is_empty() {
        tracing::info!(repo = %repo.display(), "no changes to commit");
        return Ok(VersionOutcome::no_changes());
    }
    let files_changed = count_status_lines(changes);

    run_git(repo, "add", &["add", "-A"], None)?;

    let commit_message = format!("Auto backup at {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    run_git(repo, "commit", &["commit", "-m", &commit_message], None)?;

    let commit_hash = run_git(repo, "rev-parse", &["rev-parse", "HEAD"], None)?
        .trim()
        .to_owned();

    let ssh_command = push_ssh_command(ssh_key);
    run_git(repo, "push", &["push"], Some(&ssh_command))?;

    tracing::info!(
        repo = %repo.display(),
        files_changed,
        commit = %commit_hash,
        "backup commit pushed",
    );

    Ok(VersionOutcome {
        files_changed,
        commit_hash,
        commit_message,
    })
}

/// Git word-splits `GIT_SSH_COMMAND`, so the key path is quoted to
/// survive spaces.
pub(crate) fn push_ssh_command(key: &Path) -> String {
    format!("ssh -i '{}' -o StrictHostKeyChecking=no", key.display())
}

/// Approximate changed-file count: one per porcelain status line.
pub(crate) fn count_status_lines(changes: &str) -> u64 {
    changes.lines().count() as u64
}

fn run_git(
    repo: &Path,
    stage: &'static str,
    args: &[&str],
    ssh_command: Option<&str>,
) -> Result<String, SyncError> {
    let mut cmd = Command::new("git");
    cmd.args(args).current_dir(repo);
    if let Some(ssh) = ssh_command {
        cmd.env("GIT_SSH_COMMAND", ssh);
    }

    let output = cmd.output().map_err(|source| SyncError::Spawn {
        tool: "git",
        source,
    })?;

    if !output.status.success() {
        return Err(SyncError::VersioningFailed {
            stage,
            status: output.status,
            output: combined_output(&output),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
