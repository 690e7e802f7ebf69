//! End-to-end pipeline tests against real rsync and git.
//!
//! The remote is a local bare repository reached over the `file://`-style
//! path transport, so the push step exercises the real `git push` without
//! needing SSH. Tests skip when the external tools are unavailable.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use autobackup_core::types::RunStatus;
use autobackup_core::Config;
use autobackup_daemon::{Orchestrator, TriggerOutcome};
use autobackup_store::RunStore;

fn tool_available(tool: &str) -> bool {
    Command::new(tool)
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

fn git(repo: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// A working repo tracking a local bare remote, ready to push.
fn repo_with_remote(root: &Path) -> PathBuf {
    let remote = root.join("remote.git");
    fs::create_dir_all(&remote).expect("mkdir remote");
    git(&remote, &["init", "-q", "--bare", "-b", "main"]);

    let repo = root.join("backup-repo");
    fs::create_dir_all(&repo).expect("mkdir repo");
    git(&repo, &["init", "-q", "-b", "main"]);
    git(&repo, &["config", "user.email", "backup@example.invalid"]);
    git(&repo, &["config", "user.name", "autobackup"]);
    git(&repo, &["remote", "add", "origin", remote.to_str().expect("utf8")]);
    fs::write(repo.join("README.md"), "backup repository\n").expect("write");
    git(&repo, &["add", "-A"]);
    git(&repo, &["commit", "-q", "-m", "init"]);
    git(&repo, &["push", "-q", "-u", "origin", "main"]);
    repo
}

fn seed_workspace(root: &Path, marker: &str) {
    fs::create_dir_all(root.join("memory")).expect("mkdir");
    fs::write(root.join("AGENT.md"), marker).expect("write");
    fs::write(root.join("memory/state.json"), "{}").expect("write");
    fs::write(root.join("scratch.log"), "excluded").expect("write");
}

async fn run_to_completion(orchestrator: &Arc<Orchestrator>) -> autobackup_core::BackupRun {
    assert_eq!(orchestrator.trigger(), TriggerOutcome::Accepted);
    for _ in 0..600 {
        if let Some(run) = orchestrator.store().most_recent().expect("query") {
            if run.status != RunStatus::Running {
                return run;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("run never finalized");
}

#[tokio::test(flavor = "multi_thread")]
async fn full_run_mirrors_commits_and_pushes() {
    if !tool_available("git") || !tool_available("rsync") {
        eprintln!("skipping: git or rsync not available");
        return;
    }

    let root = TempDir::new().expect("root");
    let repo = repo_with_remote(root.path());
    let ws = root.path().join("agent-ws");
    seed_workspace(&ws, "agent notes");

    let store = RunStore::open_in_memory().expect("store");
    let orchestrator = Arc::new(Orchestrator::new(
        Config {
            workspaces: format!("agent:{}", ws.display()),
            backup_repo: repo.clone(),
            ssh_key_path: Some(PathBuf::from("/tmp/unused-key")),
            ..Config::default()
        },
        store,
    ));

    let run = run_to_completion(&orchestrator).await;
    assert_eq!(run.status, RunStatus::Success, "error: {}", run.error_message);
    assert!(run.files_changed > 0);
    assert_eq!(run.commit_hash.len(), 40, "full commit hash recorded");
    assert!(run.commit_message.starts_with("Auto backup at "));
    assert!(run.finished_at.is_some());
    assert!(run.duration_ms > 0);

    // The mirrored subset landed under <repo>/<name>-backup.
    assert!(repo.join("agent-backup/AGENT.md").exists());
    assert!(repo.join("agent-backup/memory/state.json").exists());
    assert!(!repo.join("agent-backup/scratch.log").exists());

    // The commit reached the bare remote.
    let remote_head = Command::new("git")
        .args(["rev-parse", "main"])
        .current_dir(root.path().join("remote.git"))
        .output()
        .expect("remote rev-parse");
    assert_eq!(
        String::from_utf8_lossy(&remote_head.stdout).trim(),
        run.commit_hash
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn unchanged_second_run_reports_no_changes() {
    if !tool_available("git") || !tool_available("rsync") {
        eprintln!("skipping: git or rsync not available");
        return;
    }

    let root = TempDir::new().expect("root");
    let repo = repo_with_remote(root.path());
    let ws = root.path().join("agent-ws");
    seed_workspace(&ws, "steady state");

    let store = RunStore::open_in_memory().expect("store");
    let orchestrator = Arc::new(Orchestrator::new(
        Config {
            workspaces: format!("agent:{}", ws.display()),
            backup_repo: repo,
            ssh_key_path: Some(PathBuf::from("/tmp/unused-key")),
            ..Config::default()
        },
        store,
    ));

    let first = run_to_completion(&orchestrator).await;
    assert_eq!(first.status, RunStatus::Success, "error: {}", first.error_message);
    assert!(first.files_changed > 0);

    let second = run_to_completion(&orchestrator).await;
    assert_eq!(second.status, RunStatus::Success, "error: {}", second.error_message);
    assert_eq!(second.files_changed, 0);
    assert_eq!(second.commit_hash, "");
    assert_eq!(second.commit_message, "No changes");
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_workspace_aborts_later_ones_but_keeps_earlier_output() {
    if !tool_available("git") || !tool_available("rsync") {
        eprintln!("skipping: git or rsync not available");
        return;
    }

    let root = TempDir::new().expect("root");
    let repo = repo_with_remote(root.path());
    let good = root.path().join("alpha-ws");
    seed_workspace(&good, "alpha");
    // "bravo" points at a path that does not exist, so its mirror fails;
    // "charlie" sorts after it and must never be attempted.
    let charlie = root.path().join("charlie-ws");
    seed_workspace(&charlie, "charlie");

    let store = RunStore::open_in_memory().expect("store");
    let orchestrator = Arc::new(Orchestrator::new(
        Config {
            workspaces: format!(
                "alpha:{},bravo:{},charlie:{}",
                good.display(),
                root.path().join("missing-ws").display(),
                charlie.display(),
            ),
            backup_repo: repo.clone(),
            ssh_key_path: Some(PathBuf::from("/tmp/unused-key")),
            ..Config::default()
        },
        store,
    ));

    let run = run_to_completion(&orchestrator).await;
    assert_eq!(run.status, RunStatus::Failed);
    assert!(
        run.error_message.contains("bravo"),
        "failure names the broken workspace: {}",
        run.error_message
    );

    // Workspace 1's mutations stand; workspace 3 was never attempted.
    assert!(repo.join("alpha-backup/AGENT.md").exists());
    assert!(!repo.join("charlie-backup").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_ssh_key_fails_the_run_before_any_commit() {
    if !tool_available("git") || !tool_available("rsync") {
        eprintln!("skipping: git or rsync not available");
        return;
    }

    let root = TempDir::new().expect("root");
    let repo = repo_with_remote(root.path());
    let ws = root.path().join("agent-ws");
    seed_workspace(&ws, "unpushable");

    let store = RunStore::open_in_memory().expect("store");
    let orchestrator = Arc::new(Orchestrator::new(
        Config {
            workspaces: format!("agent:{}", ws.display()),
            backup_repo: repo.clone(),
            ssh_key_path: None,
            ..Config::default()
        },
        store,
    ));

    let run = run_to_completion(&orchestrator).await;
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error_message.contains("SSH_KEY_PATH"));

    // Mirroring happened, but nothing was committed.
    assert!(repo.join("agent-backup/AGENT.md").exists());
    let status = Command::new("git")
        .args(["status", "--porcelain"])
        .current_dir(&repo)
        .output()
        .expect("status");
    assert!(
        !String::from_utf8_lossy(&status.stdout).trim().is_empty(),
        "changes remain uncommitted"
    );
}
