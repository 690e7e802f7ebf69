//! Backup orchestrator — single-flight run pipeline.
//!
//! `trigger` performs exactly one atomic test-and-set and hands the run body
//! to a detached blocking worker, so callers get their Accepted/AlreadyRunning
//! answer immediately. Every failure below this layer is converted into the
//! run record's terminal `failed` state; the only error a caller ever sees
//! synchronously is the rejected trigger.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use thiserror::Error;

use autobackup_core::{parse_workspaces, Config, ConfigError, SpecError};
use autobackup_core::types::{BackupRun, RunStatus, WorkspaceName};
use autobackup_store::RunStore;
use autobackup_sync::{commit_and_push, mirror_workspace, SyncError, VersionOutcome};

use crate::guard::{RunGuard, RunPermit};
use crate::notify;

/// Synchronous answer to a trigger request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The run was started on a background worker.
    Accepted,
    /// Rejected — a run is already active. Nothing was mutated.
    AlreadyRunning,
}

/// Everything that can fail a run between guard acquisition and finalize.
#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("parse workspaces failed: {0}")]
    Spec(#[from] SpecError),

    /// Zero configured workspaces is a failure, not a no-op: it means the
    /// service is deployed without anything to back up.
    #[error("no workspaces configured")]
    NoWorkspaces,

    #[error("sync workspace '{name}' failed: {source}")]
    Workspace {
        name: WorkspaceName,
        #[source]
        source: SyncError,
    },

    #[error(transparent)]
    Versioning(SyncError),
}

/// The single-flight coordinator. One instance per process, shared by the
/// scheduler and the socket trigger path so both contend on the same guard.
pub struct Orchestrator {
    config: Config,
    store: RunStore,
    guard: RunGuard,
}

impl Orchestrator {
    pub fn new(config: Config, store: RunStore) -> Self {
        Self {
            config,
            store,
            guard: RunGuard::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start a backup run unless one is already active.
    ///
    /// Must be called from within a tokio runtime; the run body executes on
    /// `spawn_blocking` with its result discarded — outcomes are observable
    /// through the persisted record.
    pub fn trigger(self: &Arc<Self>) -> TriggerOutcome {
        let Some(permit) = self.guard.try_acquire() else {
            return TriggerOutcome::AlreadyRunning;
        };

        let orchestrator = Arc::clone(self);
        tokio::task::spawn_blocking(move || orchestrator.execute(permit));
        TriggerOutcome::Accepted
    }

    /// The run body. The permit is owned here so the guard releases on every
    /// exit path, including a panic unwinding through this frame.
    fn execute(&self, permit: RunPermit) {
        let mut run = BackupRun::started(Utc::now());
        if let Err(err) = self.store.create(&run) {
            tracing::error!(error = %err, "could not persist run record; aborting run");
            drop(permit);
            return;
        }
        tracing::info!(run = %run.id, "backup run started");

        let timer = Instant::now();
        let outcome = self.run_pipeline();
        run.finished_at = Some(Utc::now());
        run.duration_ms = timer.elapsed().as_millis() as u64;

        match outcome {
            Ok(version) => {
                run.status = RunStatus::Success;
                run.files_changed = version.files_changed;
                run.commit_hash = version.commit_hash;
                run.commit_message = version.commit_message;
                tracing::info!(
                    run = %run.id,
                    files_changed = run.files_changed,
                    duration_ms = run.duration_ms,
                    "backup run succeeded",
                );
            }
            Err(err) => {
                run.status = RunStatus::Failed;
                run.error_message = err.to_string();
                tracing::error!(run = %run.id, error = %err, "backup run failed");
            }
        }

        if let Err(err) = self.store.update(&run) {
            tracing::error!(run = %run.id, error = %err, "failed to persist finalized run");
        }

        // Best-effort; never raises the run's status.
        notify::send_notification(&self.config, &run);

        drop(permit);
    }

    /// Steps 3–5: parse, mirror each workspace, version once. Config and
    /// spec checks come first so nothing is mutated on a bad deployment.
    fn run_pipeline(&self) -> Result<VersionOutcome, RunError> {
        self.config.validate()?;
        let workspaces = parse_workspaces(&self.config.workspaces)?;
        if workspaces.is_empty() {
            return Err(RunError::NoWorkspaces);
        }

        for (name, source) in &workspaces {
            let destination = self.config.backup_repo.join(format!("{name}-backup"));
            mirror_workspace(source, &destination).map_err(|source| RunError::Workspace {
                name: name.clone(),
                source,
            })?;
            tracing::info!(
                workspace = %name,
                src = %source.display(),
                dst = %destination.display(),
                "workspace synced",
            );
        }

        commit_and_push(
            &self.config.backup_repo,
            self.config.ssh_key_path.as_deref(),
        )
        .map_err(RunError::Versioning)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn orchestrator_with(config: Config) -> Arc<Orchestrator> {
        let store = RunStore::open_in_memory().expect("store");
        Arc::new(Orchestrator::new(config, store))
    }

    async fn wait_for_finalized(orchestrator: &Orchestrator) -> BackupRun {
        for _ in 0..200 {
            if let Some(run) = orchestrator.store().most_recent().expect("query") {
                if run.status != RunStatus::Running {
                    return run;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run never finalized");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_backup_repo_fails_the_run_by_name() {
        let orchestrator = orchestrator_with(Config {
            workspaces: "agent:/ws".into(),
            ..Config::default()
        });
        orchestrator.trigger();

        let run = wait_for_finalized(&orchestrator).await;
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_message, "missing required setting: BACKUP_REPO");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_workspace_config_fails_the_run() {
        let orchestrator = orchestrator_with(Config {
            backup_repo: "/srv/backup".into(),
            ..Config::default()
        });
        assert_eq!(orchestrator.trigger(), TriggerOutcome::Accepted);

        let run = wait_for_finalized(&orchestrator).await;
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error_message, "no workspaces configured");
        assert!(run.finished_at.is_some());
        assert!(!orchestrator.is_running(), "guard released after failure");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_spec_fails_the_run_with_the_pair() {
        let orchestrator = orchestrator_with(Config {
            workspaces: "agent:/ws,broken".into(),
            backup_repo: "/srv/backup".into(),
            ..Config::default()
        });
        orchestrator.trigger();

        let run = wait_for_finalized(&orchestrator).await;
        assert_eq!(run.status, RunStatus::Failed);
        assert!(
            run.error_message.contains("'broken'"),
            "error should quote the offending pair: {}",
            run.error_message
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn trigger_is_rejected_while_guard_is_held() {
        let orchestrator = orchestrator_with(Config::default());

        let permit = orchestrator.guard.try_acquire().expect("hold guard");
        assert!(orchestrator.is_running());
        assert_eq!(orchestrator.trigger(), TriggerOutcome::AlreadyRunning);
        assert!(
            orchestrator.store().most_recent().expect("query").is_none(),
            "a rejected trigger must not create a record"
        );

        drop(permit);
        assert_eq!(orchestrator.trigger(), TriggerOutcome::Accepted);
        wait_for_finalized(&orchestrator).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn finalization_invariant_holds_for_persisted_runs() {
        let orchestrator = orchestrator_with(Config::default());
        orchestrator.trigger();
        let run = wait_for_finalized(&orchestrator).await;

        assert!(run.finished_at.is_some());
        assert_ne!(run.status, RunStatus::Running);
        // Failed before any sync work, but after timing started: duration is
        // whatever elapsed, finished_at is set either way.
        let (rows, total) = orchestrator.store().page(0, 10).expect("page");
        assert_eq!(total, 1);
        assert_eq!(rows[0].finished_at.is_some(), rows[0].status != RunStatus::Running);
    }
}
