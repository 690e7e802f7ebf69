//! Fixed-period backup scheduling.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::error::DaemonError;
use crate::orchestrator::{Orchestrator, TriggerOutcome};

/// Runs fire hourly, matching the service's original cadence.
pub const BACKUP_PERIOD: Duration = Duration::from_secs(3600);

/// Trigger the orchestrator every `period` until shutdown.
///
/// Shares the orchestrator (and thus the single-flight guard) with the
/// socket trigger path: an overlap in either direction is a logged
/// `AlreadyRunning`, never an error that stops the schedule.
pub async fn scheduler_task(
    orchestrator: Arc<Orchestrator>,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval.tick().await; // consume the immediate tick; no backup at startup

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                tracing::info!("scheduled backup triggered");
                match orchestrator.trigger() {
                    TriggerOutcome::Accepted => {}
                    TriggerOutcome::AlreadyRunning => {
                        tracing::warn!("scheduled backup skipped: a run is already active");
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use autobackup_core::types::RunStatus;
    use autobackup_core::Config;
    use autobackup_store::RunStore;
    use tokio::sync::broadcast;

    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn periodic_ticks_trigger_runs_and_shutdown_stops_them() {
        let store = RunStore::open_in_memory().expect("store");
        let orchestrator = Arc::new(Orchestrator::new(Config::default(), store.clone()));
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let task = tokio::spawn(scheduler_task(
            Arc::clone(&orchestrator),
            Duration::from_millis(20),
            shutdown_tx.subscribe(),
        ));

        // Wait until at least one scheduled run has been recorded.
        let mut saw_run = false;
        for _ in 0..200 {
            if let Some(run) = store.most_recent().expect("query") {
                if run.status != RunStatus::Running {
                    saw_run = true;
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(saw_run, "scheduler should have triggered a run");

        shutdown_tx.send(()).expect("signal shutdown");
        task.await.expect("join").expect("scheduler task");
    }
}
