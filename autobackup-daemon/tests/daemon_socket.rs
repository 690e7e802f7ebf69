//! Socket server round-trip through the real daemon runtime task.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::broadcast;

use autobackup_core::Config;
use autobackup_daemon::protocol;
use autobackup_daemon::runtime;
use autobackup_daemon::Orchestrator;
use autobackup_store::RunStore;

async fn wait_for_socket(socket: &PathBuf) {
    for _ in 0..100 {
        if socket.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("daemon socket never appeared at {}", socket.display());
}

#[tokio::test(flavor = "multi_thread")]
async fn status_trigger_and_stop_over_the_socket() {
    let dir = TempDir::new().expect("dir");
    let socket = dir.path().join("autobackup.sock");

    let store = RunStore::open_in_memory().expect("store");
    let orchestrator = Arc::new(Orchestrator::new(Config::default(), store));
    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let server = tokio::spawn(runtime::serve_socket(
        socket.clone(),
        orchestrator,
        shutdown_tx.clone(),
    ));
    wait_for_socket(&socket).await;

    // status: idle daemon, no runs yet, empty workspace map.
    let status_socket = socket.clone();
    let status = tokio::task::spawn_blocking(move || protocol::request_status(&status_socket))
        .await
        .expect("join")
        .expect("status");
    assert_eq!(status["is_running"], serde_json::json!(false));
    assert!(status["last_run"].is_null());

    // trigger: accepted, and the (failing, unconfigured) run eventually
    // shows up in the runs listing.
    let trigger_socket = socket.clone();
    let accepted = tokio::task::spawn_blocking(move || protocol::request_trigger(&trigger_socket))
        .await
        .expect("join")
        .expect("trigger");
    assert_eq!(accepted["accepted"], serde_json::json!(true));

    let mut recorded = false;
    for _ in 0..100 {
        let runs_socket = socket.clone();
        let runs =
            tokio::task::spawn_blocking(move || protocol::request_runs(&runs_socket, None, None))
                .await
                .expect("join")
                .expect("runs");
        if runs["total"] == serde_json::json!(1)
            && runs["runs"][0]["status"] == serde_json::json!("failed")
        {
            recorded = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(recorded, "triggered run should appear in history");

    // stop: the server task exits and removes its socket.
    let stop_socket = socket.clone();
    tokio::task::spawn_blocking(move || protocol::request_stop(&stop_socket))
        .await
        .expect("join")
        .expect("stop");
    server
        .await
        .expect("join server")
        .expect("server shutdown clean");
    assert!(!socket.exists(), "socket cleaned up on shutdown");
}
