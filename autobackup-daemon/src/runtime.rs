//! Daemon runtime — task wiring and the socket command server.
//!
//! Three long-lived tasks share a broadcast shutdown channel: the hourly
//! scheduler, the Unix-socket server, and the ctrl-c handler. The actual
//! backup work never runs on these tasks; the orchestrator detaches it onto
//! blocking workers.

use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;

use autobackup_core::{parse_workspaces, Config};
use autobackup_store::RunStore;
use autobackup_sync::latest_modification;

use crate::error::{io_err, DaemonError};
use crate::orchestrator::{Orchestrator, TriggerOutcome};
use crate::protocol::{DaemonRequest, DaemonResponse};
use crate::scheduler::{scheduler_task, BACKUP_PERIOD};

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(config: Config) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Run the daemon runtime.
pub async fn run(config: Config) -> Result<(), DaemonError> {
    let store = RunStore::open(&config.database_path)?;
    let orchestrator = Arc::new(Orchestrator::new(config.clone(), store));

    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let scheduler_handle = {
        let shutdown = shutdown_tx.clone();
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            let result = scheduler_task(orchestrator, BACKUP_PERIOD, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let orchestrator = orchestrator.clone();
        let socket = config.socket_path.clone();
        tokio::spawn(async move {
            let result =
                socket_server_task(socket, orchestrator, shutdown.clone(), shutdown.subscribe())
                    .await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (scheduler_result, socket_result, signal_result) =
        tokio::join!(scheduler_handle, socket_handle, signal_handle);

    handle_join("scheduler", scheduler_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

/// Serve the command socket until a shutdown broadcast. Split out from
/// [`run`] so the server can be driven without the scheduler and signal
/// tasks.
pub async fn serve_socket(
    socket: std::path::PathBuf,
    orchestrator: Arc<Orchestrator>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let shutdown_rx = shutdown_tx.subscribe();
    socket_server_task(socket, orchestrator, shutdown_tx, shutdown_rx).await
}

async fn socket_server_task(
    socket: std::path::PathBuf,
    orchestrator: Arc<Orchestrator>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    if let Some(parent) = socket.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
    }
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;
    tracing::info!(socket = %socket.display(), "daemon listening");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let orchestrator = orchestrator.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, orchestrator, shutdown_tx).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    orchestrator: Arc<Orchestrator>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let cmd = request.cmd.clone();
        let response = handle_request(&orchestrator, &shutdown_tx, request).await;
        write_response(&mut writer, &response).await?;
        if cmd == "stop" {
            break;
        }
    }

    Ok(())
}

/// Dispatch one request to its handler.
pub(crate) async fn handle_request(
    orchestrator: &Arc<Orchestrator>,
    shutdown_tx: &broadcast::Sender<()>,
    request: DaemonRequest,
) -> DaemonResponse {
    match request.cmd.as_str() {
        "status" => match build_status_payload(orchestrator).await {
            Ok(payload) => DaemonResponse::ok(payload),
            Err(err) => DaemonResponse::error(err.to_string()),
        },
        "runs" => match list_runs(orchestrator, request.page, request.page_size).await {
            Ok(payload) => DaemonResponse::ok(payload),
            Err(err) => DaemonResponse::error(err.to_string()),
        },
        "trigger" => match orchestrator.trigger() {
            TriggerOutcome::Accepted => DaemonResponse::ok(json!({ "accepted": true })),
            // A conflict, not a generic failure: the payload lets callers
            // tell "one already active" apart from everything else.
            TriggerOutcome::AlreadyRunning => DaemonResponse::conflict(
                "backup is already running",
                json!({ "already_running": true }),
            ),
        },
        "stop" => {
            let _ = shutdown_tx.send(());
            DaemonResponse::ok(json!({ "stopping": true }))
        }
        other => DaemonResponse::error(format!("unknown command '{other}'")),
    }
}

/// `status` payload: guard state, most recent run, per-workspace mod times.
async fn build_status_payload(orchestrator: &Arc<Orchestrator>) -> Result<Value, DaemonError> {
    let store = orchestrator.store().clone();
    let last_run = tokio::task::spawn_blocking(move || store.most_recent())
        .await
        .map_err(|err| DaemonError::Protocol(format!("status query join error: {err}")))??;

    let config = orchestrator.config().clone();
    let workspaces = tokio::task::spawn_blocking(move || workspace_statuses(&config))
        .await
        .map_err(|err| DaemonError::Protocol(format!("workspace scan join error: {err}")))??;

    Ok(json!({
        "is_running": orchestrator.is_running(),
        "last_run": last_run,
        "workspaces": workspaces,
    }))
}

/// Name → `{ path, mod_time }` for every configured workspace. Scan failures
/// degrade to a null mod time; a bad spec string is a real error.
fn workspace_statuses(config: &Config) -> Result<Value, DaemonError> {
    let workspaces = parse_workspaces(&config.workspaces)?;

    let mut statuses = Map::new();
    for (name, path) in &workspaces {
        let mod_time = match latest_modification(path) {
            Ok(Some(at)) => Value::String(at.to_rfc3339()),
            Ok(None) => Value::Null,
            Err(err) => {
                tracing::warn!(workspace = %name, error = %err, "workspace scan failed");
                Value::Null
            }
        };
        statuses.insert(
            name.0.clone(),
            json!({
                "path": path.display().to_string(),
                "mod_time": mod_time,
            }),
        );
    }
    Ok(Value::Object(statuses))
}

/// `runs` payload: one page of history, most-recent-first.
async fn list_runs(
    orchestrator: &Arc<Orchestrator>,
    page: Option<u64>,
    page_size: Option<u64>,
) -> Result<Value, DaemonError> {
    let (page, page_size) = clamp_paging(page, page_size);
    let store = orchestrator.store().clone();
    let (runs, total) =
        tokio::task::spawn_blocking(move || store.page((page - 1) * page_size, page_size))
            .await
            .map_err(|err| DaemonError::Protocol(format!("runs query join error: {err}")))??;

    Ok(json!({
        "runs": runs,
        "total": total,
        "page": page,
        "page_size": page_size,
    }))
}

/// Page is floored to 1; page size defaults to 20 and clamps into [1, 100].
pub(crate) fn clamp_paging(page: Option<u64>, page_size: Option<u64>) -> (u64, u64) {
    let page = page.unwrap_or(1).max(1);
    let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, page_size)
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
