use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, Mutex};

use dayboard_core::{BoardConfig, BoardDate, FileStatusStore, StatusChange, StatusStore, StoreError};

use crate::error::{io_err, DaemonError};
use crate::fanout::Broadcaster;
use crate::listener::stream_events;
use crate::paths::{board_root, socket_path};
use crate::protocol::{requested_task_id, DaemonRequest, DaemonResponse};

/// Everything a connection handler needs, shared across tasks.
pub struct DaemonState {
    store: Arc<dyn StatusStore>,
    broadcaster: Arc<Broadcaster>,
    /// Serializes persist-then-publish so event order matches write order.
    write_lock: Mutex<()>,
    started_at_unix: u64,
    socket: PathBuf,
}

impl DaemonState {
    pub fn new(store: Arc<dyn StatusStore>, config: &BoardConfig, socket: PathBuf) -> Self {
        Self {
            store,
            broadcaster: Arc::new(Broadcaster::new(config.listener_capacity)),
            write_lock: Mutex::new(()),
            started_at_unix: unix_seconds_now(),
            socket,
        }
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the daemon against the file store under `home`.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;
    let config = BoardConfig::load_at(&home)?;

    let store_home = home.clone();
    let store = tokio::task::spawn_blocking(move || -> Result<FileStatusStore, StoreError> {
        let store = FileStatusStore::open_at(&store_home);
        if store.seed_if_empty()? {
            tracing::info!("seeded empty store with sample board");
        }
        Ok(store)
    })
    .await
    .map_err(|err| DaemonError::Protocol(format!("store open join error: {err}")))??;

    let state = Arc::new(DaemonState::new(
        Arc::new(store),
        &config,
        socket_path(&home),
    ));
    serve(state).await
}

/// Bind the socket in `state` and serve until `stop` or ctrl-c.
pub async fn serve(state: Arc<DaemonState>) -> Result<(), DaemonError> {
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    tracing::info!(
        socket = %state.socket.display(),
        listener_capacity = state.broadcaster.registry().capacity(),
        "daemon starting",
    );

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let result = socket_server_task(state, shutdown.clone(), shutdown.subscribe()).await;
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

    let (socket_result, signal_result) = tokio::join!(socket_handle, signal_handle);

    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("daemon stopped");
    Ok(())
}

async fn socket_server_task(
    state: Arc<DaemonState>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = state.socket.clone();
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let state = state.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, state, shutdown_tx).await {
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
    state: Arc<DaemonState>,
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

        if request.cmd == "stream" {
            let date = match request_date(&request) {
                Ok(date) => date,
                Err(message) => {
                    write_response(&mut writer, &DaemonResponse::error(message)).await?;
                    continue;
                }
            };
            // The connection belongs to the stream from here on.
            let listener = state.broadcaster.open_listener();
            stream_events(listener, date, lines.into_inner(), writer, shutdown_tx.subscribe())
                .await?;
            return Ok(());
        }

        let response = handle_request(&state, &request, &shutdown_tx).await;
        write_response(&mut writer, &response).await?;
        if request.cmd == "stop" {
            break;
        }
    }

    Ok(())
}

/// Answer one non-streaming request.
pub async fn handle_request(
    state: &DaemonState,
    request: &DaemonRequest,
    shutdown_tx: &broadcast::Sender<()>,
) -> DaemonResponse {
    match request.cmd.as_str() {
        "status" => DaemonResponse::ok(build_status_payload(state)),
        "tasks" => match request_date(request) {
            Ok(date) => {
                let store = state.store.clone();
                respond(run_store(move || store.timetable(&date)).await)
            }
            Err(message) => DaemonResponse::error(message),
        },
        "state" => match request_date(request) {
            Ok(date) => {
                let store = state.store.clone();
                respond(run_store(move || store.snapshot(&date)).await)
            }
            Err(message) => DaemonResponse::error(message),
        },
        "set" => handle_set(state, request).await,
        "stop" => {
            let _ = shutdown_tx.send(());
            DaemonResponse::ok(json!({ "stopping": true }))
        }
        other => DaemonResponse::error(format!("unknown command '{other}'")),
    }
}

async fn handle_set(state: &DaemonState, request: &DaemonRequest) -> DaemonResponse {
    let date = match request_date(request) {
        Ok(date) => date,
        Err(message) => return DaemonResponse::error(message),
    };
    let Some(task_id) = requested_task_id(request) else {
        return DaemonResponse::error("need task_id");
    };
    let change = StatusChange {
        task_id,
        completed: request.completed.unwrap_or(false),
        reviewed: request.reviewed.unwrap_or(false),
    };

    let _guard = state.write_lock.lock().await;
    let store = state.store.clone();
    let written = {
        let change = change.clone();
        run_store(move || store.write_status(&date, &change)).await
    };
    match written {
        Ok(persisted) => {
            state
                .broadcaster
                .notify_change(date, vec![StatusChange::from(&persisted)]);
            tracing::info!(%date, task = %task_id, "status updated");
            respond(Ok(persisted))
        }
        Err(err) => {
            tracing::warn!(%date, task = %task_id, error = %err, "status update rejected");
            DaemonResponse::error(client_message(err))
        }
    }
}

fn request_date(request: &DaemonRequest) -> Result<BoardDate, String> {
    let Some(raw) = request.date.as_deref() else {
        return Err("need date".to_string());
    };
    raw.parse().map_err(|err: dayboard_core::CoreError| err.to_string())
}

async fn run_store<T, F>(op: F) -> Result<T, DaemonError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|err| DaemonError::Protocol(format!("store task join error: {err}")))?
        .map_err(DaemonError::from)
}

fn respond<T: serde::Serialize>(result: Result<T, DaemonError>) -> DaemonResponse {
    let value = result.and_then(|data| serde_json::to_value(data).map_err(DaemonError::from));
    match value {
        Ok(data) => DaemonResponse::ok(data),
        Err(err) => DaemonResponse::error(client_message(err)),
    }
}

/// Store errors reach the client without the daemon's own prefix.
fn client_message(err: DaemonError) -> String {
    match err {
        DaemonError::Store(err) => err.to_string(),
        other => other.to_string(),
    }
}

fn build_status_payload(state: &DaemonState) -> Value {
    json!({
        "running": true,
        "started_at_unix": state.started_at_unix,
        "listeners": state.broadcaster.registry().len(),
        "listener_capacity": state.broadcaster.registry().capacity(),
        "socket": state.socket.display().to_string(),
    })
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

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let root = board_root(home);
    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    }
    Ok(())
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

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Log line shape, chosen with `DAYBOARD_LOG_FORMAT=json|text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let format = LogFormat::from_env_value(std::env::var("DAYBOARD_LOG_FORMAT").ok().as_deref());
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
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

#[cfg(test)]
mod tests {
    use super::*;
    use dayboard_core::{DailyStatus, DaySnapshot, MemoryStatusStore, TaskId};

    fn state() -> DaemonState {
        DaemonState::new(
            Arc::new(MemoryStatusStore::seeded().expect("seed")),
            &BoardConfig::default(),
            PathBuf::from("/tmp/dayboard-test.sock"),
        )
    }

    #[test]
    fn log_format_defaults_to_text() {
        assert_eq!(LogFormat::from_env_value(None), LogFormat::Text);
        assert_eq!(LogFormat::from_env_value(Some("")), LogFormat::Text);
        assert_eq!(LogFormat::from_env_value(Some("pretty")), LogFormat::Text);
        assert_eq!(LogFormat::from_env_value(Some(" JSON ")), LogFormat::Json);
    }

    fn set(date: &str, task_id: Option<u32>) -> DaemonRequest {
        DaemonRequest {
            date: Some(date.to_string()),
            task_id,
            completed: Some(true),
            reviewed: Some(false),
            ..DaemonRequest::new("set")
        }
    }

    #[tokio::test]
    async fn set_persists_then_publishes() {
        let state = state();
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut listener = state.broadcaster().open_listener();

        let response = handle_request(&state, &set("2025-01-01", Some(3)), &shutdown_tx).await;
        assert!(response.ok, "{:?}", response.error);
        let persisted: DailyStatus =
            serde_json::from_value(response.data.expect("data")).expect("decode");
        assert_eq!(persisted.task_id, TaskId(3));
        assert!(persisted.completed);

        let event = listener.next().await.expect("event");
        assert_eq!(event.date.to_string(), "2025-01-01");
        assert_eq!(event.changes.len(), 1);
        assert_eq!(event.changes[0].task_id, TaskId(3));

        let snapshot = handle_request(
            &state,
            &DaemonRequest::for_date("state", &"2025-01-01".parse().expect("date")),
            &shutdown_tx,
        )
        .await;
        let snapshot: DaySnapshot =
            serde_json::from_value(snapshot.data.expect("data")).expect("decode");
        assert!(snapshot.list.iter().any(|e| e.id == TaskId(3) && e.completed));
    }

    #[tokio::test]
    async fn unknown_task_publishes_nothing() {
        let state = state();
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut handle = state.broadcaster().registry().register();

        let response = handle_request(&state, &set("2025-01-01", Some(99)), &shutdown_tx).await;
        assert!(!response.ok);
        assert_eq!(response.error.as_deref(), Some("task 99 not exists"));
        assert!(handle.try_recv().is_none());
    }

    #[tokio::test]
    async fn set_requires_task_id_and_date() {
        let state = state();
        let (shutdown_tx, _) = broadcast::channel(1);

        let missing_id = handle_request(&state, &set("2025-01-01", None), &shutdown_tx).await;
        assert_eq!(missing_id.error.as_deref(), Some("need task_id"));

        let mut no_date = set("2025-01-01", Some(1));
        no_date.date = None;
        let missing_date = handle_request(&state, &no_date, &shutdown_tx).await;
        assert_eq!(missing_date.error.as_deref(), Some("need date"));
    }

    #[tokio::test]
    async fn tasks_projects_onto_requested_date() {
        let state = state();
        let (shutdown_tx, _) = broadcast::channel(1);
        let response = handle_request(
            &state,
            &DaemonRequest::for_date("tasks", &"2025-03-09".parse().expect("date")),
            &shutdown_tx,
        )
        .await;
        let tasks = response.data.expect("data");
        assert_eq!(tasks[0]["start"], json!("2025-03-09 08:00"));
        assert_eq!(tasks.as_array().map(Vec::len), Some(5));
    }

    #[tokio::test]
    async fn status_reports_listener_count_and_stop_signals_shutdown() {
        let state = state();
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let _listener = state.broadcaster().open_listener();

        let status = handle_request(&state, &DaemonRequest::new("status"), &shutdown_tx).await;
        let data = status.data.expect("data");
        assert_eq!(data["running"], json!(true));
        assert_eq!(data["listeners"], json!(1));

        let stop = handle_request(&state, &DaemonRequest::new("stop"), &shutdown_tx).await;
        assert!(stop.ok);
        shutdown_rx.recv().await.expect("shutdown signal");

        let unknown = handle_request(&state, &DaemonRequest::new("sync"), &shutdown_tx).await;
        assert_eq!(unknown.error.as_deref(), Some("unknown command 'sync'"));
    }
}
