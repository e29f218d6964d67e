use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, RwLock};

use chestkeeper_core::DaemonConfig;

use crate::daemon::{DaemonControl, DaemonState, RetentionDaemon};
use crate::error::{io_err, DaemonError};
use crate::paths::{chestkeeper_root, socket_path};
use crate::policy::SweepReport;
use crate::protocol::{DaemonReply, DaemonRequest, DaemonStatus};
use crate::scanner::Scanner;

type LastSweep = Arc<RwLock<Option<SweepReport>>>;

/// What the socket server needs to answer `status`.
#[derive(Clone)]
struct StatusContext {
    config: DaemonConfig,
    state: watch::Receiver<DaemonState>,
    last_sweep: LastSweep,
    started_at: DateTime<Utc>,
}

/// Install logging, build a multi-threaded runtime and [`run`] on it.
pub fn start_blocking(home: &Path, config: DaemonConfig) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), config))
}

/// Run the retention daemon with its control socket until stopped.
///
/// Misconfiguration is rejected before anything is bound or swept.
pub async fn run(home: PathBuf, config: DaemonConfig) -> Result<(), DaemonError> {
    let daemon = RetentionDaemon::new(config.clone())?;
    let socket = socket_path(&home);
    let listener = bind_control_socket(&home, &socket)?;

    let reports = daemon.subscribe();
    let handle = daemon.start();
    let control = handle.control();
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let context = StatusContext {
        config,
        state: handle.watch_state(),
        last_sweep: LastSweep::default(),
        started_at: Utc::now(),
    };
    tracing::info!(socket = %socket.display(), "control socket listening");

    let tracker = tokio::spawn(track_last_sweep(
        reports,
        context.last_sweep.clone(),
        shutdown_tx.subscribe(),
    ));
    let server = tokio::spawn(serve(
        listener,
        context,
        control.clone(),
        shutdown_tx.subscribe(),
    ));
    let interrupts = tokio::spawn(stop_on_ctrl_c(control, shutdown_tx.subscribe()));

    let outcome = handle.join().await;
    let _ = shutdown_tx.send(());
    let (tracker, server, interrupts) = tokio::join!(tracker, server, interrupts);
    if let Err(err) = fs::remove_file(&socket) {
        tracing::debug!(error = %err, "control socket already gone");
    }

    outcome?;
    for (task, joined) in [
        ("sweep tracker", tracker),
        ("socket server", server),
        ("ctrl-c handler", interrupts),
    ] {
        joined.map_err(|source| DaemonError::Task { task, source })?;
    }
    Ok(())
}

/// Bind `<home>/.chestkeeper/chestkeeper.sock` owner-only, replacing a
/// leftover socket file but never a live daemon's.
fn bind_control_socket(home: &Path, socket: &Path) -> Result<UnixListener, DaemonError> {
    let root = chestkeeper_root(home);
    fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    clear_stale_socket(socket)?;

    let listener = UnixListener::bind(socket).map_err(|e| io_err(socket, e))?;
    fs::set_permissions(socket, fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(socket, e))?;
    Ok(listener)
}

fn clear_stale_socket(socket: &Path) -> Result<(), DaemonError> {
    if StdUnixStream::connect(socket).is_ok() {
        return Err(DaemonError::SocketInUse {
            socket: socket.to_path_buf(),
        });
    }
    match fs::remove_file(socket) {
        Ok(()) => {
            tracing::warn!(socket = %socket.display(), "removed stale control socket");
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

async fn track_last_sweep(
    mut reports: broadcast::Receiver<SweepReport>,
    last_sweep: LastSweep,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            report = reports.recv() => match report {
                Ok(report) => *last_sweep.write().await = Some(report),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "sweep report tracker lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}

async fn stop_on_ctrl_c(control: DaemonControl, mut shutdown: broadcast::Receiver<()>) {
    tokio::select! {
        _ = shutdown.recv() => {}
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => {
                tracing::info!("received ctrl-c, stopping retention daemon");
                control.request_stop();
            }
            Err(err) => tracing::error!(error = %err, "cannot listen for ctrl-c"),
        },
    }
}

async fn serve(
    listener: UnixListener,
    context: StatusContext,
    control: DaemonControl,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let context = context.clone();
                    let control = control.clone();
                    tokio::spawn(async move {
                        if let Err(err) = answer_client(stream, &context, &control).await {
                            tracing::warn!(error = %err, "control client failed");
                        }
                    });
                }
                Err(err) => tracing::warn!(error = %err, "control socket accept failed"),
            },
        }
    }
}

async fn answer_client(
    stream: UnixStream,
    context: &StatusContext,
    control: &DaemonControl,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("control socket", e))?
    {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<DaemonRequest>(&line) {
            Ok(DaemonRequest::Status) => DaemonReply::Status(build_status(context).await),
            Ok(DaemonRequest::Cleanup) => {
                control.request_cleanup();
                DaemonReply::CleanupQueued
            }
            Ok(DaemonRequest::Stop) => {
                control.request_stop();
                DaemonReply::Stopping
            }
            Err(err) => DaemonReply::Error {
                message: format!("invalid request: {err}"),
            },
        };

        let mut encoded = serde_json::to_vec(&reply)?;
        encoded.push(b'\n');
        writer
            .write_all(&encoded)
            .await
            .map_err(|e| io_err("control socket", e))?;
        if matches!(reply, DaemonReply::Stopping) {
            break;
        }
    }
    Ok(())
}

async fn build_status(context: &StatusContext) -> DaemonStatus {
    let state = *context.state.borrow();
    let last_sweep = context.last_sweep.read().await.clone();

    let scanner = Scanner::new(&context.config.watched_dir);
    let scan = tokio::task::spawn_blocking(move || scanner.scan()).await;
    let (matching_files, scan_error) = match scan {
        Ok(Ok(files)) => (Some(files.len()), None),
        Ok(Err(err)) => (None, Some(err.to_string())),
        Err(err) => (None, Some(format!("scan task failed: {err}"))),
    };

    DaemonStatus {
        state,
        config: context.config.clone(),
        matching_files,
        scan_error,
        last_sweep,
        started_at: context.started_at,
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
