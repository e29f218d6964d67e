//! Control-socket wire format: one JSON object per line in each direction.
//!
//! ```text
//! → {"cmd":"cleanup"}
//! ← {"reply":"cleanup_queued"}
//! ```

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chestkeeper_core::DaemonConfig;

use crate::daemon::DaemonState;
use crate::error::{io_err, DaemonError};
use crate::paths::socket_path;
use crate::policy::SweepReport;

/// A status reply may include a fresh directory scan.
const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum DaemonRequest {
    Status,
    Stop,
    Cleanup,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum DaemonReply {
    Status(DaemonStatus),
    Stopping,
    CleanupQueued,
    Error { message: String },
}

/// Snapshot of a running daemon, answered to `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub state: DaemonState,
    pub config: DaemonConfig,
    /// Matching files right now; `None` when the scan failed.
    pub matching_files: Option<usize>,
    pub scan_error: Option<String>,
    pub last_sweep: Option<SweepReport>,
    pub started_at: DateTime<Utc>,
}

/// Send one request over the daemon socket under `home` and read its reply.
pub fn send_request(home: &Path, request: DaemonRequest) -> Result<DaemonReply, DaemonError> {
    let socket = socket_path(home);
    let stream = UnixStream::connect(&socket).map_err(|err| match err.kind() {
        ErrorKind::NotFound | ErrorKind::ConnectionRefused => DaemonError::DaemonNotRunning {
            socket: socket.clone(),
        },
        _ => io_err(&socket, err),
    })?;
    stream
        .set_read_timeout(Some(REPLY_TIMEOUT))
        .map_err(|e| io_err(&socket, e))?;

    let mut line = serde_json::to_vec(&request)?;
    line.push(b'\n');
    (&stream).write_all(&line).map_err(|e| io_err(&socket, e))?;

    let mut reply = String::new();
    BufReader::new(&stream)
        .read_line(&mut reply)
        .map_err(|e| io_err(&socket, e))?;
    if reply.is_empty() {
        return Err(DaemonError::Protocol(
            "daemon closed the connection without replying".to_string(),
        ));
    }
    Ok(serde_json::from_str(&reply)?)
}

pub fn request_status(home: &Path) -> Result<DaemonStatus, DaemonError> {
    match send_request(home, DaemonRequest::Status)? {
        DaemonReply::Status(status) => Ok(status),
        other => Err(unexpected(other)),
    }
}

pub fn request_stop(home: &Path) -> Result<(), DaemonError> {
    match send_request(home, DaemonRequest::Stop)? {
        DaemonReply::Stopping => Ok(()),
        other => Err(unexpected(other)),
    }
}

pub fn request_cleanup(home: &Path) -> Result<(), DaemonError> {
    match send_request(home, DaemonRequest::Cleanup)? {
        DaemonReply::CleanupQueued => Ok(()),
        other => Err(unexpected(other)),
    }
}

fn unexpected(reply: DaemonReply) -> DaemonError {
    match reply {
        DaemonReply::Error { message } => DaemonError::Protocol(message),
        other => DaemonError::Protocol(format!("unexpected daemon reply: {other:?}")),
    }
}
