//! `chestkeeper stop|cleanup`: signal a running daemon over its socket.

use anyhow::{Context, Result};

use chestkeeper_daemon::{request_cleanup, request_stop, DaemonError};

use super::home_dir;

pub fn stop() -> Result<()> {
    let home = home_dir()?;
    match request_stop(&home) {
        Ok(()) => println!("daemon stop requested"),
        Err(DaemonError::DaemonNotRunning { .. }) => println!("daemon is not running"),
        Err(err) => return Err(err).context("failed to stop daemon"),
    }
    Ok(())
}

pub fn cleanup() -> Result<()> {
    let home = home_dir()?;
    match request_cleanup(&home) {
        Ok(()) => println!("cleanup requested; it runs at the next tick"),
        Err(DaemonError::DaemonNotRunning { .. }) => println!("daemon is not running"),
        Err(err) => return Err(err).context("failed to request cleanup"),
    }
    Ok(())
}
