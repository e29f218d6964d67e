//! Disposal strategies: delete in place, or move into an archive directory.
//!
//! The strategy is chosen once from [`DaemonConfig::archive_dir`] and kept for
//! the daemon's whole lifetime.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chestkeeper_core::{DaemonConfig, WatchedFile};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, DaemonError};

/// What a disposal does to a file; drives the status line wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Deleted,
    Moved,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Deleted => write!(f, "Deleted"),
            Operation::Moved => write!(f, "Moved"),
        }
    }
}

/// One filesystem mutation per call, no batching, no rollback.
pub trait Disposer: Send + Sync {
    fn dispose(&self, file: &WatchedFile) -> Result<(), DaemonError>;

    fn operation(&self) -> Operation;

    /// Archive directory for move strategies.
    fn destination(&self) -> Option<&Path> {
        None
    }
}

/// Build the strategy selected by `config`.
pub fn from_config(config: &DaemonConfig) -> Box<dyn Disposer> {
    match &config.archive_dir {
        Some(archive) => Box::new(MoveStrategy::new(&config.watched_dir, archive)),
        None => Box::new(DeleteStrategy::new(&config.watched_dir)),
    }
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DeleteStrategy {
    dir: PathBuf,
}

impl DeleteStrategy {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Disposer for DeleteStrategy {
    fn dispose(&self, file: &WatchedFile) -> Result<(), DaemonError> {
        let path = self.dir.join(file);
        fs::remove_file(&path).map_err(|e| io_err(&path, e))
    }

    fn operation(&self) -> Operation {
        Operation::Deleted
    }
}

// ---------------------------------------------------------------------------
// Move
// ---------------------------------------------------------------------------

/// Relocates files into an existing archive directory under the same base name.
#[derive(Debug, Clone)]
pub struct MoveStrategy {
    dir: PathBuf,
    archive: PathBuf,
}

impl MoveStrategy {
    pub fn new(dir: impl Into<PathBuf>, archive: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            archive: archive.into(),
        }
    }
}

impl Disposer for MoveStrategy {
    fn dispose(&self, file: &WatchedFile) -> Result<(), DaemonError> {
        let source = self.dir.join(file);
        let destination = self.archive.join(file);
        match fs::rename(&source, &destination) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
                copy_then_remove(&source, &destination)
            }
            Err(err) => Err(io_err(&source, err)),
        }
    }

    fn operation(&self) -> Operation {
        Operation::Moved
    }

    fn destination(&self) -> Option<&Path> {
        Some(&self.archive)
    }
}

/// Rename fallback when archive and watched dir sit on different filesystems.
fn copy_then_remove(source: &Path, destination: &Path) -> Result<(), DaemonError> {
    if let Err(err) = fs::copy(source, destination) {
        // Drop a partial copy so a retry starts clean.
        let _ = fs::remove_file(destination);
        return Err(io_err(source, err));
    }
    fs::remove_file(source).map_err(|e| io_err(source, e))
}
