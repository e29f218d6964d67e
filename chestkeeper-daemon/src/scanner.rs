//! Lists retention candidates in the watched directory.

use std::fs;
use std::path::{Path, PathBuf};

use chestkeeper_core::WatchedFile;

use crate::error::DaemonError;

/// Read-only view over the watched directory.
#[derive(Debug, Clone)]
pub struct Scanner {
    dir: PathBuf,
}

impl Scanner {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Matching base names, sorted ascending (oldest first).
    ///
    /// Entries that vanish while being listed are skipped; a missing or
    /// unreadable directory is a [`DaemonError::Scan`].
    pub fn scan(&self) -> Result<Vec<WatchedFile>, DaemonError> {
        let scan_err = |source| DaemonError::Scan {
            dir: self.dir.clone(),
            source,
        };

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(scan_err)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(scan_err(err)),
            };
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let Some(file) = WatchedFile::parse(name) else {
                continue;
            };
            // Directories that happen to match the pattern are never disposal targets.
            if entry.file_type().map(|ty| ty.is_dir()).unwrap_or(false) {
                continue;
            }
            files.push(file);
        }
        files.sort();
        Ok(files)
    }
}
