//! Sweep policies: which files to dispose of, in what order.
//!
//! Every sweep re-scans immediately before disposing, walks its batch strictly
//! ascending by base name, and keeps going past per-file failures. A failed
//! file stays in the directory and is picked up again by a later sweep.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chestkeeper_core::{DaemonConfig, WatchedFile};

use crate::disposer::{self, Disposer, Operation};
use crate::error::DaemonError;
use crate::scanner::Scanner;

/// What triggered a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepKind {
    Initial,
    Instructed,
    Threshold,
    Terminal,
}

impl fmt::Display for SweepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SweepKind::Initial => "initial",
            SweepKind::Instructed => "instructed",
            SweepKind::Threshold => "threshold",
            SweepKind::Terminal => "terminal",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Watermarks {
    pub lower: usize,
    pub upper: usize,
}

impl Watermarks {
    /// Oldest files to dispose of so that `lower` remain, once `upper` is reached.
    ///
    /// Empty when below `upper`, or when `lower` exceeds the file count.
    pub fn excess<'a>(&self, files: &'a [WatchedFile]) -> &'a [WatchedFile] {
        if files.len() < self.upper {
            return &[];
        }
        let limit = files.len().saturating_sub(self.lower);
        &files[..limit]
    }
}

/// A file the disposer could not handle during a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisposalFailure {
    pub file: WatchedFile,
    pub error: String,
}

/// Outcome of one sweep that planned at least one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub kind: SweepKind,
    pub operation: Operation,
    /// Files in the planned batch.
    pub planned: usize,
    /// Files actually deleted or moved.
    pub disposed: usize,
    /// First name of the planned range.
    pub first: WatchedFile,
    /// Last name of the planned range.
    pub last: WatchedFile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    pub failures: Vec<DisposalFailure>,
    pub completed_at: DateTime<Utc>,
}

impl fmt::Display for SweepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} files ({} - {})",
            self.operation, self.disposed, self.first, self.last
        )?;
        if let Some(destination) = &self.destination {
            write!(f, " to {}", destination.display())?;
        }
        // Threshold sweeps name no trigger.
        if self.kind != SweepKind::Threshold {
            write!(f, " at the {} cleanup", self.kind)?;
        }
        if !self.failures.is_empty() {
            write!(f, "; {} failed", self.failures.len())?;
        }
        f.write_str(".")
    }
}

/// Scanner + disposer + watermarks; runs sweeps synchronously.
pub struct SweepEngine {
    scanner: Scanner,
    disposer: Box<dyn Disposer>,
    watermarks: Watermarks,
}

impl SweepEngine {
    pub fn new(scanner: Scanner, disposer: Box<dyn Disposer>, watermarks: Watermarks) -> Self {
        Self {
            scanner,
            disposer,
            watermarks,
        }
    }

    pub fn from_config(config: &DaemonConfig) -> Self {
        Self::new(
            Scanner::new(&config.watched_dir),
            disposer::from_config(config),
            Watermarks {
                lower: config.lower_watermark,
                upper: config.upper_watermark,
            },
        )
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    /// Run the sweep `kind` calls for: threshold policy for
    /// [`SweepKind::Threshold`], a full sweep otherwise.
    pub fn sweep(&self, kind: SweepKind) -> Result<Option<SweepReport>, DaemonError> {
        match kind {
            SweepKind::Threshold => self.threshold_sweep(),
            SweepKind::Initial | SweepKind::Instructed | SweepKind::Terminal => {
                self.full_sweep(kind)
            }
        }
    }

    /// Dispose of every matching file. `Ok(None)` when the directory had none.
    pub fn full_sweep(&self, kind: SweepKind) -> Result<Option<SweepReport>, DaemonError> {
        let files = self.scanner.scan()?;
        Ok(self.dispose_batch(kind, &files))
    }

    /// Dispose of the oldest files down to the lower watermark once the upper
    /// watermark is reached. `Ok(None)` when nothing was due.
    pub fn threshold_sweep(&self) -> Result<Option<SweepReport>, DaemonError> {
        let files = self.scanner.scan()?;
        let batch = self.watermarks.excess(&files);
        if batch.is_empty() {
            return Ok(None);
        }
        tracing::info!(
            files = files.len(),
            upper = self.watermarks.upper,
            "number of files ({}) reached the threshold of {}",
            files.len(),
            self.watermarks.upper,
        );
        Ok(self.dispose_batch(SweepKind::Threshold, batch))
    }

    fn dispose_batch(&self, kind: SweepKind, batch: &[WatchedFile]) -> Option<SweepReport> {
        let (first, last) = match batch {
            [] => return None,
            [first, .., last] => (first.clone(), last.clone()),
            [only] => (only.clone(), only.clone()),
        };

        let mut disposed = 0usize;
        let mut failures = Vec::new();
        for file in batch {
            match self.disposer.dispose(file) {
                Ok(()) => disposed += 1,
                Err(err) => {
                    tracing::warn!(file = %file, sweep = %kind, error = %err, "disposal failed");
                    failures.push(DisposalFailure {
                        file: file.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let report = SweepReport {
            kind,
            operation: self.disposer.operation(),
            planned: batch.len(),
            disposed,
            first,
            last,
            destination: self.disposer.destination().map(|p| p.to_path_buf()),
            failures,
            completed_at: Utc::now(),
        };
        tracing::info!(
            sweep = %report.kind,
            disposed = report.disposed,
            failed = report.failures.len(),
            "{report}"
        );
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Records dispose calls instead of touching the filesystem.
    #[derive(Default, Clone)]
    struct RecordingDisposer {
        calls: Arc<Mutex<Vec<String>>>,
        fail_on: Option<&'static str>,
    }

    impl Disposer for RecordingDisposer {
        fn dispose(&self, file: &WatchedFile) -> Result<(), DaemonError> {
            self.calls.lock().unwrap().push(file.to_string());
            if self.fail_on == Some(file.as_str()) {
                return Err(DaemonError::Protocol("injected failure".to_string()));
            }
            Ok(())
        }

        fn operation(&self) -> Operation {
            Operation::Deleted
        }
    }

    fn names(list: &[&str]) -> Vec<WatchedFile> {
        list.iter()
            .map(|n| WatchedFile::parse(*n).expect("valid name"))
            .collect()
    }

    fn populate(dir: &TempDir, list: &[&str]) {
        for name in list {
            fs::write(dir.path().join(name), name.as_bytes()).expect("write");
        }
    }

    #[test]
    fn excess_is_empty_below_upper() {
        let marks = Watermarks { lower: 1, upper: 4 };
        let files = names(&["chest_0_1.log", "chest_0_2.log", "chest_0_3.log"]);
        assert!(marks.excess(&files).is_empty());
    }

    #[test]
    fn excess_leaves_exactly_lower() {
        let marks = Watermarks { lower: 2, upper: 3 };
        let files = names(&[
            "chest_0_1.log",
            "chest_0_2.log",
            "chest_0_3.log",
            "chest_0_4.log",
        ]);
        assert_eq!(marks.excess(&files), &files[..2]);
    }

    #[test]
    fn excess_with_lower_above_count_is_noop() {
        // Only reachable if upper <= len < lower, which validation forbids,
        // but the arithmetic must still not underflow.
        let marks = Watermarks { lower: 9, upper: 0 };
        let files = names(&["chest_0_1.log"]);
        assert!(marks.excess(&files).is_empty());
    }

    #[test]
    fn threshold_sweep_disposes_oldest_in_order() {
        let dir = TempDir::new().expect("tempdir");
        populate(&dir, &["chest_0_3.log", "chest_0_1.log", "chest_0_2.log"]);
        let recorder = RecordingDisposer::default();
        let engine = SweepEngine::new(
            Scanner::new(dir.path()),
            Box::new(recorder.clone()),
            Watermarks { lower: 1, upper: 2 },
        );

        let report = engine.threshold_sweep().expect("sweep").expect("report");
        assert_eq!(
            *recorder.calls.lock().unwrap(),
            ["chest_0_1.log", "chest_0_2.log"]
        );
        assert_eq!(report.kind, SweepKind::Threshold);
        assert_eq!(report.disposed, 2);
        assert_eq!(report.first.as_str(), "chest_0_1.log");
        assert_eq!(report.last.as_str(), "chest_0_2.log");
    }

    #[test]
    fn full_sweep_on_empty_dir_reports_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let recorder = RecordingDisposer::default();
        let engine = SweepEngine::new(
            Scanner::new(dir.path()),
            Box::new(recorder.clone()),
            Watermarks { lower: 0, upper: 0 },
        );
        assert!(engine.full_sweep(SweepKind::Initial).expect("sweep").is_none());
        assert!(recorder.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn failure_mid_batch_continues_and_is_reported() {
        let dir = TempDir::new().expect("tempdir");
        populate(&dir, &["chest_0_1.log", "chest_0_2.log", "chest_0_3.log"]);
        let recorder = RecordingDisposer {
            fail_on: Some("chest_0_2.log"),
            ..RecordingDisposer::default()
        };
        let engine = SweepEngine::new(
            Scanner::new(dir.path()),
            Box::new(recorder.clone()),
            Watermarks { lower: 0, upper: 10 },
        );

        let report = engine
            .full_sweep(SweepKind::Instructed)
            .expect("sweep")
            .expect("report");
        assert_eq!(recorder.calls.lock().unwrap().len(), 3);
        assert_eq!(report.planned, 3);
        assert_eq!(report.disposed, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].file.as_str(), "chest_0_2.log");
        assert!(report.to_string().ends_with("; 1 failed."), "{report}");
    }

    #[test]
    fn scan_failure_aborts_before_disposal() {
        let dir = TempDir::new().expect("tempdir");
        let recorder = RecordingDisposer::default();
        let engine = SweepEngine::new(
            Scanner::new(dir.path().join("gone")),
            Box::new(recorder.clone()),
            Watermarks { lower: 0, upper: 0 },
        );
        assert!(matches!(
            engine.full_sweep(SweepKind::Terminal),
            Err(DaemonError::Scan { .. })
        ));
        assert!(recorder.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn status_line_mentions_destination_when_moving() {
        let report = SweepReport {
            kind: SweepKind::Initial,
            operation: Operation::Moved,
            planned: 2,
            disposed: 2,
            first: WatchedFile::parse("chest_0_1.log").expect("name"),
            last: WatchedFile::parse("chest_0_2.log").expect("name"),
            destination: Some(PathBuf::from("/srv/archive")),
            failures: vec![],
            completed_at: Utc::now(),
        };
        assert_eq!(
            report.to_string(),
            "Moved 2 files (chest_0_1.log - chest_0_2.log) to /srv/archive at the initial cleanup."
        );
    }

    #[test]
    fn threshold_status_line_has_no_trigger_suffix() {
        let dir = TempDir::new().expect("tempdir");
        for name in ["chest_0_1.log", "chest_0_2.log", "chest_0_3.log"] {
            std::fs::write(dir.path().join(name), b"x").expect("write");
        }
        let engine = SweepEngine::new(
            Scanner::new(dir.path()),
            Box::new(RecordingDisposer::default()),
            Watermarks { lower: 1, upper: 3 },
        );

        let report = engine.threshold_sweep().expect("sweep").expect("report");
        assert_eq!(
            report.to_string(),
            "Deleted 2 files (chest_0_1.log - chest_0_2.log)."
        );
    }
}
