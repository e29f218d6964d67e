//! Daemon configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.chestkeeper/
//!   config.yaml          (optional; every key has a default)
//!   chestkeeper.sock     (control socket of a running daemon)
//! ```
//!
//! # API pattern
//!
//! Loading has two forms:
//! - `load_at(home: &Path)`: explicit home; used in tests with `TempDir`
//! - `load()`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_WATCHED_DIR: &str = "/dev/shm";
pub const DEFAULT_POLL_INTERVAL_SECS: f64 = 2.0;
pub const DEFAULT_LOWER_WATERMARK: usize = 50;
pub const DEFAULT_UPPER_WATERMARK: usize = 500;

pub const CONFIG_FILE: &str = "config.yaml";

// ---------------------------------------------------------------------------
// Cadence
// ---------------------------------------------------------------------------

/// How many interval waits the run loop performs per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    /// Wait for commands, sweep, then wait the same interval again.
    #[default]
    Parity,
    /// One wait per tick.
    Single,
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cadence::Parity => write!(f, "parity"),
            Cadence::Single => write!(f, "single"),
        }
    }
}

impl FromStr for Cadence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "parity" => Ok(Cadence::Parity),
            "single" => Ok(Cadence::Single),
            other => Err(format!(
                "unknown cadence '{other}'; expected: parity, single"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// DaemonConfig
// ---------------------------------------------------------------------------

/// Immutable settings handed to the retention daemon at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Directory holding the rotating `chest_*_*.log` files.
    pub watched_dir: PathBuf,
    /// Seconds between checks; must be finite and positive.
    pub poll_interval_secs: f64,
    /// Files to retain after a threshold sweep.
    pub lower_watermark: usize,
    /// File count that triggers a threshold sweep.
    pub upper_watermark: usize,
    /// When set, disposed files are moved here instead of deleted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_dir: Option<PathBuf>,
    pub cadence: Cadence,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            watched_dir: PathBuf::from(DEFAULT_WATCHED_DIR),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            lower_watermark: DEFAULT_LOWER_WATERMARK,
            upper_watermark: DEFAULT_UPPER_WATERMARK,
            archive_dir: None,
            cadence: Cadence::default(),
        }
    }
}

impl DaemonConfig {
    /// Checks the numeric invariants the watermark arithmetic relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let representable = Duration::try_from_secs_f64(self.poll_interval_secs).is_ok();
        if !representable || self.poll_interval_secs <= 0.0 {
            return Err(ConfigError::InvalidInterval(self.poll_interval_secs));
        }
        if self.upper_watermark < self.lower_watermark {
            return Err(ConfigError::WatermarkOrder {
                lower: self.lower_watermark,
                upper: self.upper_watermark,
            });
        }
        Ok(())
    }

    /// Checks that the directories the daemon touches exist right now.
    pub fn check_directories(&self) -> Result<(), ConfigError> {
        if !self.watched_dir.is_dir() {
            return Err(ConfigError::WatchedDirMissing {
                path: self.watched_dir.clone(),
            });
        }
        if let Some(archive) = &self.archive_dir {
            if !archive.is_dir() {
                return Err(ConfigError::ArchiveDirMissing {
                    path: archive.clone(),
                });
            }
        }
        Ok(())
    }

    /// Poll interval as a `Duration`, saturating for values
    /// [`validate`](Self::validate) would reject.
    pub fn poll_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.poll_interval_secs).unwrap_or(Duration::MAX)
    }

    /// Render as YAML (used by `chestkeeper config`).
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

// ---------------------------------------------------------------------------
// Paths + load
// ---------------------------------------------------------------------------

/// `<home>/.chestkeeper/`
pub fn config_dir_at(home: &Path) -> PathBuf {
    home.join(".chestkeeper")
}

/// `<home>/.chestkeeper/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    config_dir_at(home).join(CONFIG_FILE)
}

/// Load `<home>/.chestkeeper/config.yaml`, falling back to defaults when absent.
///
/// The result is not validated; callers apply overrides first.
pub fn load_at(home: &Path) -> Result<DaemonConfig, ConfigError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(DaemonConfig::default());
    }
    load_file(&path)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<DaemonConfig, ConfigError> {
    load_at(&home()?)
}

/// Load an explicit config file. Unlike [`load_at`], the file must exist.
pub fn load_file(path: &Path) -> Result<DaemonConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(DaemonConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
