//! Error types for chestkeeper-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading or validating daemon configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure while reading the config file.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (used when rendering the effective config).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file path.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    #[error("poll interval must be a positive, representable number of seconds, got {0}")]
    InvalidInterval(f64),

    #[error("upper watermark ({upper}) must not be below lower watermark ({lower})")]
    WatermarkOrder { lower: usize, upper: usize },

    #[error("watched directory does not exist or is not a directory: {path}")]
    WatchedDirMissing { path: PathBuf },

    #[error("archive directory does not exist or is not a directory: {path}")]
    ArchiveDirMissing { path: PathBuf },
}
