//! Chestkeeper core library: domain types, daemon configuration, errors.
//!
//! - [`types`]: [`WatchedFile`] and the `chest_<a>_<b>.log` name pattern
//! - [`config`]: [`DaemonConfig`], YAML loading and validation
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{Cadence, DaemonConfig};
pub use error::ConfigError;
pub use types::{is_watched_name, WatchedFile};
