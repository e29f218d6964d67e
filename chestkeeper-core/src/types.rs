//! Domain types for the retention daemon.
//!
//! A watched file is identified by its base name alone. Names follow the
//! `chest_<segment>_<segment>.log` scheme, whose segments embed a sortable
//! index, so lexicographic order of base names is chronological order.

use std::fmt;

use serde::{Deserialize, Serialize};

const NAME_PREFIX: &str = "chest_";
const NAME_SUFFIX: &str = ".log";

// ---------------------------------------------------------------------------
// Name pattern
// ---------------------------------------------------------------------------

/// Returns `true` if `name` matches the `chest_*_*.log` retention pattern.
///
/// Wildcards behave like shell globs: each may match any run of characters,
/// including an empty one, but the two-segment separator must be present.
/// `chest_1.log` therefore does not match while `chest_0_1.log` does.
pub fn is_watched_name(name: &str) -> bool {
    name.strip_prefix(NAME_PREFIX)
        .and_then(|rest| rest.strip_suffix(NAME_SUFFIX))
        .map(|middle| middle.contains('_'))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// WatchedFile
// ---------------------------------------------------------------------------

/// Base name of a file in the watched directory that matches the pattern.
///
/// Ordering is the ordering of the base name, which is oldest-first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WatchedFile(String);

impl WatchedFile {
    /// Wraps `name` if it matches the retention pattern.
    pub fn parse(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        is_watched_name(&name).then_some(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WatchedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<std::path::Path> for WatchedFile {
    fn as_ref(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_two_segment_names() {
        let file = WatchedFile::parse("chest_0_17.log").expect("valid name");
        assert_eq!(file.as_str(), "chest_0_17.log");
        assert_eq!(file.to_string(), "chest_0_17.log");
    }

    #[test]
    fn parse_rejects_foreign_names() {
        assert!(WatchedFile::parse("notes.txt").is_none());
        assert!(WatchedFile::parse("chest_1.log").is_none());
        assert!(WatchedFile::parse("chest_0_1.log.bak").is_none());
    }

    #[test]
    fn ordering_follows_base_name() {
        let mut files: Vec<WatchedFile> = ["chest_0_3.log", "chest_0_1.log", "chest_0_2.log"]
            .into_iter()
            .filter_map(WatchedFile::parse)
            .collect();
        files.sort();
        let names: Vec<&str> = files.iter().map(WatchedFile::as_str).collect();
        assert_eq!(names, ["chest_0_1.log", "chest_0_2.log", "chest_0_3.log"]);
    }
}
