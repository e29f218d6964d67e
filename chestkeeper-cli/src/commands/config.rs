//! `chestkeeper config`: resolve file + flag overrides into one `DaemonConfig`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use chestkeeper_core::{config, Cadence, DaemonConfig};

use super::home_dir;

/// Config source and per-key overrides, shared by `run` and `config`.
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Config file to read instead of ~/.chestkeeper/config.yaml.
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding the chest_*_*.log files.
    #[arg(long, value_name = "PATH")]
    pub dir: Option<PathBuf>,

    /// Seconds between checks.
    #[arg(long, value_name = "SECS")]
    pub interval: Option<f64>,

    /// Files to keep after a threshold sweep.
    #[arg(long, value_name = "N")]
    pub lower: Option<usize>,

    /// File count that triggers a threshold sweep.
    #[arg(long, value_name = "N")]
    pub upper: Option<usize>,

    /// Move disposed files here instead of deleting them.
    #[arg(long, value_name = "PATH")]
    pub archive: Option<PathBuf>,

    /// Waits per tick: parity (two) or single (one).
    #[arg(long, value_name = "MODE")]
    pub cadence: Option<Cadence>,
}

impl ConfigArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let config = self.resolve(&home)?;
        let yaml = config
            .to_yaml()
            .context("failed to render configuration")?;
        print!("{yaml}");
        Ok(())
    }

    /// Load the file, apply flag overrides, and validate the result.
    pub fn resolve(&self, home: &Path) -> Result<DaemonConfig> {
        let mut config = match &self.config {
            Some(path) => config::load_file(path)
                .with_context(|| format!("failed to load config '{}'", path.display()))?,
            None => config::load_at(home).context("failed to load ~/.chestkeeper/config.yaml")?,
        };
        self.apply(&mut config);
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn apply(&self, config: &mut DaemonConfig) {
        if let Some(dir) = &self.dir {
            config.watched_dir = dir.clone();
        }
        if let Some(interval) = self.interval {
            config.poll_interval_secs = interval;
        }
        if let Some(lower) = self.lower {
            config.lower_watermark = lower;
        }
        if let Some(upper) = self.upper {
            config.upper_watermark = upper;
        }
        if let Some(archive) = &self.archive {
            config.archive_dir = Some(archive.clone());
        }
        if let Some(cadence) = self.cadence {
            config.cadence = cadence;
        }
    }
}
