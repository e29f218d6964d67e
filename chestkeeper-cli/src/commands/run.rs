//! `chestkeeper run`: foreground retention daemon.

use anyhow::{Context, Result};
use clap::Args;

use chestkeeper_daemon::start_blocking;

use super::{config::ConfigArgs, home_dir};

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let config = self.config.resolve(&home)?;
        start_blocking(&home, config).context("daemon exited with error")?;
        Ok(())
    }
}
