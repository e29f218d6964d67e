//! `chestkeeper status`: daemon state, watermarks, and the last sweep.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use chestkeeper_daemon::{paths::socket_path, request_status, DaemonError, DaemonStatus};

use super::home_dir;

/// Arguments for `chestkeeper status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

/// `--json` output: the daemon's status flattened next to where it was looked for.
#[derive(Serialize)]
struct StatusOutput {
    running: bool,
    socket: PathBuf,
    #[serde(flatten)]
    daemon: Option<DaemonStatus>,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let daemon = match request_status(&home) {
            Ok(status) => Some(status),
            Err(DaemonError::DaemonNotRunning { .. }) => None,
            Err(err) => return Err(err).context("failed to query daemon status"),
        };

        if self.json {
            let output = StatusOutput {
                running: daemon.is_some(),
                socket: socket_path(&home),
                daemon,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&output)
                    .context("failed to render daemon status JSON")?
            );
            return Ok(());
        }

        match daemon {
            Some(status) => print_human(&status),
            None => println!("{}", "daemon is not running".yellow()),
        }
        Ok(())
    }
}

fn print_human(status: &DaemonStatus) {
    let config = &status.config;
    println!("{} ({})", "daemon running".green().bold(), status.state);
    println!("  watched:   {}", config.watched_dir.display());
    match &config.archive_dir {
        Some(archive) => println!("  archive:   {}", archive.display()),
        None => println!("  archive:   - (files are deleted)"),
    }
    println!(
        "  watermarks: lower {} / upper {}",
        config.lower_watermark, config.upper_watermark
    );
    println!(
        "  interval:  {}s ({} cadence)",
        config.poll_interval_secs, config.cadence
    );
    match (status.matching_files, &status.scan_error) {
        (Some(count), _) => println!("  files:     {count}"),
        (None, error) => println!(
            "  files:     {} {}",
            "scan failed:".red(),
            error.as_deref().unwrap_or("-")
        ),
    }
    println!(
        "  started:   {}",
        status.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    match &status.last_sweep {
        None => println!("  last sweep: none yet"),
        Some(sweep) => {
            println!("  last sweep: {sweep}");
            for failure in &sweep.failures {
                println!("    {} {}: {}", "failed".red(), failure.file, failure.error);
            }
        }
    }
}
