//! `inkbird`: command-line interface for INKBIRD IAM-T1 sensors.
//!
//! | Command | Description |
//! |---------|-------------|
//! | `watch` | Stay connected and print every update |
//! | `info` | Display model and firmware |
//! | `set alarm` | Change the CO2 alarm mode |
//! | `set interval` | Change the sampling interval |
//! | `config` | Manage CLI configuration |
//!
//! The device is taken from `--device`, then `INKBIRD_DEVICE`, then the
//! `device` key in `~/.config/inkbird/config.toml` (or platform equivalent).

mod cli;
mod commands;
mod config;
mod format;
mod util;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use inkbird_core::SupervisorConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::{WatchArgs, cmd_config, cmd_info, cmd_set, cmd_watch};
use crate::config::{
    Config, DEFAULT_TIMEOUT_SECS, require_device, resolve_snapshot_path, resolve_timeout,
};
use crate::format::FormatOptions;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();
    let opts = FormatOptions {
        no_color: cli.no_color,
        compact: cli.compact,
    };

    match cli.command {
        Commands::Watch {
            device,
            format,
            health_check,
            count,
            snapshot,
            no_snapshot,
        } => {
            let identifier = require_device(device.device, &config)?;
            let timeout = resolve_timeout(device.timeout, &config, DEFAULT_TIMEOUT_SECS);
            let mut supervisor_config =
                SupervisorConfig::default().connect_timeout(Duration::from_secs(timeout));
            if let Some(minutes) = health_check.or(config.health_check_minutes) {
                supervisor_config =
                    supervisor_config.health_check_interval(Duration::from_secs(minutes * 60));
            }
            let snapshot =
                (!no_snapshot).then(|| resolve_snapshot_path(snapshot, &config, &identifier));

            cmd_watch(WatchArgs {
                identifier: &identifier,
                config: supervisor_config,
                format,
                count,
                snapshot,
                quiet: cli.quiet,
                opts: &opts,
            })
            .await?;
        }
        Commands::Info { device, format } => {
            let identifier = require_device(device.device, &config)?;
            let timeout = resolve_timeout(device.timeout, &config, DEFAULT_TIMEOUT_SECS);
            cmd_info(
                &identifier,
                Duration::from_secs(timeout),
                format,
                cli.quiet,
                &opts,
            )
            .await?;
        }
        Commands::Set { device, setting } => {
            let identifier = require_device(device.device, &config)?;
            let timeout = resolve_timeout(device.timeout, &config, DEFAULT_TIMEOUT_SECS);
            cmd_set(
                &identifier,
                Duration::from_secs(timeout),
                setting,
                cli.quiet,
                &opts,
            )
            .await?;
        }
        Commands::Config { action } => cmd_config(action)?,
    }

    Ok(())
}
