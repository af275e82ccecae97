//! Set command implementation.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::cli::DeviceSetting;
use crate::format::{FormatOptions, format_state_text};
use crate::util::{command_config, start_supervisor, write_output};

fn describe(setting: DeviceSetting) -> String {
    match setting {
        DeviceSetting::Alarm { mode } => format!("Alarm mode set to {}", mode),
        DeviceSetting::Interval { minutes } => format!("Sampling interval set to {}", minutes),
    }
}

pub async fn cmd_set(
    identifier: &str,
    connect_timeout: Duration,
    setting: DeviceSetting,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    let supervisor = start_supervisor(identifier, command_config(connect_timeout), None).await?;

    let result = match setting {
        DeviceSetting::Alarm { mode } => supervisor.set_alarm_mode(mode).await,
        DeviceSetting::Interval { minutes } => supervisor.set_sampling_interval(minutes).await,
    };
    let state = supervisor.state();
    supervisor.shutdown().await;
    result.context("Failed to apply setting")?;

    if !quiet {
        println!("{}", describe(setting));
        write_output(&format_state_text(&state, opts))?;
    }
    Ok(())
}
