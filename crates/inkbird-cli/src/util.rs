//! Helpers shared by the command implementations.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use inkbird_core::{BleTransport, DeviceState, Supervisor, SupervisorConfig};
use time::OffsetDateTime;

/// Create a supervisor for `identifier` and bring it up.
///
/// `config.connect_timeout` bounds the first connect and handshake,
/// including the scan.
pub async fn start_supervisor(
    identifier: &str,
    config: SupervisorConfig,
    seed: Option<DeviceState>,
) -> Result<Supervisor<BleTransport>> {
    let transport = BleTransport::new(identifier);
    let supervisor = match seed {
        Some(state) => Supervisor::with_state(transport, config, state)?,
        None => Supervisor::new(transport, config)?,
    };
    supervisor
        .start()
        .await
        .with_context(|| format!("Failed to connect to {}", identifier))?;
    Ok(supervisor)
}

/// Supervisor settings for a one-shot command.
pub fn command_config(timeout: Duration) -> SupervisorConfig {
    SupervisorConfig::default().connect_timeout(timeout)
}

/// Current local time, or UTC if the offset cannot be determined.
pub fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Write to stdout and flush, so piped output appears line by line.
pub fn write_output(content: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(content.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
