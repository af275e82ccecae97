//! Watch command implementation.
//!
//! Keeps one supervised connection open and prints every state update. The
//! supervisor checks the link every few minutes and reconnects on its own, so
//! this loop only reports what happens. The last known state is written to a
//! snapshot file and used to seed the next run.

use std::path::{Path, PathBuf};

use anyhow::Result;
use inkbird_core::{
    ConnectionState, DeviceState, StateSnapshot, SupervisorConfig, SupervisorEvent,
};
use owo_colors::OwoColorize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::cli::OutputFormat;
use crate::format::{FormatOptions, format_watch_json, format_watch_line};
use crate::util::{local_now, start_supervisor, write_output};

/// Arguments for the watch command.
pub struct WatchArgs<'a> {
    pub identifier: &'a str,
    pub config: SupervisorConfig,
    pub format: OutputFormat,
    pub count: u32,
    pub snapshot: Option<PathBuf>,
    pub quiet: bool,
    pub opts: &'a FormatOptions,
}

pub async fn cmd_watch(args: WatchArgs<'_>) -> Result<()> {
    let WatchArgs {
        identifier,
        config,
        format,
        count,
        snapshot,
        quiet,
        opts,
    } = args;

    let health_check = config.health_check_interval;
    let seed = snapshot.as_deref().and_then(load_snapshot);
    let supervisor = start_supervisor(identifier, config, seed).await?;

    if !quiet {
        let name = supervisor.state().identity.display_name();
        let header = if opts.no_color {
            format!("Watching: {}", name)
        } else {
            format!("Watching: {}", name.green())
        };
        eprintln!("{}", header);
        eprintln!(
            "Health check: every {}s | Press Ctrl+C to stop",
            health_check.as_secs()
        );
        eprintln!("{}", "-".repeat(50));
    }

    let mut updates = supervisor.subscribe();
    let mut events = supervisor.events();
    let mut readings_seen: u32 = 0;

    // The handshake usually delivers a full state dump before we get here.
    let initial = updates.borrow_and_update().clone();
    emit(&initial, format, opts)?;
    if !initial.reading.is_empty() {
        readings_seen += 1;
    }

    while count == 0 || readings_seen < count {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                if !quiet {
                    eprintln!("\nShutting down...");
                }
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                emit(&state, format, opts)?;
                if let Some(path) = &snapshot {
                    save_snapshot(path, &state);
                }
            }
            event = events.recv() => match event {
                Ok(event) if is_reading(&event) => readings_seen += 1,
                Ok(SupervisorEvent::ConnectionChanged { state, .. }) => {
                    report_connection(state, quiet);
                }
                Ok(SupervisorEvent::ReconnectFailed { error, .. }) => {
                    eprintln!("Reconnect failed: {}. Retrying at next health check.", error);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Event receiver lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    }

    // The last counted reading may still be waiting on the update channel.
    if updates.has_changed().unwrap_or(false) {
        let state = updates.borrow_and_update().clone();
        emit(&state, format, opts)?;
    }
    if count > 0 && readings_seen >= count && !quiet {
        eprintln!("Completed {} readings.", readings_seen);
    }
    if let Some(path) = &snapshot {
        save_snapshot(path, &supervisor.state());
    }
    supervisor.shutdown().await;
    Ok(())
}

fn emit(state: &DeviceState, format: OutputFormat, opts: &FormatOptions) -> Result<()> {
    let line = match format {
        OutputFormat::Text => format_watch_line(state, local_now(), opts),
        OutputFormat::Json => format_watch_json(state, local_now())?,
    };
    write_output(&line)
}

/// Whether `event` reports a measurement frame. Repeated identical readings
/// each count.
fn is_reading(event: &SupervisorEvent) -> bool {
    matches!(event, SupervisorEvent::ReadingReceived { .. })
}

fn report_connection(state: ConnectionState, quiet: bool) {
    if quiet {
        return;
    }
    match state {
        ConnectionState::Active => eprintln!("Connected."),
        ConnectionState::Disconnected => {
            eprintln!("Connection lost. Reconnecting at next health check...")
        }
        _ => {}
    }
}

fn load_snapshot(path: &Path) -> Option<DeviceState> {
    if !path.exists() {
        return None;
    }
    match StateSnapshot::load(path) {
        Ok(snapshot) => {
            debug!(path = %path.display(), "Seeding state from snapshot");
            Some(snapshot.into_state())
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable snapshot");
            None
        }
    }
}

fn save_snapshot(path: &Path, state: &DeviceState) {
    if let Err(e) = StateSnapshot::from_state(state).save(path) {
        warn!(path = %path.display(), error = %e, "Failed to save snapshot");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkbird_core::{AlarmMode, SensorReading};

    #[test]
    fn test_snapshot_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        assert!(load_snapshot(&path).is_none());

        let mut state = DeviceState::new("AA:BB:CC:DD:EE:FF");
        state.alarm_mode = Some(AlarmMode::Off);
        state.reading.co2 = Some(700);
        save_snapshot(&path, &state);

        assert_eq!(load_snapshot(&path), Some(state));
    }

    #[test]
    fn test_identical_readings_each_count() {
        let reading = SensorReading {
            co2: Some(640),
            ..Default::default()
        };
        let events = [
            SupervisorEvent::ReadingReceived {
                device: "dev".to_string(),
                reading,
            },
            SupervisorEvent::StateChanged {
                device: "dev".to_string(),
                state: DeviceState::new("dev"),
            },
            SupervisorEvent::ReadingReceived {
                device: "dev".to_string(),
                reading,
            },
            SupervisorEvent::ConnectionChanged {
                device: "dev".to_string(),
                state: ConnectionState::Active,
            },
        ];
        assert_eq!(events.iter().filter(|e| is_reading(e)).count(), 2);
    }

    #[test]
    fn test_corrupt_snapshot_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_snapshot(&path).is_none());
    }
}
