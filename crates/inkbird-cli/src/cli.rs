//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use inkbird_types::{AlarmMode, SamplingInterval};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Reusable device connection arguments
#[derive(Debug, Clone, Args)]
pub struct DeviceArgs {
    /// Device address (MAC address or UUID), or use INKBIRD_DEVICE env var
    #[arg(short, long, env = "INKBIRD_DEVICE")]
    pub device: Option<String>,

    /// Connection timeout in seconds
    #[arg(short = 'T', long, default_value = "30")]
    pub timeout: u64,
}

#[derive(Parser)]
#[command(name = "inkbird")]
#[command(author, version, about = "CLI for INKBIRD IAM-T1 sensors", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output compact JSON (no pretty-printing)
    #[arg(long, global = true)]
    pub compact: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stay connected and print every update
    Watch {
        #[command(flatten)]
        device: DeviceArgs,

        /// Output format (JSON prints one object per line)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Minutes between connection health checks
        #[arg(long)]
        health_check: Option<u64>,

        /// Number of readings to print before exiting (0 for unlimited)
        #[arg(short = 'n', long, default_value = "0")]
        count: u32,

        /// Where to keep the state snapshot (overrides config)
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Neither load nor save a state snapshot
        #[arg(long, conflicts_with = "snapshot")]
        no_snapshot: bool,
    },

    /// Display device model and firmware
    Info {
        #[command(flatten)]
        device: DeviceArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Configure device settings
    Set {
        #[command(flatten)]
        device: DeviceArgs,

        #[command(subcommand)]
        setting: DeviceSetting,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Device settings that can be configured
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum DeviceSetting {
    /// Set the CO2 alarm mode
    Alarm {
        /// Alarm mode (off, once, every-time)
        #[arg(value_parser = parse_alarm_mode)]
        mode: AlarmMode,
    },

    /// Set the sampling interval
    Interval {
        /// Interval in minutes (valid: 1, 2, 5, 10)
        #[arg(value_parser = parse_interval)]
        minutes: SamplingInterval,
    },
}

fn parse_alarm_mode(s: &str) -> Result<AlarmMode, String> {
    s.parse().map_err(|_| {
        format!(
            "Invalid alarm mode '{}'. Valid values: off, once, every-time",
            s
        )
    })
}

/// Parse interval value with validation
fn parse_interval(s: &str) -> Result<SamplingInterval, String> {
    s.parse().map_err(|_| {
        format!(
            "Invalid interval '{}'. Valid values: 1, 2, 5, 10 minutes",
            s
        )
    })
}

/// Configuration keys
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConfigKey {
    /// Default device address
    Device,
    /// Default connection timeout in seconds
    Timeout,
    /// Minutes between health checks in watch mode
    HealthCheck,
    /// Snapshot file used by watch
    Snapshot,
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
        /// Configuration value
        value: String,
    },

    /// Unset (remove) a configuration value
    Unset {
        /// Configuration key to remove
        #[arg(value_enum)]
        key: ConfigKey,
    },

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_set_alarm() {
        let cli = Cli::try_parse_from([
            "inkbird", "set", "-d", "AA:BB:CC:DD:EE:FF", "alarm", "every-time",
        ])
        .unwrap();
        match cli.command {
            Commands::Set { device, setting } => {
                assert_eq!(device.device.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
                assert!(matches!(
                    setting,
                    DeviceSetting::Alarm {
                        mode: AlarmMode::EveryTime
                    }
                ));
            }
            _ => panic!("expected set command"),
        }
    }

    #[test]
    fn test_parse_set_interval() {
        let cli = Cli::try_parse_from(["inkbird", "set", "interval", "5"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Set {
                setting: DeviceSetting::Interval {
                    minutes: SamplingInterval::FiveMinutes
                },
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Cli::try_parse_from(["inkbird", "set", "interval", "3"]).is_err());
        assert!(Cli::try_parse_from(["inkbird", "set", "alarm", "loud"]).is_err());
    }

    #[test]
    fn test_watch_snapshot_flags_conflict() {
        assert!(
            Cli::try_parse_from(["inkbird", "watch", "--snapshot", "s.json", "--no-snapshot"])
                .is_err()
        );
    }

    #[test]
    fn test_parse_interval_helper() {
        assert_eq!(parse_interval("10"), Ok(SamplingInterval::TenMinutes));
        assert!(parse_interval("abc").unwrap_err().contains("1, 2, 5, 10"));
    }
}
