//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::cli::ConfigKey;

/// Default connection timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Default device address
    #[serde(default)]
    pub device: Option<String>,

    /// Connection timeout in seconds
    #[serde(default)]
    pub timeout: Option<u64>,

    /// Minutes between health checks in watch mode
    #[serde(default)]
    pub health_check_minutes: Option<u64>,

    /// Snapshot file used by watch
    #[serde(default)]
    pub snapshot: Option<PathBuf>,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("inkbird")
            .join("config.toml")
    }

    /// Load config from file, or return default if not found
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from `path`, or return default if missing or unreadable
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    eprintln!("Warning: Failed to read config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    /// Save config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Set `key` from its string form
    pub fn set(&mut self, key: ConfigKey, value: &str) -> Result<()> {
        match key {
            ConfigKey::Device => self.device = Some(value.to_string()),
            ConfigKey::Timeout => self.timeout = Some(parse_positive(value, "timeout")?),
            ConfigKey::HealthCheck => {
                self.health_check_minutes = Some(parse_positive(value, "health-check")?)
            }
            ConfigKey::Snapshot => self.snapshot = Some(PathBuf::from(value)),
        }
        Ok(())
    }

    /// Remove `key`
    pub fn unset(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::Device => self.device = None,
            ConfigKey::Timeout => self.timeout = None,
            ConfigKey::HealthCheck => self.health_check_minutes = None,
            ConfigKey::Snapshot => self.snapshot = None,
        }
    }
}

fn parse_positive(value: &str, key: &str) -> Result<u64> {
    let parsed: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("'{}' is not a valid number for {}", value, key))?;
    if parsed == 0 {
        bail!("{} must be greater than zero", key);
    }
    Ok(parsed)
}

/// Resolve device from arg (which clap already fills from `INKBIRD_DEVICE`)
/// or config.
pub fn resolve_device(device: Option<String>, config: &Config) -> Option<String> {
    device
        .filter(|d| !d.trim().is_empty())
        .or_else(|| config.device.clone())
}

/// Like [`resolve_device`], but fails with a hint when nothing is configured
pub fn require_device(device: Option<String>, config: &Config) -> Result<String> {
    match resolve_device(device, config) {
        Some(device) => Ok(device),
        None => bail!(
            "No device specified. Use --device, set INKBIRD_DEVICE, or run \
             `inkbird config set device <ADDRESS>`"
        ),
    }
}

/// Resolve timeout: use provided value, fall back to config, then default
pub fn resolve_timeout(cmd_timeout: u64, config: &Config, default: u64) -> u64 {
    // If the command timeout differs from clap's default, use it
    if cmd_timeout != default {
        cmd_timeout
    } else {
        config.timeout.unwrap_or(default)
    }
}

/// Snapshot file for `device`: explicit path, config, then the data directory.
pub fn resolve_snapshot_path(
    explicit: Option<PathBuf>,
    config: &Config,
    device: &str,
) -> PathBuf {
    explicit
        .or_else(|| config.snapshot.clone())
        .unwrap_or_else(|| default_snapshot_path(device))
}

fn default_snapshot_path(device: &str) -> PathBuf {
    let file_name: String = device
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("inkbird")
        .join(format!("{}.json", file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_device_prefers_arg() {
        let config = Config {
            device: Some("config-device".to_string()),
            ..Default::default()
        };
        let result = resolve_device(Some("arg-device".to_string()), &config);
        assert_eq!(result, Some("arg-device".to_string()));
    }

    #[test]
    fn test_resolve_device_falls_back_to_config() {
        let config = Config {
            device: Some("config-device".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve_device(None, &config),
            Some("config-device".to_string())
        );
        assert_eq!(
            resolve_device(Some("  ".to_string()), &config),
            Some("config-device".to_string())
        );
    }

    #[test]
    fn test_require_device_without_any_source() {
        let err = require_device(None, &Config::default()).unwrap_err();
        assert!(err.to_string().contains("INKBIRD_DEVICE"));
    }

    #[test]
    fn test_resolve_timeout() {
        let config = Config {
            timeout: Some(60),
            ..Default::default()
        };
        assert_eq!(resolve_timeout(45, &config, 30), 45);
        assert_eq!(resolve_timeout(30, &config, 30), 60);
        assert_eq!(resolve_timeout(30, &Config::default(), 30), 30);
    }

    #[test]
    fn test_resolve_snapshot_path() {
        let config = Config {
            snapshot: Some(PathBuf::from("/tmp/configured.json")),
            ..Default::default()
        };
        assert_eq!(
            resolve_snapshot_path(Some(PathBuf::from("explicit.json")), &config, "AA"),
            PathBuf::from("explicit.json")
        );
        assert_eq!(
            resolve_snapshot_path(None, &config, "AA"),
            PathBuf::from("/tmp/configured.json")
        );

        let default = resolve_snapshot_path(None, &Config::default(), "AA:BB:CC:DD:EE:FF");
        assert!(default.ends_with("inkbird/AA_BB_CC_DD_EE_FF.json"));
    }

    #[test]
    fn test_set_and_unset() {
        let mut config = Config::default();
        config.set(ConfigKey::Device, "AA:BB:CC:DD:EE:FF").unwrap();
        config.set(ConfigKey::HealthCheck, "2").unwrap();
        assert_eq!(config.device.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
        assert_eq!(config.health_check_minutes, Some(2));

        assert!(config.set(ConfigKey::Timeout, "0").is_err());
        assert!(config.set(ConfigKey::Timeout, "soon").is_err());
        assert_eq!(config.timeout, None);

        config.unset(ConfigKey::Device);
        assert_eq!(config.device, None);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config {
            device: Some("AA:BB:CC:DD:EE:FF".to_string()),
            timeout: Some(45),
            health_check_minutes: Some(5),
            snapshot: Some(PathBuf::from("/var/lib/inkbird/state.json")),
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn test_load_missing_or_invalid_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            Config::load_from(&dir.path().join("missing.toml")),
            Config::default()
        );

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "device = [not toml").unwrap();
        assert_eq!(Config::load_from(&bad), Config::default());
    }
}
