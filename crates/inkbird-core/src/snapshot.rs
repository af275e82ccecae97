//! Persisted device state.
//!
//! A [`StateSnapshot`] lets a host carry the last-known configuration and
//! measurements across restarts and seed a new supervisor with
//! [`Supervisor::with_state`](crate::Supervisor::with_state). Enum values are
//! stored as strings; a value this version does not know (for example one
//! written by a newer release) is restored as absent rather than failing the
//! whole load.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::debug;

use inkbird_types::{DeviceIdentity, SensorReading};

use crate::error::Result;
use crate::state::DeviceState;

/// Serializable form of a [`DeviceState`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Device identity.
    pub identity: DeviceIdentity,
    /// Alarm mode name, e.g. `every_time`.
    #[serde(default)]
    pub alarm_mode: Option<String>,
    /// Sampling interval name, e.g. `five_minutes`.
    #[serde(default)]
    pub sampling_interval: Option<String>,
    /// Temperature unit name, `celsius` or `fahrenheit`.
    #[serde(default)]
    pub temperature_unit: Option<String>,
    /// Last measurements.
    #[serde(default)]
    pub reading: SensorReading,
    /// When the snapshot was taken.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub saved_at: Option<OffsetDateTime>,
}

impl StateSnapshot {
    /// Capture `state` now.
    pub fn from_state(state: &DeviceState) -> Self {
        Self {
            identity: state.identity.clone(),
            alarm_mode: encode_name(state.alarm_mode),
            sampling_interval: encode_name(state.sampling_interval),
            temperature_unit: encode_name(state.temperature_unit),
            reading: state.reading,
            saved_at: Some(OffsetDateTime::now_utc()),
        }
    }

    /// Convert back into a [`DeviceState`]. Unknown enum names become `None`.
    pub fn into_state(self) -> DeviceState {
        DeviceState {
            alarm_mode: decode_name("alarm_mode", self.alarm_mode.as_deref()),
            sampling_interval: decode_name("sampling_interval", self.sampling_interval.as_deref()),
            temperature_unit: decode_name("temperature_unit", self.temperature_unit.as_deref()),
            identity: self.identity,
            reading: self.reading,
        }
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the snapshot to `path`, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        debug!(path = %path.display(), "Saved state snapshot");
        Ok(())
    }

    /// Read a snapshot from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }
}

impl From<&DeviceState> for StateSnapshot {
    fn from(state: &DeviceState) -> Self {
        Self::from_state(state)
    }
}

fn encode_name<T: Serialize>(value: Option<T>) -> Option<String> {
    match serde_json::to_value(value?) {
        Ok(Value::String(name)) => Some(name),
        _ => None,
    }
}

fn decode_name<T: DeserializeOwned>(field: &str, name: Option<&str>) -> Option<T> {
    let name = name?;
    match serde_json::from_value(Value::String(name.to_string())) {
        Ok(value) => Some(value),
        Err(_) => {
            debug!(field, value = name, "Ignoring unknown snapshot value");
            None
        }
    }
}
