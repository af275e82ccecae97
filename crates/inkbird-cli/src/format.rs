//! Output formatting for device state and identity.

use anyhow::Result;
use inkbird_core::DeviceState;
use inkbird_types::{DeviceIdentity, SensorReading};
use owo_colors::OwoColorize;
use serde::Serialize;
use time::OffsetDateTime;

/// Formatting options shared by all commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
    /// Use compact JSON output (no pretty-printing).
    pub compact: bool,
}

impl FormatOptions {
    /// Serialize `value` as JSON, honoring `compact`.
    pub fn as_json<T: Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.compact {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        Ok(json + "\n")
    }

    fn bold(&self, text: &str) -> String {
        if self.no_color {
            text.to_string()
        } else {
            text.bold().to_string()
        }
    }
}

/// JSON line emitted by `watch --format json`.
#[derive(Debug, Serialize)]
pub struct WatchRecord<'a> {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(flatten)]
    pub state: &'a DeviceState,
}

pub fn format_identity_text(identity: &DeviceIdentity, opts: &FormatOptions) -> String {
    let rows = [
        ("Name", identity.display_name()),
        ("Address", identity.address.clone()),
        ("Manufacturer", identity.manufacturer.clone()),
        ("Model", or_unknown(&identity.model)),
        ("Firmware", or_unknown(&identity.firmware)),
    ];
    let mut out = format!("{}\n", opts.bold("Device Information"));
    for (label, value) in rows {
        out.push_str(&format!("  {:<13} {}\n", label, value));
    }
    out
}

pub fn format_state_text(state: &DeviceState, opts: &FormatOptions) -> String {
    let mut out = format!("{}\n", opts.bold(&state.identity.display_name()));
    let rows = [
        ("Temperature", temperature(state.reading.temperature)),
        ("Humidity", humidity(state.reading.humidity)),
        ("CO2", co2(state.reading.co2, opts)),
        ("Pressure", pressure(state.reading.pressure)),
        ("Unit", display_or_unknown(state.temperature_unit)),
        ("Interval", display_or_unknown(state.sampling_interval)),
        ("Alarm", display_or_unknown(state.alarm_mode)),
    ];
    for (label, value) in rows {
        out.push_str(&format!("  {:<12} {}\n", label, value));
    }
    out
}

/// One line per update: timestamp, then whatever is known.
pub fn format_watch_line(
    state: &DeviceState,
    timestamp: OffsetDateTime,
    opts: &FormatOptions,
) -> String {
    let mut parts = vec![format!(
        "[{:02}:{:02}:{:02}]",
        timestamp.hour(),
        timestamp.minute(),
        timestamp.second()
    )];

    let SensorReading {
        temperature: temp,
        humidity: hum,
        co2: ppm,
        pressure: hpa,
    } = state.reading;
    if ppm.is_some() {
        parts.push(co2(ppm, opts));
    }
    if temp.is_some() {
        parts.push(temperature(temp));
    }
    if hum.is_some() {
        parts.push(humidity(hum));
    }
    if hpa.is_some() {
        parts.push(pressure(hpa));
    }
    if let Some(mode) = state.alarm_mode {
        parts.push(format!("alarm {}", mode));
    }
    if let Some(interval) = state.sampling_interval {
        parts.push(format!("every {}", interval));
    }

    parts.join("  ") + "\n"
}

pub fn format_watch_json(
    state: &DeviceState,
    timestamp: OffsetDateTime,
) -> Result<String> {
    let record = WatchRecord { timestamp, state };
    Ok(serde_json::to_string(&record)? + "\n")
}

fn temperature(value: Option<f32>) -> String {
    match value {
        Some(c) => format!("{:.1}°C", c),
        None => "--".to_string(),
    }
}

fn humidity(value: Option<f32>) -> String {
    match value {
        Some(h) => format!("{:.1}%", h),
        None => "--".to_string(),
    }
}

fn pressure(value: Option<u16>) -> String {
    match value {
        Some(p) => format!("{} hPa", p),
        None => "--".to_string(),
    }
}

fn co2(value: Option<u16>, opts: &FormatOptions) -> String {
    let Some(ppm) = value else {
        return "--".to_string();
    };
    let text = format!("{} ppm", ppm);
    if opts.no_color {
        return text;
    }
    // Common indoor air quality bands.
    match ppm {
        0..=999 => text.green().to_string(),
        1000..=1399 => text.yellow().to_string(),
        _ => text.red().to_string(),
    }
}

fn display_or_unknown<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}

fn or_unknown(value: &str) -> String {
    if value.is_empty() {
        "unknown".to_string()
    } else {
        value.to_string()
    }
}
