//! Core types for INKBIRD sensor data and settings.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Manufacturer string reported for every device of this product family.
pub const MANUFACTURER: &str = "INKBIRD";

/// Advertised local-name prefix of supported sensors (`Ink@IAM-T1`).
pub const LOCAL_NAME_PREFIX: &str = "Ink@IAM-T";

/// Returns `true` if an advertised local name belongs to a supported sensor.
///
/// ```
/// use inkbird_types::is_supported_name;
///
/// assert!(is_supported_name("Ink@IAM-T1"));
/// assert!(!is_supported_name("Thermo 12345"));
/// ```
#[must_use]
pub fn is_supported_name(name: &str) -> bool {
    name.starts_with(LOCAL_NAME_PREFIX)
}

/// Alarm behaviour of the device buzzer when a CO2 limit is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AlarmMode {
    /// Never sound the alarm.
    Off,
    /// Sound the alarm once per exceedance.
    Once,
    /// Sound the alarm on every measurement above the limit.
    EveryTime,
}

impl AlarmMode {
    /// All alarm modes, in display order.
    pub const ALL: [AlarmMode; 3] = [AlarmMode::Off, AlarmMode::Once, AlarmMode::EveryTime];
}

impl fmt::Display for AlarmMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlarmMode::Off => write!(f, "off"),
            AlarmMode::Once => write!(f, "once"),
            AlarmMode::EveryTime => write!(f, "every-time"),
        }
    }
}

impl FromStr for AlarmMode {
    type Err = ParseError;

    /// Parse an alarm mode name, case-insensitively.
    ///
    /// ```
    /// use inkbird_types::AlarmMode;
    ///
    /// assert_eq!("once".parse(), Ok(AlarmMode::Once));
    /// assert_eq!("EVERY_TIME".parse(), Ok(AlarmMode::EveryTime));
    /// assert!("sometimes".parse::<AlarmMode>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "off" => Ok(AlarmMode::Off),
            "once" => Ok(AlarmMode::Once),
            "every-time" | "everytime" | "always" => Ok(AlarmMode::EveryTime),
            other => Err(ParseError::InvalidValue(format!(
                "unknown alarm mode '{}' (expected off, once or every-time)",
                other
            ))),
        }
    }
}

/// How often the sensor takes a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SamplingInterval {
    /// 1 minute interval.
    OneMinute,
    /// 2 minute interval.
    TwoMinutes,
    /// 5 minute interval.
    FiveMinutes,
    /// 10 minute interval.
    TenMinutes,
}

impl SamplingInterval {
    /// All sampling intervals, shortest first.
    pub const ALL: [SamplingInterval; 4] = [
        SamplingInterval::OneMinute,
        SamplingInterval::TwoMinutes,
        SamplingInterval::FiveMinutes,
        SamplingInterval::TenMinutes,
    ];

    /// Get the interval in minutes.
    #[must_use]
    pub fn as_minutes(&self) -> u8 {
        match self {
            SamplingInterval::OneMinute => 1,
            SamplingInterval::TwoMinutes => 2,
            SamplingInterval::FiveMinutes => 5,
            SamplingInterval::TenMinutes => 10,
        }
    }

    /// Get the interval in seconds.
    #[must_use]
    pub fn as_seconds(&self) -> u16 {
        u16::from(self.as_minutes()) * 60
    }

    /// Try to create from minutes value.
    #[must_use]
    pub fn from_minutes(minutes: u8) -> Option<Self> {
        match minutes {
            1 => Some(SamplingInterval::OneMinute),
            2 => Some(SamplingInterval::TwoMinutes),
            5 => Some(SamplingInterval::FiveMinutes),
            10 => Some(SamplingInterval::TenMinutes),
            _ => None,
        }
    }
}

impl fmt::Display for SamplingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} min", self.as_minutes())
    }
}

impl FromStr for SamplingInterval {
    type Err = ParseError;

    /// Parse a number of minutes, optionally suffixed with `m` or `min`.
    ///
    /// ```
    /// use inkbird_types::SamplingInterval;
    ///
    /// assert_eq!("5".parse(), Ok(SamplingInterval::FiveMinutes));
    /// assert_eq!("10min".parse(), Ok(SamplingInterval::TenMinutes));
    /// assert!("3".parse::<SamplingInterval>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().to_lowercase();
        let digits = trimmed
            .trim_end_matches("min")
            .trim_end_matches('m')
            .trim();
        digits
            .parse::<u8>()
            .ok()
            .and_then(SamplingInterval::from_minutes)
            .ok_or_else(|| {
                ParseError::InvalidValue(format!(
                    "unknown sampling interval '{}' (expected 1, 2, 5 or 10 minutes)",
                    s.trim()
                ))
            })
    }
}

/// Temperature unit the device displays and reports in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TemperatureUnit {
    /// Degrees Celsius.
    Celsius,
    /// Degrees Fahrenheit.
    Fahrenheit,
}

impl TemperatureUnit {
    /// Convert a value expressed in this unit to degrees Celsius.
    #[must_use]
    pub fn to_celsius(&self, value: f32) -> f32 {
        match self {
            TemperatureUnit::Celsius => value,
            TemperatureUnit::Fahrenheit => (value - 32.0) * 5.0 / 9.0,
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemperatureUnit::Celsius => write!(f, "°C"),
            TemperatureUnit::Fahrenheit => write!(f, "°F"),
        }
    }
}

impl FromStr for TemperatureUnit {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "c" | "celsius" | "°c" => Ok(TemperatureUnit::Celsius),
            "f" | "fahrenheit" | "°f" => Ok(TemperatureUnit::Fahrenheit),
            other => Err(ParseError::InvalidValue(format!(
                "unknown temperature unit '{}'",
                other
            ))),
        }
    }
}

/// One measurement snapshot from the sensor.
///
/// A reading frame is a complete snapshot rather than a delta, so the four
/// fields are always replaced together.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorReading {
    /// Temperature in degrees Celsius, one decimal place.
    ///
    /// `None` while the device's temperature unit is unknown.
    pub temperature: Option<f32>,
    /// Relative humidity in percent, one decimal place.
    pub humidity: Option<f32>,
    /// CO2 concentration in ppm.
    pub co2: Option<u16>,
    /// Atmospheric pressure in hPa.
    pub pressure: Option<u16>,
}

impl SensorReading {
    /// Returns `true` if no measurement is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.humidity.is_none()
            && self.co2.is_none()
            && self.pressure.is_none()
    }
}

/// Static identity of a sensor, captured once during discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceIdentity {
    /// Connection identifier (MAC address on Linux/Windows, UUID on macOS).
    pub address: String,
    /// Manufacturer name.
    pub manufacturer: String,
    /// Model string (e.g. `Ink@IAM-T1`).
    pub model: String,
    /// Firmware version string (e.g. `YBWY02-V1.0`).
    pub firmware: String,
}

impl DeviceIdentity {
    /// Create an identity for `address` with the family manufacturer and no
    /// model or firmware information yet.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            manufacturer: MANUFACTURER.to_string(),
            model: String::new(),
            firmware: String::new(),
        }
    }

    /// Human-readable name such as `Ink@IAM-T1 (EEFF)`.
    ///
    /// ```
    /// use inkbird_types::DeviceIdentity;
    ///
    /// let mut identity = DeviceIdentity::new("aa:bb:cc:dd:ee:ff");
    /// assert_eq!(identity.display_name(), "aa:bb:cc:dd:ee:ff");
    ///
    /// identity.model = "Ink@IAM-T1".to_string();
    /// assert_eq!(identity.display_name(), "Ink@IAM-T1 (EEFF)");
    /// ```
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.model.is_empty() {
            return self.address.clone();
        }
        format!("{} ({})", self.model, short_address(&self.address))
    }
}

/// Last four hex digits of an address, upper-cased.
fn short_address(address: &str) -> String {
    let normalized = address.replace('-', ":");
    let parts: Vec<&str> = normalized.split(':').collect();
    let tail = if parts.len() >= 2 {
        format!("{}{}", parts[parts.len() - 2], parts[parts.len() - 1])
    } else {
        normalized.clone()
    };
    let tail = tail.to_uppercase();
    let start = tail.len().saturating_sub(4);
    tail.get(start..).unwrap_or(&tail).to_string()
}
