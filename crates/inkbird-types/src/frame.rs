//! Frame codec for the IAM-T1 notification protocol.
//!
//! Every frame starts with the preamble `55 AA` followed by an opcode byte.
//! Configuration frames (alarm mode, sampling interval, temperature unit) are
//! fixed byte sequences: the device sends exactly the same bytes it accepts as
//! a command, so a single table per setting serves both directions.
//!
//! Sensor reading layout (opcode `0x01`, at least 13 bytes):
//!
//! | Offset | Size | Meaning |
//! |--------|------|---------|
//! | 0      | 2    | preamble `55 AA` |
//! | 2      | 1    | opcode `0x01` |
//! | 3      | 1    | frame length |
//! | 4      | 1    | temperature sign (`1` = negative) |
//! | 5      | 2    | temperature magnitude, tenths of a degree (BE) |
//! | 7      | 2    | humidity, tenths of a percent (BE) |
//! | 9      | 2    | CO2, ppm (BE) |
//! | 11     | 2    | pressure, hPa (BE) |
//!
//! Decoding never fails: input that is not a frame, carries an unknown
//! opcode or is too short decodes to [`Decoded::Unrecognized`].

use core::fmt;

use bytes::{Buf, Bytes};

use crate::types::{AlarmMode, SamplingInterval, SensorReading, TemperatureUnit};

/// Two-byte preamble at the start of every frame.
pub const PREAMBLE: [u8; 2] = [0x55, 0xAA];

/// Minimum length of a sensor reading frame.
pub const MIN_READING_FRAME_LEN: usize = 13;

/// Frame opcode, read from byte offset 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// `0x01`: temperature, humidity, CO2 and pressure.
    SensorReading,
    /// `0x02`: current sampling interval.
    SamplingIntervalReport,
    /// `0x03`: CO2 alarm limits. Reserved; carries no state.
    LimitsReport,
    /// `0x04`: current alarm mode.
    AlarmModeReport,
    /// `0x05`: current temperature unit.
    TemperatureUnitReport,
    /// Any opcode not listed above.
    Unknown(u8),
}

impl Opcode {
    /// The wire value of this opcode.
    #[must_use]
    pub fn as_byte(&self) -> u8 {
        match self {
            Opcode::SensorReading => 0x01,
            Opcode::SamplingIntervalReport => 0x02,
            Opcode::LimitsReport => 0x03,
            Opcode::AlarmModeReport => 0x04,
            Opcode::TemperatureUnitReport => 0x05,
            Opcode::Unknown(byte) => *byte,
        }
    }
}

impl From<u8> for Opcode {
    fn from(value: u8) -> Self {
        match value {
            0x01 => Opcode::SensorReading,
            0x02 => Opcode::SamplingIntervalReport,
            0x03 => Opcode::LimitsReport,
            0x04 => Opcode::AlarmModeReport,
            0x05 => Opcode::TemperatureUnitReport,
            other => Opcode::Unknown(other),
        }
    }
}

/// An immutable protocol frame.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Frame(Bytes);

impl Frame {
    /// Wrap a static byte sequence without copying.
    #[must_use]
    pub const fn from_static(bytes: &'static [u8]) -> Self {
        Frame(Bytes::from_static(bytes))
    }

    /// Copy a received buffer into a frame.
    #[must_use]
    pub fn copy_from_slice(bytes: &[u8]) -> Self {
        Frame(Bytes::copy_from_slice(bytes))
    }

    /// Returns `true` if the buffer starts with the protocol preamble.
    #[must_use]
    pub fn has_preamble(&self) -> bool {
        self.0.starts_with(&PREAMBLE)
    }

    /// The opcode, if the frame has a preamble and an opcode byte.
    #[must_use]
    pub fn opcode(&self) -> Option<Opcode> {
        if !self.has_preamble() {
            return None;
        }
        self.0.get(2).copied().map(Opcode::from)
    }

    /// The raw frame bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Frame length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the frame holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", to_hex(&self.0))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_hex(&self.0))
    }
}

/// Lower-case hex rendering of a buffer, as used in log lines.
#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// A setting whose wire form is one of a fixed set of complete frames.
///
/// Both directions are derived from [`WireValue::FRAMES`], so
/// `from_frame(to_frame(v)) == Some(v)` holds for every value.
pub trait WireValue: Sized + Copy + PartialEq + 'static {
    /// Opcode shared by all frames of this setting.
    const OPCODE: Opcode;

    /// Every value paired with the exact frame that encodes it.
    const FRAMES: &'static [(Self, &'static [u8])];

    /// The frame encoding `self`.
    fn to_frame(self) -> &'static [u8];

    /// Reverse lookup of a complete frame. Anything but an exact match is
    /// `None`.
    fn from_frame(frame: &[u8]) -> Option<Self> {
        Self::FRAMES
            .iter()
            .find(|(_, bytes)| *bytes == frame)
            .map(|(value, _)| *value)
    }
}

/// Declares the frame table for a setting. The table and the exhaustive
/// encoder are generated from the same list, so they cannot drift apart.
macro_rules! wire_table {
    ($ty:ident, $opcode:expr, { $($variant:ident => $bytes:expr),+ $(,)? }) => {
        impl WireValue for $ty {
            const OPCODE: Opcode = $opcode;

            const FRAMES: &'static [(Self, &'static [u8])] = &[$(($ty::$variant, &$bytes)),+];

            fn to_frame(self) -> &'static [u8] {
                match self {
                    $($ty::$variant => &$bytes,)+
                }
            }
        }
    };
}

wire_table!(AlarmMode, Opcode::AlarmModeReport, {
    Off       => [0x55, 0xAA, 0x04, 0x09, 0x00, 0x00, 0x00, 0x00, 0x0C],
    Once      => [0x55, 0xAA, 0x04, 0x09, 0x01, 0x00, 0x00, 0x00, 0x0D],
    EveryTime => [0x55, 0xAA, 0x04, 0x09, 0x01, 0x01, 0x00, 0x00, 0x0E],
});

wire_table!(SamplingInterval, Opcode::SamplingIntervalReport, {
    OneMinute   => [0x55, 0xAA, 0x02, 0x0B, 0x00, 0x00, 0x00, 0x00, 0x01, 0xA4, 0xB1],
    TwoMinutes  => [0x55, 0xAA, 0x02, 0x0B, 0x01, 0x00, 0x00, 0x00, 0x01, 0xA4, 0xB2],
    FiveMinutes => [0x55, 0xAA, 0x02, 0x0B, 0x02, 0x00, 0x00, 0x00, 0x01, 0xA4, 0xB3],
    TenMinutes  => [0x55, 0xAA, 0x02, 0x0B, 0x04, 0x00, 0x00, 0x00, 0x01, 0xA4, 0xB5],
});

wire_table!(TemperatureUnit, Opcode::TemperatureUnitReport, {
    Celsius    => [0x55, 0xAA, 0x05, 0x0C, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10],
    Fahrenheit => [0x55, 0xAA, 0x05, 0x0C, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x11],
});

/// Why a buffer produced no update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unrecognized {
    /// The buffer does not start with [`PREAMBLE`] or has no opcode byte.
    NoPreamble,
    /// The opcode is not part of the protocol.
    UnknownOpcode(u8),
    /// A reading frame shorter than [`MIN_READING_FRAME_LEN`].
    Truncated {
        /// Opcode of the truncated frame.
        opcode: Opcode,
        /// Received length.
        len: usize,
    },
}

impl fmt::Display for Unrecognized {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unrecognized::NoPreamble => write!(f, "missing preamble"),
            Unrecognized::UnknownOpcode(op) => write!(f, "unknown opcode 0x{:02x}", op),
            Unrecognized::Truncated { opcode, len } => write!(
                f,
                "truncated frame for opcode 0x{:02x} ({} bytes)",
                opcode.as_byte(),
                len
            ),
        }
    }
}

/// Result of decoding one notification.
///
/// The report variants carry `None` when the opcode was recognized but the
/// payload matched no known encoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decoded {
    /// A complete measurement snapshot.
    Reading(SensorReading),
    /// Sampling interval report.
    SamplingInterval(Option<SamplingInterval>),
    /// Alarm mode report.
    AlarmMode(Option<AlarmMode>),
    /// Temperature unit report.
    TemperatureUnit(Option<TemperatureUnit>),
    /// A recognized frame that carries no state (CO2 limits).
    Ignored(Opcode),
    /// Not a frame this codec understands.
    Unrecognized(Unrecognized),
}

impl Decoded {
    /// Returns `true` if applying this update changes device state.
    #[must_use]
    pub fn affects_state(&self) -> bool {
        !matches!(self, Decoded::Ignored(_) | Decoded::Unrecognized(_))
    }
}

/// Decode a notification buffer.
///
/// `unit` is the device's currently configured temperature unit. Temperature
/// values are normalized to Celsius; with an unknown unit the temperature is
/// reported as absent.
///
/// ```
/// use inkbird_types::frame::{Decoded, decode};
/// use inkbird_types::TemperatureUnit;
///
/// let bytes = [
///     0x55, 0xAA, 0x01, 0x10, 0x00, 0x01, 0x03, 0x01, 0xFE, 0x02, 0x80, 0x03, 0xEB,
/// ];
/// let Decoded::Reading(reading) = decode(&bytes, Some(TemperatureUnit::Celsius)) else {
///     panic!("expected a reading");
/// };
/// assert_eq!(reading.co2, Some(640));
/// assert_eq!(reading.pressure, Some(1003));
/// ```
#[must_use]
pub fn decode(data: &[u8], unit: Option<TemperatureUnit>) -> Decoded {
    if data.len() < 3 || !data.starts_with(&PREAMBLE) {
        return Decoded::Unrecognized(Unrecognized::NoPreamble);
    }

    match Opcode::from(data[2]) {
        Opcode::SensorReading => parse_reading(data, unit),
        Opcode::SamplingIntervalReport => {
            Decoded::SamplingInterval(SamplingInterval::from_frame(data))
        }
        Opcode::LimitsReport => Decoded::Ignored(Opcode::LimitsReport),
        Opcode::AlarmModeReport => Decoded::AlarmMode(AlarmMode::from_frame(data)),
        Opcode::TemperatureUnitReport => {
            Decoded::TemperatureUnit(TemperatureUnit::from_frame(data))
        }
        Opcode::Unknown(op) => Decoded::Unrecognized(Unrecognized::UnknownOpcode(op)),
    }
}

fn parse_reading(data: &[u8], unit: Option<TemperatureUnit>) -> Decoded {
    if data.len() < MIN_READING_FRAME_LEN {
        return Decoded::Unrecognized(Unrecognized::Truncated {
            opcode: Opcode::SensorReading,
            len: data.len(),
        });
    }

    let mut buf = &data[4..MIN_READING_FRAME_LEN];
    let negative = buf.get_u8() == 1;
    let magnitude = f32::from(buf.get_u16());
    let humidity = buf.get_u16();
    let co2 = buf.get_u16();
    let pressure = buf.get_u16();

    let raw = (if negative { -magnitude } else { magnitude }) / 10.0;
    let temperature = unit.map(|u| round_tenths(u.to_celsius(raw)));

    Decoded::Reading(SensorReading {
        temperature,
        humidity: Some(round_tenths(f32::from(humidity) / 10.0)),
        co2: Some(co2),
        pressure: Some(pressure),
    })
}

fn round_tenths(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

/// Command frame that sets the alarm mode.
#[must_use]
pub fn encode_alarm_mode(mode: AlarmMode) -> Frame {
    Frame::from_static(mode.to_frame())
}

/// Command frame that sets the sampling interval.
#[must_use]
pub fn encode_sampling_interval(interval: SamplingInterval) -> Frame {
    Frame::from_static(interval.to_frame())
}

/// Frame announcing a temperature unit, as the device sends it.
#[must_use]
pub fn encode_temperature_unit(unit: TemperatureUnit) -> Frame {
    Frame::from_static(unit.to_frame())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    fn reading(data: &[u8], unit: Option<TemperatureUnit>) -> SensorReading {
        match decode(data, unit) {
            Decoded::Reading(reading) => reading,
            other => panic!("expected a reading, got {:?}", other),
        }
    }

    #[test]
    fn test_sensor_reading_celsius() {
        let r = reading(
            &hex("55aa011000010301fe028003eb010185"),
            Some(TemperatureUnit::Celsius),
        );
        assert!((r.temperature.unwrap() - 25.9).abs() < 0.01);
        assert!((r.humidity.unwrap() - 51.0).abs() < 0.01);
        assert_eq!(r.co2, Some(640));
        assert_eq!(r.pressure, Some(1003));
    }

    #[test]
    fn test_sensor_reading_fahrenheit() {
        let r = reading(
            &hex("55aa011010031e027605ea03f101008d"),
            Some(TemperatureUnit::Fahrenheit),
        );
        assert!((r.temperature.unwrap() - 26.6).abs() < 0.01);
        assert!((r.humidity.unwrap() - 63.0).abs() < 0.01);
        assert_eq!(r.co2, Some(1514));
        assert_eq!(r.pressure, Some(1009));
    }

    #[test]
    fn test_sensor_reading_unknown_unit_has_no_temperature() {
        let r = reading(&hex("55aa011000010301fe028003eb010185"), None);
        assert_eq!(r.temperature, None);
        assert_eq!(r.co2, Some(640));
    }

    #[test]
    fn test_sensor_reading_negative_temperature() {
        // sign byte 1, magnitude 0x0037 = 5.5 degrees
        let r = reading(
            &hex("55aa0110010037012c01900400"),
            Some(TemperatureUnit::Celsius),
        );
        assert!((r.temperature.unwrap() + 5.5).abs() < 0.01);
        assert!((r.humidity.unwrap() - 30.0).abs() < 0.01);
        assert_eq!(r.co2, Some(400));
        assert_eq!(r.pressure, Some(1024));
    }

    #[test]
    fn test_sensor_reading_zero_temperature_is_present() {
        let r = reading(
            &hex("55aa0110000000012c01900400"),
            Some(TemperatureUnit::Celsius),
        );
        assert_eq!(r.temperature, Some(0.0));
    }

    #[test]
    fn test_truncated_reading() {
        assert_eq!(
            decode(&hex("55aa011000010301fe0280"), Some(TemperatureUnit::Celsius)),
            Decoded::Unrecognized(Unrecognized::Truncated {
                opcode: Opcode::SensorReading,
                len: 11
            })
        );
    }

    #[test]
    fn test_alarm_mode_vectors() {
        let cases = [
            ("55aa0409000000000c", Some(AlarmMode::Off)),
            ("55aa0409010000000d", Some(AlarmMode::Once)),
            ("55aa0409010100000e", Some(AlarmMode::EveryTime)),
            ("55aa04090000000000", None),
        ];
        for (input, expected) in cases {
            assert_eq!(decode(&hex(input), None), Decoded::AlarmMode(expected), "{input}");
        }
    }

    #[test]
    fn test_sampling_interval_vectors() {
        let cases = [
            ("55aa020b0000000001a4b1", Some(SamplingInterval::OneMinute)),
            ("55aa020b0100000001a4b2", Some(SamplingInterval::TwoMinutes)),
            ("55aa020b0200000001a4b3", Some(SamplingInterval::FiveMinutes)),
            ("55aa020b0400000001a4b5", Some(SamplingInterval::TenMinutes)),
            ("55aa020b00000000000000", None),
        ];
        for (input, expected) in cases {
            assert_eq!(
                decode(&hex(input), None),
                Decoded::SamplingInterval(expected),
                "{input}"
            );
        }
    }

    #[test]
    fn test_temperature_unit_vectors() {
        let cases = [
            ("55aa050c0000000000000010", Some(TemperatureUnit::Celsius)),
            ("55aa050c0000000000000111", Some(TemperatureUnit::Fahrenheit)),
            ("55aa050c0000000000000000", None),
        ];
        for (input, expected) in cases {
            assert_eq!(
                decode(&hex(input), None),
                Decoded::TemperatureUnit(expected),
                "{input}"
            );
        }
    }

    #[test]
    fn test_round_trip_all_tables() {
        for mode in AlarmMode::ALL {
            let frame = encode_alarm_mode(mode);
            assert_eq!(decode(frame.as_bytes(), None), Decoded::AlarmMode(Some(mode)));
        }
        for interval in SamplingInterval::ALL {
            let frame = encode_sampling_interval(interval);
            assert_eq!(
                decode(frame.as_bytes(), None),
                Decoded::SamplingInterval(Some(interval))
            );
        }
        for unit in [TemperatureUnit::Celsius, TemperatureUnit::Fahrenheit] {
            let frame = encode_temperature_unit(unit);
            assert_eq!(
                decode(frame.as_bytes(), None),
                Decoded::TemperatureUnit(Some(unit))
            );
        }
    }

    #[test]
    fn test_table_frame_shapes() {
        for (_, bytes) in AlarmMode::FRAMES {
            assert_eq!(bytes.len(), 9);
            assert_eq!(Opcode::from(bytes[2]), AlarmMode::OPCODE);
        }
        for (_, bytes) in SamplingInterval::FRAMES {
            assert_eq!(bytes.len(), 11);
            assert_eq!(Opcode::from(bytes[2]), SamplingInterval::OPCODE);
        }
        for (_, bytes) in TemperatureUnit::FRAMES {
            assert_eq!(bytes.len(), 12);
            assert_eq!(Opcode::from(bytes[2]), TemperatureUnit::OPCODE);
        }
    }

    #[test]
    fn test_limits_frame_is_ignored() {
        let decoded = decode(&hex("55aa030a0003e807d0aa"), None);
        assert_eq!(decoded, Decoded::Ignored(Opcode::LimitsReport));
        assert!(!decoded.affects_state());
    }

    #[test]
    fn test_unknown_opcode() {
        assert_eq!(
            decode(&hex("55aa0906010f"), None),
            Decoded::Unrecognized(Unrecognized::UnknownOpcode(0x09))
        );
    }

    #[test]
    fn test_missing_preamble() {
        for input in ["", "55", "55aa", "aa550409000000000c"] {
            assert_eq!(
                decode(&hex(input), None),
                Decoded::Unrecognized(Unrecognized::NoPreamble),
                "{input}"
            );
        }
    }

    #[test]
    fn test_frame_accessors() {
        let frame = encode_alarm_mode(AlarmMode::Once);
        assert!(frame.has_preamble());
        assert_eq!(frame.opcode(), Some(Opcode::AlarmModeReport));
        assert_eq!(frame.to_string(), "55aa0409010000000d");
        assert_eq!(frame.len(), 9);

        let frame = Frame::copy_from_slice(&[0x01, 0x02]);
        assert_eq!(frame.opcode(), None);
    }

    #[test]
    fn test_opcode_byte_round_trip() {
        for byte in 0..=u8::MAX {
            assert_eq!(Opcode::from(byte).as_byte(), byte);
        }
    }

    proptest! {
        #[test]
        fn decode_never_panics(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = decode(&data, Some(TemperatureUnit::Fahrenheit));
            let _ = decode(&data, None);
        }

        #[test]
        fn reading_fields_follow_layout(
            negative in any::<bool>(),
            magnitude in 0u16..1000,
            humidity in 0u16..1000,
            co2 in any::<u16>(),
            pressure in any::<u16>(),
        ) {
            let mut data = vec![0x55, 0xAA, 0x01, 0x10, u8::from(negative)];
            data.extend_from_slice(&magnitude.to_be_bytes());
            data.extend_from_slice(&humidity.to_be_bytes());
            data.extend_from_slice(&co2.to_be_bytes());
            data.extend_from_slice(&pressure.to_be_bytes());

            let Decoded::Reading(r) = decode(&data, Some(TemperatureUnit::Celsius)) else {
                panic!("expected a reading");
            };
            let expected = f32::from(magnitude) / 10.0;
            let expected = if negative { -expected } else { expected };
            prop_assert!((r.temperature.unwrap() - expected).abs() < 0.051);
            prop_assert!((r.humidity.unwrap() - f32::from(humidity) / 10.0).abs() < 0.051);
            prop_assert_eq!(r.co2, Some(co2));
            prop_assert_eq!(r.pressure, Some(pressure));
        }
    }
}
