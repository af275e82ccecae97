//! Platform-agnostic types for INKBIRD IAM-T1 environmental sensors.
//!
//! This crate holds everything that does not need a Bluetooth stack:
//!
//! - Configuration enums and the sensor reading snapshot
//! - The frame codec that turns notification bytes into typed updates and
//!   settings into command frames
//! - UUID constants for the GATT characteristics
//! - Error types for string parsing
//!
//! # Example
//!
//! ```
//! use inkbird_types::frame::{self, Decoded};
//! use inkbird_types::AlarmMode;
//!
//! let command = frame::encode_alarm_mode(AlarmMode::Once);
//! assert_eq!(
//!     frame::decode(command.as_bytes(), None),
//!     Decoded::AlarmMode(Some(AlarmMode::Once))
//! );
//! ```

pub mod error;
pub mod frame;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use frame::{Decoded, Frame, Opcode, Unrecognized, WireValue};
pub use types::{
    AlarmMode, DeviceIdentity, LOCAL_NAME_PREFIX, MANUFACTURER, SamplingInterval, SensorReading,
    TemperatureUnit, is_supported_name,
};
pub use uuid as uuids;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let frame = frame::encode_sampling_interval(SamplingInterval::TenMinutes);
        assert_eq!(frame.opcode(), Some(Opcode::SamplingIntervalReport));
        assert_eq!(uuids::NOTIFY.to_string(), "0000ffe4-0000-1000-8000-00805f9b34fb");
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::InvalidValue("bogus".to_string());
        assert_eq!(err.to_string(), "Invalid value: bogus");
    }
}
