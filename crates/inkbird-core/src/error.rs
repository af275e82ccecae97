//! Error types for inkbird-core.
//!
//! Only a few errors ever reach a caller:
//!
//! | Error | Raised by | Caller action |
//! |-------|-----------|---------------|
//! | [`Error::ConnectionFailed`] | `Supervisor::start` | Retry later or pick another device |
//! | [`Error::DeviceNotFound`] | `read_identity` | Check the address and range |
//! | [`Error::NotConnected`] | setters while not active | Wait for the connection to recover |
//! | [`Error::CommandFailed`] | setters | Report to the user; no reconnect is triggered |
//! | [`Error::InvalidConfig`] | `Supervisor::new` | Fix configuration |
//!
//! Malformed notification frames are never errors, and background reconnect
//! failures are logged and published as events instead of being returned.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when talking to an IAM-T1 sensor.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Device not found during scan.
    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceNotFoundReason),

    /// Operation attempted while the connection is not active.
    #[error("Not connected to device")]
    NotConnected,

    /// Required GATT characteristic not present on the device.
    #[error("Characteristic not found: {uuid} (searched in {service_count} services)")]
    CharacteristicNotFound {
        /// The UUID that was not found.
        uuid: String,
        /// Number of services that were searched.
        service_count: usize,
    },

    /// Connect or handshake failed.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// The device that failed to connect.
        device_id: Option<String>,
        /// Why it failed.
        reason: String,
    },

    /// A configuration command could not be written.
    #[error("Command '{command}' failed: {reason}")]
    CommandFailed {
        /// The command that was being sent (e.g. `set_alarm_mode(once)`).
        command: String,
        /// Transport error message.
        reason: String,
    },

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Operation was cancelled by shutdown.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reason why a device was not found.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeviceNotFoundReason {
    /// No device with the given address was seen during the scan.
    NotFound {
        /// Address that was searched for.
        identifier: String,
    },
    /// No Bluetooth adapter available.
    NoAdapter,
}

impl std::fmt::Display for DeviceNotFoundReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { identifier } => write!(f, "device '{}' not found", identifier),
            Self::NoAdapter => write!(f, "no Bluetooth adapter available"),
        }
    }
}

impl Error {
    /// Create a device not found error for a specific identifier.
    pub fn device_not_found(identifier: impl Into<String>) -> Self {
        Self::DeviceNotFound(DeviceNotFoundReason::NotFound {
            identifier: identifier.into(),
        })
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a characteristic not found error.
    pub fn characteristic_not_found(uuid: impl Into<String>, service_count: usize) -> Self {
        Self::CharacteristicNotFound {
            uuid: uuid.into(),
            service_count,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a connection failure.
    pub fn connection_failed(device_id: Option<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            device_id,
            reason: reason.into(),
        }
    }

    /// Create a command failure.
    pub fn command_failed(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for errors that a later reconnect may resolve.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Error::Bluetooth(_)
                | Error::NotConnected
                | Error::ConnectionFailed { .. }
                | Error::Timeout { .. }
                | Error::DeviceNotFound(DeviceNotFoundReason::NotFound { .. })
        )
    }
}

impl From<inkbird_types::ParseError> for Error {
    fn from(err: inkbird_types::ParseError) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}

/// Result type alias using inkbird-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
