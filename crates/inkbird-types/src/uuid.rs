//! Bluetooth UUIDs and fixed command frames for INKBIRD IAM-T1 devices.

use uuid::{Uuid, uuid};

// --- IAM-T1 characteristics ---

/// Device configuration and sensor data are notified on this characteristic.
pub const NOTIFY: Uuid = uuid!("0000ffe4-0000-1000-8000-00805f9b34fb");

/// Configuration commands are written to this characteristic. The connect
/// command is written here too.
pub const WRITE: Uuid = uuid!("0000ffe9-0000-1000-8000-00805f9b34fb");

/// Model string characteristic (e.g. `Ink@IAM-T1`).
pub const MODEL: Uuid = uuid!("0000ff91-0000-1000-8000-00805f9b34fb");

// --- Device Information characteristics ---

/// Firmware revision string characteristic (e.g. `YBWY02-V1.0`).
pub const FIRMWARE_REVISION: Uuid = uuid!("00002a26-0000-1000-8000-00805f9b34fb");

/// Puts the device into its "connected" state. The device answers with a
/// burst of notifications describing its current configuration.
pub const CONNECT_COMMAND: [u8; 6] = [0x55, 0xAA, 0x09, 0x06, 0x01, 0x0F];
