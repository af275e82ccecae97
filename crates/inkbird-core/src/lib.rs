//! Async BLE driver for INKBIRD IAM-T1 environmental sensors.
//!
//! The IAM-T1 (advertised as `Ink@IAM-T1`) reports temperature, humidity,
//! CO₂ and pressure through notifications on a single characteristic and
//! takes configuration commands on another. This crate keeps one sensor's
//! state current over a long-lived connection.
//!
//! # Features
//!
//! - **Connection supervision**: handshake, periodic health check and silent
//!   reconnection after the device drops the link
//! - **State tracking**: every notification is decoded and applied to a
//!   [`DeviceState`] that observers can watch
//! - **Configuration**: change alarm mode and sampling interval
//! - **Identity read**: model and firmware strings
//! - **Snapshots**: persist and restore state across restarts
//! - **Testing**: [`MockTransport`] drives the supervisor without hardware
//!
//! # Quick Start
//!
//! ```no_run
//! use inkbird_core::{BleTransport, Supervisor, SupervisorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let supervisor = Supervisor::new(
//!         BleTransport::new("AA:BB:CC:DD:EE:FF"),
//!         SupervisorConfig::default(),
//!     )?;
//!     supervisor.start().await?;
//!
//!     let mut updates = supervisor.subscribe();
//!     while updates.changed().await.is_ok() {
//!         let state = updates.borrow_and_update().clone();
//!         println!("CO2: {:?} ppm", state.reading.co2);
//!     }
//!
//!     supervisor.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Platform Differences
//!
//! On Linux and Windows devices are addressed by MAC address
//! (`AA:BB:CC:DD:EE:FF`). On macOS CoreBluetooth hides the MAC address and
//! the peripheral UUID must be used instead.

pub mod ble;
pub mod error;
pub mod events;
pub mod identity;
pub mod mock;
pub mod snapshot;
pub mod state;
pub mod supervisor;
pub mod transport;

pub use ble::{BleOptions, BleTransport};
pub use error::{DeviceNotFoundReason, Error, Result};
pub use events::{EventDispatcher, EventReceiver, EventSender, SupervisorEvent};
pub use identity::read_identity;
pub use mock::{MockTransport, MockTransportBuilder};
pub use snapshot::StateSnapshot;
pub use state::DeviceState;
pub use supervisor::{ConnectionState, Supervisor, SupervisorConfig};
pub use transport::{NotificationHandler, Transport};

// Re-export from inkbird-types
pub use inkbird_types::frame;
pub use inkbird_types::uuid as uuids;
pub use inkbird_types::{
    AlarmMode, DeviceIdentity, SamplingInterval, SensorReading, TemperatureUnit,
};
