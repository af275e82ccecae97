//! Transport abstraction for the GATT link.
//!
//! The supervisor only ever talks to a [`Transport`], which lets the same
//! connection logic drive a real Bluetooth peripheral
//! ([`BleTransport`](crate::ble::BleTransport)) or a scripted one
//! ([`MockTransport`](crate::mock::MockTransport)) in tests.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

/// Callback invoked with the raw bytes of every notification on a
/// subscribed characteristic.
///
/// Handlers run on the transport's notification task and must not block.
pub type NotificationHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// A GATT link to one peripheral.
///
/// # Example
///
/// ```ignore
/// use inkbird_core::{Transport, Result};
/// use inkbird_types::uuids;
///
/// async fn firmware<T: Transport>(transport: &T) -> Result<String> {
///     transport.connect().await?;
///     let bytes = transport.read_characteristic(uuids::FIRMWARE_REVISION).await?;
///     Ok(String::from_utf8_lossy(&bytes).into_owned())
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Address or identifier of the peripheral this transport talks to.
    fn address(&self) -> &str;

    /// Establish the link. A no-op when already connected.
    async fn connect(&self) -> Result<()>;

    /// Whether the link is currently up, as far as the stack knows.
    async fn is_connected(&self) -> bool;

    /// Enable notifications on `characteristic` and route them to `handler`.
    async fn subscribe(&self, characteristic: Uuid, handler: NotificationHandler) -> Result<()>;

    /// Stop notifications on `characteristic`.
    async fn unsubscribe(&self, characteristic: Uuid) -> Result<()>;

    /// Write `data` to `characteristic`.
    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()>;

    /// Read the current value of `characteristic`.
    async fn read_characteristic(&self, characteristic: Uuid) -> Result<Vec<u8>>;

    /// Tear the link down.
    async fn disconnect(&self) -> Result<()>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn address(&self) -> &str {
        (**self).address()
    }

    async fn connect(&self) -> Result<()> {
        (**self).connect().await
    }

    async fn is_connected(&self) -> bool {
        (**self).is_connected().await
    }

    async fn subscribe(&self, characteristic: Uuid, handler: NotificationHandler) -> Result<()> {
        (**self).subscribe(characteristic, handler).await
    }

    async fn unsubscribe(&self, characteristic: Uuid) -> Result<()> {
        (**self).unsubscribe(characteristic).await
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()> {
        (**self).write(characteristic, data).await
    }

    async fn read_characteristic(&self, characteristic: Uuid) -> Result<Vec<u8>> {
        (**self).read_characteristic(characteristic).await
    }

    async fn disconnect(&self) -> Result<()> {
        (**self).disconnect().await
    }
}
