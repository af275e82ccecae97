//! btleplug-backed [`Transport`].
//!
//! The peripheral is located by scanning for its address the first time
//! [`Transport::connect`] is called. Later connects reuse the same
//! peripheral handle, so a reconnect after a dropped link does not need
//! another scan.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DeviceNotFoundReason, Error, Result};
use crate::transport::{NotificationHandler, Transport};

/// Timeouts for the Bluetooth link.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use inkbird_core::ble::BleOptions;
///
/// let options = BleOptions::default()
///     .scan_duration(Duration::from_secs(20))
///     .connection_timeout(Duration::from_secs(25));
/// assert_eq!(options.scan_duration, Duration::from_secs(20));
/// ```
#[derive(Debug, Clone)]
pub struct BleOptions {
    /// How long to scan when the peripheral is not yet known to the adapter.
    pub scan_duration: Duration,
    /// Timeout for establishing the link.
    pub connection_timeout: Duration,
    /// Timeout for service discovery after the link is up.
    pub discovery_timeout: Duration,
    /// Timeout for characteristic reads.
    pub read_timeout: Duration,
    /// Timeout for characteristic writes.
    pub write_timeout: Duration,
}

impl Default for BleOptions {
    fn default() -> Self {
        Self {
            scan_duration: Duration::from_secs(10),
            connection_timeout: Duration::from_secs(15),
            discovery_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
        }
    }
}

impl BleOptions {
    /// Set the scan duration.
    #[must_use]
    pub fn scan_duration(mut self, duration: Duration) -> Self {
        self.scan_duration = duration;
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the service discovery timeout.
    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Set the read timeout.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the write timeout.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

/// A located peripheral plus its discovered characteristics.
struct Link {
    /// Kept alive for as long as the peripheral is in use.
    #[allow(dead_code)]
    adapter: Adapter,
    peripheral: Peripheral,
    characteristics: HashMap<Uuid, Characteristic>,
    service_count: usize,
}

impl Link {
    fn characteristic(&self, uuid: Uuid) -> Result<Characteristic> {
        self.characteristics
            .get(&uuid)
            .cloned()
            .ok_or_else(|| Error::characteristic_not_found(uuid.to_string(), self.service_count))
    }
}

/// Bluetooth LE link to one IAM-T1 sensor.
pub struct BleTransport {
    address: String,
    options: BleOptions,
    link: RwLock<Option<Link>>,
    notification_handles: Mutex<Vec<(Uuid, JoinHandle<()>)>>,
}

impl std::fmt::Debug for BleTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleTransport")
            .field("address", &self.address)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl BleTransport {
    /// Create a transport for the sensor at `address`. Nothing is scanned or
    /// connected until [`Transport::connect`].
    pub fn new(address: impl Into<String>) -> Self {
        Self::with_options(address, BleOptions::default())
    }

    /// Create a transport with custom timeouts.
    pub fn with_options(address: impl Into<String>, options: BleOptions) -> Self {
        Self {
            address: address.into(),
            options,
            link: RwLock::new(None),
            notification_handles: Mutex::new(Vec::new()),
        }
    }

    /// The configured timeouts.
    pub fn options(&self) -> &BleOptions {
        &self.options
    }

    async fn abort_notifications(&self, characteristic: Option<Uuid>) {
        let mut handles = self.notification_handles.lock().await;
        handles.retain(|(uuid, handle)| {
            let matches = characteristic.is_none_or(|c| c == *uuid);
            if matches {
                handle.abort();
            }
            !matches
        });
    }

    async fn discover(&self, link: &mut Link) -> Result<()> {
        debug!("Discovering services...");
        timeout(
            self.options.discovery_timeout,
            link.peripheral.discover_services(),
        )
        .await
        .map_err(|_| Error::timeout("discover services", self.options.discovery_timeout))??;

        let services = link.peripheral.services();
        link.service_count = services.len();
        link.characteristics.clear();
        for service in &services {
            debug!("  Service: {}", service.uuid);
            for characteristic in &service.characteristics {
                debug!("    Characteristic: {}", characteristic.uuid);
                link.characteristics
                    .insert(characteristic.uuid, characteristic.clone());
            }
        }
        debug!(
            "Cached {} characteristics in {} services",
            link.characteristics.len(),
            link.service_count
        );
        Ok(())
    }
}

#[async_trait]
impl Transport for BleTransport {
    fn address(&self) -> &str {
        &self.address
    }

    #[tracing::instrument(level = "info", skip(self), fields(address = %self.address))]
    async fn connect(&self) -> Result<()> {
        let mut guard = self.link.write().await;

        if guard.is_none() {
            let (adapter, peripheral) =
                find_peripheral(&self.address, self.options.scan_duration).await?;
            *guard = Some(Link {
                adapter,
                peripheral,
                characteristics: HashMap::new(),
                service_count: 0,
            });
        }
        let Some(link) = guard.as_mut() else {
            return Err(Error::NotConnected);
        };

        if link.peripheral.is_connected().await.unwrap_or(false) {
            if link.characteristics.is_empty() {
                self.discover(link).await?;
            }
            return Ok(());
        }

        // Tasks from a previous session would hold a dead notification stream.
        self.abort_notifications(None).await;

        info!("Connecting to device...");
        timeout(self.options.connection_timeout, link.peripheral.connect())
            .await
            .map_err(|_| Error::timeout("connect to device", self.options.connection_timeout))??;
        info!("Connected");

        self.discover(link).await
    }

    async fn is_connected(&self) -> bool {
        match self.link.read().await.as_ref() {
            Some(link) => link.peripheral.is_connected().await.unwrap_or(false),
            None => false,
        }
    }

    async fn subscribe(&self, characteristic: Uuid, handler: NotificationHandler) -> Result<()> {
        let guard = self.link.read().await;
        let link = guard.as_ref().ok_or(Error::NotConnected)?;
        let characteristic = link.characteristic(characteristic)?;

        link.peripheral.subscribe(&characteristic).await?;

        let mut stream = link.peripheral.notifications().await?;
        let char_uuid = characteristic.uuid;
        let handle = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                if notification.uuid == char_uuid {
                    handler(&notification.value);
                }
            }
            debug!("Notification stream for {} ended", char_uuid);
        });

        self.notification_handles
            .lock()
            .await
            .push((char_uuid, handle));
        Ok(())
    }

    async fn unsubscribe(&self, characteristic: Uuid) -> Result<()> {
        self.abort_notifications(Some(characteristic)).await;

        let guard = self.link.read().await;
        let link = guard.as_ref().ok_or(Error::NotConnected)?;
        let characteristic = link.characteristic(characteristic)?;
        link.peripheral.unsubscribe(&characteristic).await?;
        Ok(())
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()> {
        let guard = self.link.read().await;
        let link = guard.as_ref().ok_or(Error::NotConnected)?;
        let characteristic = link.characteristic(characteristic)?;

        timeout(
            self.options.write_timeout,
            link.peripheral
                .write(&characteristic, data, write_type(characteristic.properties)),
        )
        .await
        .map_err(|_| {
            Error::timeout(
                format!("write characteristic {}", characteristic.uuid),
                self.options.write_timeout,
            )
        })??;
        Ok(())
    }

    async fn read_characteristic(&self, characteristic: Uuid) -> Result<Vec<u8>> {
        let guard = self.link.read().await;
        let link = guard.as_ref().ok_or(Error::NotConnected)?;
        let characteristic = link.characteristic(characteristic)?;

        let data = timeout(self.options.read_timeout, link.peripheral.read(&characteristic))
            .await
            .map_err(|_| {
                Error::timeout(
                    format!("read characteristic {}", characteristic.uuid),
                    self.options.read_timeout,
                )
            })??;
        Ok(data)
    }

    #[tracing::instrument(level = "info", skip(self), fields(address = %self.address))]
    async fn disconnect(&self) -> Result<()> {
        self.abort_notifications(None).await;

        let guard = self.link.read().await;
        if let Some(link) = guard.as_ref() {
            info!("Disconnecting from device...");
            link.peripheral.disconnect().await?;
        }
        Ok(())
    }
}

impl Drop for BleTransport {
    fn drop(&mut self) {
        if let Ok(mut handles) = self.notification_handles.try_lock() {
            for (_, handle) in handles.drain(..) {
                handle.abort();
            }
        }
    }
}

/// Write with response unless the characteristic only accepts writes
/// without one.
fn write_type(properties: CharPropFlags) -> WriteType {
    if !properties.contains(CharPropFlags::WRITE)
        && properties.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE)
    {
        WriteType::WithoutResponse
    } else {
        WriteType::WithResponse
    }
}

/// Format a peripheral ID as a plain string.
fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// Normalize an address for comparison: lower-case, no separators.
fn normalize_address(address: &str) -> String {
    address
        .chars()
        .filter(|c| *c != ':' && *c != '-')
        .collect::<String>()
        .to_lowercase()
}

async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters
        .into_iter()
        .next()
        .ok_or(Error::DeviceNotFound(DeviceNotFoundReason::NoAdapter))
}

/// Locate the peripheral with `address`, scanning if the adapter has not
/// seen it yet.
#[tracing::instrument(level = "debug", skip(scan_duration))]
async fn find_peripheral(address: &str, scan_duration: Duration) -> Result<(Adapter, Peripheral)> {
    let adapter = get_adapter().await?;
    let wanted = normalize_address(address);

    if let Some(peripheral) = match_peripheral(&adapter, &wanted).await? {
        debug!("Found device in adapter cache");
        return Ok((adapter, peripheral));
    }

    info!("Scanning for {} ({:?})...", address, scan_duration);
    adapter.start_scan(ScanFilter::default()).await?;
    sleep(scan_duration).await;
    if let Err(e) = adapter.stop_scan().await {
        warn!("Failed to stop scan: {}", e);
    }

    match match_peripheral(&adapter, &wanted).await? {
        Some(peripheral) => Ok((adapter, peripheral)),
        None => {
            warn!("Device not found: {}", address);
            Err(Error::device_not_found(address))
        }
    }
}

async fn match_peripheral(adapter: &Adapter, wanted: &str) -> Result<Option<Peripheral>> {
    for peripheral in adapter.peripherals().await? {
        let peripheral_id = normalize_address(&format_peripheral_id(&peripheral.id()));
        if peripheral_id == wanted {
            debug!("Matched by peripheral ID");
            return Ok(Some(peripheral));
        }

        if let Ok(Some(props)) = peripheral.properties().await {
            let address = normalize_address(&props.address.to_string());
            if address != "000000000000" && address == wanted {
                debug!(name = ?props.local_name, "Matched by address");
                return Ok(Some(peripheral));
            }
        }
    }
    Ok(None)
}
