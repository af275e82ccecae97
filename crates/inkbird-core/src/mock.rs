//! Mock transport for testing.
//!
//! [`MockTransport`] behaves like a well-mannered IAM-T1: after the connect
//! command it replays a configurable state dump, and it echoes every
//! configuration command back as a notification. Tests push further frames
//! with [`MockTransport::notify`] and drop the link with
//! [`MockTransport::simulate_disconnect`].
//!
//! # Features
//!
//! - **Failure injection**: fail connects, subscriptions, writes or teardown
//! - **Transient failures**: fail the next N connects, then succeed
//! - **Latency simulation**: delay connects or the connect command to
//!   exercise timeouts and shutdown

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use inkbird_types::uuids::{CONNECT_COMMAND, NOTIFY, WRITE};

use crate::error::{Error, Result};
use crate::transport::{NotificationHandler, Transport};

/// A scripted [`Transport`].
///
/// # Example
///
/// ```
/// use inkbird_core::{MockTransportBuilder, Transport};
/// use inkbird_types::frame::encode_alarm_mode;
/// use inkbird_types::AlarmMode;
///
/// #[tokio::main]
/// async fn main() {
///     let transport = MockTransportBuilder::new()
///         .connect_dump(vec![encode_alarm_mode(AlarmMode::Once).as_bytes().to_vec()])
///         .build();
///     transport.connect().await.unwrap();
///     assert!(transport.is_connected_sync());
/// }
/// ```
pub struct MockTransport {
    address: String,
    connected: AtomicBool,
    handlers: Mutex<HashMap<Uuid, NotificationHandler>>,
    characteristics: Mutex<HashMap<Uuid, Vec<u8>>>,
    connect_dump: Mutex<Vec<Vec<u8>>>,
    writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
    echo_commands: AtomicBool,
    should_fail_connect: AtomicBool,
    should_fail_subscribe: AtomicBool,
    should_fail_write: AtomicBool,
    should_fail_unsubscribe: AtomicBool,
    should_fail_disconnect: AtomicBool,
    /// Number of connects to fail before succeeding.
    remaining_failures: AtomicU32,
    /// Simulated connect latency in milliseconds (0 = no delay).
    connect_latency_ms: AtomicU64,
    /// Delay before the connect command is acknowledged, in milliseconds.
    connect_command_latency_ms: AtomicU64,
    connect_count: AtomicU32,
    subscribe_count: AtomicU32,
    unsubscribe_count: AtomicU32,
    disconnect_count: AtomicU32,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("address", &self.address)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    /// Create a disconnected mock with a random address and no state dump.
    pub fn new() -> Self {
        MockTransportBuilder::new().build()
    }

    /// Check if connected without going through the async trait.
    pub fn is_connected_sync(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Deliver `data` as a notification on the notify characteristic.
    ///
    /// Returns `false` if nothing is subscribed or the link is down.
    pub fn notify(&self, data: &[u8]) -> bool {
        self.notify_on(NOTIFY, data)
    }

    /// Deliver `data` as a notification on `characteristic`.
    pub fn notify_on(&self, characteristic: Uuid, data: &[u8]) -> bool {
        if !self.is_connected_sync() {
            return false;
        }
        let handler = lock(&self.handlers).get(&characteristic).cloned();
        match handler {
            Some(handler) => {
                handler(data);
                true
            }
            None => false,
        }
    }

    /// Drop the link as if the device went out of range. Subscriptions are
    /// lost, as they would be on a real peripheral.
    pub fn simulate_disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        lock(&self.handlers).clear();
    }

    /// Replace the frames replayed after the connect command.
    pub fn set_connect_dump(&self, frames: Vec<Vec<u8>>) {
        *lock(&self.connect_dump) = frames;
    }

    /// Set the value returned when reading `characteristic`.
    pub fn set_characteristic(&self, characteristic: Uuid, value: Vec<u8>) {
        lock(&self.characteristics).insert(characteristic, value);
    }

    /// Enable or disable echoing written commands back as notifications.
    pub fn set_echo_commands(&self, echo: bool) {
        self.echo_commands.store(echo, Ordering::SeqCst);
    }

    /// Make every connect fail.
    pub fn set_should_fail_connect(&self, fail: bool) {
        self.should_fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Make every subscribe fail.
    pub fn set_should_fail_subscribe(&self, fail: bool) {
        self.should_fail_subscribe.store(fail, Ordering::SeqCst);
    }

    /// Make every write fail.
    pub fn set_should_fail_write(&self, fail: bool) {
        self.should_fail_write.store(fail, Ordering::SeqCst);
    }

    /// Make every unsubscribe fail. The subscription stays registered.
    pub fn set_should_fail_unsubscribe(&self, fail: bool) {
        self.should_fail_unsubscribe.store(fail, Ordering::SeqCst);
    }

    /// Make every disconnect fail. The link stays up.
    pub fn set_should_fail_disconnect(&self, fail: bool) {
        self.should_fail_disconnect.store(fail, Ordering::SeqCst);
    }

    /// Fail the next `count` connects, then succeed.
    pub fn set_transient_failures(&self, count: u32) {
        self.remaining_failures.store(count, Ordering::SeqCst);
    }

    /// Get the number of remaining transient failures.
    pub fn remaining_failures(&self) -> u32 {
        self.remaining_failures.load(Ordering::SeqCst)
    }

    /// Set simulated connect latency.
    ///
    /// Set to `Duration::ZERO` to disable latency simulation.
    pub fn set_connect_latency(&self, latency: Duration) {
        self.connect_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Delay the write of the connect command, which keeps the handshake
    /// in progress with the notify subscription already in place.
    pub fn set_connect_command_latency(&self, latency: Duration) {
        self.connect_command_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Every write so far, in order.
    pub fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        lock(&self.writes).clone()
    }

    /// Writes to the write characteristic other than the connect command.
    pub fn commands(&self) -> Vec<Vec<u8>> {
        lock(&self.writes)
            .iter()
            .filter(|(uuid, data)| *uuid == WRITE && data.as_slice() != CONNECT_COMMAND)
            .map(|(_, data)| data.clone())
            .collect()
    }

    /// Whether a handler is registered for `characteristic`.
    pub fn is_subscribed(&self, characteristic: Uuid) -> bool {
        lock(&self.handlers).contains_key(&characteristic)
    }

    /// Number of successful connects.
    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::SeqCst)
    }

    /// Number of successful subscribes.
    pub fn subscribe_count(&self) -> u32 {
        self.subscribe_count.load(Ordering::SeqCst)
    }

    /// Number of unsubscribe calls.
    pub fn unsubscribe_count(&self) -> u32 {
        self.unsubscribe_count.load(Ordering::SeqCst)
    }

    /// Number of disconnect calls.
    pub fn disconnect_count(&self) -> u32 {
        self.disconnect_count.load(Ordering::SeqCst)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn address(&self) -> &str {
        &self.address
    }

    async fn connect(&self) -> Result<()> {
        let latency = self.connect_latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.remaining_failures.load(Ordering::SeqCst) > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::connection_failed(
                Some(self.address.clone()),
                "mock transient failure",
            ));
        }
        if self.should_fail_connect.load(Ordering::SeqCst) {
            return Err(Error::connection_failed(
                Some(self.address.clone()),
                "mock connect failure",
            ));
        }

        self.connected.store(true, Ordering::SeqCst);
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.is_connected_sync()
    }

    async fn subscribe(&self, characteristic: Uuid, handler: NotificationHandler) -> Result<()> {
        if !self.is_connected_sync() {
            return Err(Error::NotConnected);
        }
        if self.should_fail_subscribe.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::other("mock subscribe failure")));
        }
        lock(&self.handlers).insert(characteristic, handler);
        self.subscribe_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn unsubscribe(&self, characteristic: Uuid) -> Result<()> {
        self.unsubscribe_count.fetch_add(1, Ordering::SeqCst);
        if self.should_fail_unsubscribe.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::other("mock unsubscribe failure")));
        }
        lock(&self.handlers).remove(&characteristic);
        if !self.is_connected_sync() {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()> {
        if !self.is_connected_sync() {
            return Err(Error::NotConnected);
        }
        if self.should_fail_write.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::other("mock write failure")));
        }
        if characteristic == WRITE && data == CONNECT_COMMAND {
            let latency = self.connect_command_latency_ms.load(Ordering::SeqCst);
            if latency > 0 {
                tokio::time::sleep(Duration::from_millis(latency)).await;
            }
        }
        lock(&self.writes).push((characteristic, data.to_vec()));

        if characteristic != WRITE {
            return Ok(());
        }
        if data == CONNECT_COMMAND {
            let dump = lock(&self.connect_dump).clone();
            for frame in dump {
                self.notify(&frame);
            }
        } else if self.echo_commands.load(Ordering::SeqCst) {
            self.notify(data);
        }
        Ok(())
    }

    async fn read_characteristic(&self, characteristic: Uuid) -> Result<Vec<u8>> {
        if !self.is_connected_sync() {
            return Err(Error::NotConnected);
        }
        lock(&self.characteristics)
            .get(&characteristic)
            .cloned()
            .ok_or_else(|| Error::characteristic_not_found(characteristic.to_string(), 0))
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnect_count.fetch_add(1, Ordering::SeqCst);
        if self.should_fail_disconnect.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::other("mock disconnect failure")));
        }
        self.simulate_disconnect();
        Ok(())
    }
}

/// Builder for [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockTransportBuilder {
    address: String,
    characteristics: HashMap<Uuid, Vec<u8>>,
    connect_dump: Vec<Vec<u8>>,
    echo_commands: bool,
    connect_latency: Duration,
    connect_command_latency: Duration,
}

impl Default for MockTransportBuilder {
    fn default() -> Self {
        Self {
            address: format!("MOCK-{:06X}", rand::random::<u32>() % 0xFFFFFF),
            characteristics: HashMap::new(),
            connect_dump: Vec::new(),
            echo_commands: true,
            connect_latency: Duration::ZERO,
            connect_command_latency: Duration::ZERO,
        }
    }
}

impl MockTransportBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the device address.
    #[must_use]
    pub fn address(mut self, address: &str) -> Self {
        self.address = address.to_string();
        self
    }

    /// Set the value returned when reading `characteristic`.
    #[must_use]
    pub fn characteristic(mut self, characteristic: Uuid, value: Vec<u8>) -> Self {
        self.characteristics.insert(characteristic, value);
        self
    }

    /// Frames replayed as notifications after the connect command.
    #[must_use]
    pub fn connect_dump(mut self, frames: Vec<Vec<u8>>) -> Self {
        self.connect_dump = frames;
        self
    }

    /// Whether written commands are echoed back (default `true`).
    #[must_use]
    pub fn echo_commands(mut self, echo: bool) -> Self {
        self.echo_commands = echo;
        self
    }

    /// Delay every connect by `latency`.
    #[must_use]
    pub fn connect_latency(mut self, latency: Duration) -> Self {
        self.connect_latency = latency;
        self
    }

    /// Delay the write of the connect command by `latency`.
    #[must_use]
    pub fn connect_command_latency(mut self, latency: Duration) -> Self {
        self.connect_command_latency = latency;
        self
    }

    /// Build the transport. It starts disconnected.
    #[must_use]
    pub fn build(self) -> MockTransport {
        MockTransport {
            address: self.address,
            connected: AtomicBool::new(false),
            handlers: Mutex::new(HashMap::new()),
            characteristics: Mutex::new(self.characteristics),
            connect_dump: Mutex::new(self.connect_dump),
            writes: Mutex::new(Vec::new()),
            echo_commands: AtomicBool::new(self.echo_commands),
            should_fail_connect: AtomicBool::new(false),
            should_fail_subscribe: AtomicBool::new(false),
            should_fail_write: AtomicBool::new(false),
            should_fail_unsubscribe: AtomicBool::new(false),
            should_fail_disconnect: AtomicBool::new(false),
            remaining_failures: AtomicU32::new(0),
            connect_latency_ms: AtomicU64::new(self.connect_latency.as_millis() as u64),
            connect_command_latency_ms: AtomicU64::new(
                self.connect_command_latency.as_millis() as u64,
            ),
            connect_count: AtomicU32::new(0),
            subscribe_count: AtomicU32::new(0),
            unsubscribe_count: AtomicU32::new(0),
            disconnect_count: AtomicU32::new(0),
        }
    }
}
