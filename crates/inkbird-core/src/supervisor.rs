//! Connection supervisor for one IAM-T1 sensor.
//!
//! The supervisor owns the [`Transport`] and the device state. It performs
//! the connect handshake, feeds every notification into the state, checks
//! the link on a fixed cadence and silently reconnects when the device has
//! gone away. Only the initial [`Supervisor::start`] and the command setters
//! return errors; background reconnect failures are logged and published as
//! a single [`SupervisorEvent::ReconnectFailed`] per outage.
//!
//! ```text
//!  Disconnected ──start / health tick──▶ Connecting ──link up──▶ Handshaking
//!       ▲                                    │                       │
//!       │◀──────────── failure ──────────────┴───────────────────────┤
//!       │                                                            ▼
//!       └──────────── link lost (seen on tick) / shutdown ───────── Active
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use inkbird_types::frame::{self, Frame};
use inkbird_types::uuids::{CONNECT_COMMAND, NOTIFY, WRITE};
use inkbird_types::{AlarmMode, SamplingInterval};

use crate::error::{Error, Result};
use crate::events::{EventDispatcher, SupervisorEvent};
use crate::state::{DeviceState, StateStore};
use crate::transport::{NotificationHandler, Transport};

/// Default time between health checks.
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default budget for connect plus handshake, including any scan.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for a command write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time to wait for the device to echo a new setting.
pub const DEFAULT_ECHO_TIMEOUT: Duration = Duration::from_secs(3);

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No link. The initial and the final state.
    Disconnected,
    /// Establishing the link.
    Connecting,
    /// Link is up; subscribing and sending the connect command.
    Handshaking,
    /// Handshake done; notifications flow and commands are accepted.
    Active,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Handshaking => "handshaking",
            ConnectionState::Active => "active",
        };
        f.write_str(s)
    }
}

/// Supervisor settings.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use inkbird_core::SupervisorConfig;
///
/// let config = SupervisorConfig::default()
///     .health_check_interval(Duration::from_secs(60))
///     .connect_timeout(Duration::from_secs(45));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Time between health checks. Reconnect attempts happen at this cadence.
    pub health_check_interval: Duration,
    /// Budget for connect plus handshake.
    pub connect_timeout: Duration,
    /// Timeout for a command write.
    pub write_timeout: Duration,
    /// How long a setter waits for the device to report the new value.
    /// Zero disables the wait.
    pub echo_timeout: Duration,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            echo_timeout: DEFAULT_ECHO_TIMEOUT,
            event_capacity: 100,
        }
    }
}

impl SupervisorConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the health check interval.
    #[must_use]
    pub fn health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    /// Set the connect plus handshake timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the command write timeout.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set how long setters wait for the device echo.
    #[must_use]
    pub fn echo_timeout(mut self, timeout: Duration) -> Self {
        self.echo_timeout = timeout;
        self
    }

    /// Set the event channel capacity.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Validate the config and return an error if invalid.
    ///
    /// Checks that:
    /// - `health_check_interval` is > 0
    /// - `connect_timeout` is > 0
    /// - `write_timeout` is > 0
    /// - `event_capacity` is > 0
    pub fn validate(&self) -> Result<()> {
        if self.health_check_interval.is_zero() {
            return Err(Error::invalid_config("health_check_interval must be > 0"));
        }
        if self.connect_timeout.is_zero() {
            return Err(Error::invalid_config("connect_timeout must be > 0"));
        }
        if self.write_timeout.is_zero() {
            return Err(Error::invalid_config("write_timeout must be > 0"));
        }
        if self.event_capacity == 0 {
            return Err(Error::invalid_config("event_capacity must be > 0"));
        }
        Ok(())
    }
}

/// Supervises the connection to one sensor.
///
/// Cloning yields another handle to the same supervisor.
///
/// # Example
///
/// ```no_run
/// use inkbird_core::{BleTransport, Supervisor, SupervisorConfig};
/// use inkbird_types::AlarmMode;
///
/// #[tokio::main]
/// async fn main() -> inkbird_core::Result<()> {
///     let transport = BleTransport::new("AA:BB:CC:DD:EE:FF");
///     let supervisor = Supervisor::new(transport, SupervisorConfig::default())?;
///     supervisor.start().await?;
///
///     let mut updates = supervisor.subscribe();
///     updates.changed().await.ok();
///     println!("{:?}", updates.borrow().reading);
///
///     supervisor.set_alarm_mode(AlarmMode::Once).await?;
///     supervisor.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct Supervisor<T: Transport + 'static> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport + 'static> Clone for Supervisor<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport + 'static> std::fmt::Debug for Supervisor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("address", &self.inner.transport.address())
            .field("connection", &self.connection_state())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

struct Inner<T> {
    transport: T,
    config: SupervisorConfig,
    store: StateStore,
    events: EventDispatcher,
    connection: watch::Sender<ConnectionState>,
    /// Serializes connect, handshake and teardown.
    session: tokio::sync::Mutex<()>,
    /// Serializes command writes.
    writer: tokio::sync::Mutex<()>,
    cancel: Mutex<CancellationToken>,
    health_task: Mutex<Option<JoinHandle<()>>>,
    /// Set once the current outage has been reported.
    outage_reported: AtomicBool,
}

impl<T: Transport + 'static> Supervisor<T> {
    /// Create a supervisor with empty state. Nothing is connected until
    /// [`start`](Self::start).
    pub fn new(transport: T, config: SupervisorConfig) -> Result<Self> {
        let state = DeviceState::new(transport.address());
        Self::with_state(transport, config, state)
    }

    /// Create a supervisor seeded with previously known state, for example
    /// one restored from a [`StateSnapshot`](crate::StateSnapshot).
    pub fn with_state(transport: T, config: SupervisorConfig, mut state: DeviceState) -> Result<Self> {
        config.validate()?;

        if state.identity.address.is_empty() {
            state.identity.address = transport.address().to_string();
        }

        let events = EventDispatcher::new(config.event_capacity);
        let store = StateStore::new(state, events.clone());
        let (connection, _) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                config,
                store,
                events,
                connection,
                session: tokio::sync::Mutex::new(()),
                writer: tokio::sync::Mutex::new(()),
                cancel: Mutex::new(CancellationToken::new()),
                health_task: Mutex::new(None),
                outage_reported: AtomicBool::new(false),
            }),
        })
    }

    /// Connect, handshake and start the periodic health check.
    ///
    /// On failure the supervisor is left `Disconnected`, no health check is
    /// scheduled and the error is returned. Calling `start` on an active
    /// supervisor is a no-op. `start` may be called again after
    /// [`shutdown`](Self::shutdown).
    #[tracing::instrument(level = "info", skip_all, fields(address = %self.inner.transport.address()))]
    pub async fn start(&self) -> Result<()> {
        let token = self.inner.session_token();
        self.inner.establish(&token).await?;
        self.spawn_health_check(token);
        Ok(())
    }

    /// Run one health check now.
    ///
    /// Reconnects if the link is down. Failures are logged, never returned.
    /// Does nothing after [`shutdown`](Self::shutdown). Returns the
    /// resulting connection state.
    pub async fn health_check(&self) -> ConnectionState {
        let token = self.inner.current_token();
        self.inner.health_tick(&token).await;
        self.connection_state()
    }

    /// Stop the health check, unsubscribe and disconnect.
    ///
    /// Interrupts an in-flight connect or handshake. Works from any state,
    /// never fails and always leaves the supervisor `Disconnected`.
    #[tracing::instrument(level = "info", skip_all, fields(address = %self.inner.transport.address()))]
    pub async fn shutdown(&self) {
        info!("Shutting down");
        self.inner.current_token().cancel();
        if let Some(handle) = self
            .inner
            .health_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }

        let _session = self.inner.session.lock().await;
        self.inner.teardown().await;
        self.inner.set_connection(ConnectionState::Disconnected);
    }

    /// Change the alarm mode.
    ///
    /// Returns [`Error::NotConnected`] unless the connection is active and
    /// [`Error::CommandFailed`] if the write fails. A failed write does not
    /// trigger a reconnect.
    pub async fn set_alarm_mode(&self, mode: AlarmMode) -> Result<()> {
        self.send_command(
            format!("set_alarm_mode({})", mode),
            frame::encode_alarm_mode(mode),
            move |state| state.alarm_mode == Some(mode),
        )
        .await
    }

    /// Change the sampling interval.
    ///
    /// Same error behavior as [`set_alarm_mode`](Self::set_alarm_mode).
    pub async fn set_sampling_interval(&self, interval: SamplingInterval) -> Result<()> {
        self.send_command(
            format!("set_sampling_interval({})", interval),
            frame::encode_sampling_interval(interval),
            move |state| state.sampling_interval == Some(interval),
        )
        .await
    }

    /// Snapshot of the current device state.
    pub fn state(&self) -> DeviceState {
        self.inner.store.snapshot()
    }

    /// Receiver that is notified after every applied update.
    pub fn subscribe(&self) -> watch::Receiver<DeviceState> {
        self.inner.store.subscribe()
    }

    /// Receiver for [`SupervisorEvent`]s.
    pub fn events(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.inner.events.subscribe()
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.connection.borrow()
    }

    /// Receiver that is notified on connection state transitions.
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.subscribe()
    }

    /// When the last notification was received, if ever.
    pub fn last_notification_at(&self) -> Option<OffsetDateTime> {
        self.inner.store.last_notification_at()
    }

    /// Address of the supervised device.
    pub fn address(&self) -> &str {
        self.inner.transport.address()
    }

    /// The active configuration.
    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    async fn send_command<F>(&self, command: String, frame: Frame, echoed: F) -> Result<()>
    where
        F: Fn(&DeviceState) -> bool,
    {
        let inner = &self.inner;
        let _writer = inner.writer.lock().await;

        if self.connection_state() != ConnectionState::Active {
            debug!(%command, "Rejecting command while not active");
            return Err(Error::NotConnected);
        }

        let mut updates = inner.store.subscribe();
        debug!(%command, %frame, "Sending command");

        let written = timeout(
            inner.config.write_timeout,
            inner.transport.write(WRITE, frame.as_bytes()),
        )
        .await
        .unwrap_or_else(|_| {
            Err(Error::timeout(
                format!("write {}", command),
                inner.config.write_timeout,
            ))
        });
        if let Err(e) = written {
            warn!(%command, error = %e, "Command write failed");
            return Err(Error::command_failed(command, e.to_string()));
        }

        if !inner.config.echo_timeout.is_zero() {
            let confirmed = timeout(inner.config.echo_timeout, updates.wait_for(|s| echoed(s)))
                .await
                .is_ok_and(|r| r.is_ok());
            if confirmed {
                debug!(%command, "Device confirmed command");
            } else {
                debug!(%command, "Device did not echo command within {:?}", inner.config.echo_timeout);
            }
        }
        Ok(())
    }

    fn spawn_health_check(&self, token: CancellationToken) {
        let mut slot = self
            .inner
            .health_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        let period = self.inner.config.health_check_interval;

        *slot = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Health check cancelled");
                        break;
                    }
                    _ = ticker.tick() => {
                        let Some(inner) = weak.upgrade() else {
                            break;
                        };
                        inner.health_tick(&token).await;
                    }
                }
            }
        }));
    }
}

impl<T: Transport + 'static> Inner<T> {
    fn current_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Token for a new session; replaces the one a previous shutdown cancelled.
    fn session_token(&self) -> CancellationToken {
        let mut token = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        if token.is_cancelled() {
            *token = CancellationToken::new();
        }
        token.clone()
    }

    fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    fn set_connection(&self, next: ConnectionState) {
        let mut previous = next;
        let changed = self.connection.send_if_modified(|current| {
            previous = *current;
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        if changed {
            info!(from = %previous, to = %next, "Connection state changed");
            self.events.send(SupervisorEvent::ConnectionChanged {
                device: self.transport.address().to_string(),
                state: next,
            });
        }
    }

    async fn health_tick(&self, token: &CancellationToken) {
        if token.is_cancelled() {
            return;
        }
        match self.establish(token).await {
            Ok(()) => {}
            Err(Error::Cancelled) => debug!("Reconnect interrupted by shutdown"),
            Err(e) => {
                warn!(error = %e, "Reconnect failed; retrying at next health check");
                if !self.outage_reported.swap(true, Ordering::SeqCst) {
                    self.events.send(SupervisorEvent::ReconnectFailed {
                        device: self.transport.address().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    /// Bring the session to `Active`, or leave it `Disconnected` and return
    /// why not. A healthy active session is left alone.
    async fn establish(&self, token: &CancellationToken) -> Result<()> {
        let _session = self.session.lock().await;
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if self.connection_state() == ConnectionState::Active {
            if self.transport.is_connected().await {
                debug!("Connection healthy");
                return Ok(());
            }
            info!("Connection lost; reconnecting");
            self.set_connection(ConnectionState::Disconnected);
        }

        self.set_connection(ConnectionState::Connecting);
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(Error::Cancelled),
            r = timeout(self.config.connect_timeout, self.connect_and_handshake()) => {
                r.unwrap_or_else(|_| {
                    Err(Error::timeout("connect and handshake", self.config.connect_timeout))
                })
            }
        };

        match result {
            Ok(()) => {
                self.outage_reported.store(false, Ordering::SeqCst);
                self.set_connection(ConnectionState::Active);
                Ok(())
            }
            Err(e) => {
                self.teardown().await;
                self.set_connection(ConnectionState::Disconnected);
                match e {
                    Error::Cancelled => Err(Error::Cancelled),
                    e => Err(Error::connection_failed(
                        Some(self.transport.address().to_string()),
                        e.to_string(),
                    )),
                }
            }
        }
    }

    async fn connect_and_handshake(&self) -> Result<()> {
        self.transport.connect().await?;
        self.set_connection(ConnectionState::Handshaking);

        // The handler only holds the store, so a dropped supervisor is not
        // kept alive by the transport.
        let store = self.store.clone();
        let handler: NotificationHandler = Arc::new(move |data: &[u8]| {
            store.handle_notification(data);
        });
        self.transport.subscribe(NOTIFY, handler).await?;
        self.transport.write(WRITE, &CONNECT_COMMAND).await?;
        debug!("Handshake complete");
        Ok(())
    }

    /// Unsubscribe and disconnect, logging failures.
    async fn teardown(&self) {
        if let Err(e) = self.transport.unsubscribe(NOTIFY).await {
            log_teardown_error("unsubscribe", &e);
        }
        if let Err(e) = self.transport.disconnect().await {
            log_teardown_error("disconnect", &e);
        }
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        self.cancel
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
        if let Some(handle) = self
            .health_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

fn log_teardown_error(operation: &str, error: &Error) {
    match error {
        Error::NotConnected => debug!("Skipping {}: not connected", operation),
        e => warn!(error = %e, "Failed to {} during teardown", operation),
    }
}
