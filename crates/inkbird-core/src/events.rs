//! Supervisor event stream.
//!
//! Besides the latest-state `watch` channel exposed by
//! [`Supervisor::subscribe`](crate::Supervisor::subscribe), every supervisor
//! publishes a broadcast stream of [`SupervisorEvent`]s. Hosts use it to log
//! connection transitions or to be told once that background reconnection
//! keeps failing.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use inkbird_types::SensorReading;

use crate::state::DeviceState;
use crate::supervisor::ConnectionState;

/// Events emitted by a supervisor.
///
/// All events are serializable for logging and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SupervisorEvent {
    /// A decoded frame was applied to the device state.
    StateChanged {
        /// Device address.
        device: String,
        /// Snapshot taken right after the update was committed.
        state: DeviceState,
    },
    /// A measurement frame was applied. Sent for every reading, including
    /// one identical to the previous.
    ReadingReceived {
        /// Device address.
        device: String,
        /// The reading as applied.
        reading: SensorReading,
    },
    /// The connection moved to a new state.
    ConnectionChanged {
        /// Device address.
        device: String,
        /// The new connection state.
        state: ConnectionState,
    },
    /// Background reconnection failed. Sent once per outage; further failed
    /// attempts are only logged until a reconnect succeeds.
    ReconnectFailed {
        /// Device address.
        device: String,
        /// Description of the last failure.
        error: String,
    },
}

/// Sender for supervisor events.
pub type EventSender = broadcast::Sender<SupervisorEvent>;

/// Receiver for supervisor events.
pub type EventReceiver = broadcast::Receiver<SupervisorEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: SupervisorEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = SupervisorEvent::ConnectionChanged {
            device: "AA:BB:CC:DD:EE:FF".to_string(),
            state: ConnectionState::Active,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"connection_changed\""));
        assert!(json.contains("\"state\":\"active\""));

        let back: SupervisorEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_reading_event_serialization() {
        let event = SupervisorEvent::ReadingReceived {
            device: "dev".to_string(),
            reading: SensorReading {
                co2: Some(640),
                ..Default::default()
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"reading_received\""));

        let back: SupervisorEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[tokio::test]
    async fn test_dispatcher_fan_out() {
        let dispatcher = EventDispatcher::new(8);
        let mut a = dispatcher.subscribe();
        let mut b = dispatcher.subscribe();
        assert_eq!(dispatcher.receiver_count(), 2);

        dispatcher.send(SupervisorEvent::ReconnectFailed {
            device: "dev".to_string(),
            error: "out of range".to_string(),
        });

        for rx in [&mut a, &mut b] {
            match rx.recv().await.unwrap() {
                SupervisorEvent::ReconnectFailed { error, .. } => assert_eq!(error, "out of range"),
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[test]
    fn test_send_without_receivers() {
        let dispatcher = EventDispatcher::default();
        dispatcher.send(SupervisorEvent::ConnectionChanged {
            device: "dev".to_string(),
            state: ConnectionState::Disconnected,
        });
        assert_eq!(dispatcher.receiver_count(), 0);
    }
}
