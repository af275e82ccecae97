//! Last-known state of one sensor.
//!
//! [`DeviceState`] is a plain value: the latest configuration the device
//! reported plus its latest measurements. It survives reconnects.
//!
//! The supervisor owns the only mutable copy inside a [`StateStore`]. Every
//! notification is decoded and applied while holding the store's lock, which
//! keeps the temperature unit used for decoding consistent with the state the
//! reading is applied to. Observers receive clones through a `watch` channel.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, trace};

use inkbird_types::frame::{self, Decoded};
use inkbird_types::{AlarmMode, DeviceIdentity, SamplingInterval, SensorReading, TemperatureUnit};

use crate::events::{EventDispatcher, SupervisorEvent};

/// Aggregate of a sensor's identity, configuration and measurements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    /// Static identity.
    pub identity: DeviceIdentity,
    /// Alarm mode, if the device has reported one.
    pub alarm_mode: Option<AlarmMode>,
    /// Sampling interval, if the device has reported one.
    pub sampling_interval: Option<SamplingInterval>,
    /// Temperature unit shown on the device, if reported.
    pub temperature_unit: Option<TemperatureUnit>,
    /// Latest measurements.
    pub reading: SensorReading,
}

impl DeviceState {
    /// Empty state for the device at `address`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            identity: DeviceIdentity::new(address),
            ..Default::default()
        }
    }

    /// Apply one decoded update.
    ///
    /// A reading replaces all four measurement fields at once. A report
    /// replaces exactly its own field, including with `None` when the device
    /// sent a pattern that matched no known value. Ignored and unrecognized
    /// frames leave the state untouched.
    ///
    /// Returns `true` if the update was applied.
    pub fn apply(&mut self, update: &Decoded) -> bool {
        match *update {
            Decoded::Reading(reading) => self.reading = reading,
            Decoded::AlarmMode(mode) => self.alarm_mode = mode,
            Decoded::SamplingInterval(interval) => self.sampling_interval = interval,
            Decoded::TemperatureUnit(unit) => self.temperature_unit = unit,
            Decoded::Ignored(_) | Decoded::Unrecognized(_) => return false,
        }
        true
    }
}

/// Shared handle to the single mutable [`DeviceState`].
///
/// Cloning is cheap; all clones refer to the same state.
#[derive(Debug, Clone)]
pub(crate) struct StateStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    state: watch::Sender<DeviceState>,
    events: EventDispatcher,
    last_notification: Mutex<Option<OffsetDateTime>>,
}

impl StateStore {
    pub(crate) fn new(state: DeviceState, events: EventDispatcher) -> Self {
        let (state, _) = watch::channel(state);
        Self {
            inner: Arc::new(StoreInner {
                state,
                events,
                last_notification: Mutex::new(None),
            }),
        }
    }

    /// Decode `data` against the current temperature unit and apply it.
    ///
    /// Observers are notified once, after the update is committed. Returns
    /// `true` if the state was updated.
    pub(crate) fn handle_notification(&self, data: &[u8]) -> bool {
        self.touch();

        let mut decoded = None;
        let mut committed = None;
        self.inner.state.send_if_modified(|state| {
            let update = frame::decode(data, state.temperature_unit);
            let applied = state.apply(&update);
            if applied {
                committed = Some(state.clone());
            }
            decoded = Some(update);
            applied
        });

        match decoded {
            Some(Decoded::Unrecognized(reason)) => {
                debug!(frame = %frame::to_hex(data), %reason, "Dropping unrecognized frame");
            }
            Some(Decoded::Ignored(opcode)) => {
                trace!(?opcode, "Ignoring frame");
            }
            Some(update) => debug!(?update, "Applied frame"),
            None => {}
        }

        let Some(state) = committed else {
            return false;
        };
        let device = state.identity.address.clone();
        if let Some(Decoded::Reading(reading)) = decoded {
            self.inner.events.send(SupervisorEvent::StateChanged {
                device: device.clone(),
                state,
            });
            self.inner
                .events
                .send(SupervisorEvent::ReadingReceived { device, reading });
        } else {
            self.inner
                .events
                .send(SupervisorEvent::StateChanged { device, state });
        }
        true
    }

    /// Clone of the current state.
    pub(crate) fn snapshot(&self) -> DeviceState {
        self.inner.state.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<DeviceState> {
        self.inner.state.subscribe()
    }

    pub(crate) fn last_notification_at(&self) -> Option<OffsetDateTime> {
        *self
            .inner
            .last_notification
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn touch(&self) {
        *self
            .inner
            .last_notification
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(OffsetDateTime::now_utc());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkbird_types::Opcode;
    use inkbird_types::frame::{encode_alarm_mode, encode_sampling_interval, encode_temperature_unit};

    const READING_C: [u8; 16] = [
        0x55, 0xAA, 0x01, 0x10, 0x00, 0x01, 0x03, 0x01, 0xFE, 0x02, 0x80, 0x03, 0xEB, 0x01, 0x01,
        0x85,
    ];

    fn store() -> StateStore {
        StateStore::new(DeviceState::new("AA:BB:CC:DD:EE:FF"), EventDispatcher::default())
    }

    #[test]
    fn test_apply_reading_replaces_all_fields() {
        let mut state = DeviceState::new("dev");
        state.reading = SensorReading {
            temperature: Some(1.0),
            humidity: Some(2.0),
            co2: Some(3),
            pressure: Some(4),
        };
        let reading = SensorReading {
            temperature: None,
            humidity: Some(40.0),
            co2: Some(500),
            pressure: Some(1000),
        };
        assert!(state.apply(&Decoded::Reading(reading)));
        assert_eq!(state.reading, reading);
    }

    #[test]
    fn test_apply_report_touches_only_its_field() {
        let mut state = DeviceState::new("dev");
        state.sampling_interval = Some(SamplingInterval::FiveMinutes);
        state.temperature_unit = Some(TemperatureUnit::Celsius);

        assert!(state.apply(&Decoded::AlarmMode(Some(AlarmMode::Once))));
        assert_eq!(state.alarm_mode, Some(AlarmMode::Once));
        assert_eq!(state.sampling_interval, Some(SamplingInterval::FiveMinutes));
        assert_eq!(state.temperature_unit, Some(TemperatureUnit::Celsius));

        // unknown pattern clears the field
        assert!(state.apply(&Decoded::SamplingInterval(None)));
        assert_eq!(state.sampling_interval, None);
        assert_eq!(state.alarm_mode, Some(AlarmMode::Once));
    }

    #[test]
    fn test_apply_noop_updates() {
        let mut state = DeviceState::new("dev");
        state.alarm_mode = Some(AlarmMode::Off);
        let before = state.clone();

        assert!(!state.apply(&Decoded::Ignored(Opcode::LimitsReport)));
        assert!(!state.apply(&Decoded::Unrecognized(
            inkbird_types::Unrecognized::UnknownOpcode(0x42)
        )));
        assert_eq!(state, before);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let updates = [
            Decoded::AlarmMode(Some(AlarmMode::EveryTime)),
            Decoded::TemperatureUnit(Some(TemperatureUnit::Fahrenheit)),
            frame::decode(&READING_C, Some(TemperatureUnit::Celsius)),
        ];

        let mut once = DeviceState::new("dev");
        for update in &updates {
            once.apply(update);
        }
        let mut twice = once.clone();
        for update in &updates {
            twice.apply(update);
        }
        assert_eq!(once, twice);
    }

    #[test]
    fn test_reading_decoded_against_current_unit() {
        let store = store();

        // unit unknown: temperature absent
        assert!(store.handle_notification(&READING_C));
        assert_eq!(store.snapshot().reading.temperature, None);
        assert_eq!(store.snapshot().reading.co2, Some(640));

        assert!(store.handle_notification(encode_temperature_unit(TemperatureUnit::Celsius).as_bytes()));
        assert!(store.handle_notification(&READING_C));
        let temperature = store.snapshot().reading.temperature.unwrap();
        assert!((temperature - 25.9).abs() < 0.01);
    }

    #[test]
    fn test_observers_notified_once_per_apply() {
        let store = store();
        let mut rx = store.subscribe();
        let mut events = store.inner.events.subscribe();
        assert!(!rx.has_changed().unwrap());

        assert!(store.handle_notification(encode_alarm_mode(AlarmMode::Once).as_bytes()));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().alarm_mode, Some(AlarmMode::Once));

        match events.try_recv().unwrap() {
            SupervisorEvent::StateChanged { state, device } => {
                assert_eq!(state.alarm_mode, Some(AlarmMode::Once));
                assert_eq!(device, "AA:BB:CC:DD:EE:FF");
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_state_changed_carries_each_committed_update() {
        let store = store();
        let mut events = store.inner.events.subscribe();

        store.handle_notification(encode_alarm_mode(AlarmMode::Off).as_bytes());
        store.handle_notification(encode_sampling_interval(SamplingInterval::OneMinute).as_bytes());
        store.handle_notification(encode_alarm_mode(AlarmMode::EveryTime).as_bytes());

        let states: Vec<DeviceState> = std::iter::from_fn(|| events.try_recv().ok())
            .filter_map(|event| match event {
                SupervisorEvent::StateChanged { state, .. } => Some(state),
                _ => None,
            })
            .collect();
        let seen: Vec<_> = states
            .iter()
            .map(|s| (s.alarm_mode, s.sampling_interval))
            .collect();
        assert_eq!(
            seen,
            vec![
                (Some(AlarmMode::Off), None),
                (Some(AlarmMode::Off), Some(SamplingInterval::OneMinute)),
                (Some(AlarmMode::EveryTime), Some(SamplingInterval::OneMinute)),
            ]
        );
    }

    #[test]
    fn test_every_reading_frame_is_reported() {
        let store = store();
        let mut events = store.inner.events.subscribe();

        store.handle_notification(&READING_C);
        store.handle_notification(&READING_C);
        store.handle_notification(encode_alarm_mode(AlarmMode::Off).as_bytes());

        let readings: Vec<SensorReading> = std::iter::from_fn(|| events.try_recv().ok())
            .filter_map(|event| match event {
                SupervisorEvent::ReadingReceived { reading, .. } => Some(reading),
                _ => None,
            })
            .collect();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0], readings[1]);
        assert_eq!(readings[0].co2, Some(640));
    }

    #[test]
    fn test_unrecognized_frames_do_not_notify() {
        let store = store();
        let mut rx = store.subscribe();
        let mut events = store.inner.events.subscribe();

        assert!(!store.handle_notification(&[0x01, 0x02, 0x03]));
        assert!(!store.handle_notification(&[0x55, 0xAA, 0x03, 0x0A, 0x00]));
        assert!(!store.handle_notification(&[0x55, 0xAA, 0x77]));

        assert!(!rx.has_changed().unwrap());
        assert!(events.try_recv().is_err());
        assert!(store.last_notification_at().is_some());
    }

    #[test]
    fn test_report_frames_update_state() {
        let store = store();
        store.handle_notification(encode_sampling_interval(SamplingInterval::TwoMinutes).as_bytes());
        store.handle_notification(encode_alarm_mode(AlarmMode::EveryTime).as_bytes());

        let state = store.snapshot();
        assert_eq!(state.sampling_interval, Some(SamplingInterval::TwoMinutes));
        assert_eq!(state.alarm_mode, Some(AlarmMode::EveryTime));
        assert!(state.reading.is_empty());
    }

    #[test]
    fn test_state_serialization_roundtrip() {
        let mut state = DeviceState::new("AA:BB:CC:DD:EE:FF");
        state.alarm_mode = Some(AlarmMode::Once);
        state.reading.co2 = Some(612);

        let json = serde_json::to_string(&state).unwrap();
        let back: DeviceState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
