//! Hardware integration tests for inkbird-core
//!
//! These tests require an IAM-T1 in range and should be run with:
//! ```
//! cargo test --package inkbird-core --test hardware_tests -- --ignored --nocapture
//! ```
//!
//! Configure the device via the `INKBIRD_DEVICE` environment variable
//! (MAC address on Linux and Windows, peripheral UUID on macOS).
//!
//! Example:
//! ```
//! INKBIRD_DEVICE="AA:BB:CC:DD:EE:FF" cargo test --package inkbird-core --test hardware_tests -- --ignored --nocapture
//! ```
//!
//! The configuration test writes to the device but restores the previous
//! alarm mode afterwards.

use std::env;
use std::time::Duration;

use inkbird_core::{
    AlarmMode, BleTransport, ConnectionState, Supervisor, SupervisorConfig, read_identity,
};
use tokio::time::timeout;

/// Default timeout for BLE operations
const BLE_TIMEOUT: Duration = Duration::from_secs(45);

/// Get device identifier from environment
fn get_device() -> Option<String> {
    env::var("INKBIRD_DEVICE").ok().filter(|s| !s.is_empty())
}

macro_rules! device_or_skip {
    () => {
        match get_device() {
            Some(device) => device,
            None => {
                println!("INKBIRD_DEVICE not set, skipping");
                return;
            }
        }
    };
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_read_identity() {
    let address = device_or_skip!();
    let transport = BleTransport::new(&address);

    match timeout(BLE_TIMEOUT, read_identity(&transport)).await {
        Ok(Ok(identity)) => {
            println!("Identity: {:?}", identity);
            println!("Display name: {}", identity.display_name());
            assert!(!identity.model.is_empty(), "model should be readable");
        }
        Ok(Err(e)) => panic!("Identity read failed: {}", e),
        Err(_) => panic!("Identity read timed out"),
    }
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_supervisor_receives_state_dump() {
    let address = device_or_skip!();
    let supervisor = Supervisor::new(BleTransport::new(&address), SupervisorConfig::default())
        .expect("default config is valid");

    match timeout(BLE_TIMEOUT, supervisor.start()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => panic!("Start failed: {}", e),
        Err(_) => panic!("Start timed out"),
    }
    assert_eq!(supervisor.connection_state(), ConnectionState::Active);

    // The device answers the connect command with its settings and a reading.
    let mut updates = supervisor.subscribe();
    let result = timeout(
        Duration::from_secs(10),
        updates.wait_for(|s| s.temperature_unit.is_some() && s.reading.co2.is_some()),
    )
    .await;

    let state = supervisor.state();
    println!("State: {:#?}", state);
    supervisor.shutdown().await;

    assert!(
        matches!(result, Ok(Ok(_))),
        "expected settings and a reading after the handshake"
    );
    assert_eq!(supervisor.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_set_alarm_mode_roundtrip() {
    let address = device_or_skip!();
    let supervisor = Supervisor::new(BleTransport::new(&address), SupervisorConfig::default())
        .expect("default config is valid");

    timeout(BLE_TIMEOUT, supervisor.start())
        .await
        .expect("start timed out")
        .expect("start failed");

    let mut updates = supervisor.subscribe();
    let _ = timeout(
        Duration::from_secs(10),
        updates.wait_for(|s| s.alarm_mode.is_some()),
    )
    .await;
    let original = supervisor.state().alarm_mode.unwrap_or(AlarmMode::Once);
    let target = if original == AlarmMode::Off {
        AlarmMode::Once
    } else {
        AlarmMode::Off
    };
    println!("Alarm mode: {} -> {}", original, target);

    supervisor.set_alarm_mode(target).await.expect("set failed");
    assert_eq!(supervisor.state().alarm_mode, Some(target));

    supervisor
        .set_alarm_mode(original)
        .await
        .expect("restore failed");
    supervisor.shutdown().await;
}
