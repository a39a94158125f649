#![no_std]

use lorawan::{
    class::{class_a::ClassA, class_b::ClassB, class_c::ClassC, DeviceClass, OperatingMode},
    config::device::{AESKey, DevAddr, MacVersion, SessionState},
    lorawan::{mac::MacLayer, region::US915},
    timer::SoftwareTimer,
};

mod mock;
use mock::{MockRadio, TestClock};

fn session() -> SessionState {
    SessionState::new_abp(
        DevAddr::new([0x01, 0x02, 0x03, 0x04]),
        AESKey::new([0x11; 16]),
        AESKey::new([0x22; 16]),
    )
}

#[test]
fn test_class_a_reports_its_mode() {
    let clock = TestClock::new();
    let timer = SoftwareTimer::new(&clock);
    let mac = MacLayer::new(MockRadio::new(), US915::new(), session(), timer);
    let device = ClassA::new(mac);

    assert_eq!(device.operating_mode(), OperatingMode::ClassA);
    assert!(device.session_state().is_joined());
}

#[test]
fn test_class_c_reports_its_mode() {
    let clock = TestClock::new();
    let timer = SoftwareTimer::new(&clock);
    let mac = MacLayer::new(MockRadio::new(), US915::new(), session(), timer);
    let device = ClassC::new(mac);

    assert_eq!(device.operating_mode(), OperatingMode::ClassC);
}

#[test]
fn test_class_a_send_unconfirmed_reports_status() {
    let clock = TestClock::new();
    let timer = SoftwareTimer::new(&clock);
    let mac = MacLayer::new(MockRadio::new(), US915::new(), session(), timer);
    let mut device = ClassA::new(mac);

    // No downlink queued yet.
    assert!(device.take_downlink().is_none());

    let status = device.send_data(1, b"ping", false);
    assert!(status.is_ok());
}

#[test]
fn test_class_a_join_request_without_session() {
    let clock = TestClock::new();
    let timer = SoftwareTimer::new(&clock);
    let mac = MacLayer::new(MockRadio::new(), US915::new(), SessionState::new(), timer);
    let mut device = ClassA::new(mac);

    assert!(!device.session_state().is_joined());

    let status = device.send_join_request([0xAA; 8], [0xBB; 8], [0xCC; 16], None, MacVersion::V1_0_x);
    assert!(status.is_ok());
}

#[test]
fn test_class_b_starts_idle_and_can_start_acquisition() {
    let clock = TestClock::new();
    let timer = SoftwareTimer::new(&clock);
    let mac = MacLayer::new(MockRadio::new(), US915::new(), session(), timer);
    let ping_config = lorawan::class::class_b::PingSlotConfig::default();
    let mut device = ClassB::new(mac, &clock, ping_config);

    assert_eq!(device.operating_mode(), OperatingMode::ClassB);
    assert_eq!(device.beacon_state(), lorawan::class::class_b::BeaconState::Idle);

    device.start_acquisition();
    assert_eq!(device.beacon_state(), lorawan::class::class_b::BeaconState::Acquisition);
}

// Right after a beacon lock, the device is still inside the beacon's
// reserved window; an uplink attempted there is deferred rather than
// transmitted straight into it.
#[test]
fn test_class_b_send_data_defers_inside_beacon_reserved_window() {
    let clock = TestClock::new();
    let timer = SoftwareTimer::new(&clock);
    let mut radio = MockRadio::new();
    radio.set_rx_data(&[0xAAu8; 17]);
    let mac = MacLayer::new(radio, US915::new(), session(), timer);
    let ping_config = lorawan::class::class_b::PingSlotConfig::default();
    let mut device = ClassB::new(mac, &clock, ping_config);

    device.start_acquisition();
    device.process().unwrap();
    assert_eq!(device.beacon_state(), lorawan::class::class_b::BeaconState::Locked);

    let status = device.send_data(1, b"ping", false).unwrap();
    assert_eq!(status, lorawan::status::StatusCode::BusyBeaconReserved);
}

#[test]
fn test_class_b_into_mac_round_trips_session() {
    let clock = TestClock::new();
    let timer = SoftwareTimer::new(&clock);
    let mac = MacLayer::new(MockRadio::new(), US915::new(), session(), timer);
    let ping_config = lorawan::class::class_b::PingSlotConfig::default();
    let device = ClassB::new(mac, &clock, ping_config);

    let mac = device.into_mac();
    assert!(mac.is_joined());
}

#[test]
fn test_class_c_process_does_not_error_without_radio_activity() {
    let clock = TestClock::new();
    let timer = SoftwareTimer::new(&clock);
    let mac = MacLayer::new(MockRadio::new(), US915::new(), session(), timer);
    let mut device = ClassC::new(mac);

    assert!(device.process().is_ok());
}

#[test]
fn test_class_c_send_data_with_simulated_radio_error() {
    let clock = TestClock::new();
    let timer = SoftwareTimer::new(&clock);
    let mut radio = MockRadio::new();
    radio.set_error_mode(true);
    let mac = MacLayer::new(radio, US915::new(), session(), timer);
    let mut device = ClassC::new(mac);

    assert!(device.send_data(1, &[1, 2, 3, 4], false).is_err());
}
