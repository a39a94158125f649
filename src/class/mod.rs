//! LoRaWAN device class implementations
//!
//! This module contains the implementations of the three LoRaWAN device classes:
//! - Class A: Basic bi-directional communication with two receive windows after each uplink
//! - Class B: Scheduled receive slots synchronized with network beacon
//! - Class C: Continuous receive except when transmitting

/// Class A device implementation
pub mod class_a;
pub use class_a::ClassA;

/// Class B device implementation
pub mod class_b;
pub use class_b::ClassB;

/// Class C device implementation
pub mod class_c;
pub use class_c::ClassC;

use crate::config::device::{EUI64, MacVersion, SessionState};
use crate::lorawan::mac::{DownlinkPayload, MacLayer, INDICATION_CAPACITY};
use crate::lorawan::region::Region;
use crate::radio::traits::Radio;
use crate::status::{EventInfo, StatusCode};
use crate::timer::Timer;
use heapless::Vec;

/// Device operating mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatingMode {
    /// Class A: Basic bi-directional communication
    ClassA,
    /// Class B: Scheduled receive slots
    ClassB,
    /// Class C: Continuous receive
    ClassC,
}

/// Common trait for all device classes
pub trait DeviceClass<R: Radio, REG: Region, TMR: Timer> {
    /// Error type for device operations
    type Error;

    /// Get current operating mode
    fn operating_mode(&self) -> OperatingMode;

    /// Run one iteration of the class's idle-time behavior (Class C's
    /// continuous RX2 window, Class B's ping slots, or just draining the
    /// confirm queue for Class A).
    fn process(&mut self) -> Result<(), Self::Error>;

    /// Send data
    fn send_data(&mut self, port: u8, data: &[u8], confirmed: bool) -> Result<StatusCode, Self::Error>;

    /// Send join request
    fn send_join_request(
        &mut self,
        dev_eui: EUI64,
        app_eui: EUI64,
        app_key: [u8; 16],
        nwk_key: Option<[u8; 16]>,
        mac_version: MacVersion,
    ) -> Result<StatusCode, Self::Error>;

    /// Take the most recently received downlink application payload, if any.
    fn take_downlink(&mut self) -> Option<DownlinkPayload>;

    /// Drain the queue of asynchronous fault/event indications (MIC failure,
    /// address mismatch, frame-counter rejection, ...) raised since the last
    /// call.
    fn take_indications(&mut self) -> Vec<EventInfo, INDICATION_CAPACITY>;

    /// Get session state
    fn session_state(&self) -> &SessionState;

    /// Get MAC layer reference
    fn mac_layer(&self) -> &MacLayer<R, REG, TMR>;
}
