//! # lorawan
//!
//! A `no_std` LoRaWAN end-device MAC implementation, supporting Class A, B and C
//! devices on the US915 frequency plan.
//!
//! This crate implements the end-device side of the LoRaWAN MAC: the wire codec
//! and cryptographic frame protection ([`codec`], [`crypto`]), the pending-command
//! store ([`command_store`]), the confirm queue that arbitrates asynchronous
//! request completion ([`confirm_queue`]), the join/send/receive state machine
//! ([`lorawan::mac`]), and the Class B beacon/ping-slot state machines
//! ([`class::class_b`]). The radio driver, secure element, and non-volatile store
//! are external collaborators reached through traits, not implemented here.
//!
//! ## Example
//!
//! ```rust,no_run
//! use lorawan::{
//!     config::device::DeviceConfig,
//!     device::LoRaWANDevice,
//!     class::OperatingMode,
//!     lorawan::region::US915,
//!     radio::sx127x,
//!     timer::{Clock, SoftwareTimer},
//! };
//!
//! struct SystemClock;
//! impl Clock for SystemClock {
//!     fn now_ms(&self) -> u64 { 0 }
//! }
//!
//! # fn run(radio: sx127x::SX127x<(), (), (), ()>) {
//! let config = DeviceConfig::new_otaa([0x01; 8], [0x02; 8], [0x03; 16]);
//! let region = US915::new();
//! let clock = SystemClock;
//! let duty_cycle_timer = SoftwareTimer::new(&clock);
//!
//! let mut device = LoRaWANDevice::new(
//!     radio,
//!     region,
//!     duty_cycle_timer,
//!     config,
//!     &clock,
//!     OperatingMode::ClassA,
//! );
//! let _ = device.join();
//! let _ = device.send_data(1, b"Hello LoRaWAN!", false);
//! let _ = device.process();
//! # }
//! ```
//!
//! ## Device Classes
//!
//! - **Class A**: Basic class with two receive windows after each uplink
//! - **Class B**: Adds scheduled receive windows synchronized with a network beacon
//! - **Class C**: Continuous receive except when transmitting
//!
//! ## Safety
//!
//! This crate uses `#![no_std]` and is intended for use in embedded systems.
//! It has been designed with safety in mind but has not been audited.
//! Use at your own risk in production systems.

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod class;
pub mod codec;
pub mod command_store;
pub mod commands;
pub mod config;
pub mod confirm_queue;
pub mod crypto;
pub mod device;
pub mod lorawan;
pub mod radio;
pub mod status;
pub mod timer;

/// Error type for the LoRaWAN stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Radio hardware error
    Radio,
    /// Invalid configuration
    Config,
    /// Join procedure failed
    Join,
    /// Transmission failed
    Tx,
    /// Reception failed
    Rx,
    /// MAC layer error
    Mac,
    /// Crypto operation failed
    Crypto,
    /// Invalid state for operation
    InvalidState,
    /// Buffer too small
    BufferTooSmall,
    /// Invalid parameter
    InvalidParam,
    /// The device is not joined to a network
    NotJoined,
    /// A request of this kind is already outstanding
    Busy,
}

/// Result type for the LoRaWAN stack
pub type Result<T> = core::result::Result<T, Error>;
