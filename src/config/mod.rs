//! Device and network configuration
//!
//! This module contains types and functions for configuring LoRaWAN devices
//! and network parameters. It includes:
//! - Device configuration (DevEUI, AppEUI, keys)
//! - Session state management
//! - The MAC Information Base (MIB) get/set surface

/// Device configuration and session state
pub mod device;

/// MAC Information Base (key/value parameter access)
pub mod mib;

pub use device::DeviceConfig;
pub use mib::{MibHandler, MibId, MibValue};
