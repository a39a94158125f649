//! LoRaWAN protocol implementation
//!
//! This module contains the core LoRaWAN protocol implementation, including:
//! - MAC layer functionality
//! - PHY layer operations
//! - Regional parameters
//!
//! MAC command parsing/serialization lives at the crate root in
//! [`crate::commands`]; it is shared by the MAC engine and the Class B
//! engine and has no region or PHY dependency.

/// MAC layer implementation
pub mod mac;

/// PHY layer operations
pub mod phy;

/// Regional parameters and configurations
pub mod region;

pub use mac::{MacError, MacLayer};
pub use phy::{PhyConfig, PhyLayer, TimingParams};
