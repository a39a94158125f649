//! MAC Information Base: a key/value interface identifying device and session
//! parameters by symbolic id, for get/set access outside the primary
//! request/indication flow.

use super::device::{AbpVersion, DevAddr, MacVersion, NetworkActivation, AESKey};
use crate::class::OperatingMode;
use crate::status::StatusCode;

/// Symbolic identifier for a MIB parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MibId {
    /// Device class (A, B or C).
    DeviceClass,
    /// Device EUI.
    DevEui,
    /// Join EUI (application EUI).
    JoinEui,
    /// Device address.
    DevAddr,
    /// Network session key set (write-only).
    SessionKeys,
    /// Network identifier.
    NetworkId,
    /// Whether ADR is enabled.
    AdrEnable,
    /// RX1 default data-rate offset.
    Rx1DrOffsetDefault,
    /// RX1 current data-rate offset.
    Rx1DrOffset,
    /// RX2 default channel (frequency, data rate).
    Rx2ChannelDefault,
    /// RX2 current channel (frequency, data rate).
    Rx2Channel,
    /// Class C receive-window channel (frequency, data rate).
    RxCChannel,
    /// Whether this is a public network (affects the sync word).
    PublicNetwork,
    /// System maximum receive-window timing error, in milliseconds.
    SystemMaxRxError,
    /// Enabled-channel bitmask.
    ChannelMask,
    /// Current data rate.
    DataRate,
    /// Current TX power index.
    TxPower,
    /// Network activation type (none, ABP, OTAA).
    NetworkActivation,
    /// ABP activation version tag.
    AbpVersion,
}

/// A MIB parameter value, tagged by the [`MibId`] it belongs to.
#[derive(Debug, Clone)]
pub enum MibValue {
    /// See [`MibId::DeviceClass`].
    DeviceClass(OperatingMode),
    /// See [`MibId::DevEui`].
    DevEui([u8; 8]),
    /// See [`MibId::JoinEui`].
    JoinEui([u8; 8]),
    /// See [`MibId::DevAddr`].
    DevAddr(DevAddr),
    /// See [`MibId::SessionKeys`]. Write-only: never returned by `get`.
    SessionKeys {
        /// Network session key (1.0.x shape).
        nwk_skey: AESKey,
        /// Application session key.
        app_skey: AESKey,
    },
    /// See [`MibId::NetworkId`].
    NetworkId(u32),
    /// A boolean-valued parameter (ADR enable, public network).
    Bool(bool),
    /// A small integer parameter (DR offset, channel mask word, data rate, TX power).
    U32(u32),
    /// A (frequency Hz, data rate) channel pair.
    Channel {
        /// Channel centre frequency in Hz.
        frequency: u32,
        /// Data rate index.
        data_rate: u8,
    },
    /// See [`MibId::NetworkActivation`].
    NetworkActivation(NetworkActivation),
    /// See [`MibId::AbpVersion`].
    AbpVersion(AbpVersion),
}

/// Implemented by the component that owns the parameters a MIB request reads
/// or mutates (the `device` facade, delegating into the active MAC engine(s)).
pub trait MibHandler {
    /// Read a MIB parameter by id.
    fn mib_get(&self, id: MibId) -> Result<MibValue, StatusCode>;

    /// Write a MIB parameter. Returns `ParameterInvalid` if `value` does not
    /// match the shape `id` expects, or if the value itself is out of range.
    fn mib_set(&mut self, id: MibId, value: MibValue) -> Result<(), StatusCode>;
}
