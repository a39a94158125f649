//! Status codes and event-info values returned by the MAC engine's primitives
//! and delivered through its indication/confirm callbacks.

/// Result status for `MlmeRequest`/`McpsRequest` primitives and MIB access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// Operation succeeded.
    Ok,
    /// A request of this kind is already outstanding.
    Busy,
    /// The requested MIB id or service is not recognised.
    UnknownService,
    /// A MIB set or request parameter failed validation.
    ParameterInvalid,
    /// Requested frequency is outside the region's allowed range.
    FrequencyInvalid,
    /// Requested data rate is not supported by the region or channel.
    DatarateInvalid,
    /// No session is active; the device has not joined a network.
    NoNetworkJoined,
    /// Payload length exceeds what the current data rate allows.
    LengthError,
    /// The configured region is not supported by this build.
    RegionUnsupported,
    /// Application data was dropped because only MAC commands fit the frame.
    SkippedAppData,
    /// Transmission was denied by the duty-cycle budget and rescheduled.
    DutyCycleRestricted,
    /// No enabled channel matches the requested data rate.
    NoChannelFound,
    /// All channels are in their duty-cycle cooldown.
    NoFreeChannel,
    /// Uplink denied: it would land inside the beacon-reserved window.
    BusyBeaconReserved,
    /// Uplink denied: it would land inside an active ping slot.
    BusyPingSlot,
    /// Uplink denied: it would collide with a scheduled ping slot.
    BusyUplinkCollision,
    /// The secure element rejected or failed a cryptographic operation.
    CryptoError,
    /// Frame-counter validation rejected the frame (replay or excessive gap).
    FCntHandlerError,
    /// A MAC command could not be parsed, stored, or answered.
    MacCommandError,
    /// A Class B beacon or ping-slot operation failed.
    ClassBError,
    /// The confirm queue is full or the request kind is already tracked.
    ConfirmQueueError,
    /// The referenced multicast group has no context installed.
    MulticastGroupUndefined,
    /// Unclassified error.
    Error,
}

/// Event info delivered with `MlmeIndication`/`McpsIndication` callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventInfo {
    /// Operation succeeded.
    Ok,
    /// Unclassified error.
    Error,
    /// No radio activity observed before the TX deadline.
    TxTimeout,
    /// RX1 window closed without a valid preamble.
    Rx1Timeout,
    /// RX2 window closed without a valid preamble.
    Rx2Timeout,
    /// RX1 window detected a preamble but failed to decode a valid frame.
    Rx1Error,
    /// RX2 window detected a preamble but failed to decode a valid frame.
    Rx2Error,
    /// The join procedure exhausted its retry budget without a join-accept.
    JoinFail,
    /// A downlink frame counter repeats one already processed.
    DownlinkRepeated,
    /// The requested payload does not fit at the current data rate.
    TxDrPayloadSizeError,
    /// Consecutive downlinks were missed beyond the tolerated gap.
    DownlinkTooManyFramesLoss,
    /// A downlink's device address did not match any known session.
    AddressFail,
    /// A downlink failed MIC verification.
    MicFail,
    /// A multicast downlink failed validation or has no matching group.
    MulticastFail,
    /// The Class B beacon has been acquired and is being tracked.
    BeaconLocked,
    /// The Class B beacon was lost after being locked.
    BeaconLost,
    /// The Class B beacon could not be acquired.
    BeaconNotFound,
}
