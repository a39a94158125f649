//! Device configuration and session state
//!
//! This module provides the types used to configure a LoRaWAN device and to
//! track its per-session cryptographic and protocol state: device address,
//! named key handles, frame counters, and the negotiated radio parameters
//! ADR/MAC-command exchange is allowed to mutate.

/// Number of independent multicast groups the device can track.
pub const MAX_MULTICAST_GROUPS: usize = 4;

/// Sentinel frame-counter value meaning "never received".
pub const FCNT_NONE: u32 = 0xFFFF_FFFF;

/// Device address (4 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DevAddr {
    bytes: [u8; 4],
}

impl DevAddr {
    /// Create a new device address from raw bytes
    pub fn new(bytes: [u8; 4]) -> Self {
        Self { bytes }
    }

    /// Get the raw bytes of the device address
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.bytes
    }

    /// Device address as a little-endian `u32`, as it appears on the wire.
    pub fn as_u32(&self) -> u32 {
        u32::from_le_bytes(self.bytes)
    }
}

impl From<u32> for DevAddr {
    fn from(v: u32) -> Self {
        Self {
            bytes: v.to_le_bytes(),
        }
    }
}

/// AES-128 key (16 bytes). Stands in for an opaque secure-element key handle:
/// nothing outside [`crate::crypto`] reads these bytes directly.
#[derive(Clone, PartialEq, Eq)]
pub struct AESKey {
    bytes: [u8; 16],
}

impl AESKey {
    /// Create a new AES key from raw bytes
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self { bytes }
    }

    /// Get the raw bytes of the key
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.bytes
    }
}

impl core::fmt::Debug for AESKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("AESKey(..)")
    }
}

/// 64-bit Extended Unique Identifier (EUI)
pub type EUI64 = [u8; 8];

/// LoRaWAN MAC version, selecting the key-derivation and MIC scheme C2 uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacVersion {
    /// LoRaWAN 1.0.x: single network session key, single-CMAC MIC.
    V1_0_x,
    /// LoRaWAN 1.1: split network session keys, dual-CMAC MIC.
    V1_1,
}

impl Default for MacVersion {
    fn default() -> Self {
        MacVersion::V1_0_x
    }
}

/// ABP activation version tag, reported through the MIB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbpVersion {
    /// Major version component.
    pub major: u8,
    /// Minor version component.
    pub minor: u8,
    /// Patch version component.
    pub patch: u8,
}

impl AbpVersion {
    /// Construct an ABP version tag.
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

/// How the device was activated onto the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkActivation {
    /// Not yet activated.
    None,
    /// Activation by personalisation: keys and address are pre-provisioned.
    Abp,
    /// Over-the-air activation: keys and address are derived from a join-accept.
    Otaa,
}

/// Frame-counter identifier (six independent 32-bit counters).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FCntId {
    /// Uplink counter.
    Uplink,
    /// Network downlink counter (FPort 0, or 1.1 network-side FOpts).
    NetworkDown,
    /// Application downlink counter (FPort > 0 under 1.1).
    AppDown,
    /// A multicast group's downlink counter, indexed 0..MAX_MULTICAST_GROUPS.
    MulticastDown(u8),
}

/// The independent frame counters tracked by a session.
#[derive(Debug, Clone)]
pub struct FrameCounters {
    up: u32,
    nwk_down: u32,
    app_down: u32,
    mc_down: [u32; MAX_MULTICAST_GROUPS],
}

impl FrameCounters {
    /// A fresh counter set: uplink starts at zero, downlinks at the "never
    /// received" sentinel so the first downlink of any kind is always accepted.
    pub fn new() -> Self {
        Self {
            up: 0,
            nwk_down: FCNT_NONE,
            app_down: FCNT_NONE,
            mc_down: [FCNT_NONE; MAX_MULTICAST_GROUPS],
        }
    }

    /// Read a counter by identifier.
    pub fn get(&self, id: FCntId) -> u32 {
        match id {
            FCntId::Uplink => self.up,
            FCntId::NetworkDown => self.nwk_down,
            FCntId::AppDown => self.app_down,
            FCntId::MulticastDown(i) => self.mc_down[i as usize % MAX_MULTICAST_GROUPS],
        }
    }

    /// Overwrite a counter by identifier (used after NVM restore or a validated downlink).
    pub fn set(&mut self, id: FCntId, value: u32) {
        match id {
            FCntId::Uplink => self.up = value,
            FCntId::NetworkDown => self.nwk_down = value,
            FCntId::AppDown => self.app_down = value,
            FCntId::MulticastDown(i) => self.mc_down[i as usize % MAX_MULTICAST_GROUPS] = value,
        }
    }

    /// Increment the uplink counter. Called once per accepted send request,
    /// not once per retransmission attempt.
    pub fn increment_uplink(&mut self) {
        self.up = self.up.wrapping_add(1);
    }
}

impl Default for FrameCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// The session keys negotiated (OTAA) or provisioned (ABP) for a device.
///
/// Under 1.0.x `f_nwk_s_int_key`, `s_nwk_s_int_key` and `nwk_s_enc_key` are all
/// the same material (the legacy single `NwkSKey`); under 1.1 they are derived
/// independently. Callers that only care about the 1.0.x shape can use
/// [`KeySet::nwk_s_key_1_0`].
#[derive(Debug, Clone)]
pub struct KeySet {
    /// Forwarding/uplink network session integrity key.
    pub f_nwk_s_int_key: AESKey,
    /// Serving network session integrity key (1.1 only; equals `f_nwk_s_int_key` under 1.0.x).
    pub s_nwk_s_int_key: AESKey,
    /// Network session encryption key (protects FPort 0 payloads).
    pub nwk_s_enc_key: AESKey,
    /// Application session key (protects FPort > 0 payloads).
    pub app_s_key: AESKey,
}

impl KeySet {
    /// Build a key set from the legacy 1.0.x single network session key.
    pub fn from_1_0_x(nwk_skey: AESKey, app_skey: AESKey) -> Self {
        Self {
            f_nwk_s_int_key: nwk_skey.clone(),
            s_nwk_s_int_key: nwk_skey.clone(),
            nwk_s_enc_key: nwk_skey,
            app_s_key: app_skey,
        }
    }

    /// The 1.0.x view of the network session key: valid whenever all three
    /// network-side keys coincide, which `from_1_0_x` guarantees.
    pub fn nwk_s_key_1_0(&self) -> &AESKey {
        &self.f_nwk_s_int_key
    }
}

/// Device configuration supplied at startup.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Device EUI (unique device identifier)
    pub dev_eui: EUI64,
    /// Join EUI / Application EUI (unique application identifier)
    pub app_eui: EUI64,
    /// Application root key
    pub app_key: AESKey,
    /// Network root key (1.1 only; unused under 1.0.x)
    pub nwk_key: Option<AESKey>,
    /// Legacy multicast root key (pre-1.1 `McRootKey` derivation)
    pub gen_app_key: Option<AESKey>,
    /// MAC version selecting the key-derivation and MIC scheme
    pub mac_version: MacVersion,
    /// Device address (assigned during activation)
    pub dev_addr: Option<DevAddr>,
    /// Network session key (ABP only, legacy 1.0.x shape)
    pub nwk_skey: Option<AESKey>,
    /// Application session key (ABP only)
    pub app_skey: Option<AESKey>,
    /// ABP activation version tag, reported through the MIB
    pub abp_version: Option<AbpVersion>,
}

impl DeviceConfig {
    /// Create a new device configuration for OTAA activation
    pub fn new_otaa(dev_eui: EUI64, app_eui: EUI64, app_key: [u8; 16]) -> Self {
        Self {
            dev_eui,
            app_eui,
            app_key: AESKey::new(app_key),
            nwk_key: None,
            gen_app_key: None,
            mac_version: MacVersion::V1_0_x,
            dev_addr: None,
            nwk_skey: None,
            app_skey: None,
            abp_version: None,
        }
    }

    /// Create a new device configuration for ABP activation
    pub fn new_abp(
        dev_eui: EUI64,
        app_eui: EUI64,
        dev_addr: DevAddr,
        nwk_skey: AESKey,
        app_skey: AESKey,
    ) -> Self {
        Self {
            dev_eui,
            app_eui,
            app_key: AESKey::new([0; 16]), // not used in ABP
            nwk_key: None,
            gen_app_key: None,
            mac_version: MacVersion::V1_0_x,
            dev_addr: Some(dev_addr),
            nwk_skey: Some(nwk_skey),
            app_skey: Some(app_skey),
            abp_version: Some(AbpVersion::new(1, 0, 4)),
        }
    }

    /// Select the LoRaWAN MAC version (builder style).
    pub fn with_mac_version(mut self, version: MacVersion) -> Self {
        self.mac_version = version;
        self
    }

    /// Attach the 1.1 network root key (builder style).
    pub fn with_nwk_key(mut self, nwk_key: [u8; 16]) -> Self {
        self.nwk_key = Some(AESKey::new(nwk_key));
        self
    }
}

/// A single multicast group's session context.
#[derive(Debug, Clone)]
pub struct McGroupContext {
    /// Multicast group address.
    pub mc_addr: DevAddr,
    /// Multicast application session key.
    pub mc_app_s_key: AESKey,
    /// Multicast network session key.
    pub mc_nwk_s_key: AESKey,
}

/// Session state: device address, keys, frame counters, and negotiated radio
/// parameters. Lives from join (or ABP provisioning) through the non-volatile
/// store until a new join replaces it.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Device address
    pub dev_addr: DevAddr,
    /// Session keys
    pub keys: KeySet,
    /// Frame counters
    pub counters: FrameCounters,
    /// MAC version this session was established under
    pub mac_version: MacVersion,
    /// RX1 data-rate offset negotiated via RXParamSetupReq
    pub rx1_dr_offset: u8,
    /// RX2 data rate negotiated via RXParamSetupReq
    pub rx2_data_rate: u8,
    /// RX2 frequency negotiated via RXParamSetupReq
    pub rx2_frequency: u32,
    /// Maximum aggregate duty cycle (1 / 2^n), negotiated via DutyCycleReq
    pub max_duty_cycle: u8,
    /// Number of transmissions per confirmed uplink, negotiated via LinkADRReq
    pub nb_trans: u8,
    /// Installed multicast group session contexts, indexed by group id.
    pub mc_groups: [Option<McGroupContext>; MAX_MULTICAST_GROUPS],
}

impl SessionState {
    /// Create a new empty session state with default values
    pub fn new() -> Self {
        Self {
            dev_addr: DevAddr::new([0; 4]),
            keys: KeySet::from_1_0_x(AESKey::new([0; 16]), AESKey::new([0; 16])),
            counters: FrameCounters::new(),
            mac_version: MacVersion::V1_0_x,
            rx1_dr_offset: 0,
            rx2_data_rate: 8,
            rx2_frequency: 923_300_000,
            max_duty_cycle: 0,
            nb_trans: 1,
            mc_groups: core::array::from_fn(|_| None),
        }
    }

    /// Create a new session state for ABP activation
    pub fn new_abp(dev_addr: DevAddr, nwk_skey: AESKey, app_skey: AESKey) -> Self {
        Self {
            dev_addr,
            keys: KeySet::from_1_0_x(nwk_skey, app_skey),
            ..Self::new()
        }
    }

    /// Create a new session state from an OTAA join-accept.
    pub fn from_join_accept(
        dev_addr: DevAddr,
        keys: KeySet,
        mac_version: MacVersion,
        rx1_dr_offset: u8,
        rx2_data_rate: u8,
    ) -> Self {
        Self {
            dev_addr,
            keys,
            counters: FrameCounters::new(),
            mac_version,
            rx1_dr_offset,
            rx2_data_rate,
            rx2_frequency: 923_300_000,
            max_duty_cycle: 0,
            nb_trans: 1,
            mc_groups: core::array::from_fn(|_| None),
        }
    }

    /// Install or replace a multicast group's session context at `group_id`
    /// (0..MAX_MULTICAST_GROUPS), resetting its downlink counter so a group
    /// reused for a different session does not inherit a stale counter.
    pub fn install_mc_group(&mut self, group_id: u8, context: McGroupContext) -> bool {
        let idx = group_id as usize;
        if idx >= MAX_MULTICAST_GROUPS {
            return false;
        }
        self.mc_groups[idx] = Some(context);
        self.counters.set(FCntId::MulticastDown(group_id), FCNT_NONE);
        true
    }

    /// Find the installed multicast group (if any) whose address matches
    /// `addr`, returning its group id alongside the context.
    pub fn find_mc_group(&self, addr: DevAddr) -> Option<(u8, &McGroupContext)> {
        self.mc_groups.iter().enumerate().find_map(|(i, slot)| {
            slot.as_ref()
                .filter(|ctx| ctx.mc_addr == addr)
                .map(|ctx| (i as u8, ctx))
        })
    }

    /// Network session key under the 1.0.x key shape (convenience accessor).
    pub fn nwk_skey(&self) -> &AESKey {
        self.keys.nwk_s_key_1_0()
    }

    /// Application session key.
    pub fn app_skey(&self) -> &AESKey {
        &self.keys.app_s_key
    }

    /// Reset frame counters (used only when explicitly re-provisioning).
    pub fn reset_counters(&mut self) {
        self.counters = FrameCounters::new();
    }

    /// Check if the session has a non-zero device address, i.e. is joined.
    pub fn is_joined(&self) -> bool {
        self.dev_addr.as_bytes().iter().any(|&b| b != 0)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
