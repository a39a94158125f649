//! Top-level LoRaWAN device facade.
//!
//! Owns exactly one of [`ClassA`]/[`ClassB`]/[`ClassC`] at a time (the radio
//! is exclusive, so only one can hold the `MacLayer` at once) and exposes the
//! MLME/MCPS-style request surface plus the [`MibHandler`] get/set interface
//! over it.

/// Battery/duty-cycle bookkeeping, kept separate from the MAC layer it has
/// no protocol dependency on.
pub mod power;

use crate::class::class_a::ClassA;
use crate::class::class_b::{ClassB, PingSlotConfig};
use crate::class::class_c::ClassC;
use crate::class::{DeviceClass, OperatingMode};
use crate::config::device::{DeviceConfig, NetworkActivation, SessionState};
use crate::config::mib::{MibHandler, MibId, MibValue};
use crate::lorawan::mac::{DownlinkPayload, MacError, MacLayer, INDICATION_CAPACITY};
use crate::lorawan::region::Region;
use crate::radio::Radio;
use crate::status::{EventInfo, StatusCode};
use crate::timer::{Clock, Timer};
use heapless::Vec;

/// Device-level error: either a MAC-layer failure, or a request made while
/// the requested class variant is not the one currently active.
#[derive(Debug)]
pub enum DeviceError<E> {
    /// MAC layer error.
    Mac(MacError<E>),
    /// No radio/session is available for the requested operation (should not
    /// occur in practice; the device always owns exactly one class variant).
    InvalidState,
}

impl<E> From<MacError<E>> for DeviceError<E> {
    fn from(error: MacError<E>) -> Self {
        DeviceError::Mac(error)
    }
}

enum Inner<'a, R: Radio, REG: Region, TMR: Timer, C: Clock> {
    A(ClassA<R, REG, TMR>),
    B(ClassB<'a, R, REG, TMR, C>),
    C(ClassC<R, REG, TMR>),
}

/// Ambient MIB-visible parameters this facade tracks directly rather than
/// delegating to the MAC layer (public-network flag, RX error budget, and so
/// on have no other owner in this crate).
struct MibState {
    adr_enable: bool,
    public_network: bool,
    system_max_rx_error_ms: u32,
    tx_power: u8,
}

impl Default for MibState {
    fn default() -> Self {
        Self {
            adr_enable: true,
            public_network: true,
            system_max_rx_error_ms: 20,
            tx_power: 0,
        }
    }
}

/// High-level LoRaWAN device: configuration, activation, send/receive, and
/// class-switching, built on top of [`MacLayer`].
pub struct LoRaWANDevice<'a, R: Radio, REG: Region, TMR: Timer, C: Clock> {
    config: DeviceConfig,
    clock: &'a C,
    ping_config: PingSlotConfig,
    mib: MibState,
    inner: Option<Inner<'a, R, REG, TMR, C>>,
}

impl<'a, R: Radio, REG: Region, TMR: Timer, C: Clock> LoRaWANDevice<'a, R, REG, TMR, C> {
    /// Build a device from its radio, region table, duty-cycle timer and
    /// configuration, starting in `mode`. `clock` is only consulted by class
    /// B; class A/C devices may pass any clock they have on hand.
    pub fn new(
        radio: R,
        region: REG,
        duty_cycle_timer: TMR,
        config: DeviceConfig,
        clock: &'a C,
        mode: OperatingMode,
    ) -> Self {
        let session = match (config.dev_addr, config.nwk_skey.clone(), config.app_skey.clone()) {
            (Some(addr), Some(nwk), Some(app)) => SessionState::new_abp(addr, nwk, app),
            _ => SessionState::new(),
        };
        let mac = MacLayer::new(radio, region, session, duty_cycle_timer);
        let ping_config = PingSlotConfig::default();
        let inner = Some(Self::wrap(mac, mode, clock, ping_config.clone()));
        Self {
            config,
            clock,
            ping_config,
            mib: MibState::default(),
            inner,
        }
    }

    fn wrap(
        mac: MacLayer<R, REG, TMR>,
        mode: OperatingMode,
        clock: &'a C,
        ping_config: PingSlotConfig,
    ) -> Inner<'a, R, REG, TMR, C> {
        match mode {
            OperatingMode::ClassA => Inner::A(ClassA::new(mac)),
            OperatingMode::ClassB => Inner::B(ClassB::new(mac, clock, ping_config)),
            OperatingMode::ClassC => Inner::C(ClassC::new(mac)),
        }
    }

    fn inner(&self) -> &Inner<'a, R, REG, TMR, C> {
        self.inner.as_ref().expect("inner class is always present between calls")
    }

    fn inner_mut(&mut self) -> &mut Inner<'a, R, REG, TMR, C> {
        self.inner.as_mut().expect("inner class is always present between calls")
    }

    /// Currently active device class.
    pub fn operating_mode(&self) -> OperatingMode {
        match self.inner() {
            Inner::A(a) => a.operating_mode(),
            Inner::B(b) => b.operating_mode(),
            Inner::C(c) => c.operating_mode(),
        }
    }

    /// Switch device class, carrying the existing session over via the
    /// underlying `MacLayer` (no re-join is performed).
    pub fn set_operating_mode(&mut self, mode: OperatingMode) {
        if self.operating_mode() == mode {
            return;
        }
        let mac = match self.inner.take().expect("inner class is always present between calls") {
            Inner::A(a) => a.into_mac(),
            Inner::B(b) => b.into_mac(),
            Inner::C(c) => c.into_mac(),
        };
        self.inner = Some(Self::wrap(mac, mode, self.clock, self.ping_config.clone()));
    }

    /// Drive the event loop: timers, radio IRQ drain, and (in class B)
    /// beacon/ping-slot tracking.
    pub fn process(&mut self) -> Result<(), DeviceError<R::Error>> {
        match self.inner_mut() {
            Inner::A(a) => a.process()?,
            Inner::B(b) => b.process()?,
            Inner::C(c) => c.process()?,
        }
        Ok(())
    }

    /// Send application data on `port`, confirmed or unconfirmed.
    pub fn send_data(
        &mut self,
        port: u8,
        data: &[u8],
        confirmed: bool,
    ) -> Result<StatusCode, DeviceError<R::Error>> {
        Ok(match self.inner_mut() {
            Inner::A(a) => a.send_data(port, data, confirmed)?,
            Inner::B(b) => b.send_data(port, data, confirmed)?,
            Inner::C(c) => c.send_data(port, data, confirmed)?,
        })
    }

    /// Begin an OTAA join using the device/app EUIs and keys supplied at
    /// construction.
    pub fn join(&mut self) -> Result<StatusCode, DeviceError<R::Error>> {
        let dev_eui = self.config.dev_eui;
        let app_eui = self.config.app_eui;
        let app_key = *self.config.app_key.as_bytes();
        let nwk_key = self.config.nwk_key.as_ref().map(|k| *k.as_bytes());
        let mac_version = self.config.mac_version;
        Ok(match self.inner_mut() {
            Inner::A(a) => a.send_join_request(dev_eui, app_eui, app_key, nwk_key, mac_version)?,
            Inner::B(b) => b.send_join_request(dev_eui, app_eui, app_key, nwk_key, mac_version)?,
            Inner::C(c) => c.send_join_request(dev_eui, app_eui, app_key, nwk_key, mac_version)?,
        })
    }

    /// Take the most recently received downlink's application payload, if any.
    pub fn take_downlink(&mut self) -> Option<DownlinkPayload> {
        match self.inner_mut() {
            Inner::A(a) => a.take_downlink(),
            Inner::B(b) => b.take_downlink(),
            Inner::C(c) => c.take_downlink(),
        }
    }

    /// Drain the queue of asynchronous fault/event indications (MIC failure,
    /// address mismatch, frame-counter rejection, beacon state changes, ...)
    /// raised since the last call.
    pub fn take_indications(&mut self) -> Vec<EventInfo, INDICATION_CAPACITY> {
        match self.inner_mut() {
            Inner::A(a) => a.take_indications(),
            Inner::B(b) => b.take_indications(),
            Inner::C(c) => c.take_indications(),
        }
    }

    /// Current session state (device address, keys, counters, negotiated
    /// radio parameters).
    pub fn session_state(&self) -> &SessionState {
        match self.inner() {
            Inner::A(a) => a.session_state(),
            Inner::B(b) => b.session_state(),
            Inner::C(c) => c.session_state(),
        }
    }

    /// Whether a session is active (joined via OTAA or provisioned via ABP).
    pub fn is_joined(&self) -> bool {
        self.session_state().is_joined()
    }

    fn network_activation(&self) -> NetworkActivation {
        match self.inner() {
            Inner::A(a) => a.mac_layer().network_activation(),
            Inner::B(b) => b.mac_layer().network_activation(),
            Inner::C(c) => c.mac_layer().network_activation(),
        }
    }
}

impl<'a, R: Radio, REG: Region, TMR: Timer, C: Clock> MibHandler for LoRaWANDevice<'a, R, REG, TMR, C> {
    fn mib_get(&self, id: MibId) -> Result<MibValue, StatusCode> {
        let session = self.session_state();
        Ok(match id {
            MibId::DeviceClass => MibValue::DeviceClass(self.operating_mode()),
            MibId::DevEui => MibValue::DevEui(self.config.dev_eui),
            MibId::JoinEui => MibValue::JoinEui(self.config.app_eui),
            MibId::DevAddr => MibValue::DevAddr(session.dev_addr),
            MibId::SessionKeys => return Err(StatusCode::ParameterInvalid),
            MibId::NetworkId => return Err(StatusCode::UnknownService),
            MibId::AdrEnable => MibValue::Bool(self.mib.adr_enable),
            MibId::Rx1DrOffsetDefault | MibId::Rx1DrOffset => {
                MibValue::U32(session.rx1_dr_offset as u32)
            }
            MibId::Rx2ChannelDefault | MibId::Rx2Channel | MibId::RxCChannel => MibValue::Channel {
                frequency: session.rx2_frequency,
                data_rate: session.rx2_data_rate,
            },
            MibId::PublicNetwork => MibValue::Bool(self.mib.public_network),
            MibId::SystemMaxRxError => MibValue::U32(self.mib.system_max_rx_error_ms),
            MibId::ChannelMask => return Err(StatusCode::UnknownService),
            MibId::DataRate => MibValue::U32(session.rx2_data_rate as u32),
            MibId::TxPower => MibValue::U32(self.mib.tx_power as u32),
            MibId::NetworkActivation => MibValue::NetworkActivation(self.network_activation()),
            MibId::AbpVersion => match self.config.abp_version {
                Some(v) => MibValue::AbpVersion(v),
                None => return Err(StatusCode::UnknownService),
            },
        })
    }

    fn mib_set(&mut self, id: MibId, value: MibValue) -> Result<(), StatusCode> {
        match (id, value) {
            (MibId::DeviceClass, MibValue::DeviceClass(mode)) => self.set_operating_mode(mode),
            (MibId::DevAddr, MibValue::DevAddr(_addr)) => {
                // Device address is set only as part of join/ABP session setup.
                return Err(StatusCode::ParameterInvalid);
            }
            (MibId::AdrEnable, MibValue::Bool(v)) => self.mib.adr_enable = v,
            (MibId::PublicNetwork, MibValue::Bool(v)) => self.mib.public_network = v,
            (MibId::SystemMaxRxError, MibValue::U32(v)) => self.mib.system_max_rx_error_ms = v,
            (MibId::TxPower, MibValue::U32(v)) => self.mib.tx_power = v as u8,
            (MibId::NetworkActivation, MibValue::NetworkActivation(_)) => {
                // Read-only: activation follows from a completed join/ABP setup.
                return Err(StatusCode::ParameterInvalid);
            }
            _ => return Err(StatusCode::ParameterInvalid),
        }
        Ok(())
    }
}
