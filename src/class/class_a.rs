//! LoRaWAN Class A device implementation
//!
//! Class A is the most basic device class, supporting bi-directional communication
//! where each uplink transmission is followed by two short receive windows.

use super::{DeviceClass, OperatingMode};
use crate::config::device::{EUI64, MacVersion, SessionState};
use crate::lorawan::mac::{DownlinkPayload, MacError, MacLayer, INDICATION_CAPACITY};
use crate::lorawan::region::Region;
use crate::radio::traits::Radio;
use crate::status::{EventInfo, StatusCode};
use crate::timer::Timer;
use heapless::Vec;

/// Class A device implementation
pub struct ClassA<R: Radio, REG: Region, TMR: Timer> {
    /// MAC layer
    mac: MacLayer<R, REG, TMR>,
}

impl<R: Radio, REG: Region, TMR: Timer> ClassA<R, REG, TMR> {
    /// Create new Class A device
    pub fn new(mac: MacLayer<R, REG, TMR>) -> Self {
        Self { mac }
    }

    /// Consume this class wrapper and recover the MAC layer, e.g. to switch
    /// operating mode.
    pub fn into_mac(self) -> MacLayer<R, REG, TMR> {
        self.mac
    }
}

impl<R: Radio, REG: Region, TMR: Timer> DeviceClass<R, REG, TMR> for ClassA<R, REG, TMR> {
    type Error = MacError<R::Error>;

    fn operating_mode(&self) -> OperatingMode {
        OperatingMode::ClassA
    }

    fn process(&mut self) -> Result<(), Self::Error> {
        // RX1/RX2 are already serviced synchronously inside send_data; idle
        // time only needs to drain confirm-queue completions.
        let _ = self.mac.process();
        Ok(())
    }

    fn send_data(&mut self, port: u8, data: &[u8], confirmed: bool) -> Result<StatusCode, Self::Error> {
        if confirmed {
            self.mac.mcps_confirmed(port, data)
        } else {
            self.mac.mcps_unconfirmed(port, data)
        }
    }

    fn send_join_request(
        &mut self,
        dev_eui: EUI64,
        app_eui: EUI64,
        app_key: [u8; 16],
        nwk_key: Option<[u8; 16]>,
        mac_version: MacVersion,
    ) -> Result<StatusCode, Self::Error> {
        self.mac.mlme_join(dev_eui, app_eui, app_key, nwk_key, mac_version)
    }

    fn take_downlink(&mut self) -> Option<DownlinkPayload> {
        self.mac.take_downlink()
    }

    fn take_indications(&mut self) -> Vec<EventInfo, INDICATION_CAPACITY> {
        self.mac.take_indications()
    }

    fn session_state(&self) -> &SessionState {
        self.mac.session()
    }

    fn mac_layer(&self) -> &MacLayer<R, REG, TMR> {
        &self.mac
    }
}
