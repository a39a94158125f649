//! LoRaWAN Class C device implementation
//!
//! Class C devices extend Class A by keeping the RX2 window open continuously
//! when not transmitting. This allows for minimal downlink latency at the cost
//! of increased power consumption.

use super::{DeviceClass, OperatingMode};
use crate::config::device::{EUI64, MacVersion, SessionState};
use crate::lorawan::mac::{DownlinkPayload, MacError, MacLayer, INDICATION_CAPACITY};
use crate::lorawan::region::Region;
use crate::radio::traits::Radio;
use crate::status::{EventInfo, StatusCode};
use crate::timer::Timer;
use heapless::Vec;

/// Class C device implementation
pub struct ClassC<R: Radio, REG: Region, TMR: Timer> {
    /// MAC layer
    mac: MacLayer<R, REG, TMR>,
    /// Scratch buffer for the continuous RX2 window
    rx_buf: [u8; 255],
}

impl<R: Radio, REG: Region, TMR: Timer> ClassC<R, REG, TMR> {
    /// Create new Class C device
    pub fn new(mac: MacLayer<R, REG, TMR>) -> Self {
        Self {
            mac,
            rx_buf: [0u8; 255],
        }
    }

    /// Consume this class wrapper and recover the MAC layer, e.g. to switch
    /// operating mode.
    pub fn into_mac(self) -> MacLayer<R, REG, TMR> {
        self.mac
    }
}

impl<R: Radio, REG: Region, TMR: Timer> DeviceClass<R, REG, TMR> for ClassC<R, REG, TMR> {
    type Error = MacError<R::Error>;

    fn operating_mode(&self) -> OperatingMode {
        OperatingMode::ClassC
    }

    fn process(&mut self) -> Result<(), Self::Error> {
        self.mac.listen_class_c(&mut self.rx_buf)?;
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
