//! LoRaWAN Class B device: beacon-synchronized scheduled receive slots
//! layered on top of the class-A request/response exchange.
//!
//! - Beacon synchronization and tracking ([`beacon`])
//! - Ping slot timing and AES-keyed randomization ([`ping_slot`])
//! - GPS/network time conversions ([`timing`])

mod beacon;
mod ping_slot;
mod timing;

pub use beacon::{BeaconState, BeaconTracker, BEACON_GUARD_MS, BEACON_PERIOD_MS, BEACON_RESERVED_MS};
pub use ping_slot::{PingSlotConfig, PingSlotScheduler, PING_SLOT_WINDOW_MS};
pub use timing::{gps_to_network_time, network_to_gps_time};

use heapless::Vec;

use crate::class::{DeviceClass, OperatingMode};
use crate::config::device::{EUI64, MacVersion, SessionState};
use crate::lorawan::mac::{DownlinkPayload, MacError, MacLayer, INDICATION_CAPACITY};
use crate::lorawan::region::{time_on_air_ms, Region};
use crate::radio::traits::Radio;
use crate::status::{EventInfo, StatusCode};
use crate::timer::{Clock, Timer};

/// MAC header + FHDR + port + MIC overhead assumed when estimating an
/// uplink's time-on-air for collision avoidance, ahead of the payload
/// actually being built.
const MAC_OVERHEAD_BYTES: usize = 13;

/// A class-B device: tracks the network beacon and services its own ping
/// slots between ordinary class-A uplinks, falling back to pure class-A
/// behavior whenever the beacon is unlocked.
pub struct ClassB<'a, R: Radio, REG: Region, TMR: Timer, C: Clock> {
    mac: MacLayer<R, REG, TMR>,
    clock: &'a C,
    beacon: BeaconTracker,
    ping_config: PingSlotConfig,
    ping_scheduler: PingSlotScheduler,
    period_start_ms: Option<u64>,
    rx_buf: [u8; 255],
}

impl<'a, R: Radio, REG: Region, TMR: Timer, C: Clock> ClassB<'a, R, REG, TMR, C> {
    /// Wrap an existing MAC layer for class-B operation, reading time from
    /// `clock`.
    pub fn new(mac: MacLayer<R, REG, TMR>, clock: &'a C, ping_config: PingSlotConfig) -> Self {
        Self {
            mac,
            clock,
            beacon: BeaconTracker::new(),
            ping_config,
            ping_scheduler: PingSlotScheduler::new(),
            period_start_ms: None,
            rx_buf: [0u8; 255],
        }
    }

    /// Unwrap back to a plain MAC layer, e.g. to hand off to a class-A
    /// wrapper when beacon tracking is abandoned for good.
    pub fn into_mac(self) -> MacLayer<R, REG, TMR> {
        self.mac
    }

    /// Start (or restart) blind beacon acquisition.
    pub fn start_acquisition(&mut self) {
        self.period_start_ms = None;
        self.beacon.start_acquisition();
    }

    /// Start acquisition anchored to a prior time reference (from
    /// `DeviceTimeAns`/`BeaconTimingAns`).
    pub fn start_acquisition_by_time(&mut self, time_reference_ms: u64) {
        self.period_start_ms = None;
        self.beacon.start_acquisition_by_time(time_reference_ms);
    }

    /// Current beacon-tracking state.
    pub fn beacon_state(&self) -> BeaconState {
        self.beacon.state()
    }

    /// Reconfigure ping-slot periodicity; takes effect on the next beacon
    /// lock.
    pub fn set_ping_periodicity(&mut self, periodicity: u8) {
        self.ping_config.set_periodicity(periodicity);
        self.ping_scheduler = PingSlotScheduler::new();
    }

    fn process_class_b(&mut self, now_ms: u64) -> Result<(), MacError<R::Error>> {
        let was_locked = self.beacon.is_locked();
        self.beacon.process(&mut self.mac, now_ms, &mut self.rx_buf)?;

        if !self.beacon.is_locked() {
            self.period_start_ms = None;
            return Ok(());
        }

        let period_start = match (was_locked, self.period_start_ms) {
            (true, Some(start)) => start,
            _ => {
                let last = self.beacon.last_beacon_rx().unwrap_or(now_ms);
                self.period_start_ms = Some(last);
                self.ping_scheduler.update_schedule(
                    &self.ping_config,
                    self.mac.nwk_s_enc_key(),
                    self.mac.dev_addr(),
                    last as u32,
                );
                for (group_id, slot) in self.mac.session().mc_groups.iter().enumerate() {
                    if let Some(ctx) = slot {
                        self.ping_scheduler.update_mc_schedule(
                            group_id as u8,
                            &self.ping_config,
                            &ctx.mc_nwk_s_key,
                            ctx.mc_addr,
                            last as u32,
                        );
                    }
                }
                last
            }
        };

        let elapsed = (now_ms.saturating_sub(period_start)) as u32;
        if elapsed >= BEACON_PERIOD_MS {
            // Rolled into the next period; reschedule on the tracker's next
            // successful lock rather than here, to stay keyed off the
            // tracker's own phase.
            self.period_start_ms = None;
            return Ok(());
        }

        if self
            .ping_scheduler
            .current_slot(elapsed, PING_SLOT_WINDOW_MS)
            .is_some()
        {
            let frequency = if self.ping_config.frequency() != 0 {
                self.ping_config.frequency()
            } else {
                self.mac.rx2_frequency()
            };
            self.mac.receive_ping_slot(
                frequency,
                crate::lorawan::region::DataRate::from_index(self.ping_config.data_rate()),
                PING_SLOT_WINDOW_MS,
                &mut self.rx_buf,
            )?;
        }

        Ok(())
    }

    /// Check whether transmitting a `payload_len`-byte uplink right now would
    /// land inside the beacon-reserved window or a scheduled ping slot
    /// (unicast or multicast). Returns `None` when it is clear to send, or
    /// the specific busy status a delayed retry would resolve.
    ///
    /// Uses the approximate frame length (`payload_len` plus MAC overhead)
    /// rather than the final encoded frame, since the collision check runs
    /// before the frame is built.
    fn check_uplink_collision(&self, payload_len: usize) -> Option<StatusCode> {
        let period_start = self.period_start_ms?;
        let now_ms = self.clock.now_ms();
        let elapsed = now_ms.saturating_sub(period_start) as u32;
        if elapsed >= BEACON_PERIOD_MS {
            return None;
        }

        let time_on_air = time_on_air_ms(self.mac.data_rate(), payload_len + MAC_OVERHEAD_BYTES);
        let delay = self
            .ping_scheduler
            .uplink_collision_delay(elapsed, time_on_air, PING_SLOT_WINDOW_MS);
        if delay == 0 {
            return None;
        }

        if elapsed < BEACON_RESERVED_MS {
            Some(StatusCode::BusyBeaconReserved)
        } else if self.ping_scheduler.current_slot(elapsed, PING_SLOT_WINDOW_MS).is_some() {
            Some(StatusCode::BusyPingSlot)
        } else {
            Some(StatusCode::BusyUplinkCollision)
        }
    }
}

impl<'a, R: Radio, REG: Region, TMR: Timer, C: Clock> DeviceClass<R, REG, TMR>
    for ClassB<'a, R, REG, TMR, C>
{
    type Error = MacError<R::Error>;

    fn operating_mode(&self) -> OperatingMode {
        OperatingMode::ClassB
    }

    fn process(&mut self) -> Result<(), Self::Error> {
        let now_ms = self.clock.now_ms();
        self.beacon.halt();
        let _ = self.mac.process();
        self.beacon.resume(now_ms);
        self.process_class_b(now_ms)
    }

    fn send_data(&mut self, port: u8, data: &[u8], confirmed: bool) -> Result<StatusCode, Self::Error> {
        if let Some(status) = self.check_uplink_collision(data.len()) {
            return Ok(status);
        }
        self.beacon.halt();
        let result = if confirmed {
            self.mac.mcps_confirmed(port, data)
        } else {
            self.mac.mcps_unconfirmed(port, data)
        };
        self.beacon.resume(self.clock.now_ms());
        result
    }

    fn send_join_request(
        &mut self,
        dev_eui: EUI64,
        app_eui: EUI64,
        app_key: [u8; 16],
        nwk_key: Option<[u8; 16]>,
        mac_version: MacVersion,
    ) -> Result<StatusCode, Self::Error> {
        self.beacon.halt();
        let result = self.mac.mlme_join(dev_eui, app_eui, app_key, nwk_key, mac_version);
        self.beacon.resume(self.clock.now_ms());
        result
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
