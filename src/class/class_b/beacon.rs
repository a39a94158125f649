//! Class B beacon acquisition and tracking.
//!
//! States follow the network beacon's lifecycle: a device starts blind
//! (`Acquisition`) or anchored to a time reference from `DeviceTimeAns`/
//! `BeaconTimingAns` (`AcquisitionByTime`), locks on first valid beacon,
//! and from there tracks one window per 128 s period, widening its search
//! window on consecutive misses before giving up and falling back to class A.

use crate::lorawan::mac::{MacError, MacLayer};
use crate::lorawan::region::Region;
use crate::radio::traits::Radio;
use crate::timer::Timer;

/// Beacon period.
pub const BEACON_PERIOD_MS: u32 = 128_000;

/// Beacon frame's reserved time at the start of each beacon period.
pub const BEACON_RESERVED_MS: u32 = 2_120;

/// Guard time bracketing the expected beacon window.
pub const BEACON_GUARD_MS: u32 = 3_000;

const BASE_SYMBOL_TIMEOUT_MS: u32 = 100;
const MAX_SYMBOL_TIMEOUT_MS: u32 = BEACON_GUARD_MS;
const MAX_BEACON_MISSED: u8 = 3;
const BEACON_SIZE: usize = 17;

/// Class-B beacon state machine (C6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeaconState {
    /// Not tracking beacons.
    Idle,
    /// Blind scan across a full beacon period.
    Acquisition,
    /// Scan anchored to a `DeviceTimeAns`/`BeaconTimingAns` reference.
    AcquisitionByTime,
    /// An acquisition scan's window elapsed without a beacon.
    Timeout,
    /// A single expected beacon was missed while locked.
    BeaconMissed,
    /// Widened-window retry after one or more missed beacons.
    Reacquisition,
    /// Beacon phase is known and being tracked successfully.
    Locked,
    /// Tracking suspended so the radio can service a class-A exchange.
    Halt,
    /// Waiting for the next scheduled window to open.
    Guard,
    /// Actively listening for the expected beacon.
    Rx,
    /// Beacon lost after exhausting reacquisition attempts; falls back to class A.
    Lost,
}

/// Tracks beacon phase and drives the acquisition/reacquisition state machine.
#[derive(Debug)]
pub struct BeaconTracker {
    state: BeaconState,
    pre_halt_state: BeaconState,
    last_beacon_rx_ms: Option<u64>,
    missed: u8,
    symbol_timeout_ms: u32,
    time_reference_ms: Option<u64>,
}

impl BeaconTracker {
    /// Create a tracker with no beacon lock.
    pub fn new() -> Self {
        Self {
            state: BeaconState::Idle,
            pre_halt_state: BeaconState::Idle,
            last_beacon_rx_ms: None,
            missed: 0,
            symbol_timeout_ms: BASE_SYMBOL_TIMEOUT_MS,
            time_reference_ms: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> BeaconState {
        self.state
    }

    /// Whether the beacon phase is currently locked.
    pub fn is_locked(&self) -> bool {
        matches!(self.state, BeaconState::Locked | BeaconState::Guard | BeaconState::Rx)
    }

    /// Monotonic time of the last accepted beacon, if any.
    pub fn last_beacon_rx(&self) -> Option<u64> {
        self.last_beacon_rx_ms
    }

    /// Expected time of the next beacon, exactly one period after the last.
    pub fn next_beacon_rx(&self) -> Option<u64> {
        self.last_beacon_rx_ms.map(|t| t + BEACON_PERIOD_MS as u64)
    }

    /// Start a blind scan across the full beacon period.
    pub fn start_acquisition(&mut self) {
        self.missed = 0;
        self.symbol_timeout_ms = BASE_SYMBOL_TIMEOUT_MS;
        self.state = BeaconState::Acquisition;
    }

    /// Start acquisition anchored to a `DeviceTimeAns`/`BeaconTimingAns`
    /// reference (a prior estimate of the next beacon's arrival time).
    pub fn start_acquisition_by_time(&mut self, time_reference_ms: u64) {
        self.time_reference_ms = Some(time_reference_ms);
        self.missed = 0;
        self.symbol_timeout_ms = BASE_SYMBOL_TIMEOUT_MS;
        self.state = BeaconState::AcquisitionByTime;
    }

    /// Suspend beacon tracking so the radio can be used for a class-A
    /// exchange; the current state is remembered for `resume`.
    pub fn halt(&mut self) {
        if self.state != BeaconState::Halt {
            self.pre_halt_state = self.state;
            self.state = BeaconState::Halt;
        }
    }

    /// Resume after `halt`, re-entering at the phase implied by elapsed time.
    pub fn resume(&mut self, now_ms: u64) {
        self.state = match (self.pre_halt_state, self.last_beacon_rx_ms) {
            (BeaconState::Locked | BeaconState::Guard | BeaconState::Rx, Some(last)) => {
                let phase = now_ms.saturating_sub(last) % BEACON_PERIOD_MS as u64;
                if phase + (BEACON_GUARD_MS as u64) >= BEACON_PERIOD_MS as u64 {
                    BeaconState::Guard
                } else {
                    BeaconState::Locked
                }
            }
            (other, _) => other,
        };
    }

    /// Run one step of the tracker. `buf` is scratch space for the 17-byte
    /// beacon frame.
    pub fn process<R, REG, TMR>(
        &mut self,
        mac: &mut MacLayer<R, REG, TMR>,
        now_ms: u64,
        buf: &mut [u8],
    ) -> Result<(), MacError<R::Error>>
    where
        R: Radio,
        REG: Region,
        TMR: Timer,
    {
        match self.state {
            BeaconState::Idle | BeaconState::Halt | BeaconState::Lost => Ok(()),
            BeaconState::Acquisition => self.scan(mac, buf, BEACON_PERIOD_MS, now_ms),
            BeaconState::AcquisitionByTime => self.scan_by_time(mac, now_ms, buf),
            BeaconState::Timeout => {
                self.state = BeaconState::Acquisition;
                Ok(())
            }
            BeaconState::Guard => {
                if let Some(last) = self.last_beacon_rx_ms {
                    let elapsed = now_ms.saturating_sub(last) % BEACON_PERIOD_MS as u64;
                    if elapsed + self.symbol_timeout_ms as u64 >= BEACON_PERIOD_MS as u64 {
                        self.state = BeaconState::Rx;
                    }
                }
                Ok(())
            }
            BeaconState::Rx | BeaconState::Locked | BeaconState::Reacquisition => self.track(mac, buf),
            BeaconState::BeaconMissed => {
                self.missed += 1;
                self.symbol_timeout_ms = (self.symbol_timeout_ms * 2).min(MAX_SYMBOL_TIMEOUT_MS);
                self.state = if self.missed >= MAX_BEACON_MISSED {
                    BeaconState::Lost
                } else {
                    BeaconState::Reacquisition
                };
                Ok(())
            }
        }
    }

    fn scan<R, REG, TMR>(
        &mut self,
        mac: &mut MacLayer<R, REG, TMR>,
        buf: &mut [u8],
        window_ms: u32,
        now_ms: u64,
    ) -> Result<(), MacError<R::Error>>
    where
        R: Radio,
        REG: Region,
        TMR: Timer,
    {
        let channel = mac.next_beacon_channel().ok_or(MacError::NoChannel)?;
        match mac.raw_receive(channel.frequency, channel.min_dr, window_ms, &mut buf[..BEACON_SIZE]) {
            Ok(len) if len == BEACON_SIZE && !buf[..BEACON_SIZE].iter().all(|&b| b == 0) => {
                self.last_beacon_rx_ms = Some(now_ms);
                self.missed = 0;
                self.symbol_timeout_ms = BASE_SYMBOL_TIMEOUT_MS;
                self.state = BeaconState::Locked;
            }
            _ => self.state = BeaconState::Timeout,
        }
        Ok(())
    }

    fn scan_by_time<R, REG, TMR>(
        &mut self,
        mac: &mut MacLayer<R, REG, TMR>,
        now_ms: u64,
        buf: &mut [u8],
    ) -> Result<(), MacError<R::Error>>
    where
        R: Radio,
        REG: Region,
        TMR: Timer,
    {
        if self.time_reference_ms.is_none() {
            self.state = BeaconState::Acquisition;
            return Ok(());
        }
        // Narrow window around the time reference; falls back to a blind
        // scan via Timeout -> Acquisition if the reference was off.
        self.scan(mac, buf, BEACON_GUARD_MS * 2, now_ms)?;
        if self.state == BeaconState::Timeout {
            self.state = BeaconState::Acquisition;
        }
        Ok(())
    }

    fn track<R, REG, TMR>(
        &mut self,
        mac: &mut MacLayer<R, REG, TMR>,
        buf: &mut [u8],
    ) -> Result<(), MacError<R::Error>>
    where
        R: Radio,
        REG: Region,
        TMR: Timer,
    {
        let channel = mac.next_beacon_channel().ok_or(MacError::NoChannel)?;
        let window = self.symbol_timeout_ms * 2 + BEACON_GUARD_MS;
        match mac.raw_receive(channel.frequency, channel.min_dr, window, &mut buf[..BEACON_SIZE]) {
            Ok(len) if len == BEACON_SIZE && !buf[..BEACON_SIZE].iter().all(|&b| b == 0) => {
                // Advance by exactly one period rather than sampling the
                // clock, so a locked phase never accumulates poll-rate jitter.
                self.last_beacon_rx_ms = Some(self.last_beacon_rx_ms.unwrap_or(0) + BEACON_PERIOD_MS as u64);
                self.missed = 0;
                self.symbol_timeout_ms = BASE_SYMBOL_TIMEOUT_MS;
                self.state = BeaconState::Locked;
            }
            _ => self.state = BeaconState::BeaconMissed,
        }
        Ok(())
    }
}

impl Default for BeaconTracker {
    fn default() -> Self {
        Self::new()
    }
}
