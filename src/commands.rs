//! LoRaWAN MAC commands: parsing, serialization, and the sticky-answer set
//! the confirm queue and command store need to know about.
//!
//! Encode/decode only lives here; the semantics of *answering* a request
//! (what value to put in an Ans, what session state to mutate) belong to the
//! MAC engine ([`crate::lorawan::mac`]) and, for Class B commands, to
//! [`crate::class::class_b`].

use heapless::Vec;

/// Maximum serialized length of any single MAC command's payload.
pub const MAX_COMMAND_PAYLOAD: usize = 5;

/// A decoded MAC command, either a request (network to device, except
/// `LinkCheckReq`/`DeviceTimeReq`/ping-slot and beacon requests which are
/// device to network) or an answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MacCommand {
    /// Link check request (uplink).
    LinkCheckReq,
    /// Link check answer (downlink).
    LinkCheckAns {
        /// Link margin in dB.
        margin: u8,
        /// Number of gateways that received the request.
        gateway_count: u8,
    },
    /// Link ADR request (downlink).
    LinkADRReq {
        /// Data rate.
        data_rate: u8,
        /// TX power index.
        tx_power: u8,
        /// Channel mask.
        ch_mask: u16,
        /// Channel mask control.
        ch_mask_cntl: u8,
        /// Number of transmissions.
        nb_trans: u8,
    },
    /// Link ADR answer (uplink).
    LinkADRAns {
        /// Power ACK.
        power_ack: bool,
        /// Data rate ACK.
        data_rate_ack: bool,
        /// Channel mask ACK.
        channel_mask_ack: bool,
    },
    /// Duty cycle request (downlink).
    DutyCycleReq {
        /// Maximum aggregate duty cycle, expressed as `1 / 2^n`.
        max_duty_cycle: u8,
    },
    /// Duty cycle answer (uplink).
    DutyCycleAns,
    /// RX parameter setup request (downlink).
    RXParamSetupReq {
        /// RX1 data-rate offset.
        rx1_dr_offset: u8,
        /// RX2 data rate.
        rx2_data_rate: u8,
        /// RX2 frequency.
        freq: u32,
    },
    /// RX parameter setup answer (uplink, sticky until ACKed).
    RXParamSetupAns {
        /// RX1 data-rate offset ACK.
        rx1_dr_offset_ack: bool,
        /// RX2 data rate ACK.
        rx2_data_rate_ack: bool,
        /// Channel ACK.
        channel_ack: bool,
    },
    /// Device status request (downlink).
    DevStatusReq,
    /// Device status answer (uplink).
    DevStatusAns {
        /// Battery level (0 = external power, 1-254 = level, 255 = unknown).
        battery: u8,
        /// Radio status (margin in dB).
        margin: i8,
    },
    /// New channel request (downlink).
    NewChannelReq {
        /// Channel index.
        ch_index: u8,
        /// Frequency.
        freq: u32,
        /// Maximum data rate.
        max_dr: u8,
        /// Minimum data rate.
        min_dr: u8,
    },
    /// New channel answer (uplink).
    NewChannelAns {
        /// Channel frequency OK.
        channel_freq_ok: bool,
        /// Data rate OK.
        data_rate_ok: bool,
    },
    /// RX timing setup request (downlink).
    RXTimingSetupReq {
        /// Delay in seconds (0-15).
        delay: u8,
    },
    /// RX timing setup answer (uplink, sticky until ACKed).
    RXTimingSetupAns,
    /// TX parameter setup request (downlink).
    TxParamSetupReq {
        /// Downlink dwell time limit in effect.
        downlink_dwell_time: bool,
        /// Uplink dwell time limit in effect.
        uplink_dwell_time: bool,
        /// Maximum EIRP index.
        max_eirp: u8,
    },
    /// TX parameter setup answer (uplink).
    TxParamSetupAns,
    /// Downlink channel request (downlink).
    DlChannelReq {
        /// Channel index.
        ch_index: u8,
        /// Frequency.
        freq: u32,
    },
    /// Downlink channel answer (uplink, sticky until ACKed).
    DlChannelAns {
        /// Channel frequency OK.
        channel_freq_ok: bool,
        /// Uplink frequency exists.
        uplink_freq_exists: bool,
    },
    /// Device time request (uplink).
    DeviceTimeReq,
    /// Device time answer (downlink): GPS epoch seconds plus sub-second fraction.
    DeviceTimeAns {
        /// Seconds since the GPS epoch.
        seconds: u32,
        /// Sub-second fraction, in 1/256ths of a second.
        fraction: u8,
    },
    /// Ping slot info request (uplink).
    PingSlotInfoReq {
        /// Ping slot periodicity (0-7).
        periodicity: u8,
    },
    /// Ping slot info answer (downlink).
    PingSlotInfoAns,
    /// Ping slot channel request (downlink).
    PingSlotChannelReq {
        /// Ping slot frequency.
        frequency: u32,
        /// Ping slot data rate.
        data_rate: u8,
    },
    /// Ping slot channel answer (uplink).
    PingSlotChannelAns {
        /// Frequency OK.
        frequency_ok: bool,
        /// Data rate OK.
        data_rate_ok: bool,
    },
    /// Beacon timing request (uplink): ask for time until the next beacon.
    BeaconTimingReq,
    /// Beacon timing answer (downlink).
    BeaconTimingAns {
        /// Delay until the next beacon, in 30ms units.
        delay: u16,
        /// Beacon channel index.
        channel: u8,
    },
    /// Beacon frequency request (downlink): reconfigure the beacon channel.
    BeaconFreqReq {
        /// New beacon frequency in Hz.
        frequency: u32,
    },
    /// Beacon frequency answer (uplink).
    BeaconFreqAns {
        /// Non-zero if the new frequency was rejected.
        status: u8,
    },
}

/// Error parsing a MAC command from its CID and payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// CID is not recognised.
    UnknownCommand,
    /// Payload length does not match what this CID requires.
    InvalidLength,
}

impl MacCommand {
    /// Wire command identifier for this command.
    pub fn cid(&self) -> u8 {
        match self {
            MacCommand::LinkCheckReq => 0x02,
            MacCommand::LinkCheckAns { .. } => 0x82,
            MacCommand::LinkADRReq { .. } => 0x03,
            MacCommand::LinkADRAns { .. } => 0x83,
            MacCommand::DutyCycleReq { .. } => 0x04,
            MacCommand::DutyCycleAns => 0x84,
            MacCommand::RXParamSetupReq { .. } => 0x05,
            MacCommand::RXParamSetupAns { .. } => 0x85,
            MacCommand::DevStatusReq => 0x06,
            MacCommand::DevStatusAns { .. } => 0x86,
            MacCommand::NewChannelReq { .. } => 0x07,
            MacCommand::NewChannelAns { .. } => 0x87,
            MacCommand::RXTimingSetupReq { .. } => 0x08,
            MacCommand::RXTimingSetupAns => 0x88,
            MacCommand::TxParamSetupReq { .. } => 0x09,
            MacCommand::TxParamSetupAns => 0x89,
            MacCommand::DlChannelReq { .. } => 0x0A,
            MacCommand::DlChannelAns { .. } => 0x8A,
            MacCommand::DeviceTimeReq => 0x0D,
            MacCommand::DeviceTimeAns { .. } => 0x8D,
            MacCommand::PingSlotInfoReq { .. } => 0x10,
            MacCommand::PingSlotInfoAns => 0x90,
            MacCommand::PingSlotChannelReq { .. } => 0x11,
            MacCommand::PingSlotChannelAns { .. } => 0x91,
            MacCommand::BeaconTimingReq => 0x12,
            MacCommand::BeaconTimingAns { .. } => 0x92,
            MacCommand::BeaconFreqReq { .. } => 0x13,
            MacCommand::BeaconFreqAns { .. } => 0x93,
        }
    }

    /// Whether this is an answer that must remain queued (sticky) until a
    /// downlink acknowledges it, per §4.5: `RXParamSetupAns`, `RXTimingSetupAns`
    /// and `DlChannelAns`.
    pub fn is_sticky_answer(&self) -> bool {
        matches!(
            self,
            MacCommand::RXParamSetupAns { .. }
                | MacCommand::RXTimingSetupAns
                | MacCommand::DlChannelAns { .. }
        )
    }

    /// Serialized payload length in bytes (excluding the CID byte).
    pub fn len(&self) -> usize {
        match self {
            MacCommand::LinkCheckReq => 0,
            MacCommand::LinkCheckAns { .. } => 2,
            MacCommand::LinkADRReq { .. } => 4,
            MacCommand::LinkADRAns { .. } => 1,
            MacCommand::DutyCycleReq { .. } => 1,
            MacCommand::DutyCycleAns => 0,
            MacCommand::RXParamSetupReq { .. } => 4,
            MacCommand::RXParamSetupAns { .. } => 1,
            MacCommand::DevStatusReq => 0,
            MacCommand::DevStatusAns { .. } => 2,
            MacCommand::NewChannelReq { .. } => 5,
            MacCommand::NewChannelAns { .. } => 1,
            MacCommand::RXTimingSetupReq { .. } => 1,
            MacCommand::RXTimingSetupAns => 0,
            MacCommand::TxParamSetupReq { .. } => 1,
            MacCommand::TxParamSetupAns => 0,
            MacCommand::DlChannelReq { .. } => 4,
            MacCommand::DlChannelAns { .. } => 1,
            MacCommand::DeviceTimeReq => 0,
            MacCommand::DeviceTimeAns { .. } => 5,
            MacCommand::PingSlotInfoReq { .. } => 1,
            MacCommand::PingSlotInfoAns => 0,
            MacCommand::PingSlotChannelReq { .. } => 4,
            MacCommand::PingSlotChannelAns { .. } => 1,
            MacCommand::BeaconTimingReq => 0,
            MacCommand::BeaconTimingAns { .. } => 3,
            MacCommand::BeaconFreqReq { .. } => 3,
            MacCommand::BeaconFreqAns { .. } => 1,
        }
    }

    /// Parse a command body from its CID and payload bytes.
    pub fn from_bytes(cid: u8, payload: &[u8]) -> Result<Self, CommandError> {
        let need = |n: usize| -> Result<(), CommandError> {
            if payload.len() != n {
                Err(CommandError::InvalidLength)
            } else {
                Ok(())
            }
        };
        Ok(match cid {
            0x02 => {
                need(0)?;
                MacCommand::LinkCheckReq
            }
            0x82 => {
                need(2)?;
                MacCommand::LinkCheckAns {
                    margin: payload[0],
                    gateway_count: payload[1],
                }
            }
            0x03 => {
                need(4)?;
                MacCommand::LinkADRReq {
                    data_rate: payload[0] >> 4,
                    tx_power: payload[0] & 0x0F,
                    ch_mask: u16::from_le_bytes([payload[1], payload[2]]),
                    ch_mask_cntl: payload[3] >> 4,
                    nb_trans: payload[3] & 0x0F,
                }
            }
            0x83 => {
                need(1)?;
                MacCommand::LinkADRAns {
                    power_ack: payload[0] & 0x04 != 0,
                    data_rate_ack: payload[0] & 0x02 != 0,
                    channel_mask_ack: payload[0] & 0x01 != 0,
                }
            }
            0x04 => {
                need(1)?;
                MacCommand::DutyCycleReq {
                    max_duty_cycle: payload[0] & 0x0F,
                }
            }
            0x84 => {
                need(0)?;
                MacCommand::DutyCycleAns
            }
            0x05 => {
                need(4)?;
                MacCommand::RXParamSetupReq {
                    rx1_dr_offset: payload[0] >> 4 & 0x07,
                    rx2_data_rate: payload[0] & 0x0F,
                    freq: u32::from_le_bytes([payload[1], payload[2], payload[3], 0]) * 100,
                }
            }
            0x85 => {
                need(1)?;
                MacCommand::RXParamSetupAns {
                    rx1_dr_offset_ack: payload[0] & 0x04 != 0,
                    rx2_data_rate_ack: payload[0] & 0x02 != 0,
                    channel_ack: payload[0] & 0x01 != 0,
                }
            }
            0x06 => {
                need(0)?;
                MacCommand::DevStatusReq
            }
            0x86 => {
                need(2)?;
                MacCommand::DevStatusAns {
                    battery: payload[0],
                    margin: ((payload[1] & 0x3F) as i8) - if payload[1] & 0x20 != 0 { 64 } else { 0 },
                }
            }
            0x07 => {
                need(5)?;
                MacCommand::NewChannelReq {
                    ch_index: payload[0],
                    freq: u32::from_le_bytes([payload[1], payload[2], payload[3], 0]) * 100,
                    max_dr: payload[4] >> 4,
                    min_dr: payload[4] & 0x0F,
                }
            }
            0x87 => {
                need(1)?;
                MacCommand::NewChannelAns {
                    channel_freq_ok: payload[0] & 0x02 != 0,
                    data_rate_ok: payload[0] & 0x01 != 0,
                }
            }
            0x08 => {
                need(1)?;
                MacCommand::RXTimingSetupReq {
                    delay: payload[0] & 0x0F,
                }
            }
            0x88 => {
                need(0)?;
                MacCommand::RXTimingSetupAns
            }
            0x09 => {
                need(1)?;
                MacCommand::TxParamSetupReq {
                    downlink_dwell_time: payload[0] & 0x20 != 0,
                    uplink_dwell_time: payload[0] & 0x10 != 0,
                    max_eirp: payload[0] & 0x0F,
                }
            }
            0x89 => {
                need(0)?;
                MacCommand::TxParamSetupAns
            }
            0x0A => {
                need(4)?;
                MacCommand::DlChannelReq {
                    ch_index: payload[0],
                    freq: u32::from_le_bytes([payload[1], payload[2], payload[3], 0]) * 100,
                }
            }
            0x8A => {
                need(1)?;
                MacCommand::DlChannelAns {
                    channel_freq_ok: payload[0] & 0x02 != 0,
                    uplink_freq_exists: payload[0] & 0x01 != 0,
                }
            }
            0x0D => {
                need(0)?;
                MacCommand::DeviceTimeReq
            }
            0x8D => {
                need(5)?;
                MacCommand::DeviceTimeAns {
                    seconds: u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]),
                    fraction: payload[4],
                }
            }
            0x10 => {
                need(1)?;
                MacCommand::PingSlotInfoReq {
                    periodicity: payload[0] & 0x07,
                }
            }
            0x90 => {
                need(0)?;
                MacCommand::PingSlotInfoAns
            }
            0x11 => {
                need(4)?;
                MacCommand::PingSlotChannelReq {
                    frequency: u32::from_le_bytes([payload[0], payload[1], payload[2], 0]) * 100,
                    data_rate: payload[3] & 0x0F,
                }
            }
            0x91 => {
                need(1)?;
                MacCommand::PingSlotChannelAns {
                    frequency_ok: payload[0] & 0x02 != 0,
                    data_rate_ok: payload[0] & 0x01 != 0,
                }
            }
            0x12 => {
                need(0)?;
                MacCommand::BeaconTimingReq
            }
            0x92 => {
                need(3)?;
                MacCommand::BeaconTimingAns {
                    delay: u16::from_le_bytes([payload[0], payload[1]]),
                    channel: payload[2],
                }
            }
            0x13 => {
                need(3)?;
                MacCommand::BeaconFreqReq {
                    frequency: u32::from_le_bytes([payload[0], payload[1], payload[2], 0]) * 100,
                }
            }
            0x93 => {
                need(1)?;
                MacCommand::BeaconFreqAns { status: payload[0] }
            }
            _ => return Err(CommandError::UnknownCommand),
        })
    }

    /// Serialize this command's payload (excluding the CID byte).
    pub fn to_bytes(&self) -> Vec<u8, MAX_COMMAND_PAYLOAD> {
        let mut out = Vec::new();
        match *self {
            MacCommand::LinkCheckReq
            | MacCommand::DutyCycleAns
            | MacCommand::DevStatusReq
            | MacCommand::RXTimingSetupAns
            | MacCommand::TxParamSetupAns
            | MacCommand::DeviceTimeReq
            | MacCommand::PingSlotInfoAns
            | MacCommand::BeaconTimingReq => {}
            MacCommand::LinkCheckAns {
                margin,
                gateway_count,
            } => {
                let _ = out.push(margin);
                let _ = out.push(gateway_count);
            }
            MacCommand::LinkADRReq {
                data_rate,
                tx_power,
                ch_mask,
                ch_mask_cntl,
                nb_trans,
            } => {
                let _ = out.push((data_rate << 4) | (tx_power & 0x0F));
                let _ = out.extend_from_slice(&ch_mask.to_le_bytes());
                let _ = out.push((ch_mask_cntl << 4) | (nb_trans & 0x0F));
            }
            MacCommand::LinkADRAns {
                power_ack,
                data_rate_ack,
                channel_mask_ack,
            } => {
                let mut byte = 0u8;
                if power_ack {
                    byte |= 0x04;
                }
                if data_rate_ack {
                    byte |= 0x02;
                }
                if channel_mask_ack {
                    byte |= 0x01;
                }
                let _ = out.push(byte);
            }
            MacCommand::DutyCycleReq { max_duty_cycle } => {
                let _ = out.push(max_duty_cycle & 0x0F);
            }
            MacCommand::RXParamSetupReq {
                rx1_dr_offset,
                rx2_data_rate,
                freq,
            } => {
                let _ = out.push((rx1_dr_offset << 4) | (rx2_data_rate & 0x0F));
                let f = (freq / 100).to_le_bytes();
                let _ = out.extend_from_slice(&f[0..3]);
            }
            MacCommand::RXParamSetupAns {
                rx1_dr_offset_ack,
                rx2_data_rate_ack,
                channel_ack,
            } => {
                let mut byte = 0u8;
                if rx1_dr_offset_ack {
                    byte |= 0x04;
                }
                if rx2_data_rate_ack {
                    byte |= 0x02;
                }
                if channel_ack {
                    byte |= 0x01;
                }
                let _ = out.push(byte);
            }
            MacCommand::DevStatusAns { battery, margin } => {
                let _ = out.push(battery);
                let _ = out.push((margin & 0x3F) as u8);
            }
            MacCommand::NewChannelReq {
                ch_index,
                freq,
                max_dr,
                min_dr,
            } => {
                let _ = out.push(ch_index);
                let f = (freq / 100).to_le_bytes();
                let _ = out.extend_from_slice(&f[0..3]);
                let _ = out.push((max_dr << 4) | (min_dr & 0x0F));
            }
            MacCommand::NewChannelAns {
                channel_freq_ok,
                data_rate_ok,
            } => {
                let mut byte = 0u8;
                if channel_freq_ok {
                    byte |= 0x02;
                }
                if data_rate_ok {
                    byte |= 0x01;
                }
                let _ = out.push(byte);
            }
            MacCommand::RXTimingSetupReq { delay } => {
                let _ = out.push(delay & 0x0F);
            }
            MacCommand::TxParamSetupReq {
                downlink_dwell_time,
                uplink_dwell_time,
                max_eirp,
            } => {
                let mut byte = max_eirp & 0x0F;
                if downlink_dwell_time {
                    byte |= 0x20;
                }
                if uplink_dwell_time {
                    byte |= 0x10;
                }
                let _ = out.push(byte);
            }
            MacCommand::DlChannelReq { ch_index, freq } => {
                let _ = out.push(ch_index);
                let f = (freq / 100).to_le_bytes();
                let _ = out.extend_from_slice(&f[0..3]);
            }
            MacCommand::DlChannelAns {
                channel_freq_ok,
                uplink_freq_exists,
            } => {
                let mut byte = 0u8;
                if channel_freq_ok {
                    byte |= 0x02;
                }
                if uplink_freq_exists {
                    byte |= 0x01;
                }
                let _ = out.push(byte);
            }
            MacCommand::DeviceTimeAns { seconds, fraction } => {
                let _ = out.extend_from_slice(&seconds.to_le_bytes());
                let _ = out.push(fraction);
            }
            MacCommand::PingSlotInfoReq { periodicity } => {
                let _ = out.push(periodicity & 0x07);
            }
            MacCommand::PingSlotChannelReq {
                frequency,
                data_rate,
            } => {
                let f = (frequency / 100).to_le_bytes();
                let _ = out.extend_from_slice(&f[0..3]);
                let _ = out.push(data_rate & 0x0F);
            }
            MacCommand::PingSlotChannelAns {
                frequency_ok,
                data_rate_ok,
            } => {
                let mut byte = 0u8;
                if frequency_ok {
                    byte |= 0x02;
                }
                if data_rate_ok {
                    byte |= 0x01;
                }
                let _ = out.push(byte);
            }
            MacCommand::BeaconTimingAns { delay, channel } => {
                let _ = out.extend_from_slice(&delay.to_le_bytes());
                let _ = out.push(channel);
            }
            MacCommand::BeaconFreqReq { frequency } => {
                let f = (frequency / 100).to_le_bytes();
                let _ = out.extend_from_slice(&f[0..3]);
            }
            MacCommand::BeaconFreqAns { status } => {
                let _ = out.push(status);
            }
        }
        out
    }
}
