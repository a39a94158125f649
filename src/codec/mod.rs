//! LoRaWAN wire codec: header bitfields and frame parsing/serialization.
//!
//! Integer fields are little-endian on the wire. `MHdr`, `DlSettings` and
//! `FCtrl` wrap their raw byte and expose named shift/mask accessors rather
//! than packed bitfield structs, so encode/decode stays a portable, auditable
//! function instead of relying on field layout.

use heapless::Vec;

use crate::config::device::{AESKey, DevAddr};
use crate::crypto;

/// Maximum size of a data frame's FRMPayload.
pub const MAX_FRM_PAYLOAD: usize = 242;

/// Maximum size of a full serialized frame.
pub const MAX_FRAME_SIZE: usize = 255;

/// MIC field size, shared with [`crate::crypto::MIC_SIZE`].
pub const MIC_SIZE: usize = crypto::MIC_SIZE;

/// Frame type carried by [`MHdr`]'s top 3 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Join-request.
    JoinRequest = 0x00,
    /// Join-accept.
    JoinAccept = 0x20,
    /// Unconfirmed data uplink.
    UnconfirmedDataUp = 0x40,
    /// Unconfirmed data downlink.
    UnconfirmedDataDown = 0x60,
    /// Confirmed data uplink.
    ConfirmedDataUp = 0x80,
    /// Confirmed data downlink.
    ConfirmedDataDown = 0xA0,
    /// Rejoin-request (type 0, 1 or 2; disambiguated by the frame body).
    RejoinRequest = 0xC0,
    /// Proprietary frame type; body format is vendor-defined.
    Proprietary = 0xE0,
}

impl FrameType {
    fn from_bits(bits: u8) -> Option<Self> {
        Some(match bits {
            0x00 => FrameType::JoinRequest,
            0x20 => FrameType::JoinAccept,
            0x40 => FrameType::UnconfirmedDataUp,
            0x60 => FrameType::UnconfirmedDataDown,
            0x80 => FrameType::ConfirmedDataUp,
            0xA0 => FrameType::ConfirmedDataDown,
            0xC0 => FrameType::RejoinRequest,
            0xE0 => FrameType::Proprietary,
            _ => return None,
        })
    }

    /// Whether this frame type originates from the device (vs. the network).
    pub fn is_uplink(&self) -> bool {
        matches!(
            self,
            FrameType::JoinRequest
                | FrameType::UnconfirmedDataUp
                | FrameType::ConfirmedDataUp
                | FrameType::RejoinRequest
        )
    }
}

/// MAC header byte: frame type (bits 7-5) and major version (bits 1-0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MHdr(u8);

impl MHdr {
    /// Build an MHDR byte for the given frame type, LoRaWAN R1 major version.
    pub fn new(frame_type: FrameType) -> Self {
        Self(frame_type as u8)
    }

    /// Raw byte.
    pub fn to_byte(self) -> u8 {
        self.0
    }

    /// Parse a raw MHDR byte.
    pub fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// Decoded frame type, or `None` for a reserved combination.
    pub fn frame_type(self) -> Option<FrameType> {
        FrameType::from_bits(self.0 & 0xE0)
    }

    /// Major version field (bits 1-0). Only `0` (R1) is defined.
    pub fn major(self) -> u8 {
        self.0 & 0x03
    }
}

/// Frame-control byte carried in the FHDR: ADR/ACK flags and FOptsLen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FCtrl(u8);

impl FCtrl {
    /// Build an uplink FCtrl byte.
    pub fn new_uplink(adr: bool, adr_ack_req: bool, ack: bool, f_opts_len: u8) -> Self {
        let mut byte = f_opts_len & 0x0F;
        if adr {
            byte |= 0x80;
        }
        if adr_ack_req {
            byte |= 0x40;
        }
        if ack {
            byte |= 0x20;
        }
        Self(byte)
    }

    /// Build a downlink FCtrl byte (bit 4 is FPending, not AdrAckReq).
    pub fn new_downlink(adr: bool, ack: bool, f_pending: bool, f_opts_len: u8) -> Self {
        let mut byte = f_opts_len & 0x0F;
        if adr {
            byte |= 0x80;
        }
        if ack {
            byte |= 0x20;
        }
        if f_pending {
            byte |= 0x10;
        }
        Self(byte)
    }

    /// Raw byte.
    pub fn to_byte(self) -> u8 {
        self.0
    }

    /// Parse a raw FCtrl byte.
    pub fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// ADR bit.
    pub fn adr(self) -> bool {
        self.0 & 0x80 != 0
    }

    /// ADRACKReq bit (uplink only).
    pub fn adr_ack_req(self) -> bool {
        self.0 & 0x40 != 0
    }

    /// ACK bit.
    pub fn ack(self) -> bool {
        self.0 & 0x20 != 0
    }

    /// FPending bit (downlink only).
    pub fn f_pending(self) -> bool {
        self.0 & 0x10 != 0
    }

    /// Number of bytes of piggy-backed MAC commands following FCnt.
    pub fn f_opts_len(self) -> u8 {
        self.0 & 0x0F
    }
}

/// DLSettings byte carried in a join-accept: RX1 DR offset and RX2 data rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DlSettings(u8);

impl DlSettings {
    /// Build a DLSettings byte.
    pub fn new(opt_neg: bool, rx1_dr_offset: u8, rx2_data_rate: u8) -> Self {
        let mut byte = rx2_data_rate & 0x0F;
        byte |= (rx1_dr_offset & 0x07) << 4;
        if opt_neg {
            byte |= 0x80;
        }
        Self(byte)
    }

    /// Raw byte.
    pub fn to_byte(self) -> u8 {
        self.0
    }

    /// Parse a raw DLSettings byte.
    pub fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// OptNeg bit: set when the session negotiated LoRaWAN 1.1 semantics.
    pub fn opt_neg(self) -> bool {
        self.0 & 0x80 != 0
    }

    /// RX1 data-rate offset (bits 6-4).
    pub fn rx1_dr_offset(self) -> u8 {
        (self.0 >> 4) & 0x07
    }

    /// RX2 data rate (bits 3-0).
    pub fn rx2_data_rate(self) -> u8 {
        self.0 & 0x0F
    }
}

/// Frame header: device address, control byte, frame counter and options.
#[derive(Debug, Clone)]
pub struct FHdr {
    /// Device address.
    pub dev_addr: DevAddr,
    /// Control byte.
    pub f_ctrl: FCtrl,
    /// Low 16 bits of the relevant frame counter.
    pub f_cnt: u16,
    /// Piggy-backed MAC command bytes (0-15).
    pub f_opts: Vec<u8, 15>,
}

impl FHdr {
    fn serialize_into(&self, out: &mut Vec<u8, MAX_FRAME_SIZE>) -> Result<(), ParseError> {
        out.extend_from_slice(self.dev_addr.as_bytes())
            .map_err(|_| ParseError::BufferTooSmall)?;
        out.push(self.f_ctrl.to_byte())
            .map_err(|_| ParseError::BufferTooSmall)?;
        out.extend_from_slice(&self.f_cnt.to_le_bytes())
            .map_err(|_| ParseError::BufferTooSmall)?;
        out.extend_from_slice(&self.f_opts)
            .map_err(|_| ParseError::BufferTooSmall)?;
        Ok(())
    }
}

/// Errors raised while parsing or serializing a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Frame is shorter than its declared structure requires.
    Truncated,
    /// MHDR names a reserved or unsupported frame type.
    ReservedMessageType,
    /// MHDR's major version field is not the supported LoRaWAN R1 (`0`).
    BadMajorVersion,
    /// FOptsLen does not match the space actually available before FPort/FRMPayload.
    InconsistentFOptsLen,
    /// Rejoin-request carries an unrecognised RejoinType.
    UnknownRejoinType,
    /// Output buffer is too small to hold the serialized frame.
    BufferTooSmall,
}

/// A fully parsed (but, for data frames, still payload-encrypted) LoRaWAN frame.
#[derive(Debug, Clone)]
pub enum Frame {
    /// Join-request.
    JoinRequest {
        /// Join EUI (application identifier).
        join_eui: [u8; 8],
        /// Device EUI.
        dev_eui: [u8; 8],
        /// Device nonce.
        dev_nonce: u16,
        /// Message integrity code.
        mic: [u8; MIC_SIZE],
    },
    /// Rejoin-request type 0 or 2 (same wire shape; distinguished by `rejoin_type`).
    RejoinType0Or2 {
        /// Which of type 0 or type 2 this is.
        rejoin_type: u8,
        /// Network identifier.
        net_id: [u8; 3],
        /// Device EUI.
        dev_eui: [u8; 8],
        /// Rejoin counter (RJcount0).
        rj_count0: u16,
        /// Message integrity code.
        mic: [u8; MIC_SIZE],
    },
    /// Rejoin-request type 1.
    RejoinType1 {
        /// Join EUI.
        join_eui: [u8; 8],
        /// Device EUI.
        dev_eui: [u8; 8],
        /// Rejoin counter (RJcount1).
        rj_count1: u16,
        /// Message integrity code.
        mic: [u8; MIC_SIZE],
    },
    /// Join-accept. Fields are already decrypted by the time this is produced.
    JoinAccept {
        /// Join nonce (server nonce).
        join_nonce: [u8; 3],
        /// Network identifier.
        net_id: [u8; 3],
        /// Assigned device address.
        dev_addr: DevAddr,
        /// Downlink settings.
        dl_settings: DlSettings,
        /// RX1 delay in seconds (0 means 1s, per LoRaWAN convention).
        rx_delay: u8,
        /// Optional channel-frequency list (5 channels x 3 bytes).
        cf_list: Option<[u8; 16]>,
        /// Message integrity code.
        mic: [u8; MIC_SIZE],
    },
    /// Data frame (uplink or downlink). FRMPayload is still encrypted.
    Data {
        /// MAC header.
        mhdr: MHdr,
        /// Frame header.
        fhdr: FHdr,
        /// Port field, absent when there is no payload.
        f_port: Option<u8>,
        /// Encrypted application or MAC-command payload.
        frm_payload: Vec<u8, MAX_FRM_PAYLOAD>,
        /// Message integrity code.
        mic: [u8; MIC_SIZE],
    },
}

fn read_mic(buf: &[u8]) -> Result<[u8; MIC_SIZE], ParseError> {
    if buf.len() < MIC_SIZE {
        return Err(ParseError::Truncated);
    }
    let mut mic = [0u8; MIC_SIZE];
    mic.copy_from_slice(&buf[buf.len() - MIC_SIZE..]);
    Ok(mic)
}

/// Parse a join-request frame body (including MHDR, excluding nothing).
pub fn parse_join_request(buf: &[u8]) -> Result<Frame, ParseError> {
    if buf.len() != 23 {
        return Err(ParseError::Truncated);
    }
    let mhdr = MHdr::from_byte(buf[0]);
    if mhdr.frame_type() != Some(FrameType::JoinRequest) {
        return Err(ParseError::ReservedMessageType);
    }
    let mut join_eui = [0u8; 8];
    join_eui.copy_from_slice(&buf[1..9]);
    let mut dev_eui = [0u8; 8];
    dev_eui.copy_from_slice(&buf[9..17]);
    let dev_nonce = u16::from_le_bytes([buf[17], buf[18]]);
    Ok(Frame::JoinRequest {
        join_eui,
        dev_eui,
        dev_nonce,
        mic: read_mic(buf)?,
    })
}

/// Serialize a join-request frame body (everything but the trailing MIC,
/// which the caller computes over this output and appends).
pub fn serialize_join_request_unsigned(
    join_eui: [u8; 8],
    dev_eui: [u8; 8],
    dev_nonce: u16,
) -> Vec<u8, MAX_FRAME_SIZE> {
    let mut out = Vec::new();
    let _ = out.push(MHdr::new(FrameType::JoinRequest).to_byte());
    let _ = out.extend_from_slice(&join_eui);
    let _ = out.extend_from_slice(&dev_eui);
    let _ = out.extend_from_slice(&dev_nonce.to_le_bytes());
    out
}

/// Parse a rejoin-request frame body, dispatching on RejoinType.
pub fn parse_rejoin_request(buf: &[u8]) -> Result<Frame, ParseError> {
    if buf.is_empty() {
        return Err(ParseError::Truncated);
    }
    let mhdr = MHdr::from_byte(buf[0]);
    if mhdr.frame_type() != Some(FrameType::RejoinRequest) {
        return Err(ParseError::ReservedMessageType);
    }
    if buf.len() < 2 {
        return Err(ParseError::Truncated);
    }
    match buf[1] {
        1 => {
            if buf.len() != 24 {
                return Err(ParseError::Truncated);
            }
            let mut join_eui = [0u8; 8];
            join_eui.copy_from_slice(&buf[2..10]);
            let mut dev_eui = [0u8; 8];
            dev_eui.copy_from_slice(&buf[10..18]);
            let rj_count1 = u16::from_le_bytes([buf[18], buf[19]]);
            Ok(Frame::RejoinType1 {
                join_eui,
                dev_eui,
                rj_count1,
                mic: read_mic(buf)?,
            })
        }
        rejoin_type @ (0 | 2) => {
            if buf.len() != 19 {
                return Err(ParseError::Truncated);
            }
            let mut net_id = [0u8; 3];
            net_id.copy_from_slice(&buf[2..5]);
            let mut dev_eui = [0u8; 8];
            dev_eui.copy_from_slice(&buf[5..13]);
            let rj_count0 = u16::from_le_bytes([buf[13], buf[14]]);
            Ok(Frame::RejoinType0Or2 {
                rejoin_type,
                net_id,
                dev_eui,
                rj_count0,
                mic: read_mic(buf)?,
            })
        }
        _ => Err(ParseError::UnknownRejoinType),
    }
}

/// Parse a join-accept frame. `buf` is the wire frame (MHDR followed by the
/// encrypted body); `key` is the key the body was protected under (`NwkKey`
/// under 1.0.x/1.1, or `AppKey` for a legacy 1.0.x join, per the session's
/// negotiated MAC version).
pub fn parse_join_accept(buf: &[u8], key: &AESKey) -> Result<Frame, ParseError> {
    if buf.len() != 17 && buf.len() != 33 {
        return Err(ParseError::Truncated);
    }
    let mhdr = MHdr::from_byte(buf[0]);
    if mhdr.frame_type() != Some(FrameType::JoinAccept) {
        return Err(ParseError::ReservedMessageType);
    }
    let decrypted = crypto::encrypt_join_accept(key, &buf[1..]);

    let mut join_nonce = [0u8; 3];
    join_nonce.copy_from_slice(&decrypted[0..3]);
    let mut net_id = [0u8; 3];
    net_id.copy_from_slice(&decrypted[3..6]);
    let mut dev_addr_bytes = [0u8; 4];
    dev_addr_bytes.copy_from_slice(&decrypted[6..10]);
    let dl_settings = DlSettings::from_byte(decrypted[10]);
    let rx_delay = decrypted[11];

    let (cf_list, mic) = if decrypted.len() == 32 {
        let mut cf = [0u8; 16];
        cf.copy_from_slice(&decrypted[12..28]);
        let mut mic = [0u8; MIC_SIZE];
        mic.copy_from_slice(&decrypted[28..32]);
        (Some(cf), mic)
    } else {
        let mut mic = [0u8; MIC_SIZE];
        mic.copy_from_slice(&decrypted[12..16]);
        (None, mic)
    };

    Ok(Frame::JoinAccept {
        join_nonce,
        net_id,
        dev_addr: DevAddr::new(dev_addr_bytes),
        dl_settings,
        rx_delay,
        cf_list,
        mic,
    })
}

/// Serialize (encrypt) a join-accept body, ready for transmission. Takes the
/// already-computed MIC so callers compute it over the plaintext body first.
pub fn serialize_join_accept(
    join_nonce: [u8; 3],
    net_id: [u8; 3],
    dev_addr: DevAddr,
    dl_settings: DlSettings,
    rx_delay: u8,
    cf_list: Option<[u8; 16]>,
    mic: [u8; MIC_SIZE],
    key: &AESKey,
) -> Vec<u8, MAX_FRAME_SIZE> {
    let mut plain: Vec<u8, 32> = Vec::new();
    let _ = plain.extend_from_slice(&join_nonce);
    let _ = plain.extend_from_slice(&net_id);
    let _ = plain.extend_from_slice(dev_addr.as_bytes());
    let _ = plain.push(dl_settings.to_byte());
    let _ = plain.push(rx_delay);
    if let Some(cf) = cf_list {
        let _ = plain.extend_from_slice(&cf);
    }
    let _ = plain.extend_from_slice(&mic);

    let mut out = Vec::new();
    let _ = out.push(MHdr::new(FrameType::JoinAccept).to_byte());
    let encrypted = crypto::encrypt_join_accept(key, &plain);
    let _ = out.extend_from_slice(&encrypted);
    out
}

/// Parse a data frame (uplink or downlink). FRMPayload is returned encrypted.
pub fn parse_data(buf: &[u8]) -> Result<Frame, ParseError> {
    if buf.len() < 1 + 7 + MIC_SIZE {
        return Err(ParseError::Truncated);
    }
    let mhdr = MHdr::from_byte(buf[0]);
    match mhdr.frame_type() {
        Some(
            FrameType::UnconfirmedDataUp
            | FrameType::UnconfirmedDataDown
            | FrameType::ConfirmedDataUp
            | FrameType::ConfirmedDataDown,
        ) => {}
        _ => return Err(ParseError::ReservedMessageType),
    }
    if mhdr.major() != 0 {
        return Err(ParseError::BadMajorVersion);
    }

    let mut dev_addr_bytes = [0u8; 4];
    dev_addr_bytes.copy_from_slice(&buf[1..5]);
    let f_ctrl = FCtrl::from_byte(buf[5]);
    let f_cnt = u16::from_le_bytes([buf[6], buf[7]]);
    let f_opts_len = f_ctrl.f_opts_len() as usize;

    let body = &buf[..buf.len() - MIC_SIZE];
    let fopts_start = 8;
    let fopts_end = fopts_start + f_opts_len;
    if fopts_end > body.len() {
        return Err(ParseError::InconsistentFOptsLen);
    }

    let mut f_opts: Vec<u8, 15> = Vec::new();
    f_opts
        .extend_from_slice(&body[fopts_start..fopts_end])
        .map_err(|_| ParseError::InconsistentFOptsLen)?;

    let rest = &body[fopts_end..];
    let (f_port, frm_payload_bytes) = if rest.is_empty() {
        (None, &rest[0..0])
    } else {
        (Some(rest[0]), &rest[1..])
    };

    let mut frm_payload: Vec<u8, MAX_FRM_PAYLOAD> = Vec::new();
    frm_payload
        .extend_from_slice(frm_payload_bytes)
        .map_err(|_| ParseError::Truncated)?;

    Ok(Frame::Data {
        mhdr,
        fhdr: FHdr {
            dev_addr: DevAddr::new(dev_addr_bytes),
            f_ctrl,
            f_cnt,
            f_opts,
        },
        f_port,
        frm_payload,
        mic: read_mic(buf)?,
    })
}

/// Serialize a data frame body up to (excluding) the MIC, so the caller can
/// compute the MIC over this output and append it.
pub fn serialize_data_unsigned(
    mhdr: MHdr,
    fhdr: &FHdr,
    f_port: Option<u8>,
    frm_payload: &[u8],
) -> Result<Vec<u8, MAX_FRAME_SIZE>, ParseError> {
    let mut out = Vec::new();
    out.push(mhdr.to_byte())
        .map_err(|_| ParseError::BufferTooSmall)?;
    fhdr.serialize_into(&mut out)?;
    if let Some(port) = f_port {
        out.push(port).map_err(|_| ParseError::BufferTooSmall)?;
    }
    out.extend_from_slice(frm_payload)
        .map_err(|_| ParseError::BufferTooSmall)?;
    Ok(out)
}

/// Parse any well-formed frame by dispatching on its MHDR frame type. Join
/// accept cannot be dispatched here since it requires a key to decrypt; use
/// [`parse_join_accept`] directly when `raw[0] & 0xE0 == FrameType::JoinAccept`.
pub fn parse(buf: &[u8]) -> Result<Frame, ParseError> {
    if buf.is_empty() {
        return Err(ParseError::Truncated);
    }
    match MHdr::from_byte(buf[0]).frame_type() {
        Some(FrameType::JoinRequest) => parse_join_request(buf),
        Some(FrameType::RejoinRequest) => parse_rejoin_request(buf),
        Some(
            FrameType::UnconfirmedDataUp
            | FrameType::UnconfirmedDataDown
            | FrameType::ConfirmedDataUp
            | FrameType::ConfirmedDataDown,
        ) => parse_data(buf),
        Some(FrameType::JoinAccept) => Err(ParseError::ReservedMessageType),
        Some(FrameType::Proprietary) | None => Err(ParseError::ReservedMessageType),
    }
}
