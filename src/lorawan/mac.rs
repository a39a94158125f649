//! MAC engine (C5): the `RESTORE -> START -> JOIN -> SEND -> CYCLE -> SLEEP`
//! state machine, window scheduling, MAC-command dispatch, and retransmission
//! policy tying together the codec, crypto, command store and confirm queue.

use heapless::Vec;

use super::phy::{PhyConfig, PhyLayer};
use super::region::{time_on_air_ms, Channel, DataRate, Region};
use crate::codec::{self, FCtrl, FHdr, Frame, FrameType, MHdr};
use crate::command_store::CommandStore;
use crate::commands::MacCommand;
use crate::config::device::{AESKey, DevAddr, EUI64, FCntId, MacVersion, NetworkActivation, SessionState};
use crate::confirm_queue::{ConfirmQueue, QueueError, RequestKind};
use crate::crypto::{self, CryptoError, Direction};
use crate::radio::Radio;
use crate::status::{EventInfo, StatusCode};
use crate::timer::Timer;

/// Maximum MAC payload size.
pub const MAX_MAC_PAYLOAD_SIZE: usize = 242;

/// Number of pending indications the MAC layer holds before the oldest is
/// dropped in favor of a new one.
pub const INDICATION_CAPACITY: usize = 8;

/// Map a frame-counter validation failure onto the indication delivered to
/// the caller, rather than the hard error the crypto engine itself raises.
fn fcnt_error_to_indication(error: CryptoError) -> EventInfo {
    match error {
        CryptoError::FcntDuplicated | CryptoError::FcntSmaller => EventInfo::DownlinkRepeated,
        CryptoError::FcntGapExceeded => EventInfo::DownlinkTooManyFramesLoss,
        _ => EventInfo::Error,
    }
}

/// MAC engine error.
#[derive(Debug)]
pub enum MacError<E> {
    /// Radio driver error.
    Radio(E),
    /// Frame failed MIC verification.
    InvalidMic,
    /// Output buffer too small for the frame being built.
    BufferTooSmall,
    /// Frame could not be parsed or is structurally invalid.
    InvalidFrame,
    /// No session is active.
    NotJoined,
    /// A request of this kind is already outstanding.
    Busy,
    /// No enabled channel is available for the requested operation.
    NoChannel,
    /// No join is in progress.
    NoJoinInProgress,
    /// Frame-counter or MIC validation rejected a downlink.
    Crypto(crypto::CryptoError),
    /// The command store or confirm queue rejected an operation.
    Queue(QueueError),
}

/// Top-level MAC state machine state (component C5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacState {
    /// Restoring session/command-store/confirm-queue state from NVM.
    Restore,
    /// Fresh start, no session restored.
    Start,
    /// A join procedure is in progress.
    Join,
    /// Preparing and transmitting a frame.
    Send,
    /// Waiting out the receive windows and duty-cycle cooldown after a send.
    Cycle,
    /// Idle; radio is asleep.
    Sleep,
}

struct JoinContext {
    dev_eui: EUI64,
    app_eui: EUI64,
    app_key: AESKey,
    nwk_key: Option<AESKey>,
    mac_version: MacVersion,
    dev_nonce: u16,
}

/// A downlink's decrypted application payload, handed back to the caller of
/// [`MacLayer::process`] alongside its port.
#[derive(Debug, Clone)]
pub struct DownlinkPayload {
    /// FPort the payload arrived on.
    pub f_port: u8,
    /// Decrypted application payload.
    pub data: Vec<u8, MAX_MAC_PAYLOAD_SIZE>,
}

/// The MAC layer (C5): owns the PHY, region table, session state, pending
/// command store and confirm queue, and drives the join/send/receive cycle.
pub struct MacLayer<R: Radio, REG: Region, TMR: Timer> {
    phy: PhyLayer<R>,
    region: REG,
    session: SessionState,
    state: MacState,
    command_store: CommandStore,
    confirm_queue: ConfirmQueue,
    network_activation: NetworkActivation,
    join_ctx: Option<JoinContext>,
    last_join_nonce: Option<u32>,
    duty_cycle_timer: TMR,
    duty_cycle_active: bool,
    last_downlink: Option<DownlinkPayload>,
    last_rx_ack: bool,
    indications: Vec<EventInfo, INDICATION_CAPACITY>,
}

impl<R: Radio, REG: Region, TMR: Timer> MacLayer<R, REG, TMR> {
    /// Create a new MAC layer.
    pub fn new(radio: R, region: REG, session: SessionState, duty_cycle_timer: TMR) -> Self {
        let network_activation = if session.is_joined() {
            NetworkActivation::Abp
        } else {
            NetworkActivation::None
        };
        Self {
            phy: PhyLayer::new(radio, PhyConfig::default()),
            region,
            session,
            state: MacState::Start,
            command_store: CommandStore::new(),
            confirm_queue: ConfirmQueue::new(),
            network_activation,
            join_ctx: None,
            last_join_nonce: None,
            duty_cycle_timer,
            duty_cycle_active: false,
            last_downlink: None,
            last_rx_ack: false,
            indications: Vec::new(),
        }
    }

    /// Initialize the underlying radio.
    pub fn init(&mut self) -> Result<(), MacError<R::Error>> {
        self.state = MacState::Restore;
        self.phy.init().map_err(MacError::Radio)?;
        self.state = if self.session.is_joined() {
            MacState::Cycle
        } else {
            MacState::Start
        };
        Ok(())
    }

    /// Current state-machine state.
    pub fn state(&self) -> MacState {
        self.state
    }

    /// Whether a session is active.
    pub fn is_joined(&self) -> bool {
        self.session.is_joined()
    }

    /// Current session state, for NVM persistence.
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// How the current session was activated, for the MIB.
    pub fn network_activation(&self) -> NetworkActivation {
        self.network_activation
    }

    /// Take the application payload (and its port) from the most recently
    /// handled downlink, if any.
    pub fn take_downlink(&mut self) -> Option<DownlinkPayload> {
        self.last_downlink.take()
    }

    /// Whether the last confirmed uplink was acknowledged.
    pub fn last_tx_acked(&self) -> bool {
        self.last_rx_ack
    }

    /// Current uplink data rate, for class-B time-on-air estimation.
    pub fn data_rate(&self) -> DataRate {
        self.region.data_rate()
    }

    /// Record an indication for later delivery, dropping the oldest pending
    /// one if the ring is already full. Mirrors an `MlmeIndication`/
    /// `McpsIndication` callback without requiring a callback/closure to be
    /// threaded through every caller.
    fn raise_indication(&mut self, info: EventInfo) {
        if self.indications.is_full() {
            self.indications.remove(0);
        }
        let _ = self.indications.push(info);
    }

    /// Drain all indications raised since the last call.
    pub fn take_indications(&mut self) -> Vec<EventInfo, INDICATION_CAPACITY> {
        core::mem::take(&mut self.indications)
    }

    /// Install (or replace) a multicast group's session context, deriving its
    /// keys from `root_key` (the device's `AppKey` under 1.1, or `GenAppKey`
    /// under 1.0.x) and the group address.
    pub fn install_mc_group(&mut self, group_id: u8, root_key: &AESKey, mc_addr: DevAddr) -> bool {
        let context = crypto::derive_mc_group(root_key, self.session.mac_version, mc_addr);
        self.session.install_mc_group(group_id, context)
    }

    /// MLME-Join: begin an OTAA join procedure.
    pub fn mlme_join(
        &mut self,
        dev_eui: EUI64,
        app_eui: EUI64,
        app_key: [u8; 16],
        nwk_key: Option<[u8; 16]>,
        mac_version: MacVersion,
    ) -> Result<StatusCode, MacError<R::Error>> {
        if self.confirm_queue.is_cmd_active(RequestKind::MlmeJoin) {
            return Ok(StatusCode::Busy);
        }
        self.confirm_queue
            .add(RequestKind::MlmeJoin, false)
            .map_err(MacError::Queue)?;
        let dev_nonce = self.join_ctx.as_ref().map(|c| c.dev_nonce + 1).unwrap_or(0);
        self.join_ctx = Some(JoinContext {
            dev_eui,
            app_eui,
            app_key: AESKey::new(app_key),
            nwk_key: nwk_key.map(AESKey::new),
            mac_version,
            dev_nonce,
        });
        self.state = MacState::Join;
        self.join_request()?;
        Ok(StatusCode::Ok)
    }

    fn join_key(&self) -> Result<AESKey, MacError<R::Error>> {
        let ctx = self.join_ctx.as_ref().ok_or(MacError::NoJoinInProgress)?;
        Ok(match ctx.mac_version {
            MacVersion::V1_0_x => ctx.app_key.clone(),
            MacVersion::V1_1 => ctx.nwk_key.clone().unwrap_or_else(|| ctx.app_key.clone()),
        })
    }

    fn join_request(&mut self) -> Result<(), MacError<R::Error>> {
        let channel = self
            .region
            .get_next_join_channel()
            .ok_or(MacError::NoChannel)?;
        self.phy
            .configure_tx::<REG>(&channel, self.region.data_rate())
            .map_err(MacError::Radio)?;

        let key = self.join_key()?;
        let ctx = self.join_ctx.as_ref().ok_or(MacError::NoJoinInProgress)?;
        let unsigned = codec::serialize_join_request_unsigned(ctx.app_eui, ctx.dev_eui, ctx.dev_nonce);
        let mic = crypto::compute_join_request_mic(&key, &unsigned);
        let mut frame: Vec<u8, 23> = Vec::new();
        frame
            .extend_from_slice(&unsigned)
            .map_err(|_| MacError::BufferTooSmall)?;
        frame
            .extend_from_slice(&mic)
            .map_err(|_| MacError::BufferTooSmall)?;

        self.phy.transmit(&frame).map_err(MacError::Radio)?;

        let mut rx_buf = [0u8; 64];
        self.phy
            .configure_join_rx1::<REG>(&self.region, &channel)
            .map_err(MacError::Radio)?;
        if let Ok(len) = self.phy.receive(&mut rx_buf) {
            if len > 0 && self.handle_join_accept(&rx_buf[..len]).is_ok() {
                return Ok(());
            }
        }
        self.phy
            .configure_join_rx2::<REG>(&self.region)
            .map_err(MacError::Radio)?;
        if let Ok(len) = self.phy.receive(&mut rx_buf) {
            if len > 0 && self.handle_join_accept(&rx_buf[..len]).is_ok() {
                return Ok(());
            }
        }

        self.confirm_queue
            .set_status(RequestKind::MlmeJoin, StatusCode::Error)
            .ok();
        self.state = MacState::Start;
        Ok(())
    }

    fn handle_join_accept(&mut self, buf: &[u8]) -> Result<(), MacError<R::Error>> {
        let key = self.join_key()?;
        let ctx = self.join_ctx.take().ok_or(MacError::NoJoinInProgress)?;

        let frame = codec::parse_join_accept(buf, &key).map_err(|_| MacError::InvalidFrame)?;
        let (join_nonce, net_id, dev_addr, dl_settings, rx_delay, cf_list, mic) = match frame {
            Frame::JoinAccept {
                join_nonce,
                net_id,
                dev_addr,
                dl_settings,
                rx_delay,
                cf_list,
                mic,
            } => (join_nonce, net_id, dev_addr, dl_settings, rx_delay, cf_list, mic),
            _ => return Err(MacError::InvalidFrame),
        };
        let _ = (net_id, rx_delay, cf_list);

        let mut body: Vec<u8, 28> = Vec::new();
        let _ = body.extend_from_slice(&join_nonce);
        let _ = body.extend_from_slice(&net_id);
        let _ = body.extend_from_slice(dev_addr.as_bytes());
        let _ = body.push(dl_settings.to_byte());
        let _ = body.push(rx_delay);
        if let Some(cf) = cf_list {
            let _ = body.extend_from_slice(&cf);
        }
        let expected_mic = crypto::compute_join_request_mic(&key, &body);
        if expected_mic != mic {
            self.join_ctx = Some(ctx);
            return Err(MacError::InvalidMic);
        }

        let join_nonce_u32 = u32::from_le_bytes([join_nonce[0], join_nonce[1], join_nonce[2], 0]);
        crypto::validate_join_nonce(self.last_join_nonce, join_nonce_u32)
            .map_err(MacError::Crypto)?;

        let keys = match ctx.mac_version {
            MacVersion::V1_0_x => {
                crypto::derive_session_keys_1_0(&ctx.app_key, join_nonce, net_id, ctx.dev_nonce)
            }
            MacVersion::V1_1 => {
                let nwk_key = ctx.nwk_key.clone().unwrap_or_else(|| ctx.app_key.clone());
                crypto::derive_session_keys_1_1(
                    &nwk_key,
                    &ctx.app_key,
                    join_nonce,
                    ctx.app_eui,
                    ctx.dev_nonce,
                )
            }
        };

        self.session = SessionState::from_join_accept(
            dev_addr,
            keys,
            ctx.mac_version,
            dl_settings.rx1_dr_offset(),
            dl_settings.rx2_data_rate(),
        );
        self.network_activation = NetworkActivation::Otaa;
        self.last_join_nonce = Some(join_nonce_u32);
        self.command_store = CommandStore::new();
        self.state = MacState::Cycle;

        self.confirm_queue
            .set_status(RequestKind::MlmeJoin, StatusCode::Ok)
            .ok();
        Ok(())
    }

    /// MCPS-Unconfirmed: send an unconfirmed uplink.
    pub fn mcps_unconfirmed(&mut self, f_port: u8, data: &[u8]) -> Result<StatusCode, MacError<R::Error>> {
        self.mcps_request(RequestKind::McpsUnconfirmed, FrameType::UnconfirmedDataUp, f_port, data)
    }

    /// MCPS-Confirmed: send a confirmed uplink.
    pub fn mcps_confirmed(&mut self, f_port: u8, data: &[u8]) -> Result<StatusCode, MacError<R::Error>> {
        self.mcps_request(RequestKind::McpsConfirmed, FrameType::ConfirmedDataUp, f_port, data)
    }

    fn mcps_request(
        &mut self,
        kind: RequestKind,
        frame_type: FrameType,
        f_port: u8,
        data: &[u8],
    ) -> Result<StatusCode, MacError<R::Error>> {
        if !self.session.is_joined() {
            return Ok(StatusCode::NoNetworkJoined);
        }
        if self.confirm_queue.is_cmd_active(RequestKind::McpsUnconfirmed)
            || self.confirm_queue.is_cmd_active(RequestKind::McpsConfirmed)
        {
            return Ok(StatusCode::Busy);
        }
        if self.duty_cycle_active {
            match self.duty_cycle_timer.poll() {
                Ok(()) => self.duty_cycle_active = false,
                Err(_) => return Ok(StatusCode::DutyCycleRestricted),
            }
        }
        self.confirm_queue.add(kind, false).map_err(MacError::Queue)?;
        self.state = MacState::Send;

        let frame = self.build_uplink_frame(frame_type, f_port, data)?;

        let status = if kind == RequestKind::McpsConfirmed {
            self.send_confirmed(&frame)?
        } else {
            self.transmit_and_listen(&frame)?;
            StatusCode::Ok
        };

        self.confirm_queue.set_status(kind, status).ok();
        self.state = MacState::Cycle;
        Ok(status)
    }

    /// Transmit `frame` up to `session.nb_trans` times (`NbTrans`, negotiated
    /// via `LinkADRReq`), halving the data rate every two unacknowledged
    /// attempts down to the region's floor, stopping as soon as a downlink
    /// carries the ACK bit.
    fn send_confirmed(&mut self, frame: &[u8]) -> Result<StatusCode, MacError<R::Error>> {
        let max_attempts = self.session.nb_trans.max(1);
        for attempt in 0..max_attempts {
            self.transmit_and_listen(frame)?;
            if self.last_rx_ack {
                return Ok(StatusCode::Ok);
            }
            if attempt % 2 == 1 {
                let floor = self.region.data_rate().to_index();
                if floor > 0 {
                    self.region.set_data_rate(floor - 1);
                }
            }
        }
        Ok(StatusCode::Error)
    }

    fn build_uplink_frame(
        &mut self,
        frame_type: FrameType,
        f_port: u8,
        data: &[u8],
    ) -> Result<Vec<u8, 255>, MacError<R::Error>> {
        self.command_store.serialize(15);
        let mut f_opts: Vec<u8, 15> = Vec::new();
        self.command_store.write_into(&mut f_opts);

        let fcnt_full = self.session.counters.get(FCntId::Uplink);
        let fhdr = FHdr {
            dev_addr: self.session.dev_addr,
            f_ctrl: FCtrl::new_uplink(false, false, self.last_rx_ack, f_opts.len() as u8),
            f_cnt: fcnt_full as u16,
            f_opts,
        };

        let key = if f_port == 0 {
            self.session.keys.nwk_s_enc_key.clone()
        } else {
            self.session.app_skey().clone()
        };
        let encrypted = crypto::encrypt_payload(&key, self.session.dev_addr, fcnt_full, Direction::Up, data);

        let unsigned = codec::serialize_data_unsigned(MHdr::new(frame_type), &fhdr, Some(f_port), &encrypted)
            .map_err(|_| MacError::BufferTooSmall)?;
        let mic = crypto::compute_mic(
            self.session.nwk_skey(),
            &unsigned,
            self.session.dev_addr,
            fcnt_full,
            Direction::Up,
        );
        let mut out: Vec<u8, 255> = Vec::new();
        out.extend_from_slice(&unsigned).map_err(|_| MacError::BufferTooSmall)?;
        out.extend_from_slice(&mic).map_err(|_| MacError::BufferTooSmall)?;

        // NbTrans retransmissions of a confirmed uplink reuse this same
        // counter value and frame; it only advances once per distinct
        // application request.
        self.session.counters.increment_uplink();
        self.command_store.remove_non_sticky();
        Ok(out)
    }

    /// Pick a channel, transmit `frame`, arm the duty-cycle cooldown if the
    /// network has negotiated one, and service RX1/RX2.
    fn transmit_and_listen(&mut self, frame: &[u8]) -> Result<(), MacError<R::Error>> {
        let channel = self.region.get_next_channel().ok_or(MacError::NoChannel)?;
        let data_rate = self.region.data_rate();
        self.phy
            .configure_tx::<REG>(&channel, data_rate)
            .map_err(MacError::Radio)?;

        self.phy.transmit(frame).map_err(MacError::Radio)?;

        if self.session.max_duty_cycle > 0 {
            let on_air_ms = time_on_air_ms(data_rate, frame.len());
            let off_air_ms = on_air_ms.saturating_mul((1u32 << self.session.max_duty_cycle) - 1);
            if off_air_ms > 0 {
                self.duty_cycle_timer.start(off_air_ms);
                self.duty_cycle_active = true;
            }
        }

        let mut rx_buf = [0u8; 255];
        self.phy
            .configure_rx1::<REG>(&self.region, &channel)
            .map_err(MacError::Radio)?;
        self.last_rx_ack = false;
        if let Ok(len) = self.phy.receive(&mut rx_buf) {
            if len > 0 {
                self.receive_and_handle(&rx_buf[..len])?;
                return Ok(());
            }
        }
        self.phy.configure_rx2::<REG>(&self.region).map_err(MacError::Radio)?;
        if let Ok(len) = self.phy.receive(&mut rx_buf) {
            if len > 0 {
                self.receive_and_handle(&rx_buf[..len])?;
            }
        }
        Ok(())
    }

    /// Parse and dispatch a received frame (data uplink/downlink only; join
    /// accept is handled separately inside the join procedure).
    ///
    /// Per-frame faults (address mismatch, stale/duplicate/out-of-window
    /// frame counter, bad MIC) are surfaced as an [`EventInfo`] indication
    /// (drained via [`Self::take_indications`]) rather than a propagated
    /// `Err`: a rejected downlink does not unwind the uplink request that
    /// opened this receive window.
    fn receive_and_handle(&mut self, buf: &[u8]) -> Result<(), MacError<R::Error>> {
        let frame = codec::parse(buf).map_err(|_| MacError::InvalidFrame)?;
        let (mhdr, fhdr, f_port, frm_payload, mic) = match frame {
            Frame::Data {
                mhdr,
                fhdr,
                f_port,
                frm_payload,
                mic,
            } => (mhdr, fhdr, f_port, frm_payload, mic),
            _ => return Err(MacError::InvalidFrame),
        };

        let mc_group = if fhdr.dev_addr == self.session.dev_addr {
            None
        } else {
            match self.session.find_mc_group(fhdr.dev_addr) {
                Some((group_id, ctx)) => Some((group_id, ctx.mc_app_s_key.clone(), ctx.mc_nwk_s_key.clone())),
                None => {
                    self.raise_indication(EventInfo::AddressFail);
                    return Ok(());
                }
            }
        };

        let (cnt_id, nwk_key, app_key) = match &mc_group {
            Some((group_id, app_key, nwk_key)) => {
                (FCntId::MulticastDown(*group_id), nwk_key.clone(), app_key.clone())
            }
            None => {
                let cnt_id = if f_port == Some(0) || f_port.is_none() {
                    FCntId::NetworkDown
                } else {
                    FCntId::AppDown
                };
                (cnt_id, self.session.nwk_skey().clone(), self.session.app_skey().clone())
            }
        };

        let current = self.session.counters.get(cnt_id);
        let wire_fcnt = crypto::reconstruct_fcnt32(current, fhdr.f_cnt);
        let new_fcnt = match crypto::validate_downlink_counter(current, wire_fcnt, self.session.mac_version) {
            Ok(v) => v,
            Err(e) => {
                self.raise_indication(fcnt_error_to_indication(e));
                return Ok(());
            }
        };

        let unsigned = codec::serialize_data_unsigned(mhdr, &fhdr, f_port, &frm_payload)
            .map_err(|_| MacError::BufferTooSmall)?;
        if crypto::verify_mic(&nwk_key, &unsigned, fhdr.dev_addr, new_fcnt, Direction::Down, mic).is_err() {
            self.raise_indication(EventInfo::MicFail);
            return Ok(());
        }
        self.session.counters.set(cnt_id, new_fcnt);

        let key = if mc_group.is_some() {
            app_key
        } else if f_port == Some(0) || f_port.is_none() {
            self.session.keys.nwk_s_enc_key.clone()
        } else {
            self.session.app_skey().clone()
        };
        let decrypted = crypto::encrypt_payload(&key, fhdr.dev_addr, new_fcnt, Direction::Down, &frm_payload);

        if mc_group.is_none() {
            self.last_rx_ack = fhdr.f_ctrl.ack();
        }

        if mc_group.is_some() {
            // Multicast downlinks carry application payload only; there is no
            // per-group NwkSEncKey to decrypt a piggybacked FOpts/FPort-0
            // command block against.
            if !decrypted.is_empty() {
                let mut data = Vec::new();
                let _ = data.extend_from_slice(&decrypted);
                self.last_downlink = Some(DownlinkPayload {
                    f_port: f_port.unwrap_or(0),
                    data,
                });
            }
        } else if f_port == Some(0) {
            self.dispatch_commands(&decrypted)?;
        } else {
            self.dispatch_commands(&fhdr.f_opts)?;
            if !decrypted.is_empty() {
                let mut data = Vec::new();
                let _ = data.extend_from_slice(&decrypted);
                self.last_downlink = Some(DownlinkPayload {
                    f_port: f_port.unwrap_or(0),
                    data,
                });
            }
        }

        // A ConfirmedDataDown's ACK bit is set on the *next* uplink via
        // `last_rx_ack`, read back in `build_uplink_frame`.
        self.command_store.remove_sticky_answers();
        self.raise_indication(EventInfo::Ok);
        Ok(())
    }

    fn dispatch_commands(&mut self, bytes: &[u8]) -> Result<(), MacError<R::Error>> {
        let mut i = 0;
        while i < bytes.len() {
            let cid = bytes[i];
            i += 1;
            let len = match command_payload_len(cid) {
                Some(len) => len,
                None => break,
            };
            if i + len > bytes.len() {
                break;
            }
            if let Ok(cmd) = MacCommand::from_bytes(cid, &bytes[i..i + len]) {
                self.process_mac_command(cmd);
            }
            i += len;
        }
        Ok(())
    }

    fn process_mac_command(&mut self, command: MacCommand) {
        match command {
            MacCommand::LinkADRReq {
                data_rate,
                ch_mask,
                ch_mask_cntl,
                nb_trans,
                ..
            } => {
                let data_rate_ack = self.region.set_data_rate(data_rate);
                let channel_mask_ack = self.region.apply_channel_mask(ch_mask_cntl, ch_mask);
                if nb_trans > 0 {
                    self.session.nb_trans = nb_trans;
                }
                let _ = self.command_store.add(&MacCommand::LinkADRAns {
                    power_ack: true,
                    data_rate_ack,
                    channel_mask_ack,
                });
            }
            MacCommand::DutyCycleReq { max_duty_cycle } => {
                self.session.max_duty_cycle = max_duty_cycle;
                let _ = self.command_store.add(&MacCommand::DutyCycleAns);
            }
            MacCommand::RXParamSetupReq {
                rx1_dr_offset,
                rx2_data_rate,
                freq,
            } => {
                let channel_ack = self.region.is_valid_frequency(freq);
                if channel_ack {
                    self.session.rx1_dr_offset = rx1_dr_offset;
                    self.session.rx2_data_rate = rx2_data_rate;
                    self.session.rx2_frequency = freq;
                }
                let _ = self.command_store.add(&MacCommand::RXParamSetupAns {
                    rx1_dr_offset_ack: channel_ack,
                    rx2_data_rate_ack: channel_ack,
                    channel_ack,
                });
            }
            MacCommand::DevStatusReq => {
                let _ = self.command_store.add(&MacCommand::DevStatusAns {
                    battery: 255,
                    margin: 0,
                });
            }
            MacCommand::NewChannelReq { .. } => {
                // US915's channel plan is fixed by region table; new channels
                // are not accepted outside the region's own frequency set.
                let _ = self.command_store.add(&MacCommand::NewChannelAns {
                    channel_freq_ok: false,
                    data_rate_ok: false,
                });
            }
            MacCommand::RXTimingSetupReq { delay } => {
                let _ = delay;
                let _ = self.command_store.add(&MacCommand::RXTimingSetupAns);
            }
            MacCommand::TxParamSetupReq { .. } => {
                let _ = self.command_store.add(&MacCommand::TxParamSetupAns);
            }
            MacCommand::DlChannelReq { freq, .. } => {
                let channel_freq_ok = self.region.is_valid_frequency(freq);
                let _ = self.command_store.add(&MacCommand::DlChannelAns {
                    channel_freq_ok,
                    uplink_freq_exists: true,
                });
            }
            MacCommand::LinkCheckAns { .. }
            | MacCommand::DeviceTimeAns { .. }
            | MacCommand::PingSlotInfoAns
            | MacCommand::PingSlotChannelAns { .. }
            | MacCommand::BeaconTimingAns { .. } => {
                // Answers to device-initiated requests; the class-B engine
                // (for beacon/ping-slot answers) or the confirm queue
                // (for LinkCheck) consumes these via their own channel.
                self.confirm_queue
                    .set_status_common(StatusCode::Ok);
            }
            MacCommand::BeaconFreqReq { frequency } => {
                let ok = self.region.is_valid_frequency(frequency);
                let _ = self.command_store.add(&MacCommand::BeaconFreqAns {
                    status: if ok { 0 } else { 1 },
                });
            }
            MacCommand::LinkCheckReq
            | MacCommand::DutyCycleAns
            | MacCommand::RXParamSetupAns { .. }
            | MacCommand::NewChannelAns { .. }
            | MacCommand::RXTimingSetupAns
            | MacCommand::TxParamSetupAns
            | MacCommand::DlChannelAns { .. }
            | MacCommand::DeviceTimeReq
            | MacCommand::LinkADRAns { .. }
            | MacCommand::DevStatusAns { .. }
            | MacCommand::PingSlotInfoReq { .. }
            | MacCommand::PingSlotChannelReq { .. }
            | MacCommand::BeaconTimingReq
            | MacCommand::BeaconFreqAns { .. } => {
                // Device-originated commands cannot arrive as downlink content;
                // ignore rather than fault the frame.
            }
        }
    }

    /// Drain the confirm queue, delivering at most one pass of ready
    /// confirmations to the caller.
    pub fn process(&mut self) -> Vec<(RequestKind, StatusCode), { crate::confirm_queue::CAPACITY }> {
        let mut out = Vec::new();
        self.confirm_queue.handle_all(|kind, status| {
            let _ = out.push((kind, status));
        });
        out
    }

    /// Next channel from the region's beacon channel plan (class B).
    pub fn next_beacon_channel(&mut self) -> Option<Channel> {
        self.region.get_next_beacon_channel()
    }

    /// RX2 frequency for this region, used as the class-B ping-slot default.
    pub fn rx2_frequency(&self) -> u32 {
        self.region.rx2_window().0
    }

    /// Session device address, for class-B ping-slot offset calculation.
    pub fn dev_addr(&self) -> DevAddr {
        self.session.dev_addr
    }

    /// Network session encryption key, for class-B ping-slot offset calculation.
    pub fn nwk_s_enc_key(&self) -> &AESKey {
        &self.session.keys.nwk_s_enc_key
    }

    /// Open an arbitrary RX window at `frequency`/`data_rate` without MAC
    /// framing, for class-B beacon reception (beacons are not LoRaWAN data
    /// frames, so they bypass [`Self::receive_and_handle`]).
    pub fn raw_receive(
        &mut self,
        frequency: u32,
        data_rate: DataRate,
        timeout_ms: u32,
        buf: &mut [u8],
    ) -> Result<usize, MacError<R::Error>> {
        self.phy
            .configure_rx::<REG>(frequency, data_rate, timeout_ms)
            .map_err(MacError::Radio)?;
        self.phy.receive(buf).map_err(MacError::Radio)
    }

    /// Open a ping-slot RX window (class B) at `frequency`/`data_rate` and
    /// dispatch a frame, including MAC-command processing, if one arrives.
    pub fn receive_ping_slot(
        &mut self,
        frequency: u32,
        data_rate: DataRate,
        timeout_ms: u32,
        buf: &mut [u8],
    ) -> Result<(), MacError<R::Error>> {
        if !self.session.is_joined() {
            return Ok(());
        }
        self.phy
            .configure_rx::<REG>(frequency, data_rate, timeout_ms)
            .map_err(MacError::Radio)?;
        if let Ok(len) = self.phy.receive(buf) {
            if len > 0 {
                self.receive_and_handle(&buf[..len])?;
            }
        }
        Ok(())
    }

    /// Open a continuous RX2 window and dispatch a frame if one arrives.
    /// Meant to be polled from a Class C device's idle loop between
    /// uplinks, rather than from [`Self::send_data`]'s own RX1/RX2 pair.
    pub fn listen_class_c(&mut self, buf: &mut [u8]) -> Result<(), MacError<R::Error>> {
        if !self.session.is_joined() {
            return Ok(());
        }
        self.phy.configure_rx2::<REG>(&self.region).map_err(MacError::Radio)?;
        if let Ok(len) = self.phy.receive(buf) {
            if len > 0 {
                self.receive_and_handle(&buf[..len])?;
            }
        }
        Ok(())
    }

    /// Request a channel-plan reconfiguration specific to the underlying
    /// region, via a safe downcast rather than an unchecked pointer cast.
    pub fn configure_for_ttn(&mut self) -> Result<(), MacError<R::Error>> {
        if let Some(us915) = self
            .region
            .as_any_mut()
            .downcast_mut::<super::region::US915>()
        {
            us915.configure_ttn_us915();
        }
        Ok(())
    }
}

/// Wire payload length for a known CID, independent of
/// [`MacCommand::from_bytes`]'s own strict length check (which needs the
/// length to validate, not to discover it).
fn command_payload_len(cid: u8) -> Option<usize> {
    Some(match cid {
        0x02 | 0x06 | 0x84 | 0x88 | 0x89 | 0x0D | 0x90 | 0x12 => 0,
        0x83 | 0x04 | 0x85 | 0x87 | 0x08 | 0x09 | 0x8A | 0x10 | 0x91 | 0x93 => 1,
        0x82 | 0x86 => 2,
        0x92 | 0x13 => 3,
        0x03 | 0x05 | 0x0A | 0x11 => 4,
        0x07 | 0x8D => 5,
        _ => return None,
    })
}
