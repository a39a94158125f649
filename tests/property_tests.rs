//! Exercises the testable properties and end-to-end scenarios: command-store
//! bookkeeping, frame-counter replay rejection, codec round-trips, MIC
//! sensitivity, confirm-queue capacity/ordering, and beacon phase tracking.
#![no_std]

use lorawan::{
    class::class_b::{BeaconState, BeaconTracker, BEACON_PERIOD_MS},
    codec::{self, FCtrl, FHdr, FrameType, MHdr},
    command_store::CommandStore,
    commands::MacCommand,
    config::device::{AESKey, DevAddr, MacVersion, SessionState},
    confirm_queue::{ConfirmQueue, RequestKind},
    crypto::{self, CryptoError, Direction},
    lorawan::{mac::MacLayer, region::US915},
    status::{EventInfo, StatusCode},
    timer::SoftwareTimer,
};

mod mock;
use mock::{MockRadio, TestClock};

// P1: serialized_size always equals the sum of (1 + payload-size) over the
// entries actually remaining, across add/remove-non-sticky/remove-sticky.
#[test]
fn p1_command_store_serialized_size_matches_contents() {
    let mut store = CommandStore::new();

    // RXTimingSetupAns is a sticky answer (must survive until a downlink ACKs
    // it); LinkCheckAns is not.
    let sticky = MacCommand::RXTimingSetupAns;
    let non_sticky = MacCommand::LinkCheckAns { margin: 20, gateway_count: 1 };

    store.add(&sticky).unwrap();
    store.add(&non_sticky).unwrap();
    assert_eq!(store.serialized_size(), 1 + sticky.len() + 1 + non_sticky.len());

    store.remove_non_sticky();
    assert_eq!(store.count(), 1);
    assert_eq!(store.serialized_size(), 1 + sticky.len());

    store.remove_sticky_answers();
    assert_eq!(store.count(), 0);
    assert_eq!(store.serialized_size(), 0);
}

// Scenario 4: enqueue to capacity, overflow, then serialize with a byte
// budget that only fits a prefix of the entries.
#[test]
fn scenario4_command_store_overflow_then_serialize() {
    let mut store = CommandStore::new();
    let cmd = MacCommand::DutyCycleAns;

    for _ in 0..15 {
        store.add(&cmd).unwrap();
    }
    assert_eq!(store.count(), 15);
    assert!(store.add(&cmd).is_err());

    // Each DutyCycleAns serializes to 1 byte (CID only, no payload), so a
    // 10-byte budget keeps the first 10 and drops the rest.
    let (written, truncated) = store.serialize(10);
    assert_eq!(written, 10);
    assert!(truncated);
    assert_eq!(store.count(), 10);
}

// P2 / scenario 3: downlink counter replay rejection.
#[test]
fn p2_downlink_counter_replay_rules() {
    assert_eq!(
        crypto::validate_downlink_counter(5, 6, MacVersion::V1_0_x),
        Ok(6)
    );
    assert_eq!(
        crypto::validate_downlink_counter(6, 6, MacVersion::V1_0_x),
        Err(CryptoError::FcntDuplicated)
    );
    assert_eq!(
        crypto::validate_downlink_counter(6, 5, MacVersion::V1_0_x),
        Err(CryptoError::FcntSmaller)
    );

    // A gap larger than MAX_FCNT_GAP is rejected under 1.0.x.
    let too_far = crypto::MAX_FCNT_GAP + 1;
    assert_eq!(
        crypto::validate_downlink_counter(0, too_far, MacVersion::V1_0_x),
        Err(CryptoError::FcntGapExceeded)
    );
    assert_eq!(
        crypto::validate_downlink_counter(0, crypto::MAX_FCNT_GAP, MacVersion::V1_0_x),
        Ok(crypto::MAX_FCNT_GAP)
    );
}

// P3: parse(serialize(x)) reproduces the same structure, for a join-request
// and an unconfirmed data uplink.
#[test]
fn p3_codec_round_trip_join_request() {
    let join_eui = [0xAB, 0xCD, 0xEF, 0x01, 0x02, 0x03, 0x04, 0x05];
    let dev_eui = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77];
    let dev_nonce = 0x1234;
    let app_key = AESKey::new([0x2B; 16]);

    let unsigned = codec::serialize_join_request_unsigned(join_eui, dev_eui, dev_nonce);
    assert_eq!(unsigned.len(), 19);

    let mic = crypto::compute_join_request_mic(&app_key, &unsigned);
    let mut frame = unsigned.clone();
    frame.extend_from_slice(&mic).unwrap();
    assert_eq!(frame.len(), 23);
    assert_eq!(frame[0], 0x00);

    match codec::parse(&frame).unwrap() {
        codec::Frame::JoinRequest {
            join_eui: je,
            dev_eui: de,
            dev_nonce: dn,
            mic: m,
        } => {
            assert_eq!(je, join_eui);
            assert_eq!(de, dev_eui);
            assert_eq!(dn, dev_nonce);
            assert_eq!(m, mic);
        }
        _ => panic!("expected a join-request frame"),
    }
}

#[test]
fn p3_codec_round_trip_data_frame() {
    let dev_addr = DevAddr::from(0x0102_0304);
    let fhdr = FHdr {
        dev_addr,
        f_ctrl: FCtrl::new_uplink(false, false, false, 0),
        f_cnt: 1,
        f_opts: heapless::Vec::new(),
    };
    let unsigned =
        codec::serialize_data_unsigned(MHdr::new(FrameType::UnconfirmedDataUp), &fhdr, Some(2), b"HELLO").unwrap();

    let key = AESKey::new([0x01; 16]);
    let mic = crypto::compute_mic(&key, &unsigned, dev_addr, 1, Direction::Up);
    let mut frame = unsigned.clone();
    frame.extend_from_slice(&mic).unwrap();

    match codec::parse(&frame).unwrap() {
        codec::Frame::Data {
            fhdr: parsed_fhdr,
            f_port,
            frm_payload,
            mic: parsed_mic,
            ..
        } => {
            assert_eq!(parsed_fhdr.dev_addr, dev_addr);
            assert_eq!(parsed_fhdr.f_cnt, 1);
            assert_eq!(f_port, Some(2));
            assert_eq!(&frm_payload[..], b"HELLO");
            assert_eq!(parsed_mic, mic);
        }
        _ => panic!("expected a data frame"),
    }
}

// Scenario 2 / P4: deterministic encryption and MIC, and MIC sensitivity to a
// single flipped ciphertext byte.
#[test]
fn scenario2_uplink_encryption_is_deterministic_and_mic_flip_sensitive() {
    let dev_addr = DevAddr::from(0x0102_0304);
    let app_skey = AESKey::new([0x01; 16]);
    let nwk_s_enc_key = AESKey::new([0x02; 16]);

    let encrypted_a = crypto::encrypt_payload(&app_skey, dev_addr, 1, Direction::Up, b"HELLO");
    let encrypted_b = crypto::encrypt_payload(&app_skey, dev_addr, 1, Direction::Up, b"HELLO");
    assert_eq!(encrypted_a, encrypted_b);
    assert_ne!(&encrypted_a[..], b"HELLO");

    let fhdr = FHdr {
        dev_addr,
        f_ctrl: FCtrl::new_uplink(false, false, false, 0),
        f_cnt: 1,
        f_opts: heapless::Vec::new(),
    };
    let unsigned =
        codec::serialize_data_unsigned(MHdr::new(FrameType::UnconfirmedDataUp), &fhdr, Some(2), &encrypted_a).unwrap();
    let mic = crypto::compute_mic(&nwk_s_enc_key, &unsigned, dev_addr, 1, Direction::Up);
    assert!(crypto::verify_mic(&nwk_s_enc_key, &unsigned, dev_addr, 1, Direction::Up, mic).is_ok());

    let mut corrupted = unsigned.clone();
    let last = corrupted.len() - 1;
    corrupted[last] ^= 0x01;
    assert!(crypto::verify_mic(&nwk_s_enc_key, &corrupted, dev_addr, 1, Direction::Up, mic).is_err());
}

// P5: confirm-queue capacity and kind-uniqueness bookkeeping.
#[test]
fn p5_confirm_queue_capacity_and_uniqueness() {
    let mut queue = ConfirmQueue::new();
    let kinds = [
        RequestKind::MlmeJoin,
        RequestKind::MlmeLinkCheck,
        RequestKind::MlmeTxCw,
        RequestKind::MlmeDeviceTime,
        RequestKind::MlmePingSlotInfo,
    ];
    for kind in kinds {
        queue.add(kind, false).unwrap();
    }
    assert_eq!(queue.count(), lorawan::confirm_queue::CAPACITY);
    assert!(queue.is_full());
    assert_eq!(queue.is_full(), queue.count() == lorawan::confirm_queue::CAPACITY);

    assert!(queue.add(RequestKind::MlmeBeaconTiming, false).is_err());
}

// Scenario 5: confirm-queue re-ordering on a partial drain.
#[test]
fn scenario5_confirm_queue_reorders_around_late_completions() {
    let mut queue = ConfirmQueue::new();
    queue.add(RequestKind::MlmeJoin, false).unwrap();
    queue.add(RequestKind::MlmeLinkCheck, false).unwrap();
    queue.add(RequestKind::MlmeDeviceTime, false).unwrap();

    // Only LinkCheck has completed so far.
    queue.set_status(RequestKind::MlmeLinkCheck, StatusCode::Ok).unwrap();

    let mut first_pass = heapless::Vec::<RequestKind, 4>::new();
    queue.handle_all(|kind, _status| {
        first_pass.push(kind).unwrap();
    });
    assert_eq!(&first_pass[..], &[RequestKind::MlmeLinkCheck]);
    assert_eq!(queue.count(), 2);

    queue.set_status(RequestKind::MlmeJoin, StatusCode::Ok).unwrap();
    queue.set_status(RequestKind::MlmeDeviceTime, StatusCode::Ok).unwrap();

    let mut second_pass = heapless::Vec::<RequestKind, 4>::new();
    queue.handle_all(|kind, _status| {
        second_pass.push(kind).unwrap();
    });
    assert_eq!(second_pass.len(), 2);
    assert!(second_pass.contains(&RequestKind::MlmeJoin));
    assert!(second_pass.contains(&RequestKind::MlmeDeviceTime));
    assert_eq!(queue.count(), 0);
}

// P6: ping-slot offsets are deterministic for fixed inputs and bounded by the
// ping period. (Distribution across random inputs is exercised in the
// ping-slot module's own unit tests, next to the implementation.)
#[test]
fn p6_ping_slot_offset_is_stable_and_bounded() {
    let key = AESKey::new([0x2B; 16]);
    let dev_addr = DevAddr::from(0x0102_0304);
    let period = 1u32 << (5 + 3); // periodicity 3

    let a = crypto::ping_slot_offset(&key, 10_000_000, dev_addr, period);
    let b = crypto::ping_slot_offset(&key, 10_000_000, dev_addr, period);
    assert_eq!(a, b);
    assert!(a < period);
}

fn beacon_mac<'a>(rx_data: Option<&[u8]>, clock: &'a TestClock) -> MacLayer<MockRadio, US915, SoftwareTimer<'a, TestClock>> {
    let mut radio = MockRadio::new();
    if let Some(frame) = rx_data {
        radio.set_rx_data(frame);
    }
    MacLayer::new(radio, US915::new(), SessionState::new(), SoftwareTimer::new(clock))
}

// P7 / scenario 6: once locked, the tracker advances its phase by exactly one
// beacon period per successful window, with no clock-sampling jitter; a
// withheld beacon drops it to `BeaconMissed` and then `Reacquisition`.
#[test]
fn p7_beacon_phase_advances_by_exactly_one_period_per_lock() {
    let beacon_frame = [0xAAu8; 17];
    let clock = TestClock::new();
    let mut buf = [0u8; 32];
    let mut tracker = BeaconTracker::new();

    tracker.start_acquisition();
    assert_eq!(tracker.state(), BeaconState::Acquisition);

    // First beacon heard: locks and anchors the phase at `now_ms`.
    let mut mac = beacon_mac(Some(&beacon_frame), &clock);
    tracker.process(&mut mac, 10_000_000, &mut buf).unwrap();
    assert_eq!(tracker.state(), BeaconState::Locked);
    assert_eq!(tracker.last_beacon_rx(), Some(10_000_000));
    assert_eq!(tracker.next_beacon_rx(), Some(10_000_000 + BEACON_PERIOD_MS as u64));

    // Second beacon heard one period later: phase advances by exactly one
    // period, not by whatever `now_ms` happens to be.
    let mut mac = beacon_mac(Some(&beacon_frame), &clock);
    tracker
        .process(&mut mac, 10_000_000 + BEACON_PERIOD_MS as u64 + 500, &mut buf)
        .unwrap();
    assert_eq!(tracker.state(), BeaconState::Locked);
    assert_eq!(tracker.last_beacon_rx(), Some(10_000_000 + BEACON_PERIOD_MS as u64));
    assert_eq!(tracker.next_beacon_rx(), Some(10_000_000 + 2 * BEACON_PERIOD_MS as u64));

    // Third window: no beacon arrives.
    let mut mac = beacon_mac(None, &clock);
    tracker
        .process(&mut mac, 10_000_000 + 2 * BEACON_PERIOD_MS as u64, &mut buf)
        .unwrap();
    assert_eq!(tracker.state(), BeaconState::BeaconMissed);
    // The last-known phase is untouched by a miss.
    assert_eq!(tracker.last_beacon_rx(), Some(10_000_000 + BEACON_PERIOD_MS as u64));

    // Driving the tracker again widens the search window and retries.
    let mut mac = beacon_mac(None, &clock);
    tracker
        .process(&mut mac, 10_000_000 + 3 * BEACON_PERIOD_MS as u64, &mut buf)
        .unwrap();
    assert_eq!(tracker.state(), BeaconState::Reacquisition);
}

// Scenario 6: an acquisition scan with nothing on the air times out rather
// than locking on silence or garbage.
#[test]
fn scenario6_acquisition_without_a_beacon_times_out() {
    let clock = TestClock::new();
    let mut buf = [0u8; 32];
    let mut tracker = BeaconTracker::new();

    tracker.start_acquisition();
    let mut mac = beacon_mac(None, &clock);
    tracker.process(&mut mac, 0, &mut buf).unwrap();
    assert_eq!(tracker.state(), BeaconState::Timeout);
    assert_eq!(tracker.last_beacon_rx(), None);
}

// The 16-bit wire counter is reconstructed against the stored 32-bit value
// rather than compared to it directly: a rollover into the next high-order
// block bumps the candidate forward instead of reading as a replay.
#[test]
fn fcnt32_reconstruction_handles_16_bit_rollover() {
    assert_eq!(crypto::reconstruct_fcnt32(5, 6), 6);
    assert_eq!(crypto::reconstruct_fcnt32(0xFFFF_FFFF, 0), 0); // FCNT_NONE: first downlink ever.
    assert_eq!(crypto::reconstruct_fcnt32(0x0001_FFFE, 0xFFFF), 0x0001_FFFF);
    // Wire counter wrapped into the next 16-bit block.
    assert_eq!(crypto::reconstruct_fcnt32(0x0001_FFFE, 0x0001), 0x0002_0001);
}

fn joined_session(dev_addr: u32) -> SessionState {
    SessionState::new_abp(
        DevAddr::from(dev_addr),
        AESKey::new([0x01; 16]),
        AESKey::new([0x02; 16]),
    )
}

// Scenario: a confirmed uplink with no ACK forthcoming retries NbTrans times,
// halving the data rate every two failed attempts, and finally reports an
// error rather than a false Ok.
#[test]
fn confirmed_uplink_retries_and_backs_off_datarate_without_an_ack() {
    let clock = TestClock::new();
    let radio = MockRadio::new(); // never has rx_data queued: every RX comes back empty.
    let mut session = joined_session(0x0102_0304);
    session.nb_trans = 4;
    let mut mac = MacLayer::new(radio, US915::new(), session, SoftwareTimer::new(&clock));
    mac.init().unwrap();

    let starting_dr = mac.data_rate().to_index();
    let status = mac.mcps_confirmed(1, b"ping").unwrap();
    assert_eq!(status, StatusCode::Error);
    assert!(!mac.last_tx_acked());
    // Two decrements over four attempts (after attempt 2 and attempt 4).
    let expected_dr = starting_dr.saturating_sub(2);
    assert_eq!(mac.data_rate().to_index(), expected_dr);
}

// A network-negotiated duty cycle blocks the very next uplink until the
// cooldown elapses, then lets it through.
#[test]
fn duty_cycle_gate_blocks_until_cooldown_elapses() {
    let clock = TestClock::new();
    let radio = MockRadio::new();
    let mut session = joined_session(0x0102_0304);
    session.max_duty_cycle = 1; // 1/2 duty cycle: off-air time equals on-air time.
    let mut mac = MacLayer::new(radio, US915::new(), session, SoftwareTimer::new(&clock));
    mac.init().unwrap();

    assert_eq!(mac.mcps_unconfirmed(1, b"a").unwrap(), StatusCode::Ok);
    let _ = mac.process(); // drain the completed entry so the next request isn't seen as still-outstanding.
    assert_eq!(mac.mcps_unconfirmed(1, b"b").unwrap(), StatusCode::DutyCycleRestricted);
    let _ = mac.process();

    clock.advance(60_000);
    assert_eq!(mac.mcps_unconfirmed(1, b"c").unwrap(), StatusCode::Ok);
}

fn downlink_frame(
    nwk_key: &AESKey,
    app_key: &AESKey,
    dev_addr: DevAddr,
    fcnt: u32,
    f_port: u8,
    payload: &[u8],
) -> heapless::Vec<u8, { codec::MAX_FRAME_SIZE }> {
    let encrypted = crypto::encrypt_payload(app_key, dev_addr, fcnt, Direction::Down, payload);
    let fhdr = FHdr {
        dev_addr,
        f_ctrl: FCtrl::new_downlink(false, false, false, 0),
        f_cnt: fcnt as u16,
        f_opts: heapless::Vec::new(),
    };
    let unsigned =
        codec::serialize_data_unsigned(MHdr::new(FrameType::UnconfirmedDataDown), &fhdr, Some(f_port), &encrypted)
            .unwrap();
    let mic = crypto::compute_mic(nwk_key, &unsigned, dev_addr, fcnt, Direction::Down);
    let mut frame = unsigned;
    frame.extend_from_slice(&mic).unwrap();
    frame
}

// A multicast group's downlink is addressed, decrypted and counted using its
// own installed keys rather than the unicast session keys, and delivered the
// same way a unicast downlink would be.
#[test]
fn multicast_group_downlink_is_received_under_its_own_keys() {
    let clock = TestClock::new();
    let root_key = AESKey::new([0x2B; 16]);
    let mc_addr = DevAddr::from(0xAABB_CCDD);
    let mc_ctx = crypto::derive_mc_group(&root_key, MacVersion::V1_0_x, mc_addr);
    let frame = downlink_frame(&mc_ctx.mc_nwk_s_key, &mc_ctx.mc_app_s_key, mc_addr, 0, 5, b"multicast-data");

    let mut radio = MockRadio::new();
    radio.set_rx_data(&frame);
    let session = joined_session(0x0102_0304);
    let mut mac = MacLayer::new(radio, US915::new(), session, SoftwareTimer::new(&clock));
    mac.init().unwrap();
    assert!(mac.install_mc_group(0, &root_key, mc_addr));

    mac.listen_class_c(&mut [0u8; 255]).unwrap();

    let downlink = mac.take_downlink().expect("multicast payload should be delivered");
    assert_eq!(downlink.f_port, 5);
    assert_eq!(&downlink.data[..], b"multicast-data");
    assert_eq!(mac.session().mc_groups[0].as_ref().unwrap().mc_addr, mc_addr);
}

// A downlink that fails MIC verification is surfaced as an indication rather
// than unwinding the receive call with an error.
#[test]
fn mic_failure_raises_an_indication_instead_of_an_error() {
    let clock = TestClock::new();
    let session = joined_session(0x0102_0304);
    let dev_addr = session.dev_addr;
    let nwk_key = session.nwk_skey().clone();
    let app_key = session.app_skey().clone();

    let mut frame = downlink_frame(&nwk_key, &app_key, dev_addr, 0, 3, b"hello");
    let last = frame.len() - 1;
    frame[last] ^= 0x01; // corrupt the MIC.

    let mut radio = MockRadio::new();
    radio.set_rx_data(&frame);
    let mut mac = MacLayer::new(radio, US915::new(), session, SoftwareTimer::new(&clock));
    mac.init().unwrap();

    mac.listen_class_c(&mut [0u8; 255]).unwrap();

    assert!(mac.take_downlink().is_none());
    let indications = mac.take_indications();
    assert!(indications.contains(&EventInfo::MicFail));
}
