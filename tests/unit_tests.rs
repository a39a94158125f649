#![no_std]

use lorawan::{
    config::device::{AESKey, DevAddr, DeviceConfig, FCntId, SessionState},
    crypto::{self, Direction},
    lorawan::region::{DataRate, Region, US915},
};

mod mock;

#[test]
fn test_device_config() {
    let dev_eui = [0x01; 8];
    let app_eui = [0x02; 8];
    let app_key = [0x03; 16];

    let config = DeviceConfig::new_otaa(dev_eui, app_eui, app_key);

    assert_eq!(&config.dev_eui, &dev_eui);
    assert_eq!(&config.app_eui, &app_eui);
    assert_eq!(config.app_key.as_bytes(), &app_key);
    assert!(config.dev_addr.is_none());
    assert!(config.nwk_key.is_none());
}

#[test]
fn test_session_state() {
    let dev_addr = DevAddr::new([0x01, 0x02, 0x03, 0x04]);
    let nwk_skey = AESKey::new([0x01; 16]);
    let app_skey = AESKey::new([0x02; 16]);

    let session = SessionState::new_abp(dev_addr, nwk_skey, app_skey);

    assert_eq!(session.dev_addr, dev_addr);
    assert_eq!(session.nwk_skey().as_bytes(), &[0x01; 16]);
    assert_eq!(session.app_skey().as_bytes(), &[0x02; 16]);
    assert_eq!(session.counters.get(FCntId::Uplink), 0);
    // Downlink counters start at the "never received" sentinel, not zero.
    assert_eq!(session.counters.get(FCntId::NetworkDown), lorawan::config::device::FCNT_NONE);
    assert!(session.is_joined());
}

#[test]
fn test_frame_counters_increment() {
    let mut session = SessionState::new();
    assert!(!session.is_joined());
    session.counters.increment_uplink();
    session.counters.increment_uplink();
    assert_eq!(session.counters.get(FCntId::Uplink), 2);
    session.counters.set(FCntId::NetworkDown, 5);
    assert_eq!(session.counters.get(FCntId::NetworkDown), 5);
}

#[test]
fn test_crypto_encrypt_decrypt() {
    let key = AESKey::new([0x01; 16]);
    let dev_addr = DevAddr::new([0x01, 0x02, 0x03, 0x04]);
    let fcnt = 1;
    let payload = b"Hello LoRaWAN";

    let encrypted = crypto::encrypt_payload(&key, dev_addr, fcnt, Direction::Up, payload);
    let decrypted = crypto::encrypt_payload(&key, dev_addr, fcnt, Direction::Up, &encrypted);

    assert_eq!(&decrypted[..], payload);
    assert_ne!(&encrypted[..], payload);
}

#[test]
fn test_crypto_mic() {
    let key = AESKey::new([0x01; 16]);
    let dev_addr = DevAddr::new([0x01, 0x02, 0x03, 0x04]);
    let fcnt = 1;
    let data = b"Test Data";

    let mic = crypto::compute_mic(&key, data, dev_addr, fcnt, Direction::Up);
    assert_eq!(mic.len(), 4);

    assert!(crypto::verify_mic(&key, data, dev_addr, fcnt, Direction::Up, mic).is_ok());

    let wrong_key = AESKey::new([0x02; 16]);
    let bad_mic = crypto::compute_mic(&wrong_key, data, dev_addr, fcnt, Direction::Up);
    assert_ne!(mic, bad_mic);
}

#[test]
fn test_crypto_join_key_derivation() {
    let app_key = AESKey::new([0x01; 16]);
    let app_nonce = [0x01, 0x02, 0x03];
    let net_id = [0x04, 0x05, 0x06];
    let dev_nonce = 0x0708;

    let keys = crypto::derive_session_keys_1_0(&app_key, app_nonce, net_id, dev_nonce);

    assert_eq!(keys.nwk_s_key_1_0().as_bytes().len(), 16);
    assert_eq!(keys.app_s_key.as_bytes().len(), 16);
    // The two derived keys must differ (distinct block prefixes).
    assert_ne!(keys.nwk_s_key_1_0().as_bytes(), keys.app_s_key.as_bytes());

    // Deterministic: same inputs produce the same keys.
    let keys2 = crypto::derive_session_keys_1_0(&app_key, app_nonce, net_id, dev_nonce);
    assert_eq!(keys.nwk_s_key_1_0().as_bytes(), keys2.nwk_s_key_1_0().as_bytes());
}

#[test]
fn test_us915_region() {
    let mut region = US915::new();

    assert_eq!(region.get_data_rate(), DataRate::SF10BW125);
    assert_eq!(region.get_enabled_channels().len(), 72);

    // A plain sub-band selection only ever covers one 8-channel 125kHz
    // block; the 500kHz channels live outside the 0-7 sub-band range.
    region.set_sub_band(2);
    assert_eq!(region.get_enabled_channels().len(), 8);

    // The TTN layout additionally force-enables one 500kHz channel.
    region.configure_ttn_us915();
    assert_eq!(region.get_enabled_channels().len(), 9);

    let channel = region.get_next_channel().unwrap();
    let (rx1_freq, rx1_dr) = region.rx1_window(&channel);
    assert!(rx1_freq < channel.frequency);
    assert_eq!(rx1_dr, region.get_data_rate());

    let (rx2_freq, rx2_dr) = region.rx2_window();
    assert_eq!(rx2_freq, 923_300_000);
    assert_eq!(rx2_dr, DataRate::SF12BW125);
}
