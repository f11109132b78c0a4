//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Packed, little-endian, byte-exact record layouts (component C1).
//!
//! Every type here is a set of offset constants plus thin slice views —
//! deliberately not a `#[repr(packed)]` struct cast over the wire buffer.
//! The session buffers (`SessionState`) are plain `[u8; N]` arrays; these
//! views borrow into them so the AEAD envelope (`crypto`) can lock/unlock
//! `encrypted_blob` in place without a copy.

/// Maximum number of ToC descriptors the device will hold at once.
pub const TOC_DESCRIPTORS_MAXCOUNT: usize = 32;

/// Maximum bytes of a display name, not including the length prefix.
pub const RECORD_NAME_MAXLEN: usize = 64;

/// Width of the `key` array inside `oath_record_secret`.
///
/// The original firmware's `RECORD_KEY_MAXLEN` is 66 (64 secret bytes + 2
/// header bytes), which makes `oath_record_secret` 67 bytes, not the 68
/// this crate's governing spec declares. That 68-byte figure recurs
/// independently in `oath_record` (78 B), `secure_oath_record` (118 B),
/// `oath_record_put` (143 B) and the `CALCULATE` wire request length (123
/// B = 1 + 122), so it is treated as the authoritative contract and
/// `RECORD_KEY_MAXLEN` is one byte wider here than in the original. The
/// `key_len <= 66` bound is kept exactly as specified — the 67th byte of
/// the array is always unused padding, never addressed by a valid record.
pub const RECORD_KEY_MAXLEN: usize = 67;

/// Inclusive bound on `key_len`, per the data model invariants.
pub const RECORD_KEY_LEN_MAX: u8 = 66;

pub const XCHACHA20_NONCE_LEN: usize = 24;
pub const XCHACHA20_MAC_LEN: usize = 16;

pub const OATH_RECORD_SECRET_LEN: usize = 1 + RECORD_KEY_MAXLEN;
pub const OATH_RECORD_PROTECTED_LEN: usize = 10;
pub const OATH_RECORD_LEN: usize = OATH_RECORD_SECRET_LEN + OATH_RECORD_PROTECTED_LEN;
pub const SECURE_OATH_RECORD_LEN: usize =
    OATH_RECORD_LEN + XCHACHA20_NONCE_LEN + XCHACHA20_MAC_LEN;
pub const OATH_RECORD_PUT_LEN: usize = OATH_RECORD_LEN + 1 + RECORD_NAME_MAXLEN;
pub const OATH_CALCULATE_LEN: usize = SECURE_OATH_RECORD_LEN + 4;

pub const TOC_RECORD_DESCRIPTOR_LEN: usize = 1 + RECORD_NAME_MAXLEN;
pub const TOC_HEADER_PROTECTED_LEN: usize = 1;
pub const DECRYPTED_TOC_HEADER_LEN: usize =
    1 + XCHACHA20_NONCE_LEN + XCHACHA20_MAC_LEN + TOC_HEADER_PROTECTED_LEN;
pub const DECRYPTED_TOC_LEN: usize =
    DECRYPTED_TOC_HEADER_LEN + TOC_DESCRIPTORS_MAXCOUNT * TOC_RECORD_DESCRIPTOR_LEN;

// ---- Property bits (section 6) ---------------------------------------------

pub const OATH_PROP_TYPE_TOTP: u8 = 0 << 7;
pub const OATH_PROP_TYPE_HOTP: u8 = 1 << 7;

pub const OATH_PROP_ALG_SHA1: u8 = (0 << 6) | (0 << 5);
pub const OATH_PROP_ALG_SHA256: u8 = (0 << 6) | (1 << 5);
pub const OATH_PROP_ALG_SHA512: u8 = (1 << 6) | (0 << 5);
pub const OATH_PROP_ALG_UNDEFINED: u8 = (1 << 6) | (1 << 5);
const OATH_PROP_ALG_MASK: u8 = 0b0110_0000;

pub const OATH_PROP_TOUCH_NO: u8 = 0 << 4;
pub const OATH_PROP_TOUCH_YES: u8 = 1 << 4;

pub const TOC_SETTING_TOUCH_NO: u8 = 0 << 7;
pub const TOC_SETTING_TOUCH_YES: u8 = 1 << 7;

/// The plaintext associated data authenticated alongside an `oath_record`'s
/// `encrypted_blob`: counter/time-step, property bits, and digit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OathRecordProtected {
    pub counter_or_timestep: u64,
    pub properties: u8,
    pub digits: u8,
}

impl OathRecordProtected {
    pub const LEN: usize = OATH_RECORD_PROTECTED_LEN;

    pub fn decode(buf: &[u8]) -> Self {
        debug_assert_eq!(buf.len(), Self::LEN);
        let mut counter_bytes = [0u8; 8];
        counter_bytes.copy_from_slice(&buf[0..8]);
        Self {
            counter_or_timestep: u64::from_le_bytes(counter_bytes),
            properties: buf[8],
            digits: buf[9],
        }
    }

    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert_eq!(buf.len(), Self::LEN);
        buf[0..8].copy_from_slice(&self.counter_or_timestep.to_le_bytes());
        buf[8] = self.properties;
        buf[9] = self.digits;
    }

    pub fn is_hotp(&self) -> bool {
        self.properties & OATH_PROP_TYPE_HOTP != 0
    }

    pub fn needs_touch(&self) -> bool {
        self.properties & OATH_PROP_TOUCH_YES != 0
    }

    pub fn algorithm_bits(&self) -> u8 {
        self.properties & OATH_PROP_ALG_MASK
    }

    pub fn is_sha1(&self) -> bool {
        self.algorithm_bits() == OATH_PROP_ALG_SHA1
    }
}

/// The plaintext associated data authenticated alongside an encrypted ToC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TocHeaderProtected {
    pub settings: u8,
}

impl TocHeaderProtected {
    pub const LEN: usize = TOC_HEADER_PROTECTED_LEN;

    pub fn decode(buf: &[u8]) -> Self {
        debug_assert_eq!(buf.len(), Self::LEN);
        Self { settings: buf[0] }
    }

    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert_eq!(buf.len(), Self::LEN);
        buf[0] = self.settings;
    }

    pub fn needs_touch(&self) -> bool {
        self.settings & TOC_SETTING_TOUCH_YES != 0
    }
}

/// View over a `78`-byte `oath_record`: `encrypted_blob` (68 B, AEAD
/// ciphertext of an `oath_record_secret`) followed by the plaintext
/// `protected` block that is its associated data.
pub struct OathRecordView;

impl OathRecordView {
    pub const LEN: usize = OATH_RECORD_LEN;
    const BLOB_RANGE: core::ops::Range<usize> = 0..OATH_RECORD_SECRET_LEN;
    const PROTECTED_RANGE: core::ops::Range<usize> = OATH_RECORD_SECRET_LEN..OATH_RECORD_LEN;

    pub fn encrypted_blob(buf: &[u8]) -> &[u8] {
        &buf[Self::BLOB_RANGE]
    }

    pub fn encrypted_blob_mut(buf: &mut [u8]) -> &mut [u8] {
        &mut buf[Self::BLOB_RANGE]
    }

    pub fn protected_bytes(buf: &[u8]) -> &[u8] {
        &buf[Self::PROTECTED_RANGE]
    }

    pub fn protected(buf: &[u8]) -> OathRecordProtected {
        OathRecordProtected::decode(&buf[Self::PROTECTED_RANGE])
    }

    pub fn set_protected(buf: &mut [u8], protected: &OathRecordProtected) {
        protected.encode_into(&mut buf[Self::PROTECTED_RANGE])
    }
}

/// View over a `118`-byte `secure_oath_record`: `record` (78 B), `nonce`
/// (24 B), `mac` (16 B).
pub struct SecureOathRecordView;

impl SecureOathRecordView {
    pub const LEN: usize = SECURE_OATH_RECORD_LEN;
    const RECORD_RANGE: core::ops::Range<usize> = 0..OATH_RECORD_LEN;
    const NONCE_RANGE: core::ops::Range<usize> =
        OATH_RECORD_LEN..OATH_RECORD_LEN + XCHACHA20_NONCE_LEN;
    const MAC_RANGE: core::ops::Range<usize> =
        OATH_RECORD_LEN + XCHACHA20_NONCE_LEN..SECURE_OATH_RECORD_LEN;

    pub fn record(buf: &[u8]) -> &[u8] {
        &buf[Self::RECORD_RANGE]
    }

    pub fn record_mut(buf: &mut [u8]) -> &mut [u8] {
        &mut buf[Self::RECORD_RANGE]
    }

    pub fn nonce(buf: &[u8]) -> &[u8] {
        &buf[Self::NONCE_RANGE]
    }

    pub fn nonce_mut(buf: &mut [u8]) -> &mut [u8] {
        &mut buf[Self::NONCE_RANGE]
    }

    pub fn mac(buf: &[u8]) -> &[u8] {
        &buf[Self::MAC_RANGE]
    }

    pub fn mac_mut(buf: &mut [u8]) -> &mut [u8] {
        &mut buf[Self::MAC_RANGE]
    }
}

/// View over a `143`-byte `oath_record_put`: `record` (78 B), `name_len`
/// (1 B), `name` (64 B). The client-to-device write form.
pub struct OathRecordPutView;

impl OathRecordPutView {
    pub const LEN: usize = OATH_RECORD_PUT_LEN;
    const RECORD_RANGE: core::ops::Range<usize> = 0..OATH_RECORD_LEN;
    const NAME_LEN_IDX: usize = OATH_RECORD_LEN;
    const NAME_RANGE: core::ops::Range<usize> = OATH_RECORD_LEN + 1..OATH_RECORD_PUT_LEN;

    pub fn record(buf: &[u8]) -> &[u8] {
        &buf[Self::RECORD_RANGE]
    }

    pub fn record_mut(buf: &mut [u8]) -> &mut [u8] {
        &mut buf[Self::RECORD_RANGE]
    }

    pub fn name_len(buf: &[u8]) -> u8 {
        buf[Self::NAME_LEN_IDX]
    }

    pub fn name(buf: &[u8]) -> &[u8] {
        let len = Self::name_len(buf) as usize;
        &buf[Self::NAME_RANGE][..len.min(RECORD_NAME_MAXLEN)]
    }

    pub fn name_field_mut(buf: &mut [u8]) -> &mut [u8] {
        &mut buf[Self::NAME_RANGE]
    }

    pub fn set_name_len(buf: &mut [u8], len: u8) {
        buf[Self::NAME_LEN_IDX] = len;
    }
}

/// View over a `122`-byte `oath_calculate`: `secure_record` (118 B), `time`
/// (u32 LE, 4 B).
pub struct OathCalculateView;

impl OathCalculateView {
    pub const LEN: usize = OATH_CALCULATE_LEN;
    const SECURE_RECORD_RANGE: core::ops::Range<usize> = 0..SECURE_OATH_RECORD_LEN;
    const TIME_RANGE: core::ops::Range<usize> = SECURE_OATH_RECORD_LEN..OATH_CALCULATE_LEN;

    pub fn secure_record(buf: &[u8]) -> &[u8] {
        &buf[Self::SECURE_RECORD_RANGE]
    }

    pub fn secure_record_mut(buf: &mut [u8]) -> &mut [u8] {
        &mut buf[Self::SECURE_RECORD_RANGE]
    }

    pub fn time(buf: &[u8]) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&buf[Self::TIME_RANGE]);
        u32::from_le_bytes(bytes)
    }

    pub fn set_time(buf: &mut [u8], time: u32) {
        buf[Self::TIME_RANGE].copy_from_slice(&time.to_le_bytes());
    }
}

/// View over a `65`-byte `toc_record_descriptor`: `name_len` (1 B), `name`
/// (64 B).
pub struct TocRecordDescriptorView;

impl TocRecordDescriptorView {
    pub const LEN: usize = TOC_RECORD_DESCRIPTOR_LEN;

    pub fn name_len(buf: &[u8]) -> u8 {
        buf[0]
    }

    pub fn name(buf: &[u8]) -> &[u8] {
        let len = Self::name_len(buf) as usize;
        &buf[1..][..len.min(RECORD_NAME_MAXLEN)]
    }

    pub fn set(buf: &mut [u8], name_len: u8, name: &[u8]) {
        buf[0] = name_len;
        buf[1..].fill(0);
        let len = (name_len as usize).min(RECORD_NAME_MAXLEN).min(name.len());
        buf[1..1 + len].copy_from_slice(&name[..len]);
    }
}

/// View over a `42`-byte `decrypted_toc_header`: `descriptor_count` (1 B),
/// `nonce` (24 B), `mac` (16 B), `protected_header` (1 B, `settings`).
pub struct DecryptedTocHeaderView;

impl DecryptedTocHeaderView {
    pub const LEN: usize = DECRYPTED_TOC_HEADER_LEN;
    const COUNT_IDX: usize = 0;
    const NONCE_RANGE: core::ops::Range<usize> = 1..1 + XCHACHA20_NONCE_LEN;
    const MAC_RANGE: core::ops::Range<usize> =
        1 + XCHACHA20_NONCE_LEN..1 + XCHACHA20_NONCE_LEN + XCHACHA20_MAC_LEN;
    const SETTINGS_IDX: usize = DECRYPTED_TOC_HEADER_LEN - 1;

    pub fn descriptor_count(buf: &[u8]) -> u8 {
        buf[Self::COUNT_IDX]
    }

    pub fn set_descriptor_count(buf: &mut [u8], count: u8) {
        buf[Self::COUNT_IDX] = count;
    }

    pub fn nonce(buf: &[u8]) -> &[u8] {
        &buf[Self::NONCE_RANGE]
    }

    pub fn nonce_mut(buf: &mut [u8]) -> &mut [u8] {
        &mut buf[Self::NONCE_RANGE]
    }

    pub fn mac(buf: &[u8]) -> &[u8] {
        &buf[Self::MAC_RANGE]
    }

    pub fn mac_mut(buf: &mut [u8]) -> &mut [u8] {
        &mut buf[Self::MAC_RANGE]
    }

    pub fn protected_header_bytes(buf: &[u8]) -> &[u8] {
        &buf[Self::SETTINGS_IDX..Self::SETTINGS_IDX + 1]
    }

    pub fn settings(buf: &[u8]) -> TocHeaderProtected {
        TocHeaderProtected::decode(Self::protected_header_bytes(buf))
    }
}

/// View over a `2122`-byte `decrypted_toc`: `header` (42 B) followed by 32
/// fixed-size descriptor slots (only the first `descriptor_count` are
/// meaningful).
pub struct DecryptedTocView;

impl DecryptedTocView {
    pub const LEN: usize = DECRYPTED_TOC_LEN;
    const HEADER_RANGE: core::ops::Range<usize> = 0..DECRYPTED_TOC_HEADER_LEN;
    const DESCRIPTORS_RANGE: core::ops::Range<usize> = DECRYPTED_TOC_HEADER_LEN..DECRYPTED_TOC_LEN;

    pub fn header(buf: &[u8]) -> &[u8] {
        &buf[Self::HEADER_RANGE]
    }

    pub fn header_mut(buf: &mut [u8]) -> &mut [u8] {
        &mut buf[Self::HEADER_RANGE]
    }

    pub fn descriptors(buf: &[u8]) -> &[u8] {
        &buf[Self::DESCRIPTORS_RANGE]
    }

    pub fn descriptors_mut(buf: &mut [u8]) -> &mut [u8] {
        &mut buf[Self::DESCRIPTORS_RANGE]
    }

    pub fn descriptor(buf: &[u8], index: usize) -> &[u8] {
        let descriptors = Self::descriptors(buf);
        &descriptors[index * TOC_RECORD_DESCRIPTOR_LEN..][..TOC_RECORD_DESCRIPTOR_LEN]
    }

    pub fn descriptor_mut(buf: &mut [u8], index: usize) -> &mut [u8] {
        let descriptors = Self::descriptors_mut(buf);
        &mut descriptors[index * TOC_RECORD_DESCRIPTOR_LEN..][..TOC_RECORD_DESCRIPTOR_LEN]
    }

    pub fn ciphertext_len(descriptor_count: u8) -> usize {
        descriptor_count as usize * TOC_RECORD_DESCRIPTOR_LEN
    }
}

/// Host-side builder: packs a plaintext `oath_record_put` ready to be
/// chunked over the wire to a `PUT` command. The device re-derives the
/// identical layout on receipt, so this layout is normative for both ends.
///
/// `key` is copied verbatim into the secret's `key` field (no implicit
/// type/algorithm/digit header is synthesized into it — those live in
/// `properties`/`digits`, see [`OathRecordProtected`]).
#[allow(clippy::too_many_arguments)]
pub fn build_put_command(
    key: &[u8],
    counter_or_timestep: u64,
    is_totp: bool,
    needs_touch: bool,
    digits: u8,
    name: &[u8],
) -> [u8; OATH_RECORD_PUT_LEN] {
    assert!(key.len() <= RECORD_KEY_LEN_MAX as usize);
    assert!(name.len() <= RECORD_NAME_MAXLEN);

    let mut buf = [0u8; OATH_RECORD_PUT_LEN];

    OathRecordPutView::set_name_len(&mut buf, name.len() as u8);
    OathRecordPutView::name_field_mut(&mut buf)[..name.len()].copy_from_slice(name);

    let record = OathRecordPutView::record_mut(&mut buf);
    let mut properties = if is_totp {
        OATH_PROP_TYPE_TOTP
    } else {
        OATH_PROP_TYPE_HOTP
    };
    properties |= if needs_touch {
        OATH_PROP_TOUCH_YES
    } else {
        OATH_PROP_TOUCH_NO
    };
    OathRecordView::set_protected(
        record,
        &OathRecordProtected {
            counter_or_timestep,
            properties,
            digits,
        },
    );

    let blob = OathRecordView::encrypted_blob_mut(record);
    blob[0] = key.len() as u8;
    blob[1..1 + key.len()].copy_from_slice(key);

    buf
}

/// Host-side builder: packs an `oath_calculate` request around a
/// previously-returned `secure_oath_record` and a UNIX timestamp.
pub fn build_calculate_command(
    secure_record: &[u8; SECURE_OATH_RECORD_LEN],
    time: u32,
) -> [u8; OATH_CALCULATE_LEN] {
    let mut buf = [0u8; OATH_CALCULATE_LEN];
    OathCalculateView::secure_record_mut(&mut buf).copy_from_slice(secure_record);
    OathCalculateView::set_time(&mut buf, time);
    buf
}
