//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! RFC 4226 HOTP, with RFC 6238 TOTP expressed as HOTP over `time / step`
//! (component C3).

use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Dynamic truncation (RFC 4226 §5.3): take the low nibble of the last byte
/// as an offset into the 20-byte HMAC output, read 4 big-endian bytes there,
/// and mask off the sign bit.
fn dynamic_truncate(hmac_result: &[u8; 20]) -> u32 {
    let offset = (hmac_result[19] & 0x0f) as usize;
    let p = u32::from_be_bytes([
        hmac_result[offset],
        hmac_result[offset + 1],
        hmac_result[offset + 2],
        hmac_result[offset + 3],
    ]);
    p & 0x7fff_ffff
}

/// HOTP value for secret `key`, counter `seq`, truncated to `digits`
/// decimal digits (1..=8 is meaningful; practical tokens use 6 or 8).
///
/// `seq` is serialized as 8 big-endian bytes, matching RFC 4226's `C`.
pub fn hotp(key: &[u8], seq: u64, digits: u8) -> u32 {
    let mut mac =
        HmacSha1::new_from_slice(key).expect("HMAC accepts a key of any length");
    mac.update(&seq.to_be_bytes());
    let result = mac.finalize().into_bytes();

    let mut hmac_result = [0u8; 20];
    hmac_result.copy_from_slice(&result);

    let truncated = dynamic_truncate(&hmac_result);
    let modulus = 10u32.checked_pow(digits as u32).unwrap_or(u32::MAX);
    truncated % modulus
}

/// TOTP value: HOTP over `time / step` (integer division), per RFC 6238.
pub fn totp(key: &[u8], time: u32, step: u64, digits: u8) -> u32 {
    let seq = (time as u64) / step;
    hotp(key, seq, digits)
}
