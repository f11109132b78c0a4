//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! AEAD crypto envelope (component C2).
//!
//! Wraps XChaCha20-Poly1305 with the fixed binding the data model requires:
//! a 32-byte device key, a freshly-sampled 24-byte nonce per encryption, and
//! associated data that is the plaintext "protected" block sitting right
//! next to the ciphertext it authenticates. Everything here operates on
//! caller-supplied buffer slices in place — there is no heap allocation,
//! matching the fixed session buffers in [`crate::session`].

use crate::error::CryptoError;
use crate::records::XCHACHA20_MAC_LEN;
use aead::{AeadInPlace, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand_core::RngCore;

/// The device's compound identifier: a 32-byte symmetric key, fixed for
/// the lifetime of a power cycle. See [`crate::session::SessionState::boot`].
pub type Cdi = [u8; 32];

/// Draw a fresh 24-byte nonce from the given TRNG source.
///
/// Real firmware's TRNG is polled MMIO (a status-ready bit, then 32-bit
/// entropy words); that polling loop is an external collaborator. Here the
/// boundary is `rand_core::RngCore` itself — any hardware TRNG driver is
/// expected to implement it, and tests/the simulator use
/// [`rand_core::OsRng`] or a seeded PRNG.
pub fn fresh_nonce(rng: &mut dyn RngCore) -> [u8; 24] {
    let mut nonce = [0u8; 24];
    rng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypt `buf` in place under `cdi`, authenticating `aad`, and write the
/// resulting MAC into `mac_out`. A fresh nonce is drawn from `rng` and also
/// returned.
///
/// This is `crypto_lock_aead` from the original firmware, generalized to
/// take the AAD length from the slice instead of a fixed 1 or 10 bytes.
pub fn lock_aead(
    buf: &mut [u8],
    cdi: &Cdi,
    aad: &[u8],
    mac_out: &mut [u8],
    rng: &mut dyn RngCore,
) -> [u8; 24] {
    debug_assert_eq!(mac_out.len(), XCHACHA20_MAC_LEN);

    let nonce = fresh_nonce(rng);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(cdi));
    let tag = cipher
        .encrypt_in_place_detached(XNonce::from_slice(&nonce), aad, buf)
        .expect("XChaCha20-Poly1305 encryption does not fail for in-bounds buffers");
    mac_out.copy_from_slice(tag.as_slice());
    nonce
}

/// Decrypt `buf` in place under `cdi`, verifying `mac` against `aad`. On MAC
/// mismatch the AEAD crate never writes through a failed tag check, so the
/// buffer keeps whatever ciphertext it held, and `CryptoError::UnlockFailed`
/// is returned.
///
/// This is `crypto_unlock_aead` from the original firmware.
pub fn unlock_aead(
    buf: &mut [u8],
    cdi: &Cdi,
    nonce: &[u8],
    mac: &[u8],
    aad: &[u8],
) -> Result<(), CryptoError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(cdi));
    let tag = chacha20poly1305::Tag::from_slice(mac);
    cipher
        .decrypt_in_place_detached(XNonce::from_slice(nonce), aad, buf, tag)
        .map_err(|_| CryptoError::UnlockFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    fn cdi() -> Cdi {
        [0x42u8; 32]
    }

    #[test]
    fn round_trips_through_lock_and_unlock() {
        let mut plaintext = *b"super secret TOTP shared key!!!";
        let original = plaintext;
        let aad = b"0123456789";
        let mut mac = [0u8; XCHACHA20_MAC_LEN];
        let mut rng = OsRng;

        let nonce = lock_aead(&mut plaintext, &cdi(), aad, &mut mac, &mut rng);
        assert_ne!(plaintext, original);

        unlock_aead(&mut plaintext, &cdi(), &nonce, &mac, aad).unwrap();
        assert_eq!(plaintext, original);
    }

    #[test]
    fn rejects_a_flipped_associated_data_bit() {
        let mut plaintext = *b"super secret TOTP shared key!!!";
        let mut aad = *b"0123456789";
        let mut mac = [0u8; XCHACHA20_MAC_LEN];
        let mut rng = OsRng;

        let nonce = lock_aead(&mut plaintext, &cdi(), &aad, &mut mac, &mut rng);
        aad[3] ^= 0x01;

        let result = unlock_aead(&mut plaintext, &cdi(), &nonce, &mac, &aad);
        assert!(matches!(result, Err(CryptoError::UnlockFailed)));
    }

    #[test]
    fn rejects_a_flipped_ciphertext_bit() {
        let mut plaintext = *b"super secret TOTP shared key!!!";
        let aad = b"0123456789";
        let mut mac = [0u8; XCHACHA20_MAC_LEN];
        let mut rng = OsRng;

        let nonce = lock_aead(&mut plaintext, &cdi(), aad, &mut mac, &mut rng);
        plaintext[0] ^= 0x01;

        let result = unlock_aead(&mut plaintext, &cdi(), &nonce, &mac, aad);
        assert!(matches!(result, Err(CryptoError::UnlockFailed)));
    }

    #[test]
    fn rejects_a_flipped_mac_bit() {
        let mut plaintext = *b"super secret TOTP shared key!!!";
        let aad = b"0123456789";
        let mut mac = [0u8; XCHACHA20_MAC_LEN];
        let mut rng = OsRng;

        let nonce = lock_aead(&mut plaintext, &cdi(), aad, &mut mac, &mut rng);
        mac[0] ^= 0x01;

        let result = unlock_aead(&mut plaintext, &cdi(), &nonce, &mac, aad);
        assert!(matches!(result, Err(CryptoError::UnlockFailed)));
    }

    #[test]
    fn rejects_a_flipped_nonce_bit() {
        let mut plaintext = *b"super secret TOTP shared key!!!";
        let aad = b"0123456789";
        let mut mac = [0u8; XCHACHA20_MAC_LEN];
        let mut rng = OsRng;

        let mut nonce = lock_aead(&mut plaintext, &cdi(), aad, &mut mac, &mut rng);
        nonce[0] ^= 0x01;

        let result = unlock_aead(&mut plaintext, &cdi(), &nonce, &mac, aad);
        assert!(matches!(result, Err(CryptoError::UnlockFailed)));
    }

    #[test]
    fn two_encryptions_never_reuse_a_nonce() {
        let mut a = *b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        let mut b = *b"bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
        let aad = b"0123456789";
        let mut mac_a = [0u8; XCHACHA20_MAC_LEN];
        let mut mac_b = [0u8; XCHACHA20_MAC_LEN];
        let mut rng = OsRng;

        let nonce_a = lock_aead(&mut a, &cdi(), aad, &mut mac_a, &mut rng);
        let nonce_b = lock_aead(&mut b, &cdi(), aad, &mut mac_b, &mut rng);
        assert_ne!(nonce_a, nonce_b);
    }
}
