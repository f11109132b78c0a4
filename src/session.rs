//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Session state (component C4): the fixed, ephemeral-per-power-cycle
//! buffers and control fields the dispatcher mutates.

use crate::crypto::Cdi;
use crate::proto::AppCmd;
use crate::records::{DECRYPTED_TOC_LEN, OATH_RECORD_PUT_LEN};
use zeroize::Zeroize;

/// `forced_next_command` from the data model: either any command is
/// accepted, or only the named one (plus `GET_NAMEVERSION`, which is
/// always accepted — see [`AppCmd::always_accepted`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedCommand {
    Any,
    Only(u8),
}

impl ForcedCommand {
    pub fn accepts(self, cmd: AppCmd) -> bool {
        match self {
            Self::Any => true,
            Self::Only(expected) => cmd.request_byte() == expected || cmd.always_accepted(),
        }
    }
}

/// The three mutable regions plus control fields described in section
/// 4.4: the ToC buffer, the record staging buffer, and the bookkeeping
/// that enforces ordering between operations.
pub struct SessionState {
    /// Backs a `decrypted_toc` (header + up to 32 descriptors). Zeroed at
    /// boot, re-populated by `LOAD_TOC`, and left as ciphertext again once
    /// `GET_ENCRYPTEDTOC` completes.
    pub toc_buf: [u8; DECRYPTED_TOC_LEN],

    /// Staging buffer for one in-flight record, reused across `PUT`,
    /// `PUT_GETRECORD`, and `CALCULATE`. Sized to the larger of
    /// `oath_record_put` and `secure_oath_record` (both 143 B after the
    /// name field, see [`crate::records`]).
    pub oath_record_buf: [u8; OATH_RECORD_PUT_LEN],

    /// Chunk cursor: non-negative while receiving into a buffer,
    /// non-positive while sending out of one. Signed so the dispatcher can
    /// read the sign to tell which phase a multi-frame operation is in.
    pub nbytes_transferred: i32,

    pub forced_next_command: ForcedCommand,

    /// Set once a `PUT` has fully completed; cleared by `PUT_GETRECORD`.
    pub oath_record_buf_encrypted_b: bool,

    /// Captured once at boot, constant for the lifetime of the power
    /// cycle (section 3, Lifecycle).
    local_cdi: Cdi,
}

impl SessionState {
    /// Boot-time state: zeroed buffers, `forced_next_command = LOAD_TOC`,
    /// and `local_cdi` captured from the platform's CDI source (the
    /// hardware measurement region in firmware; any 32-byte key in tests).
    pub fn boot(local_cdi: Cdi) -> Self {
        Self {
            toc_buf: [0u8; DECRYPTED_TOC_LEN],
            oath_record_buf: [0u8; OATH_RECORD_PUT_LEN],
            nbytes_transferred: 0,
            forced_next_command: ForcedCommand::Only(AppCmd::LOAD_TOC_REQ),
            oath_record_buf_encrypted_b: false,
            local_cdi,
        }
    }

    pub fn local_cdi(&self) -> &Cdi {
        &self.local_cdi
    }

    pub fn reset_cursor(&mut self) {
        self.nbytes_transferred = 0;
    }
}

/// Decrypted ToC descriptors, staged secrets, and the CDI itself never
/// outlive a power cycle on real hardware; dropping the in-memory state
/// early here closes the gap between that and a long-lived host process.
impl Drop for SessionState {
    fn drop(&mut self) {
        self.toc_buf.zeroize();
        self.oath_record_buf.zeroize();
        self.local_cdi.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_forces_load_toc_but_still_accepts_get_nameversion() {
        let session = SessionState::boot([0u8; 32]);
        assert!(session
            .forced_next_command
            .accepts(AppCmd::from_request_byte(AppCmd::LOAD_TOC_REQ)));
        assert!(session
            .forced_next_command
            .accepts(AppCmd::from_request_byte(AppCmd::GET_NAMEVERSION_REQ)));
        assert!(!session
            .forced_next_command
            .accepts(AppCmd::from_request_byte(AppCmd::GET_LIST_REQ)));
    }

    #[test]
    fn any_accepts_every_command() {
        let forced = ForcedCommand::Any;
        assert!(forced.accepts(AppCmd::from_request_byte(AppCmd::PUT_REQ)));
        assert!(forced.accepts(AppCmd::from_request_byte(AppCmd::CALCULATE_REQ)));
    }
}
