//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Unified error hierarchy for the OATH token firmware core.

use thiserror::Error;

/// Top-level error type for one command handler invocation.
///
/// The dispatcher is the only place that turns a `TokenError` into a
/// wire-level reply (`NOK` or a `STATUS_BAD` body) — handlers never poke at
/// frame bytes on failure, they just return one of these.
#[derive(Error, Debug)]
pub enum TokenError {
    /// The incoming command violated the ordering rules of `forced_next_command`,
    /// or targeted the wrong frame endpoint. Wire behavior: minimal `NOK` reply,
    /// no state mutation.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// AEAD unlock failed (MAC mismatch) or an algorithm was rejected.
    /// Wire behavior: `STATUS_BAD` reply, chunk cursor reset, `forced_next_command`
    /// left intact so the host can retry.
    #[error("cryptographic failure: {0}")]
    Crypto(#[from] CryptoError),

    /// A semantic or bounds failure: descriptor count over limit, ToC full,
    /// `PUT_GETRECORD` with no prior `PUT`, chunk would overflow its buffer.
    /// Wire behavior: `STATUS_BAD`, state reset for that operation only.
    #[error("bounds or semantic failure: {0}")]
    Bounds(#[from] BoundsError),

    /// Hardware could not be trusted to continue (TRNG stuck, MMIO fault).
    /// Not wire-visible — the entry point turns this into the red-flash dead loop.
    #[error("fatal hardware failure: {0}")]
    Fatal(String),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("command 0x{got:02x} not accepted, forced_next_command is 0x{expected:02x}")]
    UnexpectedCommand { expected: u8, got: u8 },

    #[error("frame endpoint 0x{0:02x} is not this application's")]
    WrongEndpoint(u8),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    #[error("AEAD unlock failed: MAC did not verify")]
    UnlockFailed,

    #[error("OATH algorithm bits are not SHA-1 and unknown algorithms are rejected")]
    UnsupportedAlgorithm,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsError {
    #[error("descriptor_count {0} exceeds TOC_DESCRIPTORS_MAXCOUNT")]
    TooManyDescriptors(u8),

    #[error("table of contents is full, cannot PUT another record")]
    TocFull,

    #[error("PUT_GETRECORD requested but no PUT has completed")]
    NoStagedRecord,

    #[error("GET_ENCRYPTEDTOC requested on an empty table of contents")]
    EmptyToc,

    #[error("first LOAD_TOC chunk shorter than the header ({got} < {need} bytes)")]
    ShortHeaderChunk { got: usize, need: usize },

    #[error("chunk of {nbytes} bytes at cursor {cursor} would overflow a {capacity}-byte buffer")]
    ChunkOverflow {
        cursor: usize,
        nbytes: usize,
        capacity: usize,
    },
}

pub type Result<T> = core::result::Result<T, TokenError>;
