//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Outer frame protocol and app-layer opcodes (section 6).
//!
//! The length-framed byte-stream encoder/decoder is an external
//! collaborator by design — the dispatcher only needs something that hands
//! it validated `Frame`s and accepts reply `Frame`s back. [`FrameChannel`]
//! is that boundary, mirroring the role the teacher crate gives its
//! `Transport` trait over QUIC/TCP. [`ByteChannel`] is a reference framer
//! (one-byte header, `{id, endpoint, status, length_code}`) used by the
//! simulator binary and the integration tests; it is not itself part of
//! the normative core.

use std::io::{self, Read, Write};

/// Maximum payload bytes any single frame carries (the largest length
/// code, 128, minus nothing — `PAYLOAD_MAXLEN` below is the chunking unit
/// for multi-frame operations, one byte less to leave room for the status
/// byte every request/reply carries as byte 0).
pub const CMDLEN_MAXBYTES: usize = 128;

/// Chunk size used when streaming a multi-frame operation's body.
pub const PAYLOAD_MAXLEN: usize = CMDLEN_MAXBYTES - 1;

pub const STATUS_OK: u8 = 0;
pub const STATUS_BAD: u8 = 1;

/// Which application a frame targets. `Fw` is always rejected with `NOK`
/// by this dispatcher; only `Sw` frames are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Fw,
    Sw,
}

/// App-layer opcode, byte 0 of a frame's payload. Request and response
/// share a name; the response code is always the request code + 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCmd {
    GetNameVersion,
    LoadToc,
    GetList,
    GetEncryptedToc,
    Put,
    PutGetRecord,
    Calculate,
    Unknown(u8),
}

impl AppCmd {
    pub const GET_NAMEVERSION_REQ: u8 = 0x01;
    pub const GET_NAMEVERSION_RSP: u8 = 0x02;
    pub const LOAD_TOC_REQ: u8 = 0x03;
    pub const LOAD_TOC_RSP: u8 = 0x04;
    pub const GET_LIST_REQ: u8 = 0x05;
    pub const GET_LIST_RSP: u8 = 0x06;
    pub const GET_ENCRYPTEDTOC_REQ: u8 = 0x07;
    pub const GET_ENCRYPTEDTOC_RSP: u8 = 0x08;
    pub const PUT_REQ: u8 = 0x09;
    pub const PUT_RSP: u8 = 0x0a;
    pub const PUT_GETRECORD_REQ: u8 = 0x0b;
    pub const PUT_GETRECORD_RSP: u8 = 0x0c;
    pub const CALCULATE_REQ: u8 = 0x0d;
    pub const CALCULATE_RSP: u8 = 0x0e;
    pub const UNKNOWN_RSP: u8 = 0xff;

    pub fn from_request_byte(byte: u8) -> Self {
        match byte {
            Self::GET_NAMEVERSION_REQ => Self::GetNameVersion,
            Self::LOAD_TOC_REQ => Self::LoadToc,
            Self::GET_LIST_REQ => Self::GetList,
            Self::GET_ENCRYPTEDTOC_REQ => Self::GetEncryptedToc,
            Self::PUT_REQ => Self::Put,
            Self::PUT_GETRECORD_REQ => Self::PutGetRecord,
            Self::CALCULATE_REQ => Self::Calculate,
            other => Self::Unknown(other),
        }
    }

    pub fn request_byte(self) -> u8 {
        match self {
            Self::GetNameVersion => Self::GET_NAMEVERSION_REQ,
            Self::LoadToc => Self::LOAD_TOC_REQ,
            Self::GetList => Self::GET_LIST_REQ,
            Self::GetEncryptedToc => Self::GET_ENCRYPTEDTOC_REQ,
            Self::Put => Self::PUT_REQ,
            Self::PutGetRecord => Self::PUT_GETRECORD_REQ,
            Self::Calculate => Self::CALCULATE_REQ,
            Self::Unknown(b) => b,
        }
    }

    pub fn response_byte(self) -> u8 {
        match self {
            Self::GetNameVersion => Self::GET_NAMEVERSION_RSP,
            Self::LoadToc => Self::LOAD_TOC_RSP,
            Self::GetList => Self::GET_LIST_RSP,
            Self::GetEncryptedToc => Self::GET_ENCRYPTEDTOC_RSP,
            Self::Put => Self::PUT_RSP,
            Self::PutGetRecord => Self::PUT_GETRECORD_RSP,
            Self::Calculate => Self::CALCULATE_RSP,
            Self::Unknown(_) => Self::UNKNOWN_RSP,
        }
    }

    /// Fixed reply body length for this command, per the opcode table.
    /// `Unknown` replies are 1 byte.
    pub fn response_len(self) -> usize {
        match self {
            Self::GetNameVersion => 32,
            Self::LoadToc => 4,
            Self::GetList => 128,
            Self::GetEncryptedToc => 128,
            Self::Put => 4,
            Self::PutGetRecord => 128,
            Self::Calculate => 128,
            Self::Unknown(_) => 1,
        }
    }

    /// Whether this command is accepted regardless of `forced_next_command`.
    pub fn always_accepted(self) -> bool {
        matches!(self, Self::GetNameVersion)
    }
}

/// A single validated frame: which endpoint it targets, whether it is a
/// status reply (vs. a request), and its payload (opcode byte + body, for
/// requests; status byte + body, for replies).
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: u8,
    pub endpoint: Endpoint,
    pub nok: bool,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn request(id: u8, payload: Vec<u8>) -> Self {
        Self {
            id,
            endpoint: Endpoint::Sw,
            nok: false,
            payload,
        }
    }

    pub fn nok_reply(id: u8) -> Self {
        Self {
            id,
            endpoint: Endpoint::Sw,
            nok: true,
            payload: Vec::new(),
        }
    }

    pub fn reply(id: u8, payload: Vec<u8>) -> Self {
        Self {
            id,
            endpoint: Endpoint::Sw,
            nok: false,
            payload,
        }
    }
}

/// The boundary between the dispatcher and the outer frame protocol.
/// Implementations deliver one already-validated [`Frame`] per `recv` and
/// accept one reply [`Frame`] per `send` — length-code selection, header
/// bit-packing, and stream framing all live on the other side of this
/// trait.
pub trait FrameChannel {
    fn recv(&mut self) -> io::Result<Frame>;
    fn send(&mut self, frame: Frame) -> io::Result<()>;
}

/// Length-code mapping used by [`ByteChannel`]'s reference header format:
/// 3 bits selecting one of {1, 4, 32, 128} payload bytes.
fn len_for_code(code: u8) -> usize {
    match code & 0b111 {
        0 => 1,
        1 => 4,
        2 => 32,
        _ => 128,
    }
}

fn code_for_len(len: usize) -> u8 {
    match len {
        0..=1 => 0,
        2..=4 => 1,
        5..=32 => 2,
        _ => 3,
    }
}

/// Reference [`FrameChannel`] over any `Read + Write` byte stream: a
/// 1-byte header (`id:2 | endpoint:2 | status:1 | length_code:3`) followed
/// by `len_for_code(length_code)` payload bytes. Not part of the
/// normative core — provided so the simulator binary and integration
/// tests have a concrete stream to drive the dispatcher through.
pub struct ByteChannel<S> {
    stream: S,
}

impl<S: Read + Write> ByteChannel<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: Read + Write> FrameChannel for ByteChannel<S> {
    fn recv(&mut self) -> io::Result<Frame> {
        let mut header = [0u8; 1];
        self.stream.read_exact(&mut header)?;
        let id = (header[0] >> 6) & 0b11;
        let endpoint = if (header[0] >> 4) & 0b11 == 0 {
            Endpoint::Fw
        } else {
            Endpoint::Sw
        };
        let nok = (header[0] >> 3) & 0b1 != 0;
        let len = len_for_code(header[0]);

        let mut payload = vec![0u8; len];
        self.stream.read_exact(&mut payload)?;

        Ok(Frame {
            id,
            endpoint,
            nok,
            payload,
        })
    }

    fn send(&mut self, frame: Frame) -> io::Result<()> {
        let endpoint_bits: u8 = match frame.endpoint {
            Endpoint::Fw => 0,
            Endpoint::Sw => 1,
        };
        let code = code_for_len(frame.payload.len());
        let header = (frame.id & 0b11) << 6
            | (endpoint_bits & 0b11) << 4
            | (frame.nok as u8) << 3
            | (code & 0b111);

        self.stream.write_all(&[header])?;
        let mut padded = vec![0u8; len_for_code(code)];
        let n = frame.payload.len().min(padded.len());
        padded[..n].copy_from_slice(&frame.payload[..n]);
        self.stream.write_all(&padded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[derive(Default)]
    struct Loopback {
        buf: Vec<u8>,
        pos: usize,
    }

    impl Read for Loopback {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            let n = (self.buf.len() - self.pos).min(out.len());
            out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    impl Write for Loopback {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.buf.extend_from_slice(data);
            Ok(data.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn opcode_response_is_request_plus_one() {
        for cmd in [
            AppCmd::GetNameVersion,
            AppCmd::LoadToc,
            AppCmd::GetList,
            AppCmd::GetEncryptedToc,
            AppCmd::Put,
            AppCmd::PutGetRecord,
            AppCmd::Calculate,
        ] {
            assert_eq!(cmd.response_byte(), cmd.request_byte() + 1);
        }
    }

    #[test]
    fn unknown_opcode_round_trips_through_from_request_byte() {
        let cmd = AppCmd::from_request_byte(0x42);
        assert_eq!(cmd, AppCmd::Unknown(0x42));
        assert_eq!(cmd.response_byte(), AppCmd::UNKNOWN_RSP);
        assert_eq!(cmd.response_len(), 1);
    }

    #[test]
    fn byte_channel_round_trips_a_frame() {
        let mut channel = ByteChannel::new(Loopback::default());
        channel
            .send(Frame::reply(2, vec![STATUS_OK, 1, 2, 3]))
            .unwrap();

        // Rewind by replaying the written bytes into a fresh reader.
        let written = channel.into_inner().buf;
        let mut channel = ByteChannel::new(Cursor::new(written));
        let frame = channel.recv().unwrap();
        assert_eq!(frame.id, 2);
        assert_eq!(frame.endpoint, Endpoint::Sw);
        assert!(!frame.nok);
        assert_eq!(&frame.payload[..4], &[STATUS_OK, 1, 2, 3]);
    }
}
