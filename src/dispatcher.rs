//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Command dispatcher (component C5): the single loop that reads one
//! frame, validates ordering against `forced_next_command`, drives C1–C4,
//! and emits exactly one reply frame.

use std::io;

use crate::config::DispatcherConfig;
use crate::crypto::{lock_aead, unlock_aead};
use crate::error::{BoundsError, CryptoError, ProtocolError, TokenError};
use crate::oath;
use crate::platform::{Led, Platform};
use crate::proto::{AppCmd, Endpoint, Frame, FrameChannel, PAYLOAD_MAXLEN, STATUS_BAD, STATUS_OK};
use crate::records::*;
use crate::session::{ForcedCommand, SessionState};
use rand_core::RngCore;
use zeroize::Zeroize;

/// Ties the session state to the platform/channel/RNG collaborators and
/// runs the single dispatch loop described in section 4.5.
pub struct Dispatcher<P, C, R> {
    pub session: SessionState,
    platform: P,
    channel: C,
    rng: R,
    config: DispatcherConfig,
}

impl<P: Platform, C: FrameChannel, R: RngCore> Dispatcher<P, C, R> {
    pub fn new(session: SessionState, platform: P, channel: C, rng: R, config: DispatcherConfig) -> Self {
        Self {
            session,
            platform,
            channel,
            rng,
            config,
        }
    }

    /// Consume the dispatcher, handing back its session state -- used to
    /// carry state across a simulated power-cycle boundary in tests.
    pub fn into_session(self) -> SessionState {
        self.session
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Run the dispatch loop forever. Each iteration is exactly one
    /// `step`; there are no cooperative yield points within a step.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            self.step()?;
        }
    }

    /// Consume one incoming frame and produce exactly one reply.
    pub fn step(&mut self) -> io::Result<()> {
        let frame = self.channel.recv()?;

        if frame.endpoint == Endpoint::Fw {
            tracing::debug!(id = frame.id, "frame targets DST_FW, rejecting");
            self.platform.set_led(Led::RED);
            return self.channel.send(Frame::nok_reply(frame.id));
        }

        let Some(&cmd_byte) = frame.payload.first() else {
            tracing::warn!(id = frame.id, "empty payload on a DST_SW frame");
            return self.channel.send(Frame::nok_reply(frame.id));
        };
        let cmd = AppCmd::from_request_byte(cmd_byte);

        if !self.session.forced_next_command.accepts(cmd) {
            let violation = ProtocolError::UnexpectedCommand {
                expected: match self.session.forced_next_command {
                    ForcedCommand::Any => 0,
                    ForcedCommand::Only(b) => b,
                },
                got: cmd_byte,
            };
            tracing::warn!(error = %violation, "rejecting out-of-order command");
            self.platform.set_led(Led::RED);
            return self.channel.send(Frame::nok_reply(frame.id));
        }

        let body = &frame.payload[1..];
        let result = self.dispatch(cmd, body);

        let reply_payload = match result {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(error = %err, ?cmd, "command handler failed");
                match err {
                    TokenError::Crypto(_) => self.platform.set_led(Led::RED | Led::GREEN),
                    _ => self.platform.set_led(Led::RED),
                }
                self.fixed_status(cmd, STATUS_BAD)
            }
        };

        self.channel.send(Frame::reply(frame.id, reply_payload))
    }

    fn dispatch(&mut self, cmd: AppCmd, body: &[u8]) -> Result<Vec<u8>, TokenError> {
        match cmd {
            AppCmd::GetNameVersion => Ok(self.handle_get_nameversion()),
            AppCmd::LoadToc => self.handle_load_toc(body),
            AppCmd::GetList => self.handle_get_list(),
            AppCmd::GetEncryptedToc => self.handle_get_encryptedtoc(),
            AppCmd::Put => self.handle_put(body),
            AppCmd::PutGetRecord => self.handle_put_getrecord(),
            AppCmd::Calculate => self.handle_calculate(body),
            AppCmd::Unknown(_) => Ok(vec![AppCmd::UNKNOWN_RSP]),
        }
    }

    fn fixed_status(&self, cmd: AppCmd, status: u8) -> Vec<u8> {
        let mut buf = vec![0u8; cmd.response_len()];
        buf[0] = cmd.response_byte();
        buf[1] = status;
        buf
    }

    // ---- GET_NAMEVERSION ---------------------------------------------------

    fn handle_get_nameversion(&self) -> Vec<u8> {
        let mut buf = vec![0u8; AppCmd::GetNameVersion.response_len()];
        buf[0] = AppCmd::GetNameVersion.response_byte();
        buf[1..5].copy_from_slice(b"tk1 ");
        buf[5..9].copy_from_slice(b"oath");
        buf[9..13].copy_from_slice(&1u32.to_le_bytes());
        buf
    }

    // ---- LOAD_TOC -----------------------------------------------------------

    fn handle_load_toc(&mut self, body: &[u8]) -> Result<Vec<u8>, TokenError> {
        let cursor = self.session.nbytes_transferred as usize;

        if cursor == 0 {
            if body.len() < DecryptedTocHeaderView::LEN {
                return Err(BoundsError::ShortHeaderChunk {
                    got: body.len(),
                    need: DecryptedTocHeaderView::LEN,
                }
                .into());
            }
            self.session.toc_buf.fill(0);
        }

        // The header (and so `descriptor_count`) is always fully present in
        // the first chunk; later chunks read it back out of `toc_buf` where
        // the first chunk's copy already landed it.
        let descriptor_count = if cursor == 0 {
            DecryptedTocHeaderView::descriptor_count(body)
        } else {
            DecryptedTocHeaderView::descriptor_count(&self.session.toc_buf)
        };

        if descriptor_count as usize > TOC_DESCRIPTORS_MAXCOUNT {
            self.session.reset_cursor();
            return Err(BoundsError::TooManyDescriptors(descriptor_count).into());
        }

        if descriptor_count == 0 {
            self.session.reset_cursor();
            self.session.forced_next_command = ForcedCommand::Any;
            return Ok(self.fixed_status(AppCmd::LoadToc, STATUS_OK));
        }

        let total_needed = DecryptedTocHeaderView::LEN + DecryptedTocView::ciphertext_len(descriptor_count);
        let nbytes = (total_needed - cursor).min(PAYLOAD_MAXLEN).min(body.len());
        let dest_end = cursor + nbytes;
        if dest_end > DECRYPTED_TOC_LEN {
            self.session.reset_cursor();
            return Err(BoundsError::ChunkOverflow {
                cursor,
                nbytes,
                capacity: DECRYPTED_TOC_LEN,
            }
            .into());
        }
        self.session.toc_buf[cursor..dest_end].copy_from_slice(&body[..nbytes]);
        self.session.nbytes_transferred = dest_end as i32;
        self.session.forced_next_command = ForcedCommand::Only(AppCmd::LOAD_TOC_REQ);

        if dest_end < total_needed {
            return Ok(self.fixed_status(AppCmd::LoadToc, STATUS_OK));
        }

        let aad = DecryptedTocHeaderView::protected_header_bytes(&self.session.toc_buf).to_vec();
        let nonce = DecryptedTocHeaderView::nonce(&self.session.toc_buf).to_vec();
        let mac = DecryptedTocHeaderView::mac(&self.session.toc_buf).to_vec();
        let cdi = *self.session.local_cdi();

        let descriptors_ciphertext_len = DecryptedTocView::ciphertext_len(descriptor_count);
        let descriptors =
            &mut DecryptedTocView::descriptors_mut(&mut self.session.toc_buf)[..descriptors_ciphertext_len];

        match unlock_aead(descriptors, &cdi, &nonce, &mac, &aad) {
            Ok(()) => {
                self.session.reset_cursor();
                self.session.forced_next_command = ForcedCommand::Any;
                Ok(self.fixed_status(AppCmd::LoadToc, STATUS_OK))
            }
            Err(_) => {
                self.session.reset_cursor();
                self.session.forced_next_command = ForcedCommand::Only(AppCmd::LOAD_TOC_REQ);
                Err(CryptoError::UnlockFailed.into())
            }
        }
    }

    // ---- GET_LIST -----------------------------------------------------------

    fn handle_get_list(&mut self) -> Result<Vec<u8>, TokenError> {
        let is_first = self.session.forced_next_command != ForcedCommand::Only(AppCmd::GET_LIST_REQ);
        let descriptor_count = DecryptedTocHeaderView::descriptor_count(&self.session.toc_buf);
        let target = DecryptedTocView::ciphertext_len(descriptor_count);

        if is_first {
            let settings = DecryptedTocHeaderView::settings(&self.session.toc_buf);
            if settings.needs_touch() {
                self.platform.wait_touch(Led::GREEN, self.config.touch_flash_period);
            }
            self.session.nbytes_transferred = 0;
        }

        let already_sent = (-self.session.nbytes_transferred) as usize;
        let remaining = target.saturating_sub(already_sent);
        // One byte of every 128-byte reply is the response code (byte 0)
        // and one more is the count/status byte (byte 1), leaving
        // `PAYLOAD_MAXLEN - 1` for descriptor data.
        let chunk_len = remaining.min(PAYLOAD_MAXLEN - 1);

        let mut reply = vec![0u8; AppCmd::GetList.response_len()];
        reply[0] = AppCmd::GetList.response_byte();
        reply[1] = if is_first { descriptor_count } else { STATUS_OK };
        let descriptors = DecryptedTocView::descriptors(&self.session.toc_buf);
        reply[2..2 + chunk_len].copy_from_slice(&descriptors[already_sent..already_sent + chunk_len]);

        let sent_now = already_sent + chunk_len;
        if sent_now >= target {
            self.session.reset_cursor();
            self.session.forced_next_command = ForcedCommand::Any;
        } else {
            self.session.nbytes_transferred = -(sent_now as i32);
            self.session.forced_next_command = ForcedCommand::Only(AppCmd::GET_LIST_REQ);
        }

        Ok(reply)
    }

    // ---- GET_ENCRYPTEDTOC ----------------------------------------------------

    fn handle_get_encryptedtoc(&mut self) -> Result<Vec<u8>, TokenError> {
        let is_first = self.session.forced_next_command != ForcedCommand::Only(AppCmd::GET_ENCRYPTEDTOC_REQ);
        let descriptor_count = DecryptedTocHeaderView::descriptor_count(&self.session.toc_buf);

        if is_first {
            if descriptor_count == 0 {
                return Err(BoundsError::EmptyToc.into());
            }

            let aad = DecryptedTocHeaderView::protected_header_bytes(&self.session.toc_buf).to_vec();
            let cdi = *self.session.local_cdi();
            let descriptors_len = DecryptedTocView::ciphertext_len(descriptor_count);
            let mut mac = [0u8; XCHACHA20_MAC_LEN];

            let nonce = {
                let descriptors =
                    &mut DecryptedTocView::descriptors_mut(&mut self.session.toc_buf)[..descriptors_len];
                lock_aead(descriptors, &cdi, &aad, &mut mac, &mut self.rng)
            };

            DecryptedTocHeaderView::nonce_mut(&mut self.session.toc_buf).copy_from_slice(&nonce);
            DecryptedTocHeaderView::mac_mut(&mut self.session.toc_buf).copy_from_slice(&mac);
            self.session.nbytes_transferred = 0;
        }

        let target = DecryptedTocHeaderView::LEN + DecryptedTocView::ciphertext_len(descriptor_count);
        let already_sent = (-self.session.nbytes_transferred) as usize;
        let remaining = target.saturating_sub(already_sent);
        let chunk_len = remaining.min(PAYLOAD_MAXLEN - 1);

        let mut reply = vec![0u8; AppCmd::GetEncryptedToc.response_len()];
        reply[0] = AppCmd::GetEncryptedToc.response_byte();
        reply[1] = STATUS_OK;
        reply[2..2 + chunk_len].copy_from_slice(&self.session.toc_buf[already_sent..already_sent + chunk_len]);

        let sent_now = already_sent + chunk_len;
        if sent_now >= target {
            self.session.reset_cursor();
            self.session.forced_next_command = ForcedCommand::Only(AppCmd::LOAD_TOC_REQ);
        } else {
            self.session.nbytes_transferred = -(sent_now as i32);
            self.session.forced_next_command = ForcedCommand::Only(AppCmd::GET_ENCRYPTEDTOC_REQ);
        }

        Ok(reply)
    }

    // ---- PUT ------------------------------------------------------------------

    fn handle_put(&mut self, body: &[u8]) -> Result<Vec<u8>, TokenError> {
        let cursor = self.session.nbytes_transferred as usize;
        // `oath_record_put` (143 B) always spans more than one chunk, and
        // frame length codes only produce bodies of {1, 4, 32, 128}, so the
        // last chunk is routinely padded past the exact remainder. Clamp to
        // what's actually still needed and drop the padding.
        let nbytes = (OATH_RECORD_PUT_LEN - cursor).min(PAYLOAD_MAXLEN).min(body.len());
        let dest_end = cursor + nbytes;
        debug_assert!(dest_end <= OATH_RECORD_PUT_LEN);
        self.session.oath_record_buf[cursor..dest_end].copy_from_slice(&body[..nbytes]);
        self.session.nbytes_transferred = dest_end as i32;

        if dest_end < OATH_RECORD_PUT_LEN {
            self.session.forced_next_command = ForcedCommand::Only(AppCmd::PUT_REQ);
            return Ok(self.fixed_status(AppCmd::Put, STATUS_OK));
        }

        let descriptor_count = DecryptedTocHeaderView::descriptor_count(&self.session.toc_buf);
        if descriptor_count as usize >= TOC_DESCRIPTORS_MAXCOUNT {
            self.session.reset_cursor();
            return Err(BoundsError::TocFull.into());
        }

        let name_len = OathRecordPutView::name_len(&self.session.oath_record_buf);
        let name = OathRecordPutView::name(&self.session.oath_record_buf).to_vec();
        {
            let slot = DecryptedTocView::descriptor_mut(&mut self.session.toc_buf, descriptor_count as usize);
            TocRecordDescriptorView::set(slot, name_len, &name);
        }
        DecryptedTocHeaderView::set_descriptor_count(&mut self.session.toc_buf, descriptor_count + 1);

        OathRecordPutView::name_field_mut(&mut self.session.oath_record_buf).fill(0);
        OathRecordPutView::set_name_len(&mut self.session.oath_record_buf, 0);

        let cdi = *self.session.local_cdi();
        let aad = OathRecordView::protected_bytes(OathRecordPutView::record(&self.session.oath_record_buf)).to_vec();
        let mut mac = [0u8; XCHACHA20_MAC_LEN];
        let nonce = {
            let record = OathRecordPutView::record_mut(&mut self.session.oath_record_buf);
            let blob = OathRecordView::encrypted_blob_mut(record);
            lock_aead(blob, &cdi, &aad, &mut mac, &mut self.rng)
        };

        // The 143-byte staging buffer is reinterpreted as a 118-byte
        // `secure_oath_record` (record + nonce + mac); the former
        // name_len/name tail (65 B) is wide enough to hold nonce+mac (40 B)
        // with 25 B left as padding. This is the in-place aliasing the
        // design notes call for, expressed as typed views, not a union.
        {
            let secure = &mut self.session.oath_record_buf[..SECURE_OATH_RECORD_LEN];
            SecureOathRecordView::nonce_mut(secure).copy_from_slice(&nonce);
            SecureOathRecordView::mac_mut(secure).copy_from_slice(&mac);
        }
        self.session.oath_record_buf[SECURE_OATH_RECORD_LEN..].fill(0);

        self.session.oath_record_buf_encrypted_b = true;
        self.session.forced_next_command = ForcedCommand::Only(AppCmd::PUT_GETRECORD_REQ);
        self.session.reset_cursor();

        Ok(self.fixed_status(AppCmd::Put, STATUS_OK))
    }

    // ---- PUT_GETRECORD ---------------------------------------------------------

    fn handle_put_getrecord(&mut self) -> Result<Vec<u8>, TokenError> {
        if !self.session.oath_record_buf_encrypted_b {
            return Err(BoundsError::NoStagedRecord.into());
        }

        let mut reply = vec![0u8; AppCmd::PutGetRecord.response_len()];
        reply[0] = AppCmd::PutGetRecord.response_byte();
        reply[1] = STATUS_OK;
        reply[2..2 + SECURE_OATH_RECORD_LEN].copy_from_slice(&self.session.oath_record_buf[..SECURE_OATH_RECORD_LEN]);

        self.session.oath_record_buf_encrypted_b = false;
        self.session.forced_next_command = ForcedCommand::Any;

        Ok(reply)
    }

    // ---- CALCULATE --------------------------------------------------------------

    fn handle_calculate(&mut self, body: &[u8]) -> Result<Vec<u8>, TokenError> {
        let mut work = [0u8; OATH_CALCULATE_LEN];
        let n = body.len().min(OATH_CALCULATE_LEN);
        work[..n].copy_from_slice(&body[..n]);

        let time = OathCalculateView::time(&work);

        let nonce = SecureOathRecordView::nonce(OathCalculateView::secure_record(&work)).to_vec();
        let mac = SecureOathRecordView::mac(OathCalculateView::secure_record(&work)).to_vec();
        let aad = OathRecordView::protected_bytes(SecureOathRecordView::record(OathCalculateView::secure_record(&work)))
            .to_vec();
        let cdi = *self.session.local_cdi();

        {
            let secure = OathCalculateView::secure_record_mut(&mut work);
            let record = SecureOathRecordView::record_mut(secure);
            let blob = OathRecordView::encrypted_blob_mut(record);
            unlock_aead(blob, &cdi, &nonce, &mac, &aad).map_err(|_| CryptoError::UnlockFailed)?;
        }

        let protected = OathRecordView::protected(SecureOathRecordView::record(OathCalculateView::secure_record(&work)));

        if self.config.reject_unknown_alg && !protected.is_sha1() {
            return Err(CryptoError::UnsupportedAlgorithm.into());
        }

        if protected.needs_touch() {
            self.platform.wait_touch(Led::GREEN, self.config.touch_flash_period);
        }

        let mut key = {
            let blob = OathRecordView::encrypted_blob(SecureOathRecordView::record(OathCalculateView::secure_record(&work)));
            let key_len = (blob[0] as usize).min(RECORD_KEY_MAXLEN - 1);
            blob[1..1 + key_len].to_vec()
        };

        let mut reply = vec![0u8; AppCmd::Calculate.response_len()];
        reply[0] = AppCmd::Calculate.response_byte();
        reply[1] = STATUS_OK;

        if protected.is_hotp() {
            let seq = protected.counter_or_timestep;
            let value = oath::hotp(&key, seq, protected.digits);
            reply[2..6].copy_from_slice(&value.to_le_bytes());

            let mut new_protected = protected;
            new_protected.counter_or_timestep = seq.wrapping_add(1);
            let mut aad_buf = [0u8; OathRecordProtected::LEN];
            new_protected.encode_into(&mut aad_buf);

            {
                let secure = OathCalculateView::secure_record_mut(&mut work);
                let record = SecureOathRecordView::record_mut(secure);
                OathRecordView::set_protected(record, &new_protected);
            }

            let mut new_mac = [0u8; XCHACHA20_MAC_LEN];
            let new_nonce = {
                let secure = OathCalculateView::secure_record_mut(&mut work);
                let record = SecureOathRecordView::record_mut(secure);
                let blob = OathRecordView::encrypted_blob_mut(record);
                lock_aead(blob, &cdi, &aad_buf, &mut new_mac, &mut self.rng)
            };
            {
                let secure = OathCalculateView::secure_record_mut(&mut work);
                SecureOathRecordView::nonce_mut(secure).copy_from_slice(&new_nonce);
                SecureOathRecordView::mac_mut(secure).copy_from_slice(&new_mac);
            }

            let secure_bytes = OathCalculateView::secure_record(&work).to_vec();
            reply[6..6 + SECURE_OATH_RECORD_LEN].copy_from_slice(&secure_bytes);
        } else {
            let step = protected.counter_or_timestep.max(1);
            let value = oath::totp(&key, time, step, protected.digits);
            reply[2..6].copy_from_slice(&value.to_le_bytes());
        }

        key.zeroize();
        work.zeroize();
        Ok(reply)
    }
}

/// Unrecoverable hardware failure: blink red forever. There is no return
/// from this — the only exit is a hardware reset.
pub fn forever_redflash<P: Platform>(platform: &mut P) -> ! {
    loop {
        platform.set_led(Led::RED);
        platform.set_led(Led::BLACK);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::SimPlatform;
    use rand::rngs::mock::StepRng;
    use std::collections::VecDeque;

    struct VecChannel {
        inbox: VecDeque<Frame>,
        outbox: Vec<Frame>,
    }

    impl VecChannel {
        fn new(frames: Vec<Frame>) -> Self {
            Self {
                inbox: frames.into(),
                outbox: Vec::new(),
            }
        }
    }

    impl FrameChannel for VecChannel {
        fn recv(&mut self) -> io::Result<Frame> {
            self.inbox
                .pop_front()
                .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no more frames"))
        }

        fn send(&mut self, frame: Frame) -> io::Result<()> {
            self.outbox.push(frame);
            Ok(())
        }
    }

    fn dispatcher(frames: Vec<Frame>) -> Dispatcher<SimPlatform, VecChannel, StepRng> {
        Dispatcher::new(
            SessionState::boot([0x11u8; 32]),
            SimPlatform::touch_ready(),
            VecChannel::new(frames),
            StepRng::new(0, 1),
            DispatcherConfig::default(),
        )
    }

    #[test]
    fn get_nameversion_is_always_accepted_at_boot() {
        let mut d = dispatcher(vec![Frame::request(1, vec![AppCmd::GET_NAMEVERSION_REQ])]);
        d.step().unwrap();
        let reply = &d.channel.outbox[0];
        assert!(!reply.nok);
        assert_eq!(reply.payload[0], AppCmd::GET_NAMEVERSION_RSP);
        assert_eq!(&reply.payload[1..9], b"tk1 oath");
        assert_eq!(u32::from_le_bytes(reply.payload[9..13].try_into().unwrap()), 1);
    }

    #[test]
    fn any_other_command_at_boot_is_rejected() {
        let mut d = dispatcher(vec![Frame::request(1, vec![AppCmd::GET_LIST_REQ])]);
        d.step().unwrap();
        assert!(d.channel.outbox[0].nok);
    }

    #[test]
    fn empty_toc_load_then_get_list_reports_zero_descriptors() {
        let mut header = [0u8; DecryptedTocHeaderView::LEN];
        DecryptedTocHeaderView::set_descriptor_count(&mut header, 0);
        let mut d = dispatcher(vec![
            Frame::request(1, [&[AppCmd::LOAD_TOC_REQ][..], &header].concat()),
            Frame::request(2, vec![AppCmd::GET_LIST_REQ]),
        ]);
        d.step().unwrap();
        assert_eq!(d.channel.outbox[0].payload[0], AppCmd::LOAD_TOC_RSP);
        assert_eq!(d.channel.outbox[0].payload[1], STATUS_OK);

        d.step().unwrap();
        assert_eq!(d.channel.outbox[1].payload[0], AppCmd::GET_LIST_RSP);
        assert_eq!(d.channel.outbox[1].payload[1], 0);
    }

    #[test]
    fn put_then_getrecord_then_calculate_totp_matches_rfc4226_seq1() {
        let key = b"12345678901234567890";
        let put_record = build_put_command(key, 30, true, false, 6, b"demo");
        // `oath_record_put` is 143 B, wider than one frame's PAYLOAD_MAXLEN
        // (127 B), so a real PUT always spans two chunks.
        let (put_first, put_rest) = put_record.split_at(PAYLOAD_MAXLEN);

        let mut d = dispatcher(vec![
            Frame::request(1, [&[AppCmd::LOAD_TOC_REQ][..], &{
                let mut h = [0u8; DecryptedTocHeaderView::LEN];
                DecryptedTocHeaderView::set_descriptor_count(&mut h, 0);
                h
            }]
            .concat()),
            Frame::request(2, [&[AppCmd::PUT_REQ][..], put_first].concat()),
            Frame::request(3, [&[AppCmd::PUT_REQ][..], put_rest].concat()),
            Frame::request(4, vec![AppCmd::PUT_GETRECORD_REQ]),
        ]);
        d.step().unwrap(); // LOAD_TOC
        d.step().unwrap(); // PUT (first chunk)
        assert_eq!(d.channel.outbox[1].payload[0], AppCmd::PUT_RSP);
        assert_eq!(d.channel.outbox[1].payload[1], STATUS_OK);
        d.step().unwrap(); // PUT (final chunk)
        d.step().unwrap(); // PUT_GETRECORD
        assert_eq!(d.channel.outbox[3].payload[0], AppCmd::PUT_GETRECORD_RSP);
        assert_eq!(d.channel.outbox[3].payload[1], STATUS_OK);

        let secure_record: [u8; SECURE_OATH_RECORD_LEN] =
            d.channel.outbox[3].payload[2..2 + SECURE_OATH_RECORD_LEN]
                .try_into()
                .unwrap();
        let calc = build_calculate_command(&secure_record, 59);

        let mut d2 = Dispatcher::new(
            d.session,
            SimPlatform::touch_ready(),
            VecChannel::new(vec![Frame::request(5, [&[AppCmd::CALCULATE_REQ][..], &calc].concat())]),
            StepRng::new(0, 1),
            DispatcherConfig::default(),
        );
        d2.step().unwrap();
        let reply = &d2.channel.outbox[0];
        assert_eq!(reply.payload[0], AppCmd::CALCULATE_RSP);
        assert_eq!(reply.payload[1], STATUS_OK);
        let value = u32::from_le_bytes(reply.payload[2..6].try_into().unwrap());
        assert_eq!(value, oath::hotp(key, 1, 6));
    }

    #[test]
    fn load_toc_with_zero_descriptors_short_circuits_without_crypto_unlock() {
        let mut header = [0u8; DecryptedTocHeaderView::LEN];
        DecryptedTocHeaderView::set_descriptor_count(&mut header, 0);
        // Nonce/mac are left all-zero; if the dispatcher attempted
        // unlock_aead on this it would fail Poly1305 verification.
        let mut d = dispatcher(vec![Frame::request(
            1,
            [&[AppCmd::LOAD_TOC_REQ][..], &header].concat(),
        )]);
        d.step().unwrap();
        let reply = &d.channel.outbox[0];
        assert_eq!(reply.payload[0], AppCmd::LOAD_TOC_RSP);
        assert_eq!(reply.payload[1], STATUS_OK);
        assert_eq!(d.session.forced_next_command, ForcedCommand::Any);
    }

    #[test]
    fn load_toc_zeroes_stale_descriptors_from_a_prior_load() {
        let key = b"12345678901234567890";
        let put_record = build_put_command(key, 0, false, false, 6, b"example.com:alice");
        let (put_first, put_rest) = put_record.split_at(PAYLOAD_MAXLEN);

        let mut d = dispatcher(vec![
            Frame::request(1, [&[AppCmd::LOAD_TOC_REQ][..], &{
                let mut h = [0u8; DecryptedTocHeaderView::LEN];
                DecryptedTocHeaderView::set_descriptor_count(&mut h, 0);
                h
            }]
            .concat()),
            Frame::request(2, [&[AppCmd::PUT_REQ][..], put_first].concat()),
            Frame::request(3, [&[AppCmd::PUT_REQ][..], put_rest].concat()),
        ]);
        d.step().unwrap(); // LOAD_TOC (empty)
        d.step().unwrap(); // PUT (first chunk)
        d.step().unwrap(); // PUT (final chunk) -- stages one descriptor

        assert_eq!(
            DecryptedTocHeaderView::descriptor_count(&d.session.toc_buf),
            1
        );

        // A fresh LOAD_TOC with descriptor_count == 0 must leave no trace
        // of the previous descriptor in toc_buf.
        let mut header = [0u8; DecryptedTocHeaderView::LEN];
        DecryptedTocHeaderView::set_descriptor_count(&mut header, 0);
        d.channel.inbox.push_back(Frame::request(
            4,
            [&[AppCmd::LOAD_TOC_REQ][..], &header].concat(),
        ));
        d.step().unwrap();

        assert!(d.session.toc_buf.iter().all(|&b| b == 0));
    }
}
