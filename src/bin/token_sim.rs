//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Off-hardware simulator: runs the dispatcher loop over stdin/stdout using
//! [`ByteChannel`] and [`SimPlatform`], so a host-side driver can exercise
//! the real command set without flashing firmware. Boot/bringup glue and
//! the host CLI itself are out of scope for the library (see `spec.md`
//! §1); this binary is the minimal harness that wires the library's own
//! trait boundaries to concrete stdio/software implementations, the same
//! role the teacher's `src/bin/trustedge-server.rs` plays for its library.

use oath_token_core::dispatcher::Dispatcher;
use oath_token_core::platform::SimPlatform;
use oath_token_core::proto::ByteChannel;
use oath_token_core::session::SessionState;
use oath_token_core::DispatcherConfig;
use rand_core::{OsRng, RngCore};

fn main() {
    tracing_subscriber_init();

    // Real firmware captures `local_cdi` from a hardware measurement
    // region; off-hardware there is no such region, so the simulator
    // draws one fresh key per process and never persists it, matching
    // the spec's "ephemeral per power cycle" lifecycle.
    let mut cdi = [0u8; 32];
    OsRng.fill_bytes(&mut cdi);

    let session = SessionState::boot(cdi);
    let platform = SimPlatform::touch_ready();
    let channel = ByteChannel::new(StdioStream);
    let mut dispatcher = Dispatcher::new(session, platform, channel, OsRng, DispatcherConfig::default());

    tracing::info!("token_sim booted, serving frames on stdin/stdout");
    if let Err(err) = dispatcher.run() {
        tracing::error!(%err, "dispatcher loop exited");
        std::process::exit(1);
    }
}

/// Couples stdin/stdout into the single `Read + Write` stream `ByteChannel`
/// expects. A real transport (USB, UART) is a single duplex stream; stdio
/// is two independent pipes, so this just forwards each call to the one
/// that matches.
struct StdioStream;

impl std::io::Read for StdioStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        std::io::Read::read(&mut std::io::stdin(), buf)
    }
}

impl std::io::Write for StdioStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::io::Write::write(&mut std::io::stdout(), buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        std::io::Write::flush(&mut std::io::stdout())
    }
}

fn tracing_subscriber_init() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .try_init();
}
