//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! # oath-token-core
//!
//! Firmware core for a hardware OATH (HOTP/TOTP) security token. Five
//! components, leaves first:
//!
//! - [`records`] (C1) — packed, little-endian, byte-exact record layouts.
//! - [`crypto`] (C2) — the XChaCha20-Poly1305 AEAD envelope binding a
//!   32-byte device key to each record and to the table of contents.
//! - [`oath`] (C3) — RFC 4226 HOTP, with RFC 6238 TOTP as HOTP over
//!   `time / step`.
//! - [`session`] (C4) — the ephemeral, per-power-cycle session buffers.
//! - [`dispatcher`] (C5) — the single-threaded command dispatcher tying
//!   the above together into one request/response loop.
//!
//! [`platform`] and [`proto`] are the hardware/outer-protocol trait
//! boundaries: the TRNG, LED, touch sensor, and frame codec are external
//! collaborators by design, and only their contracts live in this crate.
//!
//! This is firmware-shaped: single-threaded, no heap allocation on the hot
//! path, fixed-size buffers, and blocking suspension points. It is not an
//! async service, unlike most of this workspace's other crates.

pub mod config;
pub mod crypto;
pub mod dispatcher;
pub mod error;
pub mod oath;
pub mod platform;
pub mod proto;
pub mod records;
pub mod session;

pub use config::DispatcherConfig;
pub use crypto::Cdi;
pub use dispatcher::Dispatcher;
pub use error::{BoundsError, CryptoError, ProtocolError, TokenError};
pub use platform::{Led, Platform};
pub use proto::{AppCmd, ByteChannel, Frame, FrameChannel};
pub use session::{ForcedCommand, SessionState};
