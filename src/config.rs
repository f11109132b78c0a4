//
// Copyright (c) 2025 TRUSTEDGE LABS LLC
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: trustedge — Privacy and trust at the edge.
//

//! Dispatcher-wide tunables, analogous to the teacher crate's
//! transport-layer `TransportConfig`.

/// Behavior knobs that are policy rather than wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Number of `poll_touch` calls per LED half-flash while blocking on a
    /// touch confirmation. The original firmware used a busy-wait count of
    /// 35000 between LED toggles; kept as the default here purely for
    /// flash-rate parity, not for any timing correctness reason (touch
    /// waits are unbounded either way, see [`crate::platform::Platform::wait_touch`]).
    pub touch_flash_period: u32,

    /// Whether `OATH_PROP_ALG` values other than SHA-1 are rejected with
    /// `STATUS_BAD` (`true`) or silently treated as SHA-1, matching the
    /// original firmware's behavior (`false`). Decided in favor of `true`:
    /// see the "Open question" in the design notes.
    pub reject_unknown_alg: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            touch_flash_period: 35_000,
            reject_unknown_alg: true,
        }
    }
}
