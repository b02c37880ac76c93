// Copyright 2026 the conc-echo authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The wire protocol's per-byte framing state machine.
//!
//! Control bytes `'^'` (0x5E) and `'$'` (0x24) delimit messages. Every
//! input byte seen while inside a message produces exactly one output byte,
//! `b.wrapping_add(1)`.

/// Position in the framing state machine.
///
/// `InitialAck` is handled by the caller (staging the single `'*'` byte);
/// it is included here so a `PeerState` can track it alongside
/// `WaitForMsg`/`InMsg` in one field, all three belong under `PeerState.phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The connection's one-time ACK byte has not yet been fully sent.
    InitialAck,
    /// Scanning input for the next `'^'`.
    WaitForMsg,
    /// Inside a message; non-terminator bytes are echoed incremented.
    InMsg,
}

const CARET: u8 = b'^';
const DOLLAR: u8 = b'$';

/// Advances `phase` by one input byte, returning the new phase and the byte
/// to echo, if any.
///
/// This is a pure function with no I/O and no allocation: the caller stages
/// `Some(b)` into its own outbound buffer. It is the single source of truth
/// for the protocol's edge cases:
///
/// - A `'^'` seen while already `InMsg` is not a terminator; it falls
///   through to the generic "echo incremented" arm and comes back as `'_'`
///   (`0x5E + 1 == 0x5F`).
/// - A `'$'` seen while `WaitForMsg` is ignored (not a recognized control
///   byte outside a message).
/// - The increment wraps in the 8-bit domain (`0xff` echoes as `0x00`).
#[inline]
pub fn step(phase: Phase, byte: u8) -> (Phase, Option<u8>) {
    match phase {
        Phase::InitialAck => (Phase::InitialAck, None),
        Phase::WaitForMsg => {
            if byte == CARET {
                (Phase::InMsg, None)
            } else {
                (Phase::WaitForMsg, None)
            }
        }
        Phase::InMsg => {
            if byte == DOLLAR {
                (Phase::WaitForMsg, None)
            } else {
                (Phase::InMsg, Some(byte.wrapping_add(1)))
            }
        }
    }
}

/// Feeds `input` through [`step`] starting from `phase`, appending every
/// echoed byte to `out` and returning the phase the stream ended in.
///
/// Used by both non-blocking callbacks (staging into a fixed send buffer)
/// and the blocking reference handler (staging into a one-byte scratch
/// buffer before a synchronous send).
pub fn drive(mut phase: Phase, input: &[u8], out: &mut Vec<u8>) -> Phase {
    for &b in input {
        let (next, echoed) = step(phase, b);
        phase = next;
        if let Some(b) = echoed {
            out.push(b);
        }
    }
    phase
}
