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

//! Per-peer state and the three connection callbacks both readiness loops
//! drive.
//!
//! `PeerState` plus `on_connect`/`on_recv_ready`/`on_send_ready` is the one
//! place the application protocol meets non-blocking I/O; both the
//! `select`-based and `mio`-based loops call into exactly this code; only
//! the multiplexer bookkeeping around it differs.

use std::io::{self, ErrorKind, Read, Write};

use log::warn;

use crate::protocol::Phase;

/// Outbound staging buffer capacity. Must be at least 1024 bytes to absorb
/// one full non-blocking recv batch; 4096 gives comfortable headroom for a
/// batch that is entirely in-message without touching the back-pressure
/// path on every other read.
pub const SENDBUF_CAP: usize = 4096;

/// The maximum number of simultaneously live descriptors a table may hold.
/// Mirrors `MAXFDS` in the reference implementation (`1000`, "max fds on
/// Linux is 1024").
pub const MAXFDS: usize = 1000;

/// Size of the non-blocking read performed per `on_recv_ready` call.
const RECV_BUF_LEN: usize = 1024;

/// What the event loop must watch for a descriptor going forward.
///
/// `{read: false, write: false}` is the one value with special meaning:
/// the connection is being closed. There is no other side channel for
/// "close me" — this is the complete vocabulary the callbacks speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdIntent {
    /// Keep watching for read-readiness.
    pub read: bool,
    /// Keep watching for write-readiness.
    pub write: bool,
}

impl FdIntent {
    /// `{true, false}`
    pub const READ: FdIntent = FdIntent {
        read: true,
        write: false,
    };
    /// `{false, true}`
    pub const WRITE: FdIntent = FdIntent {
        read: false,
        write: true,
    };
    /// `{true, true}`
    pub const BOTH: FdIntent = FdIntent {
        read: true,
        write: true,
    };
    /// `{false, false}` — close this descriptor.
    pub const CLOSE: FdIntent = FdIntent {
        read: false,
        write: false,
    };

    /// True when this intent tells the loop to close the descriptor.
    pub fn is_close(&self) -> bool {
        !self.read && !self.write
    }
}

/// Per-connection record: framing phase plus the fixed-capacity outbound
/// staging buffer.
///
/// Invariant, checked in debug builds at every callback boundary:
/// `0 <= send_ptr <= send_end <= SENDBUF_CAP`, and while `phase ==
/// InitialAck`, `send_end == 1 && send_buf[0] == b'*' && send_ptr == 0`.
#[derive(Debug)]
pub struct PeerState {
    phase: Phase,
    send_buf: [u8; SENDBUF_CAP],
    send_end: usize,
    send_ptr: usize,
}

impl PeerState {
    fn check_invariants(&self) {
        debug_assert!(self.send_ptr <= self.send_end);
        debug_assert!(self.send_end <= SENDBUF_CAP);
        if self.phase == Phase::InitialAck {
            debug_assert_eq!(self.send_end, 1);
            debug_assert_eq!(self.send_buf[0], b'*');
            debug_assert_eq!(self.send_ptr, 0);
        }
    }

    /// Current phase, exposed for tests and diagnostics.
    pub fn phase(&self) -> Phase {
        self.phase
    }
}

/// Installs a fresh [`PeerState`] for a newly accepted, non-blocking
/// descriptor and returns the intent the loop must register.
///
/// Always `{read: false, write: true}`: the ACK byte must go out before any
/// input from the peer is processed.
pub fn on_connect() -> (PeerState, FdIntent) {
    let mut send_buf = [0u8; SENDBUF_CAP];
    send_buf[0] = b'*';
    let state = PeerState {
        phase: Phase::InitialAck,
        send_buf,
        send_end: 1,
        send_ptr: 0,
    };
    (state, FdIntent::WRITE)
}

/// Handles read-readiness on a peer descriptor.
///
/// Applies the back-pressure rule first: if the peer still has pending
/// outbound bytes, or hasn't yet received its ACK, this returns
/// `{read: false, write: true}` without touching the socket. Otherwise
/// performs one non-blocking read and feeds every byte through
/// [`crate::protocol::step`].
pub fn on_recv_ready<S: Read>(peer: &mut PeerState, stream: &mut S) -> io::Result<FdIntent> {
    peer.check_invariants();

    if peer.send_ptr < peer.send_end || peer.phase == Phase::InitialAck {
        return Ok(FdIntent::WRITE);
    }

    let mut buf = [0u8; RECV_BUF_LEN];
    let n = match stream.read(&mut buf) {
        Ok(n) => n,
        Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(FdIntent::READ),
        Err(e) => return Err(e),
    };

    if n == 0 {
        return Ok(FdIntent::CLOSE);
    }

    let free = SENDBUF_CAP - peer.send_end;
    let mut staged = 0;
    for &b in &buf[..n] {
        let (next_phase, echoed) = crate::protocol::step(peer.phase, b);
        peer.phase = next_phase;
        if let Some(out) = echoed {
            assert!(
                staged < free,
                "recv batch produced more echo bytes than SENDBUF_CAP can absorb"
            );
            peer.send_buf[peer.send_end + staged] = out;
            staged += 1;
        }
    }
    peer.send_end += staged;

    peer.check_invariants();

    if staged > 0 {
        Ok(FdIntent::WRITE)
    } else {
        Ok(FdIntent::READ)
    }
}

/// Handles write-readiness on a peer descriptor.
///
/// Performs one non-blocking write of the pending window
/// `send_buf[send_ptr..send_end]`. On full drain while `phase ==
/// InitialAck`, transitions to `WaitForMsg` — this is the only place that
/// transition happens.
pub fn on_send_ready<S: Write>(peer: &mut PeerState, stream: &mut S) -> io::Result<FdIntent> {
    peer.check_invariants();

    if peer.send_ptr == peer.send_end {
        return Ok(FdIntent::BOTH);
    }

    let window = &peer.send_buf[peer.send_ptr..peer.send_end];
    let n = match stream.write(window) {
        Ok(n) => n,
        Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(FdIntent::WRITE),
        Err(e) => return Err(e),
    };

    peer.send_ptr += n;

    let intent = if peer.send_ptr == peer.send_end {
        peer.send_ptr = 0;
        peer.send_end = 0;
        if peer.phase == Phase::InitialAck {
            peer.phase = Phase::WaitForMsg;
        }
        FdIntent::READ
    } else {
        FdIntent::WRITE
    };

    peer.check_invariants();
    Ok(intent)
}

/// Logs a transient "would block" on `accept`, matching the original's
/// "accept returned EAGAIN or EWOULDBLOCK" line.
pub fn log_transient_accept() {
    warn!("accept returned WouldBlock");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct Pending<'a> {
        data: &'a [u8],
    }

    impl<'a> Read for Pending<'a> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.data.len().min(buf.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn connect_sends_single_ack() {
        let (peer, intent) = on_connect();
        assert_eq!(intent, FdIntent::WRITE);
        assert_eq!(peer.phase, Phase::InitialAck);
        assert_eq!(&peer.send_buf[..peer.send_end], b"*");
    }

    #[test]
    fn recv_during_initial_ack_defers() {
        let (mut peer, _) = on_connect();
        let mut src = Pending { data: b"^A$" };
        let intent = on_recv_ready(&mut peer, &mut src).unwrap();
        assert_eq!(intent, FdIntent::WRITE);
        assert_eq!(peer.phase, Phase::InitialAck);
    }

    #[test]
    fn send_ready_drains_ack_and_transitions() {
        let (mut peer, _) = on_connect();
        let mut sink = Cursor::new(Vec::new());
        let intent = on_send_ready(&mut peer, &mut sink).unwrap();
        assert_eq!(intent, FdIntent::READ);
        assert_eq!(peer.phase, Phase::WaitForMsg);
        assert_eq!(sink.into_inner(), b"*");
    }

    #[test]
    fn full_round_trip_echoes_incremented_bytes() {
        let (mut peer, _) = on_connect();
        let mut sink = Cursor::new(Vec::new());
        on_send_ready(&mut peer, &mut sink).unwrap();

        let mut src = Pending { data: b"^A$" };
        let intent = on_recv_ready(&mut peer, &mut src).unwrap();
        assert_eq!(intent, FdIntent::WRITE);

        let mut sink2 = Cursor::new(Vec::new());
        on_send_ready(&mut peer, &mut sink2).unwrap();
        assert_eq!(sink2.into_inner(), b"B");
    }

    #[test]
    fn peer_closed_on_zero_byte_read() {
        let (mut peer, _) = on_connect();
        let mut sink = Cursor::new(Vec::new());
        on_send_ready(&mut peer, &mut sink).unwrap();

        let mut src = Pending { data: b"" };
        let intent = on_recv_ready(&mut peer, &mut src).unwrap();
        assert_eq!(intent, FdIntent::CLOSE);
    }
}
