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

//! The reference blocking handler: one synchronous `recv`/`send` loop per
//! connection, byte-by-byte, with no staging buffer.
//!
//! Used directly by the sequential server (one handler, one connection at a
//! time) and by the thread-per-connection server (one handler per spawned
//! thread). Both readiness-driven servers use [`crate::peer`] instead —
//! this module intentionally does not share code with it, since it is
//! grounded on the distinct "blocking call per byte" control flow rather
//! than the non-blocking callback shape.

use std::io::{self, Read, Write};
use std::net::TcpStream;

use log::{debug, warn};

use crate::protocol::Phase;

/// Sends the connection's one-time ACK, then alternates blocking `read`s of
/// up to 1024 bytes with a blocking `write` per echoed byte until the peer
/// closes or a write fails.
///
/// A write failure is logged and treated as connection-local: the function
/// returns rather than propagating, since one broken peer must never bring
/// down a server serving others (true even in the sequential variant, where
/// the "others" are just queued up behind this call).
pub fn serve_connection(stream: &mut TcpStream) -> io::Result<()> {
    stream.write_all(b"*")?;

    let mut phase = Phase::WaitForMsg;
    let mut buf = [0u8; 1024];

    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }

        for &b in &buf[..n] {
            let (next, echoed) = crate::protocol::step(phase, b);
            phase = next;
            if let Some(out) = echoed {
                if let Err(e) = stream.write_all(&[out]) {
                    warn!("send error: {e}");
                    return Ok(());
                }
            }
        }
    }

    debug!("connection closed by peer");
    Ok(())
}
