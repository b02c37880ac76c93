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

//! A `select(2)`-based level-triggered readiness loop.
//!
//! One thread, one `fd_set` pair, `FD_SETSIZE` connections. Rather than
//! reimplementing raw-fd `read`/`write`, accepted connections are kept as
//! ordinary non-blocking `std::net::TcpStream`s — `select` only needs their
//! raw descriptor for bookkeeping, which `AsRawFd` already provides, so
//! there is no reason to bypass std's socket I/O the way the reference's
//! raw-fd C code had to.

use std::collections::HashMap;
use std::io;
use std::mem::MaybeUninit;
use std::net::{TcpListener, TcpStream};
use std::os::unix::io::{AsRawFd, RawFd};

use log::{info, warn};

use crate::error::ServerError;
use crate::peer::{self, FdIntent, PeerState, MAXFDS};

/// `MAXFDS` clamped to what `select`'s fixed-size `fd_set` can represent: a
/// descriptor that fits `MAXFDS` but not `FD_SETSIZE` would corrupt the
/// bitmap, so the tighter of the two bounds governs this loop.
fn effective_maxfds() -> usize {
    MAXFDS.min(libc::FD_SETSIZE as usize - 1)
}

fn new_fd_set() -> libc::fd_set {
    unsafe {
        let mut set = MaybeUninit::<libc::fd_set>::uninit();
        libc::FD_ZERO(set.as_mut_ptr());
        set.assume_init()
    }
}

/// Runs the select loop forever, serving connections accepted from
/// `listener`. Returns only on an unrecoverable `select` failure.
pub fn run(listener: &TcpListener) -> Result<(), ServerError> {
    let listener_fd = listener.as_raw_fd();
    if listener_fd as usize >= effective_maxfds() {
        return Err(ServerError::FdOutOfRange {
            fd: listener_fd as usize,
            max: effective_maxfds(),
        });
    }

    let mut read_master = new_fd_set();
    let mut write_master = new_fd_set();
    unsafe {
        libc::FD_SET(listener_fd, &mut read_master);
    }

    let mut fdset_max = listener_fd;
    let mut streams: HashMap<RawFd, TcpStream> = HashMap::new();
    let mut peers: HashMap<RawFd, PeerState> = HashMap::new();

    info!("select loop: listening on fd {listener_fd}");

    loop {
        let mut readfds = read_master;
        let mut writefds = write_master;

        let nready = unsafe {
            libc::select(
                fdset_max + 1,
                &mut readfds,
                &mut writefds,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        };
        if nready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(ServerError::Io(err));
        }

        let mut remaining = nready;
        let mut fd = 0;
        while fd <= fdset_max && remaining > 0 {
            let mut closed = false;

            if unsafe { libc::FD_ISSET(fd, &readfds) } {
                remaining -= 1;

                if fd == listener_fd {
                    accept_all(
                        listener,
                        &mut read_master,
                        &mut write_master,
                        &mut fdset_max,
                        &mut streams,
                        &mut peers,
                    )?;
                } else if let Some(stream) = streams.get_mut(&fd) {
                    let peer = peers.get_mut(&fd).expect("peer state missing for tracked fd");
                    // Any failure besides WouldBlock is fatal: a broken
                    // read/write on one descriptor is treated the same as a
                    // multiplexer-reported error condition.
                    let intent = peer::on_recv_ready(peer, stream).map_err(ServerError::Io)?;
                    apply_intent(fd, intent, &mut read_master, &mut write_master, &mut closed);
                }
            }

            if !closed && fd != listener_fd && unsafe { libc::FD_ISSET(fd, &writefds) } {
                remaining -= 1;
                if let Some(stream) = streams.get_mut(&fd) {
                    let peer = peers.get_mut(&fd).expect("peer state missing for tracked fd");
                    let intent = peer::on_send_ready(peer, stream).map_err(ServerError::Io)?;
                    apply_intent(fd, intent, &mut read_master, &mut write_master, &mut closed);
                }
            }

            if closed {
                info!("socket {fd} closing");
                unsafe {
                    libc::FD_CLR(fd, &mut read_master);
                    libc::FD_CLR(fd, &mut write_master);
                }
                streams.remove(&fd);
                peers.remove(&fd);
            }

            fd += 1;
        }
    }
}

fn apply_intent(
    fd: RawFd,
    intent: FdIntent,
    read_master: &mut libc::fd_set,
    write_master: &mut libc::fd_set,
    closed: &mut bool,
) {
    if intent.is_close() {
        *closed = true;
        return;
    }
    unsafe {
        if intent.read {
            libc::FD_SET(fd, read_master);
        } else {
            libc::FD_CLR(fd, read_master);
        }
        if intent.write {
            libc::FD_SET(fd, write_master);
        } else {
            libc::FD_CLR(fd, write_master);
        }
    }
}

fn accept_all(
    listener: &TcpListener,
    read_master: &mut libc::fd_set,
    write_master: &mut libc::fd_set,
    fdset_max: &mut RawFd,
    streams: &mut HashMap<RawFd, TcpStream>,
    peers: &mut HashMap<RawFd, PeerState>,
) -> Result<(), ServerError> {
    loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                if let Err(e) = stream.set_nonblocking(true) {
                    warn!("failed to set accepted socket non-blocking: {e}");
                    continue;
                }

                let fd = stream.as_raw_fd();
                if fd as usize >= effective_maxfds() {
                    // A descriptor beyond the configured bound is fatal,
                    // not connection-local.
                    return Err(ServerError::FdOutOfRange {
                        fd: fd as usize,
                        max: effective_maxfds(),
                    });
                }

                if fd > *fdset_max {
                    *fdset_max = fd;
                }

                let (peer, intent) = peer::on_connect();
                let (host, port) = crate::socket::format_peer(addr);
                info!("peer connected: {host}:{port}");

                let mut ignored = false;
                apply_intent(fd, intent, read_master, write_master, &mut ignored);

                streams.insert(fd, stream);
                peers.insert(fd, peer);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                peer::log_transient_accept();
                break;
            }
            Err(e) => {
                warn!("accept error: {e}");
                break;
            }
        }
    }
    Ok(())
}
