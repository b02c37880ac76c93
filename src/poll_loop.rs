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

//! An `epoll`-backed readiness loop built on `mio`, tracking connections in
//! a [`Slab`] the way the reference implementation's HTTP listener tracks
//! its connection table — dense, descriptor-keyed, O(1) insert/remove.

use std::io;
use std::net::TcpListener as StdTcpListener;

use log::{info, warn};
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use slab::Slab;

use crate::error::ServerError;
use crate::peer::{self, PeerState, MAXFDS};

const LISTENER: Token = Token(usize::MAX);
const EVENTS_CAP: usize = 1024;

struct Conn {
    stream: TcpStream,
    peer: PeerState,
}

fn token_for(key: usize) -> Token {
    Token(key)
}

/// Runs the poll loop forever, serving connections accepted from
/// `std_listener`. Takes ownership of the listener since `mio` requires a
/// `&mut` registration handle for its lifetime.
pub fn run(std_listener: StdTcpListener) -> Result<(), ServerError> {
    std_listener.set_nonblocking(true).map_err(ServerError::Io)?;
    let mut listener = TcpListener::from_std(std_listener);

    let mut poll = Poll::new().map_err(ServerError::Io)?;
    poll.registry()
        .register(&mut listener, LISTENER, Interest::READABLE)
        .map_err(ServerError::Io)?;

    let mut events = Events::with_capacity(EVENTS_CAP);
    let mut conns: Slab<Conn> = Slab::new();

    info!("poll loop: registered listener");

    loop {
        if let Err(e) = poll.poll(&mut events, None) {
            if e.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(ServerError::Io(e));
        }

        for event in events.iter() {
            if event.token() == LISTENER {
                accept_all(&mut listener, &poll, &mut conns)?;
                continue;
            }

            let key = event.token().0;
            let mut closed = false;

            if let Some(conn) = conns.get_mut(key) {
                // Any failure besides WouldBlock is fatal: a broken
                // read/write on one connection is treated the same as a
                // multiplexer-reported error condition.
                if event.is_readable() {
                    let intent = peer::on_recv_ready(&mut conn.peer, &mut conn.stream).map_err(ServerError::Io)?;
                    reregister(&poll, key, &mut conn.stream, intent, &mut closed)?;
                }
                if !closed && event.is_writable() {
                    let intent = peer::on_send_ready(&mut conn.peer, &mut conn.stream).map_err(ServerError::Io)?;
                    reregister(&poll, key, &mut conn.stream, intent, &mut closed)?;
                }
            }

            if closed {
                if let Some(mut conn) = conns.try_remove(key) {
                    let _ = poll.registry().deregister(&mut conn.stream);
                }
                info!("connection {key} closing");
            }
        }
    }
}

fn reregister(
    poll: &Poll,
    key: usize,
    stream: &mut TcpStream,
    intent: crate::peer::FdIntent,
    closed: &mut bool,
) -> Result<(), ServerError> {
    if intent.is_close() {
        *closed = true;
        return Ok(());
    }

    let interest = match (intent.read, intent.write) {
        (true, true) => Interest::READABLE | Interest::WRITABLE,
        (true, false) => Interest::READABLE,
        (false, true) => Interest::WRITABLE,
        (false, false) => unreachable!("is_close() already handled"),
    };

    poll.registry()
        .reregister(stream, token_for(key), interest)
        .map_err(ServerError::Io)
}

fn accept_all(listener: &mut TcpListener, poll: &Poll, conns: &mut Slab<Conn>) -> Result<(), ServerError> {
    loop {
        match listener.accept() {
            Ok((mut stream, addr)) => {
                if conns.len() >= MAXFDS {
                    // The connection table reaching its configured bound is
                    // fatal, not connection-local.
                    return Err(ServerError::FdOutOfRange {
                        fd: conns.len(),
                        max: MAXFDS,
                    });
                }

                let (peer, intent) = peer::on_connect();
                let (host, port) = crate::socket::format_peer(addr);
                info!("peer connected: {host}:{port}");

                let entry = conns.vacant_entry();
                let key = entry.key();
                let interest = if intent.write { Interest::WRITABLE } else { Interest::READABLE };

                poll.registry()
                    .register(&mut stream, token_for(key), interest)
                    .map_err(ServerError::Io)?;

                entry.insert(Conn { stream, peer });
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
