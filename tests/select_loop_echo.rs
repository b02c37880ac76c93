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

//! A lighter end-to-end pass over the `select`-based loop: it shares
//! `src/peer.rs`'s callbacks with the `mio` loop (covered in depth in
//! `tests/poll_loop_echo.rs`), so this only needs to confirm the `select`
//! bookkeeping itself — accept, read-ready, write-ready, multiple peers —
//! wires up correctly.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use conc_echo::select_loop;

fn spawn_server() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    listener.set_nonblocking(true).expect("set_nonblocking");
    let addr = listener.local_addr().expect("local_addr");
    thread::spawn(move || {
        let _ = select_loop::run(&listener);
    });
    thread::sleep(Duration::from_millis(50));
    addr
}

fn read_exact_with_timeout(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    stream
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("set_read_timeout");
    let mut buf = vec![0u8; n];
    stream.read_exact(&mut buf).expect("read_exact");
    buf
}

#[test]
fn single_client_round_trip() {
    let addr = spawn_server();
    let mut client = TcpStream::connect(addr).expect("connect");

    read_exact_with_timeout(&mut client, 1); // ack
    client.write_all(b"^hi$").expect("write");
    let echoed = read_exact_with_timeout(&mut client, 2);
    assert_eq!(echoed, b"ij");
}

#[test]
fn two_clients_served_independently() {
    let addr = spawn_server();

    let mut a = TcpStream::connect(addr).expect("connect a");
    let mut b = TcpStream::connect(addr).expect("connect b");
    read_exact_with_timeout(&mut a, 1);
    read_exact_with_timeout(&mut b, 1);

    a.write_all(b"^one$").expect("write a");
    b.write_all(b"^two$").expect("write b");

    assert_eq!(read_exact_with_timeout(&mut a, 3), b"pof");
    assert_eq!(read_exact_with_timeout(&mut b, 3), b"uxp");
}
