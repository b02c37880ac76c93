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

//! End-to-end coverage of the `mio`-backed readiness loop, driven through
//! real loopback sockets rather than the in-process unit tests in
//! `src/peer.rs`.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use conc_echo::poll_loop;

fn spawn_server() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    thread::spawn(move || {
        let _ = poll_loop::run(listener);
    });
    // Give the loop thread a moment to register the listener before the
    // first client connects.
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
fn connect_with_no_data_yields_only_the_ack() {
    let addr = spawn_server();
    let mut client = TcpStream::connect(addr).expect("connect");

    let ack = read_exact_with_timeout(&mut client, 1);
    assert_eq!(ack, b"*");

    client
        .set_read_timeout(Some(Duration::from_millis(200)))
        .unwrap();
    let mut extra = [0u8; 1];
    let err = client.read(&mut extra).unwrap_or(0);
    assert_eq!(err, 0, "server must not send anything beyond the ACK unprompted");
}

#[test]
fn multiple_messages_in_one_write_are_each_echoed() {
    let addr = spawn_server();
    let mut client = TcpStream::connect(addr).expect("connect");
    read_exact_with_timeout(&mut client, 1); // ack

    client.write_all(b"hello^abc$def^ij$bye").expect("write");
    let echoed = read_exact_with_timeout(&mut client, 5);
    assert_eq!(echoed, b"bcdjk");
}

#[test]
fn nested_caret_echoes_as_underscore() {
    let addr = spawn_server();
    let mut client = TcpStream::connect(addr).expect("connect");
    read_exact_with_timeout(&mut client, 1);

    client.write_all(b"^^").expect("write");
    let echoed = read_exact_with_timeout(&mut client, 1);
    assert_eq!(echoed, b"_");
}

#[test]
fn byte_0xff_wraps_to_zero() {
    let addr = spawn_server();
    let mut client = TcpStream::connect(addr).expect("connect");
    read_exact_with_timeout(&mut client, 1);

    client.write_all(b"^\xff$").expect("write");
    let echoed = read_exact_with_timeout(&mut client, 1);
    assert_eq!(echoed, [0x00]);
}

#[test]
fn two_concurrent_clients_do_not_cross_talk() {
    let addr = spawn_server();

    let mut a = TcpStream::connect(addr).expect("connect a");
    let mut b = TcpStream::connect(addr).expect("connect b");
    read_exact_with_timeout(&mut a, 1);
    read_exact_with_timeout(&mut b, 1);

    a.write_all(b"^AAA$").expect("write a");
    b.write_all(b"^zzz$").expect("write b");

    let echoed_a = read_exact_with_timeout(&mut a, 3);
    let echoed_b = read_exact_with_timeout(&mut b, 3);

    assert_eq!(echoed_a, b"BBB");
    assert_eq!(echoed_b, b"{{{");
}
