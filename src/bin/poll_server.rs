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

//! A single-threaded readiness loop driven by the OS multiplexer `mio`
//! selects for the platform (`epoll` on Linux).

use conc_echo::poll_loop;
use conc_echo::socket;

const DEFAULT_PORT: u16 = 9090;

fn main() {
    env_logger::init();

    let port = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let listener = socket::listen_tcp(port).expect("listener setup failed");
    log::info!("serving on port {port}");

    if let Err(e) = poll_loop::run(listener) {
        log::error!("poll loop terminated: {e}");
        std::process::exit(1);
    }
}
