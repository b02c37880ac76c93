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

//! A fixed-size worker pool serving blocking connections dispatched from
//! one `accept` loop.

use conc_echo::blocking::serve_connection;
use conc_echo::pool::WorkerPool;
use conc_echo::socket::{self, format_peer};

const DEFAULT_PORT: u16 = 9090;
const DEFAULT_NUM_THREADS: usize = 5;

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let port = args.next().and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_PORT);
    let num_threads = args.next().and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_NUM_THREADS);

    let listener = socket::listen_tcp(port).expect("listener setup failed");
    log::info!("serving on port {port}");

    let pool = WorkerPool::new(num_threads);

    loop {
        let (mut stream, addr) = match listener.accept() {
            Ok(pair) => pair,
            Err(e) => {
                log::error!("accept failed: {e}");
                continue;
            }
        };

        let (host, service) = format_peer(addr);
        log::info!("peer connected: {host}:{service}");

        let submitted = pool.submit(move || {
            if let Err(e) = serve_connection(&mut stream) {
                log::warn!("connection error: {e}");
            }
            log::debug!("connection for {host}:{service} done");
        });

        if let Err(e) = submitted {
            log::error!("could not submit connection to pool: {e}");
        }
    }
}
