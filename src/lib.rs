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

#![deny(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unused_imports
)]

//! A family of concurrent TCP echo servers sharing one small framed
//! protocol, and the fixed-size worker pool one of the variants dispatches
//! onto.
//!
//! Five driver binaries (`src/bin/`) select a concurrency strategy:
//! sequential, thread-per-connection, fixed worker pool, a `select`-based
//! readiness scan, and an OS readiness-multiplexer loop built on `mio`. They
//! all speak the protocol in [`protocol`].

pub mod blocking;
pub mod error;
pub mod peer;
pub mod pool;
pub mod protocol;
pub mod queue;
pub mod select_loop;
pub mod semaphore;
pub mod socket;

pub mod poll_loop;

pub use error::ServerError;
