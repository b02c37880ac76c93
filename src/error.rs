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

//! Error taxonomy shared by every driver.
//!
//! Every variant here corresponds to a row of the error table in the
//! design: setup failures, multiplexer errors, and fd-out-of-range are all
//! fatal and propagate up to `main`; would-block and peer-EOF are handled
//! inline as [`crate::peer::FdIntent`] values and never become a
//! `ServerError`.

use std::io;

/// Fatal errors produced by the listener, readiness loops, or worker pool.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Socket setup failed: `socket`, `setsockopt`, `bind`, `listen`, or
    /// marking a descriptor non-blocking.
    #[error("socket setup failed: {0}")]
    Setup(#[from] io::Error),

    /// The readiness multiplexer reported an error condition on a
    /// descriptor, or `poll`/`select` itself failed.
    #[error("readiness multiplexer error: {0}")]
    Io(#[source] io::Error),

    /// `accept` returned a descriptor at or beyond the configured bound.
    #[error("accepted fd {fd} is out of range (max {max})")]
    FdOutOfRange {
        /// The descriptor returned by `accept`.
        fd: usize,
        /// The configured bound (`MAXFDS`), exclusive.
        max: usize,
    },

    /// A job was submitted to a pool that has already been told to shut
    /// down.
    #[error("worker pool has been shut down")]
    PoolShutDown,
}

/// Convenience alias used throughout the crate's fallible setup paths.
pub type Result<T> = std::result::Result<T, ServerError>;
