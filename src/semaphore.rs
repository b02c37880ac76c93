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

//! A one-bit signal: posts are idempotent and never count.
//!
//! This is the safe equivalent of the reference implementation's `bsem`
//! (one `pthread_mutex_t` + one `pthread_cond_t` guarding a 0/1 integer).
//! The "binary" in the name means a burst of `post`s collapses to a single
//! wake token — [`crate::queue::JobQueue`] is the component that relies on
//! that collapse being safe, by re-posting whenever a pull leaves work
//! behind.

use std::sync::{Condvar, Mutex};

/// A single-slot wakeup signal.
#[derive(Debug)]
pub struct BinarySemaphore {
    v: Mutex<bool>,
    cv: Condvar,
}

impl BinarySemaphore {
    /// Creates a semaphore with initial value `v0`.
    pub fn new(v0: bool) -> Self {
        Self {
            v: Mutex::new(v0),
            cv: Condvar::new(),
        }
    }

    /// Blocks until the semaphore's value is `true`, then atomically
    /// clears it and returns. Tolerates spurious wakeups.
    pub fn wait(&self) {
        let mut v = self.v.lock().unwrap();
        while !*v {
            v = self.cv.wait(v).unwrap();
        }
        *v = false;
    }

    /// Sets the value to `true` and wakes at most one waiter.
    pub fn post(&self) {
        let mut v = self.v.lock().unwrap();
        *v = true;
        self.cv.notify_one();
    }

    /// Sets the value to `true` and wakes every current waiter.
    pub fn post_all(&self) {
        let mut v = self.v.lock().unwrap();
        *v = true;
        self.cv.notify_all();
    }

    /// Equivalent to re-initializing to `false`.
    pub fn reset(&self) {
        let mut v = self.v.lock().unwrap();
        *v = false;
    }
}

impl Default for BinarySemaphore {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn post_then_wait_does_not_block() {
        let sem = BinarySemaphore::new(false);
        sem.post();
        sem.wait();
    }

    #[test]
    fn wait_blocks_until_posted() {
        let sem = Arc::new(BinarySemaphore::new(false));
        let sem2 = sem.clone();

        let handle = thread::spawn(move || {
            sem2.wait();
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());

        sem.post();
        handle.join().unwrap();
    }

    #[test]
    fn post_all_wakes_every_waiter() {
        let sem = Arc::new(BinarySemaphore::new(false));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sem = sem.clone();
                thread::spawn(move || sem.wait())
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        sem.post_all();

        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn reset_clears_a_pending_post() {
        let sem = BinarySemaphore::new(false);
        sem.post();
        sem.reset();
        assert!(!*sem.v.lock().unwrap());
    }
}
