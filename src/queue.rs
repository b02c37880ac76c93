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

//! A thread-safe FIFO keyed to one [`BinarySemaphore`].
//!
//! The queue itself is a plain `VecDeque` behind a `Mutex` (the reference
//! implementation's singly linked list is an implementation detail of a
//! FIFO in C, not a requirement); what this module actually specifies is
//! the wake discipline: every `push` posts, and every `pull` that leaves
//! work behind posts again, so one binary semaphore can serve an unbounded
//! number of waiting workers without lost wakeups or a thundering herd.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::semaphore::BinarySemaphore;

/// A unit of work: a function pointer plus its argument, type-erased as a
/// boxed closure the way the reference's `(function, argument)` pair is
/// type-erased through a `void*`.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A mutex-guarded FIFO of [`Job`]s, paired with a [`BinarySemaphore`] that
/// signals "the queue is non-empty, a waiter may proceed".
#[derive(Default)]
pub struct JobQueue {
    jobs: Mutex<VecDeque<Job>>,
    has_jobs: BinarySemaphore,
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("len", &self.len())
            .finish()
    }
}

impl JobQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `job` to the back of the queue and posts `has_jobs`. Never
    /// blocks.
    pub fn push(&self, job: Job) {
        let mut jobs = self.jobs.lock().unwrap();
        jobs.push_back(job);
        self.has_jobs.post();
    }

    /// Removes and returns the front job, if any.
    ///
    /// When more than one job remains after removing the front one, posts
    /// `has_jobs` again so the wake token carries forward to the next
    /// waiter — this is what lets a single binary semaphore support an
    /// arbitrarily deep queue.
    pub fn pull(&self) -> Option<Job> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.pop_front();
        if jobs.len() > 0 {
            self.has_jobs.post();
        }
        job
    }

    /// Drains every remaining job (dropping each, which runs no function)
    /// and resets `has_jobs`.
    pub fn clear(&self) {
        let mut jobs = self.jobs.lock().unwrap();
        jobs.clear();
        self.has_jobs.reset();
    }

    /// Current number of queued jobs.
    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    /// True when the queue currently holds no jobs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The semaphore workers block on between pulls.
    pub fn has_jobs(&self) -> &BinarySemaphore {
        &self.has_jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn push_then_pull_returns_fifo_order() {
        let q = JobQueue::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let seen = seen.clone();
            q.push(Box::new(move || seen.lock().unwrap().push(i)));
        }

        while let Some(job) = q.pull() {
            job();
        }

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn pull_on_empty_queue_returns_none() {
        let q = JobQueue::new();
        assert!(q.pull().is_none());
    }

    #[test]
    fn pull_reposts_when_jobs_remain() {
        let q = JobQueue::new();
        q.push(Box::new(|| {}));
        q.push(Box::new(|| {}));

        q.pull();
        // A second waiter should not block: the pull above re-posted.
        q.has_jobs().wait();
    }

    #[test]
    fn clear_drops_jobs_without_running_them() {
        let ran = Arc::new(AtomicUsize::new(0));
        let q = JobQueue::new();
        for _ in 0..3 {
            let ran = ran.clone();
            q.push(Box::new(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        }

        q.clear();
        assert_eq!(q.len(), 0);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
