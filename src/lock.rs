// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT
//! FIFO ticket lock guarding a piece of data.
//!
//! A `Storage`'s critical sections are short (bit-encode, one ZDD union or
//! difference, one map write) and contended by threads that all want strict
//! service order, which is a better match for a spin-ticket than an OS
//! mutex: no thread ever blocks in the kernel, and no thread can jump the
//! queue. The backoff exists only to reduce CPU burn under sustained
//! contention; it changes no observable ordering. Shaped like
//! `std::sync::Mutex`/`parking_lot::Mutex` (data behind an `UnsafeCell`,
//! access mediated by a `Deref`/`DerefMut` guard) so `Storage` can use it
//! the same way.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Spins this many times before falling back to a short sleep.
const SPIN_LIMIT: u32 = 64;
/// Logged once per acquisition that needed to fall back to sleeping, so
/// sustained contention is visible without logging every spin.
const CONTENTION_WARN_THRESHOLD: u32 = 4;

pub struct TicketLock<T> {
    curr_task_id: AtomicU32,
    ready_task_id: AtomicU32,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for TicketLock<T> {}
unsafe impl<T: Send> Sync for TicketLock<T> {}

impl<T> TicketLock<T> {
    pub fn new(data: T) -> Self {
        Self { curr_task_id: AtomicU32::new(0), ready_task_id: AtomicU32::new(0), data: UnsafeCell::new(data) }
    }

    /// Issues the next ticket and busy-waits until it is served, yielding a
    /// guard that releases the lock on `Drop`.
    pub fn lock(&self) -> LockGuard<'_, T> {
        let id = self.curr_task_id.fetch_add(1, Ordering::AcqRel);
        let mut spins = 0u32;
        let mut sleeps = 0u32;
        let mut backoff = Duration::from_micros(1);
        while self.ready_task_id.load(Ordering::Acquire) != id {
            if spins < SPIN_LIMIT {
                std::hint::spin_loop();
                spins += 1;
                continue;
            }
            std::thread::sleep(backoff);
            backoff = (backoff * 2).min(Duration::from_millis(1));
            sleeps += 1;
            if sleeps == CONTENTION_WARN_THRESHOLD {
                tracing::warn!(ticket = id, "ticket lock under sustained contention");
            }
        }
        LockGuard { lock: self, id }
    }
}

/// Held for exactly one critical section; releases the next ticket on drop.
pub struct LockGuard<'a, T> {
    lock: &'a TicketLock<T>,
    id: u32,
}

impl<T> LockGuard<'_, T> {
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl<T> Deref for LockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the ticket protocol admits exactly one live guard at a time.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for LockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the ticket protocol admits exactly one live guard at a time.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for LockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.ready_task_id.fetch_add(1, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn tickets_serve_in_fifo_order() {
        let lock = Arc::new(TicketLock::new(Vec::<u32>::new()));
        let handles: Vec<_> = (0..8u32)
            .map(|_| {
                let lock = lock.clone();
                std::thread::spawn(move || {
                    let mut guard = lock.lock();
                    let id = guard.id();
                    guard.push(id);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let mut ids = lock.lock().clone();
        ids.sort_unstable();
        assert_eq!(ids, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn guard_mutates_inner_data() {
        let lock = TicketLock::new(0u32);
        *lock.lock() += 41;
        *lock.lock() += 1;
        assert_eq!(*lock.lock(), 42);
    }
}
