/*
 * Created on Sun Jul 26 2026
 *
 * This file is a part of Skytable
 * Skytable (formerly known as TerrabaseDB or Skybase) is a free and open-source
 * NoSQL database written by Sayan Nandan ("the Author") with the
 * vision to provide flexibility in data modelling without compromising
 * on performance, queryability or scalability.
 *
 * Copyright (c) 2026, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! The lock-free SPSC ring itself. One producer and one consumer thread
//! share a fixed-size slot array; `head` is written only by the producer,
//! `tail` only by the consumer, each pinned to its own cache line so the
//! two sides never bounce the same line back and forth.
//!
//! Synchronization protocol (same acquire/release split the teacher's
//! lock-free queue uses for its linked-list cursors): the producer writes a
//! slot, *then* publishes it with a `Release` store to `head`; the consumer
//! must load `head` with `Acquire` at least once before trusting any slot
//! it's about to read — [`Ring::available_jobs`] is that synchronization
//! point. Once it's been called, [`Ring::peek`]/[`Ring::remove_job`] need
//! no ordering of their own, same as the contract documents.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
#[cfg_attr(
    any(target_arch = "aarch64", target_arch = "powerpc64", target_arch = "x86_64"),
    repr(align(128))
)]
#[cfg_attr(
    not(any(
        target_arch = "aarch64",
        target_arch = "arm",
        target_arch = "hexagon",
        target_arch = "mips",
        target_arch = "mips64",
        target_arch = "powerpc64",
        target_arch = "riscv32",
        target_arch = "riscv64",
        target_arch = "x86_64",
    )),
    repr(align(64))
)]
struct CachePadded<T> {
    data: T,
}
impl<T> CachePadded<T> {
    const fn new(data: T) -> Self {
        Self { data }
    }
}
impl<T> Deref for CachePadded<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.data
    }
}
impl<T> DerefMut for CachePadded<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}

/// A fixed-capacity single-producer/single-consumer ring of jobs.
pub struct Ring<T> {
    buf: Box<[UnsafeCell<MaybeUninit<T>>]>,
    capacity: usize,
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
}

unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T> Ring<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "ring capacity must allow at least one live slot");
        let buf = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            buf,
            capacity,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Producer side. Relaxed loads of both cursors: a stale read can only
    /// make this falsely report full (the consumer has room it doesn't yet
    /// see), never falsely report space that isn't there, so a caller that
    /// falls back to running the job inline on a false "full" stays correct.
    pub fn is_full(&self) -> bool {
        let h = self.head.load(Ordering::Relaxed);
        let t = self.tail.load(Ordering::Relaxed);
        (h + 1) % self.capacity == t
    }

    /// Any thread; relaxed. The caller supplies ordering where cross-thread
    /// visibility of slot contents matters (see [`Self::available_jobs`]).
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed) == self.tail.load(Ordering::Relaxed)
    }

    /// Producer side. Writes the slot at the current head, then publishes
    /// it with a `Release` store so the consumer's next `Acquire` load of
    /// `head` happens-after this write. Returns `value` back on a full ring.
    pub fn push(&self, value: T) -> Result<(), T> {
        if self.is_full() {
            return Err(value);
        }
        let h = self.head.load(Ordering::Relaxed);
        unsafe {
            (*self.buf[h].get()).write(value);
        }
        self.head.store((h + 1) % self.capacity, Ordering::Release);
        Ok(())
    }

    /// Consumer side. `Acquire`s `head`, establishing happens-before with
    /// every producer write up to the returned count; the consumer may then
    /// call [`Self::peek`]/[`Self::remove_job`] that many times without
    /// further ordering.
    pub fn available_jobs(&self) -> usize {
        let h = self.head.load(Ordering::Acquire);
        let t = self.tail.load(Ordering::Relaxed);
        if h >= t {
            h - t
        } else {
            self.capacity - t + h
        }
    }

    /// Consumer side. Reads (without removing) the slot at `tail`. Relies
    /// on a prior [`Self::available_jobs`] call in this batch to have
    /// synchronized with the producer.
    pub fn peek(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        let t = self.tail.load(Ordering::Relaxed);
        Some(unsafe { (*self.buf[t].get()).assume_init_ref() })
    }

    /// Consumer side. Removes and returns the slot at `tail`, advancing it
    /// with a `Relaxed` store — callers that care about a downstream
    /// observer seeing the drain should issue one release fence per batch.
    pub fn remove_job(&self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let t = self.tail.load(Ordering::Relaxed);
        let value = unsafe { (*self.buf[t].get()).assume_init_read() };
        self.tail.store((t + 1) % self.capacity, Ordering::Relaxed);
        Some(value)
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        while self.remove_job().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn push_pop_respects_fifo_order() {
        let ring: Ring<i32> = Ring::new(4);
        assert!(ring.push(1).is_ok());
        assert!(ring.push(2).is_ok());
        assert_eq!(ring.available_jobs(), 2);
        assert_eq!(ring.remove_job(), Some(1));
        assert_eq!(ring.remove_job(), Some(2));
        assert_eq!(ring.remove_job(), None);
    }

    #[test]
    fn full_ring_rejects_push_and_returns_value() {
        let ring: Ring<i32> = Ring::new(2); // 1 usable slot
        assert!(ring.push(1).is_ok());
        assert_eq!(ring.push(2), Err(2));
    }

    #[test]
    fn drop_releases_remaining_items() {
        let ring: Ring<Box<i32>> = Ring::new(4);
        ring.push(Box::new(1)).unwrap();
        ring.push(Box::new(2)).unwrap();
        drop(ring); // must not leak or double-free under miri
    }

    #[test]
    fn scenario_ioq_spsc_million_tokens_in_order() {
        let _ = env_logger::try_init();
        const N: i64 = 1_000_000;
        let ring = Arc::new(Ring::<i64>::new(2048));
        let producer = {
            let ring = ring.clone();
            thread::spawn(move || {
                let mut i = 0i64;
                while i < N {
                    if ring.push(i).is_ok() {
                        i += 1;
                    } else {
                        thread::yield_now();
                    }
                }
            })
        };
        let consumer = thread::spawn(move || {
            let mut expected = 0i64;
            let mut observed_full_once = false;
            while expected < N {
                if ring.is_full() {
                    observed_full_once = true;
                }
                let n = ring.available_jobs();
                for _ in 0..n {
                    let v = ring.remove_job().expect("available_jobs promised this slot");
                    assert_eq!(v, expected, "token arrived out of order");
                    expected += 1;
                }
            }
            (expected, observed_full_once)
        });
        producer.join().unwrap();
        let (received, _observed_full_once) = consumer.join().unwrap();
        assert_eq!(received, N);
    }
}
