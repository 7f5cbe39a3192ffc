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

//! Cursor-driven scanning and random sampling over a [`super::HashTable`].
//!
//! A scan cursor survives across resizes: it encodes a bucket index in the
//! *current* mask's bit-reversed space, and [`crate::cursor::next_cursor`]
//! guarantees every bucket is visited exactly once by the time the cursor
//! returns to zero, even if the table grew or shrank mid-scan (Valkey's
//! `dictScan`/`hashsetScan` guarantee, ported via [`crate::cursor`]).

use super::bucket::SLOTS;
use super::{HtHooks, HashTable, Table};
use crate::cursor::next_cursor;
use std::hash::Hash;

/// Emit references to live elements rather than copying them out. This port
/// always hands `emit` borrowed `(&K, &V)` pairs regardless of this flag —
/// kept for parity with the spec's named flag, which matters more in a
/// setting where scanned elements might otherwise be copied by value.
pub const EMIT_REF: u32 = 1 << 0;
/// Stop after the bucket at `cursor`, even if it has its `ever_full` bit
/// set. Without this flag, `scan` keeps walking the probe chain within the
/// same call until it reaches a bucket that was never overflowed, so a
/// caller doesn't have to re-enter `scan` once per tombstoned bucket.
pub const SINGLE_STEP: u32 = 1 << 1;

impl<K: Hash + Eq, V, H: HtHooks<K, V>> HashTable<K, V, H> {
    /// Emits every live element in the bucket(s) visited this step to
    /// `emit`, then returns the cursor to resume from. While rehashing,
    /// both tables are scanned at the step corresponding to the smaller
    /// table's mask, mirroring every bucket of the larger table that maps
    /// onto it — the same fix-up `dictScan` applies for a mid-rehash scan.
    ///
    /// If the bucket just visited has its `ever_full` tombstone bit set,
    /// the same lookup that bucket's chain would have needed continues
    /// within this call (so a caller seeing a tombstoned bucket doesn't
    /// have to re-invoke `scan` itself to reach the rest of the chain),
    /// unless `flags` has [`SINGLE_STEP`] set.
    pub fn scan(&self, cursor: u64, flags: u32, mut emit: impl FnMut(&K, &V)) -> u64 {
        match (&self.tables[0], &self.tables[1]) {
            (Some(t0), None) => Self::scan_single(t0, cursor, flags, &mut emit),
            (Some(t0), Some(t1)) => {
                // scan the smaller table's bucket, plus every bucket of the
                // larger table whose low bits match it.
                let (small, large) = if t0.mask() <= t1.mask() { (t0, t1) } else { (t1, t0) };
                let small_mask = small.mask();
                let large_mask = large.mask();
                let start = cursor & small_mask;
                let mut small_idx = start;
                loop {
                    for (_, kv) in small.buckets[small_idx as usize].iter() {
                        emit(&kv.0, &kv.1);
                    }
                    let mut m = small_idx;
                    loop {
                        for (_, kv) in large.buckets[m as usize].iter() {
                            emit(&kv.0, &kv.1);
                        }
                        m += small_mask + 1;
                        if m > large_mask {
                            break;
                        }
                    }
                    let was_everfull = small.buckets[small_idx as usize].ever_full;
                    let next = next_cursor(small_idx, small_mask);
                    if !was_everfull || flags & SINGLE_STEP != 0 || next == start {
                        return next;
                    }
                    small_idx = next;
                }
            }
            (None, _) => 0,
        }
    }

    fn scan_single(t0: &Table<K, V>, cursor: u64, flags: u32, emit: &mut impl FnMut(&K, &V)) -> u64 {
        let mask = t0.mask();
        let start = cursor & mask;
        let mut idx = start;
        loop {
            for (_, kv) in t0.buckets[idx as usize].iter() {
                emit(&kv.0, &kv.1);
            }
            let was_everfull = t0.buckets[idx as usize].ever_full;
            let next = next_cursor(idx, mask);
            if !was_everfull || flags & SINGLE_STEP != 0 || next == start {
                return next;
            }
            idx = next;
        }
    }

    /// Returns a uniformly random live element by rejection sampling over
    /// bucket slots (cheap since occupancy is bounded below by `HARD_MIN`).
    pub fn random_element(&self, rng: &mut impl rand::Rng) -> Option<(&K, &V)> {
        if self.is_empty() {
            return None;
        }
        loop {
            let t = if rng.gen_bool(0.5) && self.tables[1].is_some() { 1 } else { 0 };
            let Some(table) = &self.tables[t] else { continue };
            if table.buckets.is_empty() {
                continue;
            }
            let bi = rng.gen_range(0..table.buckets.len());
            let bucket = &table.buckets[bi];
            if bucket.is_empty() {
                continue;
            }
            let slot = rng.gen_range(0..SLOTS);
            if let Some(kv) = bucket.get(slot) {
                return Some((&kv.0, &kv.1));
            }
        }
    }

    /// Draws up to `count` distinct live elements without replacement,
    /// scanning bucket-by-bucket from a random starting cursor (the "fair"
    /// sampling strategy: every element has equal probability regardless of
    /// its bucket's occupancy, unlike naive per-draw rejection sampling).
    /// Repeatedly calls [`Self::scan`] with [`SINGLE_STEP`] so each draw
    /// covers exactly one bucket group rather than an unbounded tombstone
    /// chain.
    pub fn sample(&self, count: usize, rng: &mut impl rand::Rng) -> Vec<(&K, &V)> {
        let mut out = Vec::with_capacity(count.min(self.len()));
        if self.is_empty() || count == 0 {
            return out;
        }
        let mut cursor = rng.gen::<u64>();
        let mut guard = 0usize;
        let max_steps = self.tables.iter().flatten().map(|t| t.buckets.len()).max().unwrap_or(1) * 2 + 1;
        while out.len() < count && guard < max_steps {
            cursor = self.scan(cursor, SINGLE_STEP, |k, v| out.push((k, v)));
            guard += 1;
            if cursor == 0 {
                break;
            }
        }
        out.truncate(count);
        out
    }

    /// A fairer single-element pick than [`Self::random_element`]'s
    /// rejection sampling: scans roughly 40 bucket groups (≈`40 * SLOTS`
    /// entries, per the original's fairness target) from a random cursor
    /// and returns one of them uniformly at random, falling back to a full
    /// scan if the table has fewer than that many buckets.
    pub fn fair_random_element(&self, rng: &mut impl rand::Rng) -> Option<(&K, &V)> {
        if self.is_empty() {
            return None;
        }
        const SAMPLE_BUCKET_GROUPS: usize = 40;
        let mut pool: Vec<(&K, &V)> = Vec::with_capacity(SAMPLE_BUCKET_GROUPS * SLOTS);
        let mut cursor = rng.gen::<u64>();
        for _ in 0..SAMPLE_BUCKET_GROUPS {
            cursor = self.scan(cursor, SINGLE_STEP, |k, v| pool.push((k, v)));
            if cursor == 0 {
                break;
            }
        }
        if pool.is_empty() {
            // fewer buckets than the sample window: fall back to a full scan.
            cursor = 0;
            loop {
                cursor = self.scan(cursor, SINGLE_STEP, |k, v| pool.push((k, v)));
                if cursor == 0 {
                    break;
                }
            }
        }
        if pool.is_empty() {
            return None;
        }
        let i = rng.gen_range(0..pool.len());
        Some(pool[i])
    }
}

#[cfg(test)]
mod tests {
    use super::super::HashTable;

    #[test]
    fn scan_visits_every_element_exactly_once_without_resize() {
        let mut ht: HashTable<i32, i32> = HashTable::new();
        for i in 0..20 {
            ht.insert(i, i);
        }
        let mut seen = Vec::new();
        let mut cursor = 0u64;
        loop {
            cursor = ht.scan(cursor, 0, |k, _| seen.push(*k));
            if cursor == 0 {
                break;
            }
        }
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn scan_single_step_stops_at_one_tombstoned_bucket() {
        let mut ht: HashTable<i32, i32> = HashTable::new();
        for i in 0..64 {
            ht.insert(i, i);
        }
        for i in 0..40 {
            ht.remove(&i);
        }
        let mut seen = Vec::new();
        let mut cursor = 0u64;
        let mut steps = 0usize;
        loop {
            cursor = ht.scan(cursor, super::SINGLE_STEP, |k, _| seen.push(*k));
            steps += 1;
            if cursor == 0 || steps > 10_000 {
                break;
            }
        }
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen, (40..64).collect::<Vec<_>>());
    }

    #[test]
    fn fair_random_element_returns_a_live_key() {
        let mut ht: HashTable<i32, i32> = HashTable::new();
        for i in 0..5 {
            ht.insert(i, i * 10);
        }
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let (k, v) = ht.fair_random_element(&mut rng).unwrap();
            assert_eq!(*v, *k * 10);
        }
    }

    #[test]
    fn fair_random_element_falls_back_to_full_scan_on_small_table() {
        let mut ht: HashTable<i32, i32> = HashTable::new();
        ht.insert(1, 100);
        let mut rng = rand::thread_rng();
        let (k, v) = ht.fair_random_element(&mut rng).unwrap();
        assert_eq!((*k, *v), (1, 100));
    }

    #[test]
    fn random_element_returns_a_live_key() {
        let mut ht: HashTable<i32, i32> = HashTable::new();
        for i in 0..5 {
            ht.insert(i, i * 10);
        }
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            let (k, v) = ht.random_element(&mut rng).unwrap();
            assert_eq!(*v, *k * 10);
        }
    }

    #[test]
    fn sample_returns_requested_count_without_duplicates() {
        let mut ht: HashTable<i32, i32> = HashTable::new();
        for i in 0..30 {
            ht.insert(i, i);
        }
        ht.finish_rehash();
        let mut rng = rand::thread_rng();
        let drawn = ht.sample(10, &mut rng);
        let mut keys: Vec<_> = drawn.iter().map(|(k, _)| **k).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), drawn.len());
    }
}
