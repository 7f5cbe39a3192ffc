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

//! A bucket is the unit of probing and tombstone tracking: `SLOTS` element
//! slots, a presence bitmask, a fingerprint byte per slot, and a single
//! `ever_full` tombstone bit for the whole bucket.
//!
//! The original groups all of this into one hand-packed 64-byte cache line.
//! This port keeps the same logical grouping — `skymap`'s parallel
//! control-byte/value-array split is the nearest idiom in this codebase for
//! bit-packed metadata done safely — but does not claim a literal 64-byte
//! `size_of::<Bucket<_>>()`; `Option<Box<_>>` gives us the null-pointer
//! niche optimization for presence, at the cost of exact byte-for-byte
//! layout control that only `unsafe` packed pointers would buy.

/// Elements per bucket on a 64-bit target (`(7,16)` fill-factor table from
/// the spec assumes this). 32-bit hosts are not specially supported.
pub const SLOTS: usize = 7;

pub struct Bucket<K, V> {
    pub ever_full: bool,
    presence: u8,
    fingerprints: [u8; SLOTS],
    slots: [Option<Box<(K, V)>>; SLOTS],
}

impl<K, V> Default for Bucket<K, V> {
    fn default() -> Self {
        Self {
            ever_full: false,
            presence: 0,
            fingerprints: [0; SLOTS],
            slots: std::array::from_fn(|_| None),
        }
    }
}

impl<K, V> Bucket<K, V> {
    #[inline]
    pub fn is_present(&self, slot: usize) -> bool {
        self.presence & (1 << slot) != 0
    }
    #[inline]
    pub fn fingerprint(&self, slot: usize) -> u8 {
        self.fingerprints[slot]
    }
    #[inline]
    pub fn get(&self, slot: usize) -> Option<&(K, V)> {
        self.slots[slot].as_deref()
    }
    #[inline]
    pub fn get_mut(&mut self, slot: usize) -> Option<&mut (K, V)> {
        self.slots[slot].as_deref_mut()
    }
    /// Number of occupied slots.
    pub fn len(&self) -> u32 {
        self.presence.count_ones()
    }
    pub fn is_empty(&self) -> bool {
        self.presence == 0
    }
    /// True once every slot is occupied.
    pub fn is_full(&self) -> bool {
        self.presence == (1u8 << SLOTS) - 1
    }
    /// Returns the first unoccupied slot index, if any.
    pub fn first_free_slot(&self) -> Option<usize> {
        let free = (!self.presence) & ((1 << SLOTS) - 1);
        if free == 0 {
            None
        } else {
            Some(free.trailing_zeros() as usize)
        }
    }
    /// Writes `entry` into `slot`, marking it present with `fp`.
    pub fn place(&mut self, slot: usize, fp: u8, entry: (K, V)) {
        self.slots[slot] = Some(Box::new(entry));
        self.fingerprints[slot] = fp;
        self.presence |= 1 << slot;
    }
    /// Clears presence (but not `ever_full`) for `slot`, returning the
    /// removed entry.
    pub fn take(&mut self, slot: usize) -> Option<(K, V)> {
        self.presence &= !(1 << slot);
        self.slots[slot].take().map(|b| *b)
    }
    /// Iterates over `(slot, &(K, V))` for every occupied slot.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &(K, V))> {
        (0..SLOTS).filter_map(move |s| self.get(s).map(|e| (s, e)))
    }
}

/// Top 8 bits of a 64-bit hash, used as the per-slot fingerprint.
#[inline(always)]
pub fn fingerprint_of(hash: u64) -> u8 {
    (hash >> 56) as u8
}
