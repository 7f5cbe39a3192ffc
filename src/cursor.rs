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

//! # Reversed-binary scan cursors
//!
//! A scan cursor walks a power-of-two-sized bucket array without missing or
//! repeating entries even while the array is being resized concurrently with
//! the scan (as long as every resize is itself a power-of-two doubling or
//! halving). The trick, same as in `hashset.c`, is to increment cursors in
//! *reversed-bit* order: instead of counting `0, 1, 2, 3, ...` we count
//! `0, 100.., 010.., 110.., 001.., ...` (binary, high bit first). An entry
//! that lived at bucket index `i` before a resize lives at `i` or `i |
//! (new_mask & !old_mask)` after a doubling; walking the reversed-bit
//! sequence visits both locations in the correct relative order regardless
//! of when the resize happens.

/// Reverse all 64 bits of `v`.
#[inline(always)]
const fn rev(v: u64) -> u64 {
    v.reverse_bits()
}

/// Returns the next cursor in the scan sequence, given the current cursor
/// and a `mask` that is `table_capacity - 1` (capacity must be a power of
/// two).
///
/// Mirrors `nextCursor` in `hashset.c`: set all bits outside `mask`, reverse,
/// increment, reverse back. This is equivalent to incrementing `v` in
/// bit-reversed space while letting the increment carry only within the
/// masked bits.
pub const fn next_cursor(cursor: u64, mask: u64) -> u64 {
    let mut v = cursor | !mask;
    v = rev(v);
    v = v.wrapping_add(1);
    rev(v)
}

/// Returns the previous cursor in the scan sequence (the inverse of
/// [`next_cursor`]), used when a scan needs to resume from a bookmark taken
/// before the most recent step.
pub const fn prev_cursor(cursor: u64, mask: u64) -> u64 {
    let mut v = cursor | !mask;
    v = rev(v);
    v = v.wrapping_sub(1);
    rev(v)
}

/// Returns whether `a` precedes `b` in the reversed-bit scan order for the
/// given `mask`. Used to determine whether a scan that started at cursor `a`
/// has now caught up with (or overtaken) a bookmark `b`, since raw numeric
/// comparison of cursors is meaningless once they've been bit-reversed.
pub fn cursor_is_less_than(a: u64, b: u64, mask: u64) -> bool {
    let ra = rev(a & mask);
    let rb = rev(b & mask);
    ra < rb
}

/// Iterates every cursor value in scan order for a table of capacity
/// `mask + 1`, starting from (and stopping just before re-visiting) zero.
pub struct CursorScan {
    mask: u64,
    current: Option<u64>,
}

impl CursorScan {
    pub const fn new(mask: u64) -> Self {
        Self {
            mask,
            current: Some(0),
        }
    }
}

impl Iterator for CursorScan {
    type Item = u64;
    fn next(&mut self) -> Option<u64> {
        let cur = self.current?;
        let nxt = next_cursor(cur, self.mask);
        self.current = if nxt == 0 { None } else { Some(nxt) };
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn full_cycle_visits_every_slot_exactly_once() {
        // scenario 5: M = 0x7F (128 buckets)
        let mask = 0x7F;
        let mut seen = HashSet::new();
        let mut cursor = 0u64;
        for _ in 0..128 {
            assert!(seen.insert(cursor), "cursor {cursor} repeated early");
            cursor = next_cursor(cursor, mask);
        }
        assert_eq!(cursor, 0, "cycle should return to 0 after exactly 128 steps");
        assert_eq!(seen.len(), 128);
        for i in 0..128u64 {
            assert!(seen.contains(&i));
        }
    }

    #[test]
    fn prev_is_inverse_of_next() {
        let mask = 0xFF;
        let mut cursor = 17u64;
        for _ in 0..50 {
            let nxt = next_cursor(cursor, mask);
            assert_eq!(prev_cursor(nxt, mask), cursor);
            cursor = nxt;
        }
    }

    #[test]
    fn iterator_matches_manual_cycle() {
        let mask = 0x0F;
        let collected: Vec<u64> = CursorScan::new(mask).collect();
        assert_eq!(collected.len(), 16);
        let mut sorted = collected.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 16);
    }

    #[test]
    fn small_table_single_bucket() {
        // mask = 0 means a single-bucket table; cursor stays at 0 forever
        assert_eq!(next_cursor(0, 0), 0);
    }
}
