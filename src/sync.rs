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

//! # Process-wide resize policy
//!
//! A single atomic cell shared by every [`crate::ht::HashTable`] and [`crate::kvs::Kvs`]
//! instance in the process. An embedder under memory pressure (e.g. during
//! fork-based persistence in a host process) can set this to `Avoid` or
//! `Forbid` to suppress growth without touching any individual table.

use core::sync::atomic::{AtomicU8, Ordering};

const ORD_ACQ: Ordering = Ordering::Acquire;
const ORD_REL: Ordering = Ordering::Release;

/// The resize policy in effect for all tables in the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResizePolicy {
    /// Tables may grow or shrink freely.
    Allow = 0,
    /// Tables may shrink, but growth is deferred until the policy changes
    /// back to `Allow` (used to ride out a transient memory-pressure spike
    /// without refusing writes).
    Avoid = 1,
    /// No resize of any kind is permitted; inserts that would require
    /// growth still succeed into the existing bucket array's free slots,
    /// but once it's full, inserts fail.
    Forbid = 2,
}

impl ResizePolicy {
    const fn from_u8(v: u8) -> Self {
        match v {
            0 => ResizePolicy::Allow,
            1 => ResizePolicy::Avoid,
            _ => ResizePolicy::Forbid,
        }
    }
}

static POLICY: AtomicU8 = AtomicU8::new(ResizePolicy::Allow as u8);

/// Returns the process-wide resize policy currently in effect.
pub fn policy() -> ResizePolicy {
    ResizePolicy::from_u8(POLICY.load(ORD_ACQ))
}

/// Sets the process-wide resize policy.
pub fn set_policy(p: ResizePolicy) {
    POLICY.store(p as u8, ORD_REL);
}

/// True if a table is currently permitted to grow its bucket array.
pub fn can_grow() -> bool {
    matches!(policy(), ResizePolicy::Allow)
}

/// True if a table is currently permitted to shrink its bucket array.
pub fn can_shrink() -> bool {
    !matches!(policy(), ResizePolicy::Forbid)
}

#[cfg(test)]
mod tests {
    use super::*;

    // the policy cell is process-global, so exercise all three states from
    // a single test to avoid cross-test races under the default parallel
    // test runner.
    #[test]
    fn policy_transitions() {
        set_policy(ResizePolicy::Allow);
        assert!(can_grow());
        assert!(can_shrink());

        set_policy(ResizePolicy::Avoid);
        assert!(!can_grow());
        assert!(can_shrink());

        set_policy(ResizePolicy::Forbid);
        assert!(!can_grow());
        assert!(!can_shrink());

        set_policy(ResizePolicy::Allow);
    }
}
