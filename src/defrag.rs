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

//! # Defragmentation hints
//!
//! The original's `defrag_internals(reallocate)` hands a raw reallocator
//! callback to every container so it can be walked and its pointers fixed
//! up in place. Rust's `Vec`/`Box` already own their reallocation, so the
//! part of that contract worth keeping is the *decision* of when a
//! container's backing buffer is worth compacting — this module supplies
//! that signal; [`Defragmentable::defrag_internals`] just calls
//! `shrink_to_fit` where the original would have moved a pointer.

/// A coarse fragmentation signal for the whole process. Per-allocation bin
/// utilization (what the original queries) isn't something a safe
/// allocator API exposes to a caller holding only a `Vec`; the global
/// allocated/resident ratio is the idiomatic approximation jemalloc's own
/// stats interface offers instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllocHint {
    pub used_fraction: f32,
}

/// Below this, compaction is assumed worth the copy.
pub const DEFRAG_THRESHOLD: f32 = 0.7;

impl AllocHint {
    pub fn wants_defrag(&self) -> bool {
        self.used_fraction < DEFRAG_THRESHOLD
    }
}

pub trait AllocProfiler: Send + Sync {
    /// Returns the current global utilization hint, or `None` if the
    /// backing allocator doesn't expose one.
    fn global_hint(&self) -> Option<AllocHint>;
}

/// Containers that can be asked to compact their backing storage.
pub trait Defragmentable {
    /// Shrinks backing allocations when `hint` suggests it. Passing `None`
    /// (no profiler available) always compacts, matching the original's
    /// behavior of defragmenting unconditionally when called.
    fn defrag_internals(&mut self, hint: Option<AllocHint>);
}

fn should_defrag(hint: Option<AllocHint>) -> bool {
    hint.map_or(true, |h| h.wants_defrag())
}

impl Defragmentable for crate::lp::Listpack {
    fn defrag_internals(&mut self, hint: Option<AllocHint>) {
        if should_defrag(hint) {
            self.shrink_to_fit();
        }
    }
}

impl Defragmentable for crate::ql::Quicklist {
    fn defrag_internals(&mut self, hint: Option<AllocHint>) {
        if should_defrag(hint) {
            self.shrink_to_fit();
        }
    }
}

#[cfg(all(not(target_env = "msvc"), not(miri)))]
pub struct JemallocProfiler {
    allocated: jemalloc_ctl::stats::Allocated,
    resident: jemalloc_ctl::stats::Resident,
}

#[cfg(all(not(target_env = "msvc"), not(miri)))]
impl JemallocProfiler {
    pub fn new() -> Result<Self, jemalloc_ctl::Error> {
        Ok(Self {
            allocated: jemalloc_ctl::stats::allocated::mib()?,
            resident: jemalloc_ctl::stats::resident::mib()?,
        })
    }
}

#[cfg(all(not(target_env = "msvc"), not(miri)))]
impl AllocProfiler for JemallocProfiler {
    fn global_hint(&self) -> Option<AllocHint> {
        let allocated = self.allocated.read().ok()? as f32;
        let resident = self.resident.read().ok()? as f32;
        if resident <= 0.0 {
            return None;
        }
        Some(AllocHint {
            used_fraction: allocated / resident,
        })
    }
}

/// Used on targets (MSVC, Miri) where jemalloc isn't linked in.
pub struct NoopProfiler;
impl AllocProfiler for NoopProfiler {
    fn global_hint(&self) -> Option<AllocHint> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lp::{LpEntry, Listpack};

    struct FixedProfiler(f32);
    impl AllocProfiler for FixedProfiler {
        fn global_hint(&self) -> Option<AllocHint> {
            Some(AllocHint { used_fraction: self.0 })
        }
    }

    #[test]
    fn hint_threshold_classifies_correctly() {
        assert!(AllocHint { used_fraction: 0.5 }.wants_defrag());
        assert!(!AllocHint { used_fraction: 0.9 }.wants_defrag());
    }

    #[test]
    fn no_hint_always_defrags() {
        assert!(should_defrag(None));
    }

    #[test]
    fn listpack_defrag_runs_under_low_utilization() {
        let mut lp = Listpack::new(4096);
        lp.append(LpEntry::Str(b"hi")).unwrap();
        let low = FixedProfiler(0.3).global_hint();
        lp.defrag_internals(low);
        let high = FixedProfiler(0.95).global_hint();
        lp.defrag_internals(high); // should not panic either way
    }

    #[test]
    fn noop_profiler_reports_no_hint() {
        assert_eq!(NoopProfiler.global_hint(), None);
    }

    #[test]
    fn quicklist_defrag_shrinks_without_panic() {
        use crate::ql::{End, Quicklist};
        let mut ql = Quicklist::new(4, 0);
        for i in 0..50 {
            ql.push(End::Tail, format!("v{i}").as_bytes());
        }
        ql.defrag_internals(FixedProfiler(0.2).global_hint());
        assert_eq!(ql.len_entries(), 50);
    }
}
