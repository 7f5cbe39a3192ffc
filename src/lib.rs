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

//! # kvcore
//!
//! The in-memory data-structure core backing a key/value store: a packed
//! listpack for small ordered sequences, a quicklist chaining listpacks
//! (with LZF compression of cold interior nodes) for larger ones, a
//! cache-line hash table with incremental rehashing, a sharded key/value
//! store built on top of it, and a lock-free SPSC job queue used to hand
//! I/O work off to dedicated worker threads. See each module for details.

#[cfg(all(not(target_env = "msvc"), not(miri)))]
use jemallocator::Jemalloc;

#[cfg(all(not(target_env = "msvc"), not(miri)))]
#[global_allocator]
/// jemalloc is the default allocator everywhere it links (not MSVC, not
/// under Miri), matching the teacher's own choice of allocator.
static GLOBAL: Jemalloc = Jemalloc;

pub mod cursor;
pub mod defrag;
pub mod hashing;
pub mod ht;
pub mod ioq;
pub mod kvs;
pub mod lp;
pub mod lzf;
pub mod ql;
pub mod sync;

pub use ht::HashTable;
pub use kvs::{Kvs, KvsFlags};
pub use lp::Listpack;
pub use ql::Quicklist;
