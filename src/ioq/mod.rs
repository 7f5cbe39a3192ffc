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

//! # IOQ — single-producer/single-consumer job ring
//!
//! A fixed-capacity ring buffer the main thread uses to hand work off to a
//! dedicated worker thread without taking a lock on the hot path. `ring.rs`
//! holds the lock-free core; `worker.rs` builds a small thread-pool
//! lifecycle on top of it.

pub mod ring;
pub mod worker;

pub use ring::Ring;
pub use worker::{worker_thread_count, IoqConfig, Job, WorkerPool};
