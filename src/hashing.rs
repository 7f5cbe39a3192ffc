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

//! # Default keyed hash
//!
//! `ht` and `kvs` hash keys with SipHash-2-4 keyed by a 16-byte seed that is
//! generated once per process and shared by every table instance, keyed
//! rather than fixed-offset since an unkeyed hash over attacker-controlled
//! keys is a hash-flooding DoS vector.

use {
    core::hash::{Hash, Hasher},
    siphasher::sip::SipHasher24,
    std::sync::OnceLock,
};

pub mod seed {
    use super::OnceLock;

    static SEED: OnceLock<[u8; 16]> = OnceLock::new();

    /// Initializes the process-global hash seed. Only the first call has any
    /// effect; subsequent calls are no-ops. Returns the seed that is
    /// actually in effect (whichever call won the race).
    pub fn init(seed: [u8; 16]) -> [u8; 16] {
        *SEED.get_or_init(|| seed)
    }

    /// Returns the current seed, generating a random one via [`rand`] on
    /// first access if nothing has called [`init`] yet.
    pub fn current() -> [u8; 16] {
        *SEED.get_or_init(|| {
            let mut buf = [0u8; 16];
            for chunk in buf.chunks_mut(8) {
                chunk.copy_from_slice(&rand::random::<u64>().to_ne_bytes()[..chunk.len()]);
            }
            buf
        })
    }
}

/// A `SipHash-2-4` hasher keyed from the process-global seed.
pub struct SipHash24(SipHasher24);

impl SipHash24 {
    pub fn new() -> Self {
        let seed = seed::current();
        let k0 = u64::from_ne_bytes(seed[..8].try_into().unwrap());
        let k1 = u64::from_ne_bytes(seed[8..].try_into().unwrap());
        Self(SipHasher24::new_with_keys(k0, k1))
    }
    /// One-shot hash of a byte slice under the process seed.
    pub fn hash_bytes(src: &[u8]) -> u64 {
        let mut h = Self::new();
        h.write(src);
        h.finish()
    }
    /// One-shot hash of any [`Hash`] value under the process seed.
    pub fn hash_one<T: Hash>(v: &T) -> u64 {
        let mut h = Self::new();
        v.hash(&mut h);
        h.finish()
    }
}

impl Default for SipHash24 {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for SipHash24 {
    fn finish(&self) -> u64 {
        self.0.finish()
    }
    fn write(&mut self, bytes: &[u8]) {
        self.0.write(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_hash() {
        seed::init([7u8; 16]);
        let a = SipHash24::hash_bytes(b"hello");
        let b = SipHash24::hash_bytes(b"hello");
        assert_eq!(a, b);
    }

    #[test]
    fn different_input_usually_different_hash() {
        seed::init([3u8; 16]);
        let a = SipHash24::hash_bytes(b"hello");
        let b = SipHash24::hash_bytes(b"world");
        assert_ne!(a, b);
    }

    #[test]
    fn seed_init_is_sticky() {
        // a fresh OnceLock per test binary run isn't guaranteed across tests
        // in the same process, so only assert the observable contract: once
        // `current()` has been called, further `init()` calls don't change it.
        let first = seed::current();
        let _ = seed::init([42u8; 16]);
        assert_eq!(seed::current(), first);
    }
}
