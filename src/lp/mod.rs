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

//! # Listpack
//!
//! A compact, self-describing byte sequence of mixed small-integer / short
//! string entries, with a variable-length backlen trailing each entry so
//! the sequence can be walked in either direction without an external
//! index. Layout: `[total_bytes:u32 LE][num_elements:u16 LE][entry]*[0xFF]`.

pub mod encoding;

use encoding::{decode_backlen_backward, decode_element, encode_backlen, encode_element};
pub use encoding::{LpEntry, LpValue};

const HEADER_LEN: usize = 6;
const EOF_LEN: usize = 1;
/// `num_elements` header value meaning "overflowed; count by scanning".
const NUM_ELEMENTS_UNKNOWN: u16 = 0xFFFF;

/// A listpack. Owns its backing buffer.
#[derive(Clone)]
pub struct Listpack {
    buf: Vec<u8>,
}

/// Byte offset into a listpack's buffer identifying the start of an entry's
/// header. Not valid across any mutation of the listpack it was obtained
/// from.
pub type Pos = usize;

impl Listpack {
    /// Creates a new, empty listpack with room for at least `capacity`
    /// bytes of entries pre-reserved.
    pub fn new(capacity: usize) -> Self {
        let mut buf = Vec::with_capacity(HEADER_LEN + EOF_LEN + capacity);
        buf.extend_from_slice(&(HEADER_LEN as u32 + EOF_LEN as u32).to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.push(encoding::EOF_BYTE);
        Self { buf }
    }

    fn header_total_bytes(&self) -> u32 {
        u32::from_le_bytes(self.buf[0..4].try_into().unwrap())
    }
    fn set_header_total_bytes(&mut self, v: u32) {
        self.buf[0..4].copy_from_slice(&v.to_le_bytes());
    }
    fn header_num_elements(&self) -> u16 {
        u16::from_le_bytes(self.buf[4..6].try_into().unwrap())
    }
    fn set_header_num_elements(&mut self, v: u16) {
        self.buf[4..6].copy_from_slice(&v.to_le_bytes());
    }
    fn bump_num_elements(&mut self, delta: i32) {
        let cur = self.header_num_elements();
        if cur == NUM_ELEMENTS_UNKNOWN {
            return;
        }
        let next = cur as i64 + delta as i64;
        if next < 0 || next >= NUM_ELEMENTS_UNKNOWN as i64 {
            self.set_header_num_elements(NUM_ELEMENTS_UNKNOWN);
        } else {
            self.set_header_num_elements(next as u16);
        }
    }

    /// Raw backing buffer, e.g. for durable persistence (a higher layer may
    /// write this verbatim to disk; it is expected to round-trip through
    /// [`Self::validate_integrity`] + [`Self::from_raw`]).
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Wraps an already-validated buffer. Callers on an untrusted path must
    /// call [`validate_integrity`] first.
    pub fn from_raw(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    /// Number of entries. Falls back to a full scan if the header's 16-bit
    /// counter has overflowed.
    pub fn length(&self) -> usize {
        let hdr = self.header_num_elements();
        if hdr != NUM_ELEMENTS_UNKNOWN {
            return hdr as usize;
        }
        self.iter_positions().count()
    }

    /// Total buffer length, equal to the header's `total_bytes` field.
    pub fn bytes(&self) -> usize {
        self.buf.len()
    }

    fn entries_start(&self) -> usize {
        HEADER_LEN
    }
    fn eof_pos(&self) -> usize {
        self.buf.len() - EOF_LEN
    }

    /// First entry's position, or `None` if empty.
    pub fn first(&self) -> Option<Pos> {
        let p = self.entries_start();
        if p == self.eof_pos() {
            None
        } else {
            Some(p)
        }
    }

    /// Last entry's position, or `None` if empty.
    pub fn last(&self) -> Option<Pos> {
        self.prev(self.eof_pos())
    }

    /// Advances past the entry at `p`, returning the next entry's position
    /// or `None` at end of listpack.
    pub fn next(&self, p: Pos) -> Option<Pos> {
        let (_, enc_len) = decode_element(&self.buf, p)?;
        let after_payload = p + enc_len;
        let (_, backlen_len) = self.read_backlen_forward(after_payload)?;
        let next_pos = after_payload + backlen_len;
        if next_pos >= self.eof_pos() {
            None
        } else {
            Some(next_pos)
        }
    }

    /// Backlen bytes are most naturally decoded backward (that's the whole
    /// point), but `next()` already knows where they start, so just walk
    /// forward counting continuation bits instead of calling the backward
    /// decoder with a guessed end offset.
    fn read_backlen_forward(&self, start: usize) -> Option<(u64, usize)> {
        let mut n = 0usize;
        loop {
            let b = *self.buf.get(start + n)?;
            n += 1;
            if b & 0x80 == 0 {
                return Some((0, n));
            }
            if n >= 5 {
                return None;
            }
        }
    }

    /// Steps back from `p` (which may be the EOF position) to the previous
    /// entry's position, or `None` if `p` was the first entry.
    pub fn prev(&self, p: Pos) -> Option<Pos> {
        if p <= self.entries_start() {
            return None;
        }
        let (backlen_val, backlen_len) = decode_backlen_backward(&self.buf, p)?;
        let enc_len = backlen_val as usize;
        let entry_total = enc_len + backlen_len;
        if entry_total > p - self.entries_start() {
            return None;
        }
        Some(p - entry_total)
    }

    /// Decodes the entry at `p`.
    pub fn get(&self, p: Pos) -> Option<LpValue<'_>> {
        decode_element(&self.buf, p).map(|(v, _)| v)
    }

    /// Resolves a (possibly negative, counting from the tail) logical index
    /// to a position.
    pub fn seek(&self, index: isize) -> Option<Pos> {
        if index >= 0 {
            let mut p = self.first()?;
            for _ in 0..index {
                p = self.next(p)?;
            }
            Some(p)
        } else {
            let mut p = self.last()?;
            for _ in 0..(-index - 1) {
                p = self.prev(p)?;
            }
            Some(p)
        }
    }

    fn iter_positions(&self) -> impl Iterator<Item = Pos> + '_ {
        std::iter::successors(self.first(), move |&p| self.next(p))
    }

    /// Iterates every entry's decoded value in forward order.
    pub fn iter(&self) -> impl Iterator<Item = LpValue<'_>> + '_ {
        self.iter_positions().map(move |p| self.get(p).unwrap())
    }

    /// An integer-shaped string (canonical decimal, see
    /// [`encoding::parse_strict_int`]) must always be stored as an int
    /// encoding, never as a string encoding, so two listpacks built from
    /// equivalent logical content are byte-identical.
    fn canonicalize(value: LpEntry<'_>) -> LpEntry<'_> {
        match value {
            LpEntry::Str(s) => match encoding::parse_strict_int(s) {
                Some(i) => LpEntry::Int(i),
                None => LpEntry::Str(s),
            },
            v => v,
        }
    }

    fn encode_with_backlen(value: LpEntry<'_>) -> Vec<u8> {
        let mut enc = encode_element(Self::canonicalize(value));
        let backlen = encode_backlen(enc.len() as u64);
        enc.extend_from_slice(&backlen);
        enc
    }

    /// Splices `entry_bytes` in at absolute offset `at`, replacing
    /// `old_len` existing bytes there (0 for pure insertion), updating the
    /// header and entry count. Returns `None` if the resulting buffer would
    /// exceed `u32::MAX` bytes.
    fn splice(&mut self, at: usize, old_len: usize, entry_bytes: &[u8], count_delta: i32) -> Option<()> {
        let new_total = self.buf.len() as i64 - old_len as i64 + entry_bytes.len() as i64;
        if new_total > u32::MAX as i64 {
            return None;
        }
        self.buf.splice(at..at + old_len, entry_bytes.iter().copied());
        self.set_header_total_bytes(self.buf.len() as u32);
        self.bump_num_elements(count_delta);
        Some(())
    }

    /// Appends `value` at the tail.
    pub fn append(&mut self, value: LpEntry<'_>) -> Option<()> {
        let entry = Self::encode_with_backlen(value);
        let at = self.eof_pos();
        self.splice(at, 0, &entry, 1)
    }

    /// Prepends `value` at the head.
    pub fn prepend(&mut self, value: LpEntry<'_>) -> Option<()> {
        let entry = Self::encode_with_backlen(value);
        let at = self.entries_start();
        self.splice(at, 0, &entry, 1)
    }

    /// Inserts `value` immediately before the entry at `p`.
    pub fn insert_before(&mut self, p: Pos, value: LpEntry<'_>) -> Option<()> {
        let entry = Self::encode_with_backlen(value);
        self.splice(p, 0, &entry, 1)
    }

    /// Inserts `value` immediately after the entry at `p`.
    pub fn insert_after(&mut self, p: Pos, value: LpEntry<'_>) -> Option<()> {
        let at = self.next(p).unwrap_or_else(|| self.eof_pos());
        let entry = Self::encode_with_backlen(value);
        self.splice(at, 0, &entry, 1)
    }

    /// Replaces the entry at `p` with `value` in place.
    pub fn replace(&mut self, p: Pos, value: LpEntry<'_>) -> Option<()> {
        let (_, enc_len) = decode_element(&self.buf, p)?;
        let (_, backlen_len) = self.read_backlen_forward(p + enc_len)?;
        let old_len = enc_len + backlen_len;
        let entry = Self::encode_with_backlen(value);
        self.splice(p, old_len, &entry, 0)
    }

    /// Deletes the entry at `p`.
    pub fn delete(&mut self, p: Pos) -> Option<()> {
        let (_, enc_len) = decode_element(&self.buf, p)?;
        let (_, backlen_len) = self.read_backlen_forward(p + enc_len)?;
        self.splice(p, enc_len + backlen_len, &[], -1)
    }

    /// Deletes `n` entries starting at logical `index`.
    pub fn delete_range(&mut self, index: usize, n: usize) -> Option<()> {
        if n == 0 {
            return Some(());
        }
        let start = self.seek(index as isize)?;
        let mut end = start;
        let mut removed = 0;
        for _ in 0..n {
            match self.next(end) {
                Some(next) => {
                    end = next;
                    removed += 1;
                }
                None => {
                    end = self.eof_pos();
                    removed += 1;
                    break;
                }
            }
        }
        self.splice(start, end - start, &[], -(removed as i32))
    }

    /// Deletes entries at the given (listpack-unique, order-independent)
    /// positions in one pass, highest offset first so earlier splices don't
    /// invalidate later offsets.
    pub fn batch_delete(&mut self, mut positions: Vec<Pos>) -> Option<()> {
        positions.sort_unstable_by(|a, b| b.cmp(a));
        for p in positions {
            self.delete(p)?;
        }
        Some(())
    }

    /// Concatenates two listpacks into a new one (entries of `a` then `b`).
    pub fn merge(a: &Listpack, b: &Listpack) -> Option<Listpack> {
        let mut out = Listpack::new(a.bytes() + b.bytes());
        for v in a.iter() {
            out.append(owned_entry(v).as_entry())?;
        }
        for v in b.iter() {
            out.append(owned_entry(v).as_entry())?;
        }
        Some(out)
    }

    /// Deep-clones this listpack.
    pub fn dup(&self) -> Listpack {
        self.clone()
    }

    /// Asks the allocator to right-size the backing buffer. Best effort:
    /// this does not guarantee `bytes(lp) == allocated_capacity`, only that
    /// the logical length reported by the header is unchanged.
    pub fn shrink_to_fit(&mut self) {
        self.buf.shrink_to_fit();
    }

    /// Compares the entry at `p` against `s`, by integer value if both sides
    /// parse as a canonical integer, else byte-for-byte.
    pub fn compare(&self, p: Pos, s: &[u8]) -> bool {
        match self.get(p) {
            Some(LpValue::Str(entry)) => entry == s,
            Some(LpValue::Int(i)) => match encoding::parse_strict_int(s) {
                Some(si) => si == i,
                None => false,
            },
            None => false,
        }
    }

    /// Walks forward from the start, comparing every `skip + 1`-th entry
    /// against `key`, returning the first match's position.
    pub fn find(&self, key: &[u8], skip: usize) -> Option<Pos> {
        let query_int = encoding::parse_strict_int(key);
        let mut p = self.first()?;
        let stride = skip + 1;
        loop {
            let matched = match self.get(p)? {
                LpValue::Str(s) => s == key,
                LpValue::Int(i) => query_int == Some(i),
            };
            if matched {
                return Some(p);
            }
            for _ in 0..stride {
                p = self.next(p)?;
            }
        }
    }

    /// Validates header consistency and, if `deep`, walks every entry
    /// confirming forward encoding length and reverse backlen agree,
    /// invoking `cb` per entry. Never panics on malformed input.
    pub fn validate_integrity(buf: &[u8], size: usize, deep: bool, mut cb: impl FnMut(LpValue<'_>)) -> bool {
        if buf.len() != size || size < HEADER_LEN + EOF_LEN {
            return false;
        }
        let total = u32::from_le_bytes(match buf[0..4].try_into() {
            Ok(a) => a,
            Err(_) => return false,
        });
        if total as usize != size {
            return false;
        }
        if buf[size - 1] != encoding::EOF_BYTE {
            return false;
        }
        if !deep {
            return true;
        }
        let mut pos = HEADER_LEN;
        let eof = size - EOF_LEN;
        let mut count = 0u32;
        while pos < eof {
            let (val, enc_len) = match decode_element(buf, pos) {
                Some(v) => v,
                None => return false,
            };
            let after_payload = pos + enc_len;
            if after_payload > eof {
                return false;
            }
            // forward-scan the backlen to learn its length, then verify
            // the backward decoder agrees from the far end.
            let mut blen = 0usize;
            loop {
                match buf.get(after_payload + blen) {
                    Some(b) => {
                        blen += 1;
                        if b & 0x80 == 0 {
                            break;
                        }
                        if blen >= 5 {
                            return false;
                        }
                    }
                    None => return false,
                }
            }
            let entry_end = after_payload + blen;
            if entry_end > eof {
                return false;
            }
            match decode_backlen_backward(buf, entry_end) {
                Some((v, n)) if v as usize == enc_len && n == blen => {}
                _ => return false,
            }
            cb(val);
            count += 1;
            pos = entry_end;
        }
        if pos != eof {
            return false;
        }
        let hdr_count = u16::from_le_bytes(match buf[4..6].try_into() {
            Ok(a) => a,
            Err(_) => return false,
        });
        hdr_count == NUM_ELEMENTS_UNKNOWN || hdr_count as u32 == count
    }

    /// Returns one (key, value) pair drawn from a uniformly random
    /// even-indexed position, given the total pair count.
    pub fn random_pair(&self, total_count: usize, rng: &mut impl rand::Rng) -> Option<(LpValue<'_>, LpValue<'_>)> {
        if total_count == 0 {
            return None;
        }
        let i = rng.gen_range(0..total_count);
        let k = self.seek((i * 2) as isize)?;
        let v = self.next(k)?;
        Some((self.get(k)?, self.get(v)?))
    }

    /// Draws `count` pair-indices i.i.d (with repeats possible). A single
    /// forward walk materializes every pair's key position, so subsequent
    /// draws (in whatever order) are O(1) lookups rather than re-walking
    /// the listpack per draw.
    pub fn random_pairs(&self, total_count: usize, count: usize, rng: &mut impl rand::Rng) -> Vec<(Vec<u8>, Vec<u8>)> {
        if total_count == 0 || count == 0 {
            return Vec::new();
        }
        let pair_keys: Vec<Pos> = self.iter_positions().step_by(2).take(total_count).collect();
        (0..count)
            .filter_map(|_| {
                let i = rng.gen_range(0..pair_keys.len());
                let kp = pair_keys[i];
                let vp = self.next(kp)?;
                Some((render(self.get(kp)?), render(self.get(vp)?)))
            })
            .collect()
    }

    /// Vitter-style reservoir selection in one forward pass: at pair
    /// position `i` (0-based) with `remaining` items still to pick out of
    /// `available` left, accept with probability `remaining / available`.
    pub fn random_pairs_unique(&self, total_count: usize, count: usize, rng: &mut impl rand::Rng) -> Vec<(Vec<u8>, Vec<u8>)> {
        let want = count.min(total_count);
        if want == 0 {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(want);
        let mut remaining = want;
        let mut p = self.first();
        for i in 0..total_count {
            if remaining == 0 {
                break;
            }
            let available = total_count - i;
            let take = next_random(remaining, available, rng);
            let kp = match p {
                Some(k) => k,
                None => break,
            };
            let vp = match self.next(kp) {
                Some(v) => v,
                None => break,
            };
            if take {
                out.push((render(self.get(kp).unwrap()), render(self.get(vp).unwrap())));
                remaining -= 1;
            }
            p = self.next(vp);
        }
        out
    }
}

/// Acceptance test for a single item in Vitter-style reservoir sampling:
/// with `remaining` slots left to fill out of `available` items left to
/// consider, accept the current item with probability `remaining /
/// available`.
pub fn next_random(remaining: usize, available: usize, rng: &mut impl rand::Rng) -> bool {
    if remaining == 0 {
        return false;
    }
    if remaining >= available {
        return true;
    }
    rng.gen_range(0..available) < remaining
}

fn render(v: LpValue<'_>) -> Vec<u8> {
    match v {
        LpValue::Str(s) => s.to_vec(),
        LpValue::Int(i) => i.to_string().into_bytes(),
    }
}

/// Helper so `merge`/`dup` can round-trip an `LpValue` back into an
/// `LpEntry` without an extra enum.
struct OwnedEntry(Vec<u8>, bool /* is_int */, i64);
impl OwnedEntry {
    fn as_entry(&self) -> LpEntry<'_> {
        if self.1 {
            LpEntry::Int(self.2)
        } else {
            LpEntry::Str(&self.0)
        }
    }
}
fn owned_entry(v: LpValue<'_>) -> OwnedEntry {
    match v {
        LpValue::Str(s) => OwnedEntry(s.to_vec(), false, 0),
        LpValue::Int(i) => OwnedEntry(Vec::new(), true, i),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_lp_insert_delete_roundtrip() {
        let mut lp = Listpack::new(64);
        lp.append(LpEntry::Str(b"hello")).unwrap();
        lp.append(LpEntry::Str(b"foo")).unwrap();
        lp.append(LpEntry::Str(b"quux")).unwrap();
        lp.append(LpEntry::Int(1024)).unwrap();
        assert_eq!(lp.length(), 4);

        let p3 = lp.seek(3).unwrap();
        assert_eq!(lp.get(p3), Some(LpValue::Int(1024)));

        lp.delete_range(0, 2).unwrap();
        assert_eq!(lp.length(), 2);
        let first = lp.first().unwrap();
        assert_eq!(lp.get(first), Some(LpValue::Str(b"quux")));
        assert_eq!(lp.bytes(), lp.header_total_bytes() as usize);
    }

    #[test]
    fn validate_integrity_accepts_well_formed_buffer() {
        let mut lp = Listpack::new(16);
        lp.append(LpEntry::Str(b"a")).unwrap();
        lp.append(LpEntry::Int(42)).unwrap();
        let mut seen = Vec::new();
        assert!(Listpack::validate_integrity(
            lp.as_bytes(),
            lp.bytes(),
            true,
            |v| seen.push(render(v))
        ));
        assert_eq!(seen, vec![b"a".to_vec(), b"42".to_vec()]);
    }

    #[test]
    fn validate_integrity_rejects_truncated_buffer() {
        let mut lp = Listpack::new(16);
        lp.append(LpEntry::Str(b"hello world")).unwrap();
        let truncated = &lp.as_bytes()[..lp.bytes() - 3];
        assert!(!Listpack::validate_integrity(truncated, truncated.len(), true, |_| {}));
    }

    #[test]
    fn reverse_traversal_matches_forward() {
        let mut lp = Listpack::new(64);
        let vals = [LpEntry::Str(b"one"), LpEntry::Int(2), LpEntry::Str(b"three")];
        for v in vals {
            lp.append(v).unwrap();
        }
        let forward: Vec<_> = lp.iter().map(render).collect();
        let mut backward = Vec::new();
        let mut p = lp.last();
        while let Some(pp) = p {
            backward.push(render(lp.get(pp).unwrap()));
            p = lp.prev(pp);
        }
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn find_matches_int_and_string_keys() {
        let mut lp = Listpack::new(64);
        lp.append(LpEntry::Str(b"alpha")).unwrap();
        lp.append(LpEntry::Int(99)).unwrap();
        assert!(lp.find(b"alpha", 0).is_some());
        assert!(lp.find(b"99", 0).is_some());
        assert!(lp.find(b"missing", 0).is_none());
    }

    #[test]
    fn integer_shaped_strings_are_stored_as_ints() {
        let mut lp = Listpack::new(16);
        lp.append(LpEntry::Str(b"1024")).unwrap();
        let p = lp.first().unwrap();
        assert_eq!(lp.get(p), Some(LpValue::Int(1024)));
    }

    #[test]
    fn reservoir_sampling_respects_bounds() {
        let mut rng = rand::thread_rng();
        let mut lp = Listpack::new(256);
        for i in 0..20i64 {
            lp.append(LpEntry::Int(i)).unwrap();
            lp.append(LpEntry::Str(format!("v{i}").as_bytes())).unwrap();
        }
        let pairs = lp.random_pairs_unique(10, 5, &mut rng);
        assert_eq!(pairs.len(), 5);
        let mut keys: Vec<_> = pairs.iter().map(|(k, _)| k.clone()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 5, "unique reservoir must not repeat a pair");
    }
}
