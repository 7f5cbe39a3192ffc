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

//! A single quicklist node: either a live [`crate::lp::Listpack`], a cold
//! LZF-compressed copy of one, or (for an entry too large to pack) a single
//! raw value held outside any listpack.

use crate::lp::{LpValue, Listpack};
use crate::lzf;
use log::trace;

/// A single value larger than this is kept in its own [`NodeBody::Plain`]
/// node rather than packed, so one oversized value can't blow out a node's
/// byte budget for its neighbors.
pub const PLAIN_THRESHOLD: usize = 8192;

pub enum NodeBody {
    Packed(Listpack),
    Plain(Vec<u8>),
    Compressed {
        data: Vec<u8>,
        decompressed_len: usize,
        entry_count: usize,
    },
}

pub struct Node {
    pub body: NodeBody,
    /// Set once compression has been tried and didn't shrink the node, so
    /// the compression pass doesn't retry it every time the window shifts.
    /// Cleared whenever the node's entry count changes.
    pub attempted_compress: bool,
}

impl Node {
    pub fn new_packed() -> Self {
        Self {
            body: NodeBody::Packed(Listpack::new(64)),
            attempted_compress: false,
        }
    }

    pub fn new_plain(value: Vec<u8>) -> Self {
        Self {
            body: NodeBody::Plain(value),
            attempted_compress: false,
        }
    }

    pub fn is_plain(&self) -> bool {
        matches!(self.body, NodeBody::Plain(_))
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self.body, NodeBody::Compressed { .. })
    }

    /// Number of logical entries held by this node (1 for a plain node).
    pub fn len(&self) -> usize {
        match &self.body {
            NodeBody::Packed(lp) => lp.length(),
            NodeBody::Plain(_) => 1,
            NodeBody::Compressed { entry_count, .. } => *entry_count,
        }
    }

    pub fn byte_size(&self) -> usize {
        match &self.body {
            NodeBody::Packed(lp) => lp.bytes(),
            NodeBody::Plain(v) => v.len(),
            NodeBody::Compressed { data, .. } => data.len(),
        }
    }

    /// Ensures the node is in `Packed` form, decompressing in place if it
    /// was cold. A no-op for already-packed or plain nodes.
    pub fn decompress(&mut self) {
        if let NodeBody::Compressed { data, decompressed_len, .. } = &self.body {
            trace!("ql: decompressing node ({} -> {} bytes)", data.len(), decompressed_len);
            let mut raw = vec![0u8; *decompressed_len];
            let n = lzf::decompress(data, &mut raw).expect("quicklist node corrupt");
            debug_assert_eq!(n, *decompressed_len);
            self.body = NodeBody::Packed(Listpack::from_raw(raw));
        }
    }

    /// Attempts to compress a packed node in place. Returns `true` if the
    /// node ended up compressed. A plain node or one whose listpack doesn't
    /// shrink under LZF is left untouched (and marked `attempted_compress`
    /// so the caller stops retrying it until its contents change).
    pub fn try_compress(&mut self) -> bool {
        if self.attempted_compress || self.is_compressed() || self.is_plain() {
            return self.is_compressed();
        }
        let NodeBody::Packed(lp) = &self.body else {
            return false;
        };
        let raw = lp.as_bytes();
        let mut dst = vec![0u8; raw.len()];
        match lzf::compress(raw, &mut dst) {
            Some(n) => {
                dst.truncate(n);
                let entry_count = lp.length();
                let decompressed_len = raw.len();
                trace!("ql: compressed node ({decompressed_len} -> {n} bytes)");
                self.body = NodeBody::Compressed {
                    data: dst,
                    decompressed_len,
                    entry_count,
                };
                true
            }
            None => {
                self.attempted_compress = true;
                false
            }
        }
    }

    pub fn as_packed_mut(&mut self) -> &mut Listpack {
        self.decompress();
        match &mut self.body {
            NodeBody::Packed(lp) => lp,
            _ => unreachable!("decompress() leaves Packed or Plain only"),
        }
    }
}

pub fn entry_to_vec(v: LpValue<'_>) -> Vec<u8> {
    match v {
        LpValue::Str(s) => s.to_vec(),
        LpValue::Int(i) => i.to_string().into_bytes(),
    }
}
