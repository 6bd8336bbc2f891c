// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT
use std::collections::HashMap;

use crate::compression::Compression;
use crate::internal_key::InternalKey;
use crate::pair::KeyLevelPair;
use crate::storage::Storage;
use crate::zdd::Zdd;

/// One node on the path from the ZDD root to the iterator's current
/// position. `bit` records which child of `node` the path currently takes;
/// `tried_right` records whether the 1-child has already been attempted, so
/// backtracking knows whether there is anything left to try here.
struct Frame {
    node: Zdd,
    var: u32,
    bit: u8,
    tried_right: bool,
}

/// Walks the live keys of a [`Storage`] in ascending bit order.
///
/// Only meaningful over a [`Compression::None`] storage: a compressed key's
/// bytes are not recoverable from its image, so an iterator built over a
/// compressing storage starts (and stays) exhausted. Built as an explicit
/// state machine over a stack of [`Frame`]s rather than a generator, mirror-
/// ing the shape of a classic binary-trie iterator: there is no language
/// support for suspending a recursive walk mid-traversal, so the recursion
/// is unrolled into a loop.
pub struct Iterator<'a> {
    storage: &'a Storage,
    key_bits: u32,
    cf_prefix: Option<[u8; 4]>,
    data: HashMap<u32, u32>,
    stack: Vec<Frame>,
    current: Zdd,
    done: bool,
}

impl<'a> Iterator<'a> {
    /// Positions at the smallest live key in `storage`.
    pub fn new(storage: &'a Storage) -> Self {
        Self::build(storage, None, None)
    }

    /// Positions at the smallest live key greater than or equal to `key`.
    pub fn seek(storage: &'a Storage, key: &[u8]) -> Self {
        Self::build(storage, None, Some(key))
    }

    /// Restricts iteration to a single column family, optionally seeking
    /// within it.
    pub fn with_cf(storage: &'a Storage, cf_id: u32, key: Option<&[u8]>) -> Self {
        Self::build(storage, Some(cf_id), key)
    }

    fn exhausted(storage: &'a Storage) -> Self {
        Self {
            storage,
            key_bits: storage.key_bits(),
            cf_prefix: None,
            data: HashMap::new(),
            stack: Vec::new(),
            current: Zdd::empty(),
            done: true,
        }
    }

    fn build(storage: &'a Storage, cf_id: Option<u32>, key: Option<&[u8]>) -> Self {
        if storage.compression() != Compression::None {
            return Self::exhausted(storage);
        }
        let key_bits = storage.key_bits();
        let (store, data) = storage.snapshot();

        let root = match cf_id {
            Some(cf) => {
                let prefix_key = InternalKey::with_cf(cf, b"", Compression::None);
                match storage.get_subzdd(&store, &prefix_key, 32) {
                    Some(sub) => sub,
                    None => return Self::exhausted(storage),
                }
            }
            None => store,
        };

        let seek_ikey = match (cf_id, key) {
            (Some(cf), Some(k)) => InternalKey::with_cf(cf, k, Compression::None),
            (None, Some(k)) => InternalKey::new(k, Compression::None),
            (Some(cf), None) => InternalKey::with_cf(cf, &Self::minimum_suffix(key_bits), Compression::None),
            (None, None) => InternalKey::new(&Self::minimum_suffix(key_bits), Compression::None),
        };

        let mut stack = Vec::new();
        let mut cur = root;
        for _ in 0..=key_bits {
            if cur.is_false() || cur.is_true() {
                break;
            }
            let v = cur.top().expect("non-terminal node has a top variable");
            if v > key_bits {
                break;
            }
            let want = Storage::key_bit(&seek_ikey, v);
            stack.push(Frame { node: cur.clone(), var: v, bit: want, tried_right: want == 1 });
            cur = if want == 1 { cur.on_set0(v) } else { cur.off_set(v) };
        }

        let mut it = Self {
            storage,
            key_bits,
            cf_prefix: cf_id.map(|c| c.to_be_bytes()),
            data,
            stack,
            current: cur,
            done: false,
        };
        it.settle();
        it
    }

    /// A synthetic user key whose only set bit is the last one, used to seek
    /// to the smallest present key without special-casing the all-zero key.
    /// Sized to the *user key* portion of the internal key (the internal
    /// key's leading 4 bytes are the cf id, added separately by the caller).
    fn minimum_suffix(key_bits: u32) -> Vec<u8> {
        let bytes = (key_bits / 8) as usize - 4;
        let mut v = vec![0u8; bytes.max(1)];
        *v.last_mut().expect("non-empty buffer") = 1;
        v
    }

    /// Drives `current`/`stack` forward until landing on a live key (a
    /// non-empty node at or past the token range) or exhausting the
    /// diagram.
    ///
    /// Every store's low chain carries the empty combination forward (the
    /// way `union` folds TRUE into a node's low branch), so the all-off
    /// path reaches the TRUE terminal even where no real key was ever set —
    /// that terminal always decodes to token 0, which `Storage` never
    /// issues to a live entry. Landing on TRUE while still within the
    /// key-bit range is therefore a dead end exactly like landing on FALSE,
    /// not a key to report; only a TRUE reached after crossing into the
    /// token range (handled by `decode_token`, once `v > self.key_bits`
    /// below) can mean a real, stored token.
    fn settle(&mut self) {
        loop {
            if self.current.is_false() || self.current.is_true() {
                loop {
                    let Some(frame) = self.stack.last_mut() else {
                        self.done = true;
                        return;
                    };
                    if frame.bit == 0 && !frame.tried_right {
                        frame.bit = 1;
                        frame.tried_right = true;
                        self.current = frame.node.on_set0(frame.var);
                        break;
                    }
                    self.stack.pop();
                }
                continue;
            }
            let v = self.current.top().expect("non-terminal node has a top variable");
            if v > self.key_bits {
                return;
            }
            self.stack.push(Frame { node: self.current.clone(), var: v, bit: 0, tried_right: false });
            self.current = self.current.off_set(v);
        }
    }

    /// `true` if [`Self::current`] would yield a key.
    pub fn has_next(&self) -> bool {
        !self.done
    }

    /// Moves past the current key to the next one.
    pub fn advance(&mut self) {
        if self.done {
            return;
        }
        self.current = Zdd::empty();
        self.settle();
    }

    /// The key and level the iterator is currently positioned at, or `None`
    /// once exhausted.
    pub fn current(&self) -> Option<KeyLevelPair> {
        if self.done {
            return None;
        }
        let token = self.storage.decode_token(&self.current)?;
        let level = *self.data.get(&token)?;
        Some(KeyLevelPair::new(self.reconstruct_key(), level))
    }

    fn reconstruct_key(&self) -> Vec<u8> {
        let total_bytes = (self.key_bits / 8) as usize;
        let mut bytes = vec![0u8; total_bytes];
        if let Some(prefix) = self.cf_prefix {
            bytes[..4].copy_from_slice(&prefix);
        }
        for frame in &self.stack {
            if frame.bit == 1 {
                let bit_pos = frame.var - 1;
                let byte_idx = (bit_pos / 8) as usize;
                let bit_in_byte = 7 - (bit_pos % 8);
                bytes[byte_idx] |= 1 << bit_in_byte;
            }
        }
        bytes
    }
}
