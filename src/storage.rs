// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT
use std::collections::HashMap;

use crate::compression::Compression;
use crate::error::Error;
use crate::internal_key::InternalKey;
use crate::lock::TicketLock;
use crate::zdd::{self, Zdd};

/// Number of ZDD variables reserved for the token that names a live key.
/// Tokens are `u32`, so 32 bits are always enough.
pub(crate) const TOKEN_BITS: u32 = 32;

/// Construction parameters for a [`Storage`].
///
/// `Default` intentionally produces an unusable configuration
/// (`key_byte_len = 0`): callers must size the index for their workload,
/// the way `RocksDbConfig`'s knobs must be filled in rather than relied on
/// blind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StorageConfig {
    /// Maximum byte length of a user key before compression.
    pub key_byte_len: u32,
    pub compression: Compression,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { key_byte_len: 0, compression: Compression::None }
    }
}

struct StorageInner {
    store: Zdd,
    data: HashMap<u32, u32>,
    current_token: u32,
    size: u64,
    deleted: u64,
}

/// An in-memory key→level index. One ZDD root plus a token→level map,
/// mutated under a FIFO ticket lock so many threads can share a `Storage`
/// directly (see [`crate::lock::TicketLock`]).
pub struct Storage {
    key_bits: u32,
    compression: Compression,
    inner: TicketLock<StorageInner>,
}

impl Storage {
    /// Builds a `Storage` for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VariableSpaceExhausted`] if `key_byte_len` is large
    /// enough that the derived ZDD variable count would not fit in `u32`.
    pub fn new(config: StorageConfig) -> Result<Self, Error> {
        let internal_key_bytes =
            4u64 + config.compression.compressed_len(config.key_byte_len as usize) as u64;
        let key_bits = internal_key_bytes * 8;
        let total_vars = key_bits + TOKEN_BITS as u64;
        if total_vars > u32::MAX as u64 {
            return Err(Error::VariableSpaceExhausted {
                key_byte_len: config.key_byte_len,
                needed: total_vars,
            });
        }
        zdd::init(total_vars as u32);
        Ok(Self {
            key_bits: key_bits as u32,
            compression: config.compression,
            inner: TicketLock::new(StorageInner {
                store: Zdd::single(),
                data: HashMap::new(),
                current_token: 0,
                size: 0,
                deleted: 0,
            }),
        })
    }

    /// Convenience constructor for the common identity-compression case.
    pub fn with_key_len(key_byte_len: u32) -> Self {
        Self::new(StorageConfig { key_byte_len, compression: Compression::None })
            .expect("identity compression never overflows the variable space for realistic key lengths")
    }

    pub(crate) fn key_bits(&self) -> u32 {
        self.key_bits
    }

    pub(crate) fn compression(&self) -> Compression {
        self.compression
    }

    pub(crate) fn snapshot(&self) -> (Zdd, HashMap<u32, u32>) {
        let guard = self.inner.lock();
        (guard.store.clone(), guard.data.clone())
    }

    // --- bit encoding ------------------------------------------------

    /// Bit `bit_pos` (0 = MSB of byte 0) of the internal key as a ZDD
    /// variable id. Key-bit variables occupy the low end of the id space so
    /// they sit nearest the ZDD root; token variables occupy the high end,
    /// nearest the terminals (see `DESIGN.md`).
    fn key_var(bit_pos: u32) -> u32 {
        bit_pos + 1
    }

    fn token_var(&self, token_bit: u32) -> u32 {
        self.key_bits + 1 + token_bit
    }

    pub(crate) fn key_bit(ikey: &InternalKey, var: u32) -> u8 {
        let bit_pos = var - 1;
        let byte_idx = (bit_pos / 8) as usize;
        let bit_in_byte = 7 - (bit_pos % 8);
        (ikey.byte(byte_idx) >> bit_in_byte) & 1
    }

    fn lsm_key_transform(&self, ikey: &InternalKey, token: u32) -> Zdd {
        let mut z = Zdd::single();
        for b in 0..TOKEN_BITS {
            if (token >> (TOKEN_BITS - 1 - b)) & 1 == 1 {
                z = z.change(self.token_var(b));
            }
        }
        for bit_pos in 0..self.key_bits {
            let byte_idx = (bit_pos / 8) as usize;
            let bit_in_byte = 7 - (bit_pos % 8);
            if (ikey.byte(byte_idx) >> bit_in_byte) & 1 == 1 {
                z = z.change(Self::key_var(bit_pos));
            }
        }
        z
    }

    /// Ascending variable ids of the 1-bits of `ikey`, restricted to the
    /// first `prefix_bits` bits of the key range (counted from the top).
    pub(crate) fn nz_vars(&self, ikey: &InternalKey, prefix_bits: u32) -> Vec<u32> {
        let bound = prefix_bits.min(self.key_bits);
        let mut out = Vec::new();
        for bit_pos in 0..bound {
            let var = Self::key_var(bit_pos);
            if Self::key_bit(ikey, var) == 1 {
                out.push(var);
            }
        }
        // The embedded engine never reorders variables, so this is already
        // sorted; kept so the code stays correct if that ever changes.
        out.sort_unstable();
        out
    }

    /// Descends from `store` to the sub-diagram encoding exactly the
    /// key-bit variables of `ikey` within the first `prefix_bits` bits,
    /// leaving the token range (or the rest of the key range, for a
    /// restricted prefix) below the returned node. `None` if no live key
    /// matches.
    pub(crate) fn get_subzdd(&self, store: &Zdd, ikey: &InternalKey, prefix_bits: u32) -> Option<Zdd> {
        let nz = self.nz_vars(ikey, prefix_bits);
        let boundary = prefix_bits.min(self.key_bits);
        let mut cur = store.clone();
        let mut front = 0usize;
        for _ in 0..=self.key_bits {
            if cur.is_false() {
                return None;
            }
            if cur.is_true() {
                break;
            }
            let top = cur.top().expect("non-terminal node has a top variable");
            if top > boundary {
                break;
            }
            if front < nz.len() && top == nz[front] {
                cur = cur.on_set0(top);
                front += 1;
            } else if front < nz.len() && top > nz[front] {
                return None;
            } else {
                cur = cur.off_set(top);
            }
        }
        // A node's low chain always carries the empty combination forward
        // (see `node::Engine::union`'s TRUE-with-non-terminal case), so the
        // all-off path through any store always *terminates* at TRUE even
        // for a key that was never set. Token 0 is never issued to a real
        // entry (`set_impl` hands out tokens from `current_token + 1`), so
        // landing on TRUE here — whether mid-walk or after matching every
        // expected bit — means no live key matches, not a token-0 match.
        if front < nz.len() || cur.is_false() || cur.is_true() {
            None
        } else {
            Some(cur)
        }
    }

    /// Walks the token-range bits of a resolved sub-diagram to decode the
    /// integer token it encodes.
    pub(crate) fn decode_token(&self, sub: &Zdd) -> Option<u32> {
        let mut cur = sub.clone();
        let mut token: u32 = 0;
        for _ in 0..TOKEN_BITS {
            if cur.is_false() {
                return None;
            }
            if cur.is_true() {
                return Some(token);
            }
            let v = cur.top().expect("non-terminal node has a top variable");
            let off = cur.off_set(v);
            if !off.is_false() {
                cur = off;
            } else {
                let on = cur.on_set0(v);
                if on.is_false() {
                    return None;
                }
                let bit_index = v - (self.key_bits + 1);
                token |= 1 << (TOKEN_BITS - 1 - bit_index);
                cur = on;
            }
        }
        Some(token)
    }

    fn get_token(&self, store: &Zdd, ikey: &InternalKey) -> Option<u32> {
        let sub = self.get_subzdd(store, ikey, self.key_bits)?;
        self.decode_token(&sub)
    }

    fn set_impl(&self, ikey: &InternalKey, level: u32) {
        let mut guard = self.inner.lock();
        if let Some(token) = self.get_token(&guard.store, ikey) {
            guard.data.insert(token, level);
            return;
        }
        guard.current_token = guard.current_token.checked_add(1).expect("token space exhausted");
        let token = guard.current_token;
        let transform = self.lsm_key_transform(ikey, token);
        guard.store = &guard.store + &transform;
        guard.data.insert(token, level);
        guard.size += 1;
    }

    fn delete_impl(&self, ikey: &InternalKey) {
        let mut guard = self.inner.lock();
        if let Some(token) = self.get_token(&guard.store, ikey) {
            guard.data.remove(&token);
            let transform = self.lsm_key_transform(ikey, token);
            guard.store = &guard.store - &transform;
            guard.size -= 1;
            guard.deleted += 1;
        }
    }

    fn get_level_impl(&self, ikey: &InternalKey) -> Option<u32> {
        let guard = self.inner.lock();
        let token = self.get_token(&guard.store, ikey)?;
        guard.data.get(&token).copied()
    }

    // --- public API ----------------------------------------------------

    pub fn set(&self, key: &[u8], level: u32) {
        self.set_cf(0, key, level);
    }

    pub fn set_cf(&self, cf_id: u32, key: &[u8], level: u32) {
        if key.is_empty() {
            return;
        }
        let ikey = InternalKey::with_cf(cf_id, key, self.compression);
        self.set_impl(&ikey, level);
    }

    pub fn delete(&self, key: &[u8]) {
        self.delete_cf(0, key);
    }

    pub fn delete_cf(&self, cf_id: u32, key: &[u8]) {
        if key.is_empty() {
            return;
        }
        let ikey = InternalKey::with_cf(cf_id, key, self.compression);
        self.delete_impl(&ikey);
    }

    pub fn get_level(&self, key: &[u8]) -> Option<u32> {
        self.get_level_cf(0, key)
    }

    pub fn get_level_cf(&self, cf_id: u32, key: &[u8]) -> Option<u32> {
        if key.is_empty() {
            return None;
        }
        let ikey = InternalKey::with_cf(cf_id, key, self.compression);
        self.get_level_impl(&ikey)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn size(&self) -> u64 {
        self.inner.lock().size
    }

    pub fn deleted(&self) -> u64 {
        self.inner.lock().deleted
    }

    /// Acquires the storage's ticket lock directly; mainly useful for
    /// coordinating a rebuild (see [`crate::sharded::ShardedStorage`]) or in
    /// tests that assert FIFO fairness. The returned guard exposes only its
    /// ticket id: `StorageInner` stays private to this module.
    pub fn lock(&self) -> StorageGuard<'_> {
        StorageGuard(self.inner.lock())
    }

    /// Diagnostic dump of this storage's state via `tracing::debug!`.
    pub fn print(&self) {
        let guard = self.inner.lock();
        tracing::debug!(
            size = guard.size,
            deleted = guard.deleted,
            current_token = guard.current_token,
            nodes = zdd::node_count(),
            "storage snapshot"
        );
    }
}

/// A held ticket on a [`Storage`]'s lock. Releases on `Drop`.
pub struct StorageGuard<'a>(crate::lock::LockGuard<'a, StorageInner>);

impl StorageGuard<'_> {
    pub fn id(&self) -> u32 {
        self.0.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> Storage {
        Storage::with_key_len(8)
    }

    #[test]
    fn set_then_get_roundtrips() {
        let s = storage();
        s.set(b"alpha", 3);
        assert_eq!(s.get_level(b"alpha"), Some(3));
        assert_eq!(s.get_level(b"missing"), None);
    }

    #[test]
    fn overwrite_replaces_level_without_new_token() {
        let s = storage();
        s.set(b"alpha", 1);
        s.set(b"alpha", 2);
        assert_eq!(s.get_level(b"alpha"), Some(2));
        assert_eq!(s.size(), 1);
    }

    #[test]
    fn delete_removes_key() {
        let s = storage();
        s.set(b"alpha", 1);
        s.delete(b"alpha");
        assert_eq!(s.get_level(b"alpha"), None);
        assert_eq!(s.deleted(), 1);
        assert_eq!(s.size(), 0);
    }

    #[test]
    fn delete_is_idempotent() {
        let s = storage();
        s.set(b"alpha", 1);
        s.delete(b"alpha");
        s.delete(b"alpha");
        assert_eq!(s.deleted(), 1);
    }

    #[test]
    fn empty_key_is_a_silent_no_op() {
        let s = storage();
        s.set(b"", 1);
        assert!(s.is_empty());
        assert_eq!(s.get_level(b""), None);
    }

    #[test]
    fn all_zero_byte_key_is_a_real_entry_not_the_phantom_empty_combination() {
        let s = storage();
        s.set(&[0u8; 8], 7);
        assert_eq!(s.get_level(&[0u8; 8]), Some(7));
        assert_eq!(s.size(), 1);
        s.delete(&[0u8; 8]);
        assert_eq!(s.get_level(&[0u8; 8]), None);
        assert_eq!(s.size(), 0);
        assert_eq!(s.deleted(), 1);
    }

    #[test]
    fn column_families_are_disjoint() {
        let s = storage();
        s.set_cf(1, b"alpha", 10);
        s.set_cf(2, b"alpha", 20);
        assert_eq!(s.get_level_cf(1, b"alpha"), Some(10));
        assert_eq!(s.get_level_cf(2, b"alpha"), Some(20));
    }

    #[test]
    fn many_keys_survive_interleaved_mutation() {
        let s = storage();
        for i in 0u8..64 {
            s.set(&[i], i as u32);
        }
        for i in (0u8..64).step_by(2) {
            s.delete(&[i]);
        }
        for i in 0u8..64 {
            let expected = if i % 2 == 0 { None } else { Some(i as u32) };
            assert_eq!(s.get_level(&[i]), expected);
        }
    }
}
