// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;

use crate::iterator::Iterator;
use crate::storage::Storage;

/// Construction parameters for a [`ShardedStorage`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShardedStorageConfig {
    pub shard_count: u32,
    pub key_byte_len: u32,
    /// Fraction of a shard's live entries that must be tombstoned before a
    /// rebuild is triggered.
    pub rebuild_threshold: f64,
}

impl Default for ShardedStorageConfig {
    fn default() -> Self {
        Self { shard_count: 1000, key_byte_len: 0, rebuild_threshold: 0.5 }
    }
}

/// A fixed number of independent [`Storage`]s, dispatched by key hash.
/// Column family id is excluded from the dispatch hash, so a hot cf isn't
/// pinned to a single shard.
///
/// Each shard carries its own tombstone pressure; when one crosses
/// `rebuild_threshold` it is rebuilt from a scratch `Storage` fed by its own
/// iterator (bypassing compression — always valid here, since sharded
/// storage only ever uses identity compression). A shared vote counter
/// triggers a best-effort global ZDD GC every time roughly a tenth of the
/// shards have rebuilt.
pub struct ShardedStorage {
    shards: Vec<RwLock<Storage>>,
    config: ShardedStorageConfig,
    gc_votes: AtomicU32,
}

impl ShardedStorage {
    pub fn new(config: ShardedStorageConfig) -> Self {
        let shards = (0..config.shard_count.max(1))
            .map(|_| RwLock::new(Storage::with_key_len(config.key_byte_len)))
            .collect();
        Self { shards, config, gc_votes: AtomicU32::new(0) }
    }

    fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    pub fn set(&self, key: &[u8], level: u32) {
        self.set_cf(0, key, level);
    }

    pub fn set_cf(&self, cf_id: u32, key: &[u8], level: u32) {
        let idx = self.shard_index(key);
        self.shards[idx].read().set_cf(cf_id, key, level);
    }

    pub fn delete(&self, key: &[u8]) {
        self.delete_cf(0, key);
    }

    pub fn delete_cf(&self, cf_id: u32, key: &[u8]) {
        let idx = self.shard_index(key);
        self.shards[idx].read().delete_cf(cf_id, key);
        self.maybe_rebuild(idx);
        self.vote_gc();
    }

    pub fn get_level(&self, key: &[u8]) -> Option<u32> {
        self.get_level_cf(0, key)
    }

    pub fn get_level_cf(&self, cf_id: u32, key: &[u8]) -> Option<u32> {
        let idx = self.shard_index(key);
        self.shards[idx].read().get_level_cf(cf_id, key)
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn maybe_rebuild(&self, idx: usize) {
        let pressure = {
            let guard = self.shards[idx].read();
            let total = guard.size() + guard.deleted();
            if total == 0 {
                return;
            }
            guard.deleted() as f64 / total as f64
        };
        if pressure >= self.config.rebuild_threshold {
            self.rebuild_shard(idx);
        }
    }

    fn rebuild_shard(&self, idx: usize) {
        let rebuilt = {
            let guard = self.shards[idx].read();
            let rebuilt = Storage::with_key_len(self.config.key_byte_len);
            let mut it = Iterator::new(&guard);
            while let Some(pair) = it.current() {
                let (cf_id, user_key) = split_cf_prefix(&pair.key);
                rebuilt.set_cf(cf_id, user_key, pair.level);
                it.advance();
            }
            rebuilt
        };
        *self.shards[idx].write() = rebuilt;
        tracing::info!(shard = idx, "rebuilt shard to reclaim tombstoned entries");
    }

    fn vote_gc(&self) {
        let threshold = (self.shards.len() as u32 / 10).max(1);
        let votes = self.gc_votes.fetch_add(1, Ordering::AcqRel) + 1;
        if votes >= threshold {
            self.gc_votes.store(0, Ordering::Release);
            crate::zdd::gc();
        }
    }
}

/// Splits an iterator-reconstructed internal key back into its cf id and
/// user key. Only valid over identity compression, which is all
/// `ShardedStorage` ever configures its shards with.
fn split_cf_prefix(full_key: &[u8]) -> (u32, &[u8]) {
    let cf_id = u32::from_be_bytes(full_key[..4].try_into().expect("internal key has a 4-byte cf prefix"));
    (cf_id, &full_key[4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_survive_across_many_shards() {
        let store = ShardedStorage::new(ShardedStorageConfig {
            shard_count: 10,
            key_byte_len: 8,
            rebuild_threshold: 0.5,
        });
        for i in 0u32..1000 {
            store.set(&i.to_be_bytes(), i);
        }
        for i in 0u32..1000 {
            assert_eq!(store.get_level(&i.to_be_bytes()), Some(i));
        }
    }

    #[test]
    fn rebuild_preserves_live_entries() {
        let store = ShardedStorage::new(ShardedStorageConfig {
            shard_count: 1,
            key_byte_len: 4,
            rebuild_threshold: 0.4,
        });
        for i in 0u32..20 {
            store.set(&i.to_be_bytes(), i);
        }
        for i in 0u32..10 {
            store.delete(&i.to_be_bytes());
        }
        for i in 0u32..10 {
            assert_eq!(store.get_level(&i.to_be_bytes()), None);
        }
        for i in 10u32..20 {
            assert_eq!(store.get_level(&i.to_be_bytes()), Some(i));
        }
    }

    #[test]
    fn cf_disjoint_across_shards() {
        let store = ShardedStorage::new(ShardedStorageConfig {
            shard_count: 4,
            key_byte_len: 4,
            rebuild_threshold: 0.5,
        });
        store.set_cf(1, b"key1", 10);
        store.set_cf(2, b"key1", 20);
        assert_eq!(store.get_level_cf(1, b"key1"), Some(10));
        assert_eq!(store.get_level_cf(2, b"key1"), Some(20));
    }
}
