// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use lsm_zdd_index::{ShardedStorage, ShardedStorageConfig};

#[test]
fn ten_thousand_keys_across_ten_shards() {
    let store = ShardedStorage::new(ShardedStorageConfig {
        shard_count: 10,
        key_byte_len: 10,
        rebuild_threshold: 0.5,
    });
    for i in 0u32..10_000 {
        store.set(format!("key_{i}").as_bytes(), i);
    }
    for i in 0u32..10_000 {
        assert_eq!(store.get_level(format!("key_{i}").as_bytes()), Some(i));
    }
}
