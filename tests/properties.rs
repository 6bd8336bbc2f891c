// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use lsm_zdd_index::{Iterator, Storage};
use quickcheck_macros::quickcheck;

const KEY_LEN: u32 = 12;

fn non_empty_key(raw: Vec<u8>) -> Vec<u8> {
    if raw.is_empty() {
        vec![1]
    } else {
        raw.into_iter().take(KEY_LEN as usize).collect()
    }
}

#[quickcheck]
fn set_then_get_roundtrips(raw_key: Vec<u8>, level: u32) -> bool {
    let key = non_empty_key(raw_key);
    let s = Storage::with_key_len(KEY_LEN);
    s.set(&key, level);
    s.get_level(&key) == Some(level)
}

#[quickcheck]
fn delete_clears_the_key(raw_key: Vec<u8>, level: u32) -> bool {
    let key = non_empty_key(raw_key);
    let s = Storage::with_key_len(KEY_LEN);
    s.set(&key, level);
    s.delete(&key);
    s.get_level(&key).is_none()
}

#[quickcheck]
fn repeated_set_is_idempotent(raw_key: Vec<u8>, level: u32) -> bool {
    let key = non_empty_key(raw_key);
    let s = Storage::with_key_len(KEY_LEN);
    s.set(&key, level);
    let size_once = s.size();
    s.set(&key, level);
    size_once == s.size() && s.size() == 1
}

#[quickcheck]
fn overwrite_keeps_size_but_changes_level(raw_key: Vec<u8>, l1: u32, l2: u32) -> bool {
    let key = non_empty_key(raw_key);
    let s = Storage::with_key_len(KEY_LEN);
    s.set(&key, l1);
    let size_once = s.size();
    s.set(&key, l2);
    size_once == s.size() && s.get_level(&key) == Some(l2)
}

#[quickcheck]
fn column_families_are_disjoint(raw_key: Vec<u8>, cf1: u32, cf2: u32, level: u32) -> bool {
    if cf1 == cf2 {
        return true;
    }
    let key = non_empty_key(raw_key);
    let s = Storage::with_key_len(KEY_LEN);
    s.set_cf(cf1, &key, level);
    s.get_level_cf(cf2, &key).is_none()
}

#[quickcheck]
fn iteration_visits_keys_in_ascending_order(mut raw_keys: Vec<Vec<u8>>) -> bool {
    raw_keys.truncate(20);
    let keys: Vec<Vec<u8>> = raw_keys.into_iter().map(non_empty_key).collect();
    let s = Storage::with_key_len(KEY_LEN);
    for k in &keys {
        s.set(k, 0);
    }
    let mut it = Iterator::new(&s);
    let mut seen = Vec::new();
    while let Some(pair) = it.current() {
        seen.push(pair.key);
        it.advance();
    }
    let mut sorted = seen.clone();
    sorted.sort();
    seen == sorted
}
