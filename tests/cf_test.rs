// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use lsm_zdd_index::{Iterator, Storage};

#[test]
fn column_families_stay_disjoint_under_iteration() {
    let s = Storage::with_key_len(16);
    s.set_cf(0, b"abc", 1);
    s.set_cf(1, b"abc", 1);
    s.set_cf(1, b"abacaba", 1);

    let it = Iterator::with_cf(&s, 0, None);
    let pair = it.current().expect("cf 0 has one key");
    assert_eq!(&pair.key[4..7], b"abc");

    assert_eq!(s.get_level_cf(0, b"abc"), Some(1));
    assert_eq!(s.get_level_cf(1, b"abc"), Some(1));
    assert_eq!(s.get_level_cf(1, b"abacaba"), Some(1));
    assert_eq!(s.get_level_cf(0, b"abacaba"), None);
}

#[test]
fn deleting_from_one_cf_leaves_others_untouched() {
    let s = Storage::with_key_len(16);
    s.set_cf(0, b"k", 1);
    s.set_cf(1, b"k", 2);
    s.delete_cf(0, b"k");
    assert_eq!(s.get_level_cf(0, b"k"), None);
    assert_eq!(s.get_level_cf(1, b"k"), Some(2));
}
